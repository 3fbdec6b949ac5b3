//! Column name normalization

/// Rewrite a snake-case column identifier as a camel-case JSON key
///
/// The name is lowercased, then every `_` or `-` followed by an ASCII
/// letter is removed and the letter uppercased: `post_title` becomes
/// `postTitle`. A name with no separator that starts with a lowercase
/// letter is already a key and is returned as is, so normalizing a
/// normalized key is a no-op. Separators not followed by a letter are kept.
pub fn normalize_column_name(name: &str) -> String {
    let has_separator = name.contains(['_', '-']);
    if !has_separator && name.starts_with(|c: char| c.is_ascii_lowercase()) {
        return name.to_string();
    }

    let lowered = name.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut chars = lowered.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '_' || c == '-' {
            if let Some(next) = chars.peek().copied().filter(|n| n.is_ascii_alphabetic()) {
                out.push(next.to_ascii_uppercase());
                chars.next();
                continue;
            }
        }
        out.push(c);
    }

    out
}
