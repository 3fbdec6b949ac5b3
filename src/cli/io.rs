//! Terminal I/O for the CLI
//!
//! - Prompts read one line each from the given input
//! - Reports are single JSON objects on stdout

use std::io::{self, BufRead, Write};

use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Print `question` and read one trimmed line of answer
pub fn prompt<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> CliResult<String> {
    write!(output, "{}", question)?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(CliError::io_error(format!(
            "Unexpected end of input while reading: {}",
            question.trim_end_matches([':', ' '])
        )));
    }

    Ok(line.trim().to_string())
}

/// Write a success report to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });

    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, &response)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}
