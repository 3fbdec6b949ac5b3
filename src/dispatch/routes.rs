//! Route table
//!
//! Routes are tagged patterns tried in precedence order: literals, then
//! numeric parameters, then filenames. Every pattern is anchored at both
//! ends of the path.

use axum::http::Method;

use super::errors::RequestError;
use crate::catalog::names;
use crate::store::QueryParam;

/// Image extensions accepted by the filename route
pub const IMAGE_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "gif", "bmp"];

/// Shape of a route's path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePattern {
    /// Exact path
    Literal { path: &'static str },
    /// `prefix` followed by a run of ASCII digits, bound as `int4`
    NumericParam { prefix: &'static str },
    /// `prefix` followed by `<name>.<ext>`, bound verbatim as text
    FilenameParam {
        prefix: &'static str,
        extensions: &'static [&'static str],
    },
}

impl RoutePattern {
    fn precedence(&self) -> u8 {
        match self {
            RoutePattern::Literal { .. } => 0,
            RoutePattern::NumericParam { .. } => 1,
            RoutePattern::FilenameParam { .. } => 2,
        }
    }

    /// Match `path`, returning the extracted parameters
    fn extract(&self, path: &str) -> Result<Option<Vec<QueryParam>>, RequestError> {
        match self {
            RoutePattern::Literal { path: literal } => {
                Ok((path == *literal).then(Vec::new))
            }
            RoutePattern::NumericParam { prefix } => {
                let digits = match path.strip_prefix(*prefix) {
                    Some(rest) if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) => {
                        rest
                    }
                    _ => return Ok(None),
                };

                let value = digits
                    .parse::<i32>()
                    .map_err(|e| RequestError::BadParameter {
                        value: digits.to_string(),
                        reason: e.to_string(),
                    })?;
                Ok(Some(vec![QueryParam::Int(value)]))
            }
            RoutePattern::FilenameParam { prefix, extensions } => {
                let filename = match path.strip_prefix(*prefix) {
                    Some(rest) => rest,
                    None => return Ok(None),
                };
                let (stem, ext) = match filename.rsplit_once('.') {
                    Some(parts) => parts,
                    None => return Ok(None),
                };

                let stem_ok = !stem.is_empty() && !stem.chars().any(char::is_whitespace);
                let ext_ok = extensions.iter().any(|e| e.eq_ignore_ascii_case(ext));
                if stem_ok && ext_ok {
                    Ok(Some(vec![QueryParam::Text(filename.to_string())]))
                } else {
                    Ok(None)
                }
            }
        }
    }
}

/// How a matched route's rows are returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Json,
    BinaryBlob,
}

/// A path pattern bound to a catalog query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub pattern: RoutePattern,
    pub query: &'static str,
    pub kind: ResponseKind,
}

impl Route {
    pub fn literal(path: &'static str, query: &'static str) -> Self {
        Self {
            pattern: RoutePattern::Literal { path },
            query,
            kind: ResponseKind::Json,
        }
    }

    pub fn numeric(prefix: &'static str, query: &'static str, kind: ResponseKind) -> Self {
        Self {
            pattern: RoutePattern::NumericParam { prefix },
            query,
            kind,
        }
    }

    pub fn filename(prefix: &'static str, query: &'static str) -> Self {
        Self {
            pattern: RoutePattern::FilenameParam {
                prefix,
                extensions: IMAGE_EXTENSIONS,
            },
            query,
            kind: ResponseKind::BinaryBlob,
        }
    }
}

/// A classified request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub query: &'static str,
    pub params: Vec<QueryParam>,
    pub kind: ResponseKind,
}

/// Ordered, immutable set of routes
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Build a table, ordering routes by pattern precedence
    ///
    /// The sort is stable, so routes of the same class keep the order
    /// they were given in.
    pub fn new(mut routes: Vec<Route>) -> Self {
        routes.sort_by_key(|r| r.pattern.precedence());
        Self { routes }
    }

    /// The content API's routes
    pub fn content() -> Self {
        use ResponseKind::{BinaryBlob, Json};

        Self::new(vec![
            Route::literal("/api/posts", names::ALL_POSTS),
            Route::literal("/api/projects", names::ALL_PROJECTS),
            Route::literal("/api/articles", names::ALL_ARTICLES),
            Route::numeric("/api/posts/", names::POST_BY_ID, Json),
            Route::numeric("/api/recentPosts/", names::RECENT_POSTS, Json),
            Route::numeric("/api/recentArticles/", names::RECENT_ARTICLES, Json),
            Route::numeric("/api/recentProjects/", names::RECENT_PROJECTS, Json),
            Route::numeric("/api/images/", names::IMAGE_BY_ID, BinaryBlob),
            Route::filename("/api/images/", names::IMAGE_BY_FILENAME),
        ])
    }

    /// Classify a request
    ///
    /// `Ok(None)` means no route applies (including any method other than
    /// GET). A route that matches but carries an unusable parameter is a
    /// [`RequestError`].
    pub fn classify(&self, method: &Method, path: &str) -> Result<Option<RouteMatch>, RequestError> {
        if *method != Method::GET {
            return Ok(None);
        }

        for route in &self.routes {
            if let Some(params) = route.pattern.extract(path)? {
                return Ok(Some(RouteMatch {
                    query: route.query,
                    params,
                    kind: route.kind,
                }));
            }
        }

        Ok(None)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}
