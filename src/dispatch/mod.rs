//! # Route Dispatcher
//!
//! Classifies request paths into catalog queries and shapes the reply.
//!
//! | Path | Query | Reply |
//! |------|-------|-------|
//! | `/api/posts` | allPosts | JSON |
//! | `/api/projects` | allProjects | JSON |
//! | `/api/articles` | allArticles | JSON |
//! | `/api/posts/{id}` | postById | JSON |
//! | `/api/recentPosts/{n}` | recentPosts | JSON |
//! | `/api/recentArticles/{n}` | recentArticles | JSON |
//! | `/api/recentProjects/{n}` | recentProjects | JSON |
//! | `/api/images/{id}` | imageById | bytes |
//! | `/api/images/{name}.{ext}` | imageByFilename | bytes |
//!
//! Anything else is a 404 with a fixed body.

mod errors;
mod response;
mod routes;

pub use errors::{DispatchError, DispatchResult, RequestError};
pub use response::{ApiResponse, BAD_REQUEST_BODY, INTERNAL_ERROR_BODY, NOT_FOUND_BODY};
pub use routes::{ResponseKind, Route, RouteMatch, RoutePattern, RouteTable, IMAGE_EXTENSIONS};
