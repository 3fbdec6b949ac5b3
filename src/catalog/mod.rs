//! # Query Catalog
//!
//! A fixed mapping from logical query name to parameterized SQL. The
//! [`QueryCatalog`] is store-independent; a [`PreparedCatalog`] binds it to
//! one store handle and is rebuilt whenever that handle is replaced.

mod errors;
mod prepared;

pub use errors::{QueryError, QueryResult};
pub use prepared::PreparedCatalog;

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

/// Names of the content catalog's statements
pub mod names {
    pub const ALL_POSTS: &str = "allPosts";
    pub const ALL_PROJECTS: &str = "allProjects";
    pub const ALL_ARTICLES: &str = "allArticles";
    pub const POST_BY_ID: &str = "postById";
    pub const RECENT_POSTS: &str = "recentPosts";
    pub const RECENT_ARTICLES: &str = "recentArticles";
    pub const RECENT_PROJECTS: &str = "recentProjects";
    pub const IMAGE_BY_ID: &str = "imageById";
    pub const IMAGE_BY_FILENAME: &str = "imageByFilename";
}

const POSTS_SELECT: &str = "SELECT post_id
    ,game_id
    ,post_category_id
    ,post_uid
    ,post_title
    ,post_subtext
    ,post_preview_image_url
    ,post_datetime
    ,post_author
    ,post_markdown_content
    ,post_js_resource_key
    ,game_path
    ,post_category
FROM content.vw_posts vp
";

/// A named, parameterized statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    name: String,
    sql: String,
    param_arity: usize,
}

impl QueryDescriptor {
    pub fn new(name: impl Into<String>, sql: impl Into<String>, param_arity: usize) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
            param_arity,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn param_arity(&self) -> usize {
        self.param_arity
    }

    /// Highest `$n` placeholder in the SQL text, 0 if none
    fn highest_placeholder(&self) -> usize {
        static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
        let re = PLACEHOLDER.get_or_init(|| Regex::new(r"\$(\d+)").expect("static regex"));

        re.captures_iter(&self.sql)
            .filter_map(|c| c[1].parse::<usize>().ok())
            .max()
            .unwrap_or(0)
    }
}

/// The full, immutable set of statements the service may run
#[derive(Debug, Clone)]
pub struct QueryCatalog {
    descriptors: Vec<QueryDescriptor>,
}

impl QueryCatalog {
    /// Build a catalog, rejecting duplicate names and descriptors whose
    /// placeholders disagree with their declared arity
    pub fn new(descriptors: Vec<QueryDescriptor>) -> QueryResult<Self> {
        let mut seen = HashSet::new();

        for descriptor in &descriptors {
            if !seen.insert(descriptor.name.as_str()) {
                return Err(QueryError::InvalidDescriptor {
                    name: descriptor.name.clone(),
                    reason: "duplicate query name".to_string(),
                });
            }

            let placeholders = descriptor.highest_placeholder();
            if placeholders != descriptor.param_arity {
                return Err(QueryError::InvalidDescriptor {
                    name: descriptor.name.clone(),
                    reason: format!(
                        "declares {} parameter(s) but its SQL uses {}",
                        descriptor.param_arity, placeholders
                    ),
                });
            }
        }

        Ok(Self { descriptors })
    }

    /// The content catalog served by the HTTP surface
    pub fn content() -> Self {
        let descriptors = vec![
            QueryDescriptor::new(names::ALL_POSTS, POSTS_SELECT, 0),
            QueryDescriptor::new(
                names::ALL_PROJECTS,
                format!("{}WHERE vp.post_category = 'project'", POSTS_SELECT),
                0,
            ),
            QueryDescriptor::new(
                names::ALL_ARTICLES,
                format!("{}WHERE vp.post_category = 'article'", POSTS_SELECT),
                0,
            ),
            QueryDescriptor::new(
                names::POST_BY_ID,
                "select * from content.fn_get_post_by_id($1)",
                1,
            ),
            QueryDescriptor::new(
                names::RECENT_POSTS,
                "select * from content.fn_get_recent_posts($1)",
                1,
            ),
            QueryDescriptor::new(
                names::RECENT_ARTICLES,
                "select * from content.fn_get_recent_articles($1)",
                1,
            ),
            QueryDescriptor::new(
                names::RECENT_PROJECTS,
                "select * from content.fn_get_recent_projects($1)",
                1,
            ),
            QueryDescriptor::new(
                names::IMAGE_BY_ID,
                "select image from content.fn_get_image_by_id($1)",
                1,
            ),
            QueryDescriptor::new(
                names::IMAGE_BY_FILENAME,
                "select image from content.fn_get_image_by_filename($1)",
                1,
            ),
        ];

        Self { descriptors }
    }

    pub fn get(&self, name: &str) -> Option<&QueryDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    pub fn descriptors(&self) -> &[QueryDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
