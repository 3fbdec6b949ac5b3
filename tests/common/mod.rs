//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use tempfile::TempDir;
use tower::ServiceExt;

use restgres::config::{ConfigStore, ServiceConfig};
use restgres::http_server::build_router;
use restgres::service::ContentService;
use restgres::store::{Cell, CellValue, MemoryConnector, ResultRow, ResultRowSet, SqlType};

/// A service over an in-memory store, plus its config directory
pub struct Harness {
    pub connector: MemoryConnector,
    pub service: Arc<ContentService<MemoryConnector>>,
    pub config_path: std::path::PathBuf,
    _dir: TempDir,
}

impl Harness {
    pub async fn new(connector: MemoryConnector) -> Self {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("restgres.json");

        let mut config = ServiceConfig::new("host=memory dbname=site", "", "");
        config.reconnect_backoff_ms = 1;
        config.write(&config_path).unwrap();

        let store = ConfigStore::load(&config_path, false).unwrap();
        let service = ContentService::start(connector.clone(), store).await.unwrap();

        Self {
            connector,
            service: Arc::new(service),
            config_path,
            _dir: dir,
        }
    }

    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.service))
    }

    pub async fn get(&self, path: &str) -> Reply {
        self.request(Method::GET, path).await
    }

    pub async fn request(&self, method: Method, path: &str) -> Reply {
        self.request_with_headers(method, path, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        path: &str,
        headers: &[(&str, &str)],
    ) -> Reply {
        let mut builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Body::empty()).unwrap();

        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();

        Reply {
            status,
            headers,
            body,
        }
    }
}

/// A collected HTTP response
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).unwrap()
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// One row shaped like `content.vw_posts`
pub fn post_row(id: i64, title: &str, category: &str) -> ResultRow {
    ResultRow::new(vec![
        Cell::integer("post_id", id),
        Cell::integer("game_id", 3),
        Cell::integer("post_category_id", 1),
        Cell::new("post_uid", SqlType::Uuid, CellValue::Text(format!("00000000-0000-0000-0000-{:012}", id))),
        Cell::new("post_title", SqlType::Varchar, CellValue::Text(title.to_string())),
        Cell::null("post_subtext", SqlType::Text),
        Cell::text("post_preview_image_url", "/api/images/preview.png"),
        Cell::new(
            "post_datetime",
            SqlType::Timestamp,
            CellValue::Text("2024-02-29 18:30:00".to_string()),
        ),
        Cell::text("post_author", "admin"),
        Cell::text("post_markdown_content", "# Hello"),
        Cell::null("post_js_resource_key", SqlType::Varchar),
        Cell::text("game_path", "/games/snake"),
        Cell::text("post_category", category),
    ])
}

pub fn posts(rows: Vec<ResultRow>) -> ResultRowSet {
    ResultRowSet::new(rows)
}

pub fn image(bytes: &[u8]) -> ResultRowSet {
    ResultRowSet::new(vec![ResultRow::new(vec![Cell::bytes("image", bytes.to_vec())])])
}
