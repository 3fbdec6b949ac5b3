//! restgres - A read-only JSON content API over PostgreSQL
//!
//! Request path, leaves first:
//! - `store`: store connections and generic result rows
//! - `catalog`: the fixed set of named, prepared queries
//! - `marshal`: result rows to JSON
//! - `dispatch`: URL classification and response shaping
//! - `resilience`: reopening the store after a failure
//! - `service`: the per-process context tying them together

pub mod catalog;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod http_server;
pub mod marshal;
pub mod observability;
pub mod resilience;
pub mod service;
pub mod store;
