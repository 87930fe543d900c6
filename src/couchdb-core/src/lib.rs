//! couchdb-core
//!
//! Data models shared by the couchdb-rs client, including:
//! - Document bodies with `_id`/`_rev` promoted to named fields
//! - Result rows for `_all_docs` and view queries
//! - Write, server and database info responses
//! - Connection configuration

pub mod config;
pub mod models;

// Re-export commonly used types
pub use config::Config;
pub use models::*;
