//! Basic Usage Example
//!
//! Connects to a local server, creates a database and walks through the
//! document lifecycle: create, fetch, update, list, delete.
//!
//! Run with: cargo run --example basic_usage
//! (expects a server on http://localhost:5984, override with COUCHDB_URL)

use couchdb_rs::{Config, Fields, Server};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("couchdb_rs=debug"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()?;

    let mut config = Config::default();
    if let Ok(url) = std::env::var("COUCHDB_URL") {
        config.url = url;
    }
    let server = Server::from_config(&config)?;

    println!("Server version: {}", server.version().await?);
    println!("Databases: {:?}\n", server.list_databases().await?);

    let db = server.use_database("animals", true).await?;
    let info = db.info().await?;
    println!("📦 Using '{}' ({} documents)\n", info.db_name, info.doc_count);

    let mut fields = Fields::new();
    fields.insert("id".to_string(), json!("wolf"));
    fields.insert("noise".to_string(), json!("howl"));
    let mut doc = db.create(fields).await?;
    println!("📝 Created {:?} at {:?}", doc.id(), doc.revision());

    doc.set("noise", "growl");
    let doc = doc.update().await?;
    println!("✏️  Updated to {:?}", doc.revision());

    let fetched = db.document_by_id("wolf").await?;
    println!("   noise = {}\n", fetched.get("noise").unwrap_or(&json!(null)));

    let all = db.all_documents(true).await?;
    println!("🔍 {} document(s) in '{}':", all.len(), db.name());
    for doc in all.documents().unwrap_or_default() {
        println!("   {:?}", doc);
    }

    doc.delete().await?;
    println!("\n🗑️  Deleted 'wolf'");

    Ok(())
}
