//! Conflict Retry Example
//!
//! Read-modify-write loop: when an update loses a race with another writer
//! the server answers with a conflict, so re-fetch, reapply and try again.
//!
//! Run with: cargo run --example conflict_retry

use couchdb_rs::{Database, Document, Error, Fields, Server, ViewOptions};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const MAX_ATTEMPTS: usize = 5;

async fn increment(db: &Database, id: &str) -> anyhow::Result<Document> {
    for attempt in 1..=MAX_ATTEMPTS {
        let mut doc = db.document_by_id(id).await?;
        let visits = doc.get_as::<u64>("visits")?.unwrap_or(0);
        doc.set("visits", visits + 1);

        match doc.update().await {
            Ok(updated) => return Ok(updated),
            Err(Error::DocumentConflict(reason)) => {
                tracing::warn!(attempt, %reason, "Update conflicted, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
    anyhow::bail!("gave up on {} after {} attempts", id, MAX_ATTEMPTS)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    let server = Server::from_url("http://localhost:5984")?;
    let db = server.use_database("counters", true).await?;

    let id = "homepage";
    match db.document_by_id(id).await {
        Ok(_) => {}
        Err(e) if e.is_not_found() => {
            let mut fields = Fields::new();
            fields.insert("id".to_string(), json!(id));
            fields.insert("visits".to_string(), json!(0));
            db.create(fields).await?;
        }
        Err(e) => return Err(e.into()),
    }

    // a stale copy to show the conflict path
    let stale = db.document_by_id(id).await?;

    let current = increment(&db, id).await?;
    println!("visits = {:?} at {:?}", current.get("visits"), current.revision());

    match stale.update().await {
        Err(e) if e.is_conflict() => println!("stale copy rejected: {}", e),
        other => println!("unexpected: {:?}", other.map(|d| d.revision().map(String::from))),
    }

    let by_day = db
        .view(&ViewOptions::new("stats", "by_day").param("group", true))
        .await;
    match by_day {
        Ok(rows) => println!("{} day(s) in stats/by_day", rows.len()),
        Err(e) => println!("no stats view: {}", e),
    }

    Ok(())
}
