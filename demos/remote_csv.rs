//! Example: fetching a remote CSV file over HTTP.
//!
//! Run with: `cargo run --example remote_csv -- <url>`
//!
//! Press Ctrl-C to cancel a slow download.

use query_frames::query::{ParserMode, Query, QueryType};
use query_frames::{pipeline, ExecCtx, HttpClient};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "query_frames=debug".into()),
        ))
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://people.sc.fsu.edu/~jburkardt/data/csv/cities.csv".into());

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    let client = HttpClient::builder()
        .timeout(Duration::from_secs(20))
        .user_agent(concat!("query-frames/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let ctx = ExecCtx::builder().cancellation(Some(cancel)).build();
    let query = Query::builder(QueryType::Csv, url)
        .ref_id("A")
        .parser(ParserMode::Backend)
        .build()?;

    let response = pipeline::execute(&ctx, &query, &client, &HashMap::new()).await;
    println!("executed: {}", response.frame.meta.executed_query_string);
    match &response.error {
        None => {
            println!("{} rows", response.frame.row_count());
            for field in &response.frame.fields {
                println!("  {} ({:?})", field.name, field.field_type);
            }
        }
        Some(e) => eprintln!("query failed: {}", e),
    }
    Ok(())
}
