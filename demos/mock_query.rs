//! Example: running queries against MockClient, no network needed.
//!
//! Run with: `cargo run --example mock_query`

use query_frames::query::{Column, ColumnType, Filter, FilterOperator, ParserMode, Query, QueryType};
use query_frames::{pipeline, ExecCtx, MockClient};
use serde_json::json;
use std::collections::HashMap;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "query_frames=debug".into()),
        ))
        .init();

    let ctx = ExecCtx::default();
    let headers = HashMap::new();

    // Backend JSON with typed columns and a filter
    let query = Query::builder(QueryType::Json, "https://api.example.com/users")
        .ref_id("users")
        .parser(ParserMode::Backend)
        .root_selector("data.users")
        .column(Column::new("name").with_text("Name"))
        .column(Column::new("age").with_text("Age").with_type(ColumnType::Number))
        .filter(Filter::new("Age", FilterOperator::GreaterThanOrEqual, "18"))
        .build()?;
    let client = MockClient::fixed(json!({
        "data": {"users": [
            {"name": "Ann", "age": "41"},
            {"name": "Bob", "age": "7"},
            {"name": "Cyd", "age": "19"}
        ]}
    }));
    let response = pipeline::execute(&ctx, &query, &client, &headers).await;
    println!("{}", serde_json::to_string_pretty(&response.frame)?);

    // SQL over the same payload
    let query = Query::builder(QueryType::Json, "https://api.example.com/users")
        .ref_id("stats")
        .parser(ParserMode::Sqlite)
        .root_selector("data.users")
        .sqlite_query("SELECT count(*) AS users, avg(CAST(age AS REAL)) AS mean_age FROM input")
        .build()?;
    let frame = pipeline::execute(&ctx, &query, &client, &headers)
        .await
        .into_result()?;
    for field in &frame.fields {
        println!("{} = {:?}", field.name, field.values);
    }

    // A CSV query fed a JSON object fails, but the frame still carries diagnostics
    let query = Query::builder(QueryType::Csv, "https://api.example.com/users.csv")
        .ref_id("broken")
        .parser(ParserMode::Backend)
        .build()?;
    let response = pipeline::execute(&ctx, &query, &client, &headers).await;
    if let Some(meta) = &response.frame.meta.custom {
        println!("error: {}", meta.error);
        println!("status: {}, duration: {:?}", meta.response_code_from_server, meta.duration);
    }

    Ok(())
}
