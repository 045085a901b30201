//! Example demonstrating batch requests with per-slot failures.
//!
//! This example shows how to:
//! - Fetch several descriptors concurrently with `models_batch`
//! - Inspect the result of each slot independently
//! - Register a client-wide interceptor
//! - Stream cached and fresh batches with `cached_then_fetch_batch`
//!
//! Run with: `cargo run --example batch_models`

use cachet::{interceptor_fn, Client, Error, LoggingPolicy, Request};
use futures_util::StreamExt;
use http::HeaderValue;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("cachet=debug,batch_models=info")
        .init();

    let client = Client::builder()
        .logging(LoggingPolicy::OnError)
        .interceptor(interceptor_fn(|mut request| {
            request
                .headers
                .insert("x-demo", HeaderValue::from_static("batch_models"));
            request
        }))
        .build()?;

    let requests = vec![
        Request::<serde_json::Value>::new("https://httpbin.org/get")?.path("headers/X-Demo"),
        Request::<serde_json::Value>::new("https://httpbin.org/status/500")?,
        Request::<serde_json::Value>::new("https://httpbin.org/json")?.path("slideshow/title"),
    ];

    println!("=== Batch fetch ===");
    for (index, result) in client.models_batch(&requests).await.into_iter().enumerate() {
        match result {
            Ok(response) => println!("[{}] {} -> {}", index, response.status, response.result),
            Err(Error::HttpError { status, .. }) => println!("[{}] failed with {}", index, status),
            Err(e) => println!("[{}] failed: {}", index, e),
        }
    }
    println!();

    println!("=== Cached then fetch ===");
    let mut batches = Box::pin(client.cached_then_fetch_batch(&requests));
    while let Some(batch) = batches.next().await {
        let succeeded = batch.iter().filter(|result| result.is_ok()).count();
        let cached = batch
            .iter()
            .filter(|result| result.as_ref().map(|r| r.is_cached()).unwrap_or(false))
            .count();
        println!("{} of {} succeeded, {} cached", succeeded, batch.len(), cached);
    }

    Ok(())
}
