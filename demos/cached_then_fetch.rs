//! Example showing stored data first, then the fresh network response.
//!
//! This example shows how to:
//! - Decode a model from a nested path
//! - Read a response back from the local cache
//! - Use `cached_then_fetch` to get the cached value before the network one
//! - Log curl transcripts of outgoing requests
//!
//! Run with: `cargo run --example cached_then_fetch`

use cachet::{decodable_model, Client, Error, LoggingPolicy, Request, ResponseType};
use futures_util::StreamExt;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Slide {
    title: String,
    #[serde(rename = "type")]
    kind: String,
}

decodable_model!(Slide);

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("cachet=debug,cachet::curl=info,cached_then_fetch=info")
        .init();

    let client = Client::builder().logging(LoggingPolicy::Always).build()?;

    let request = Request::<Vec<Option<Slide>>>::new("https://httpbin.org/json")?
        .path("slideshow/slides");

    println!("=== First run: nothing stored yet ===");
    let mut updates = Box::pin(client.cached_then_fetch(&request));
    while let Some(update) = updates.next().await {
        let update = update?;
        let source = match update.response_type {
            ResponseType::LocalCache => "local cache",
            ResponseType::HttpCache => "HTTP cache",
            ResponseType::Regular => "network",
        };
        println!("{} slides from the {}", update.result.len(), source);
    }
    println!();

    println!("=== Second run: cached value arrives first ===");
    let mut updates = Box::pin(client.cached_then_fetch(&request));
    while let Some(update) = updates.next().await {
        let update = update?;
        println!("{:?} response with {} slides", update.response_type, update.result.len());
        for slide in update.result.iter().flatten() {
            println!("  - {} ({})", slide.title, slide.kind);
        }
    }
    println!();

    println!("=== Local cache only ===");
    match client.cached_models(&request).await? {
        Some(cached) => println!("{} slides stored", cached.result.len()),
        None => println!("Nothing stored"),
    }

    let uncached = request.clone().disable_local_cache(true);
    match client.cached_models(&uncached).await {
        Err(Error::CachePolicyConflict) => println!("Local cache disabled for this request"),
        other => println!("Unexpected: {:?}", other.map(|r| r.map(|r| r.response_type))),
    }

    Ok(())
}
