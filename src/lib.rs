//! # Cachet - A cache-aware typed HTTP client
//!
//! Cachet sits between your code and an HTTP transport. It decodes typed
//! models from arbitrary nested locations in response bodies and can answer
//! from stored responses before, or instead of, going to the network.
//!
//! ## Quick Start
//!
//! ```no_run
//! use cachet::{decodable_model, Client, Request, ResponseType};
//! use futures_util::StreamExt;
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct Player {
//!     first_name: String,
//!     last_name: String,
//! }
//!
//! decodable_model!(Player);
//!
//! #[tokio::main]
//! async fn main() -> Result<(), cachet::Error> {
//!     let client = Client::builder().build()?;
//!
//!     // Decode the second player of the first team
//!     let request = Request::<Player>::new("https://api.example.com/teams")?
//!         .path("teams[0]/players[1]");
//!     let player = client.models(&request).await?;
//!     println!("{} {}", player.first_name, player.last_name);
//!
//!     // Show stored data right away, then the fresh response
//!     let roster = Request::<Vec<Option<Player>>>::new("https://api.example.com/roster")?
//!         .path("players");
//!     let mut updates = Box::pin(client.cached_then_fetch(&roster));
//!     while let Some(update) = updates.next().await {
//!         let update = update?;
//!         let source = match update.response_type {
//!             ResponseType::LocalCache => "cache",
//!             ResponseType::HttpCache => "revalidated",
//!             ResponseType::Regular => "network",
//!         };
//!         println!("{} players from {}", update.result.len(), source);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Dual-source fetching** - `models`, `cached_models` and `cached_then_fetch`, plus batch forms
//! - **Response classification** - Every response says whether it came from the local cache, the HTTP cache or the network
//! - **Path-based decoding** - `teams[0]/players[1]` style paths into JSON and XML bodies
//! - **Decode arities** - `T`, `Vec<T>`, best-effort `Vec<Option<T>>` and `Option<T>`
//! - **Deterministic encoding** - Sorted query flattening, URL-encoded, JSON and multipart bodies
//! - **Interceptors** - Sync or async request rewriting, per request or per client
//! - **Automatic logging** - Structured logging with `tracing`, and curl transcripts on demand
//!
//! ## Error Handling
//!
//! Failures carry what you need to debug them, including the raw body of
//! error responses:
//!
//! ```no_run
//! use cachet::{Client, Error, Request};
//!
//! # async fn example() -> Result<(), Error> {
//! # let client = Client::builder().build()?;
//! let request = Request::<serde_json::Value>::new("https://api.example.com/endpoint")?
//!     .path("data");
//!
//! match client.models(&request).await {
//!     Ok(response) => println!("Success: {:?}", response.result),
//!     Err(Error::HttpError { status, raw_response, .. }) => {
//!         eprintln!("HTTP error {}: {}", status, String::from_utf8_lossy(&raw_response));
//!     }
//!     Err(Error::DecodeFailed { path, message }) => {
//!         eprintln!("No model at {:?}: {}", path, message);
//!     }
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! # Ok(())
//! # }
//! ```

mod cache;
mod client;
mod container;
pub mod encoding;
mod error;
mod formatter;
mod interceptor;
mod model;
pub mod path;
mod request;
mod response;
pub mod response_cache;
mod transport;
mod xml;

pub use cache::{CachePolicy, ResponseType};
pub use client::{Client, ClientBuilder};
pub use container::{DataContainer, Format};
pub use encoding::TransportRequest;
pub use error::{BatchResult, Error, Result};
pub use formatter::curl_command;
pub use interceptor::{
    async_interceptor_fn, interceptor_fn, AsyncFnInterceptor, FnInterceptor, Interceptor,
    InterceptorRegistry,
};
pub use model::Model;
pub use request::{
    LoggingPolicy, Method, MultipartFile, Params, Request, ResponseObserver, DEFAULT_TIMEOUT,
};
pub use response::Response;
pub use transport::{ReqwestTransport, ReqwestTransportBuilder, Transport, TransportResponse};
pub use xml::XmlElement;
