//! Scripted transport shared by the orchestrator tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use cachet::{CachePolicy, Error, Result, Transport, TransportRequest, TransportResponse};
use http::{HeaderMap, StatusCode};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
struct Scripted {
    status: u16,
    body: Bytes,
    from_cache: bool,
    delay: Duration,
}

/// Answers from two scripted tables keyed by URL: one for local-cache-only
/// calls and one for network calls.
#[derive(Default)]
pub struct ScriptedTransport {
    stored: HashMap<String, Scripted>,
    network: HashMap<String, Scripted>,
    calls: AtomicUsize,
    requests: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A response available to local-cache-only reads.
    pub fn stored(mut self, url: &str, body: &str) -> Self {
        self.stored.insert(
            url.to_string(),
            Scripted {
                status: 200,
                body: Bytes::from(body.to_string()),
                from_cache: true,
                delay: Duration::ZERO,
            },
        );
        self
    }

    pub fn network(self, url: &str, status: u16, body: &str) -> Self {
        self.network_with(url, status, body, false, Duration::ZERO)
    }

    /// A network response the transport reports as an HTTP cache hit.
    pub fn http_cached(self, url: &str, body: &str) -> Self {
        self.network_with(url, 200, body, true, Duration::ZERO)
    }

    pub fn delayed(self, url: &str, body: &str, delay: Duration) -> Self {
        self.network_with(url, 200, body, false, delay)
    }

    fn network_with(
        mut self,
        url: &str,
        status: u16,
        body: &str,
        from_cache: bool,
        delay: Duration,
    ) -> Self {
        self.network.insert(
            url.to_string(),
            Scripted {
                status,
                body: Bytes::from(body.to_string()),
                from_cache,
                delay,
            },
        );
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests in the order they reached the transport.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn policies(&self) -> Vec<CachePolicy> {
        self.requests().iter().map(|r| r.cache_policy).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let table = match request.cache_policy {
            CachePolicy::LocalCacheOnly => &self.stored,
            CachePolicy::BypassHttpCache | CachePolicy::UseProtocolCache => &self.network,
        };

        let scripted = match table.get(request.url.as_str()) {
            Some(scripted) => scripted.clone(),
            None if request.cache_policy == CachePolicy::LocalCacheOnly => {
                return Err(Error::ResourceUnavailable)
            }
            None => {
                return Err(Error::UndefinedTransportFailure(format!(
                    "nothing scripted for {}",
                    request.url
                )))
            }
        };

        if !scripted.delay.is_zero() {
            tokio::time::sleep(scripted.delay).await;
        }

        Ok(TransportResponse {
            status: StatusCode::from_u16(scripted.status).unwrap(),
            headers: HeaderMap::new(),
            body: scripted.body,
            from_cache: scripted.from_cache,
        })
    }
}

struct DropGuard(Arc<AtomicUsize>);

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Never answers. Counts calls that started and calls whose future was dropped.
#[derive(Default)]
pub struct HangingTransport {
    started: AtomicUsize,
    dropped: Arc<AtomicUsize>,
}

impl HangingTransport {
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for HangingTransport {
    async fn execute(&self, _request: TransportRequest) -> Result<TransportResponse> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let _guard = DropGuard(self.dropped.clone());
        std::future::pending::<Result<TransportResponse>>().await
    }
}
