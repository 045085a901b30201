//! Request interceptors.
//!
//! Interceptors rewrite an encoded [`TransportRequest`] right before it is
//! handed to the transport, e.g. to sign the body or attach credentials.
//! They run strictly one after another, each receiving the previous one's
//! output.

use crate::encoding::TransportRequest;
use crate::Result;
use async_trait::async_trait;
use std::future::Future;
use std::sync::{Arc, RwLock};

/// Transforms an outgoing request.
///
/// # Examples
///
/// ```
/// use cachet::{Interceptor, Result, TransportRequest};
/// use async_trait::async_trait;
/// use http::HeaderValue;
///
/// struct BearerToken(String);
///
/// #[async_trait]
/// impl Interceptor for BearerToken {
///     async fn intercept(&self, mut request: TransportRequest) -> Result<TransportRequest> {
///         let value = HeaderValue::try_from(format!("Bearer {}", self.0))
///             .map_err(|e| cachet::Error::InterceptorFailed(e.to_string()))?;
///         request.headers.insert(http::header::AUTHORIZATION, value);
///         Ok(request)
///     }
/// }
/// ```
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Returns the rewritten request, or an error that aborts the call.
    async fn intercept(&self, request: TransportRequest) -> Result<TransportRequest>;
}

/// Interceptor backed by a synchronous closure. See [`interceptor_fn`].
pub struct FnInterceptor<F>(F);

#[async_trait]
impl<F> Interceptor for FnInterceptor<F>
where
    F: Fn(TransportRequest) -> TransportRequest + Send + Sync,
{
    async fn intercept(&self, request: TransportRequest) -> Result<TransportRequest> {
        Ok((self.0)(request))
    }
}

/// Wraps a synchronous closure as an [`Interceptor`].
pub fn interceptor_fn<F>(f: F) -> FnInterceptor<F>
where
    F: Fn(TransportRequest) -> TransportRequest + Send + Sync,
{
    FnInterceptor(f)
}

/// Interceptor backed by a closure returning a future. See [`async_interceptor_fn`].
pub struct AsyncFnInterceptor<F>(F);

#[async_trait]
impl<F, Fut> Interceptor for AsyncFnInterceptor<F>
where
    F: Fn(TransportRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<TransportRequest>> + Send,
{
    async fn intercept(&self, request: TransportRequest) -> Result<TransportRequest> {
        (self.0)(request).await
    }
}

/// Wraps an asynchronous closure as an [`Interceptor`].
pub fn async_interceptor_fn<F, Fut>(f: F) -> AsyncFnInterceptor<F>
where
    F: Fn(TransportRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<TransportRequest>> + Send,
{
    AsyncFnInterceptor(f)
}

/// Ordered list of interceptors shared by every request of a client.
///
/// Readers take a snapshot of the list, so registering or clearing
/// interceptors never affects requests that are already being encoded.
#[derive(Default)]
pub struct InterceptorRegistry {
    interceptors: RwLock<Arc<Vec<Arc<dyn Interceptor>>>>,
}

impl InterceptorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an interceptor; it runs after all previously added ones.
    pub fn add(&self, interceptor: impl Interceptor + 'static) {
        self.add_shared(Arc::new(interceptor));
    }

    /// Appends an interceptor that is already shared elsewhere.
    pub fn add_shared(&self, interceptor: Arc<dyn Interceptor>) {
        let mut guard = self
            .interceptors
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut updated = Vec::with_capacity(guard.len() + 1);
        updated.extend(guard.iter().cloned());
        updated.push(interceptor);
        *guard = Arc::new(updated);
    }

    /// Removes every interceptor. Requests already encoding keep their snapshot.
    pub fn clear(&self) {
        let mut guard = self
            .interceptors
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(Vec::new());
    }

    /// Returns the interceptors registered at this moment, in order.
    pub fn snapshot(&self) -> Arc<Vec<Arc<dyn Interceptor>>> {
        self.interceptors
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of registered interceptors.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Returns `true` if no interceptor is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs the interceptor chain for one request.
///
/// An exclusive request interceptor runs alone. Otherwise the request's own
/// interceptor runs first, followed by `registered` in order.
pub(crate) async fn apply(
    mut request: TransportRequest,
    own: Option<&Arc<dyn Interceptor>>,
    exclusive: bool,
    registered: &[Arc<dyn Interceptor>],
) -> Result<TransportRequest> {
    if let Some(own) = own {
        request = own.intercept(request).await?;
        if exclusive {
            return Ok(request);
        }
    }

    for interceptor in registered {
        request = interceptor.intercept(request).await?;
    }

    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachePolicy;
    use http::{HeaderMap, HeaderValue};
    use std::time::Duration;
    use url::Url;

    fn request() -> TransportRequest {
        TransportRequest {
            method: http::Method::POST,
            url: Url::parse("https://example.com/post").unwrap(),
            headers: HeaderMap::new(),
            body: None,
            timeout: Duration::from_secs(60),
            handle_cookies: false,
            cache_policy: CachePolicy::UseProtocolCache,
        }
    }

    fn tag(value: &'static str) -> FnInterceptor<impl Fn(TransportRequest) -> TransportRequest> {
        interceptor_fn(move |mut request: TransportRequest| {
            request
                .headers
                .append("x-signature", HeaderValue::from_static(value));
            request
        })
    }

    fn signatures(request: &TransportRequest) -> Vec<&str> {
        request
            .headers
            .get_all("x-signature")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    #[tokio::test]
    async fn test_request_interceptor_runs_before_registered() {
        let registry = InterceptorRegistry::new();
        registry.add(tag("global-1"));
        registry.add(tag("global-2"));

        let own: Arc<dyn Interceptor> = Arc::new(tag("own"));
        let result = apply(request(), Some(&own), false, &registry.snapshot())
            .await
            .unwrap();

        assert_eq!(signatures(&result), vec!["own", "global-1", "global-2"]);
    }

    #[tokio::test]
    async fn test_exclusive_interceptor_skips_registered() {
        let registry = InterceptorRegistry::new();
        registry.add(tag("global"));

        let own: Arc<dyn Interceptor> = Arc::new(tag("own"));
        let result = apply(request(), Some(&own), true, &registry.snapshot())
            .await
            .unwrap();

        assert_eq!(signatures(&result), vec!["own"]);
    }

    #[tokio::test]
    async fn test_async_interceptors_stay_sequential() {
        let registry = InterceptorRegistry::new();
        registry.add(async_interceptor_fn(|mut request: TransportRequest| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            request
                .headers
                .append("x-signature", HeaderValue::from_static("slow"));
            Ok(request)
        }));
        registry.add(tag("fast"));

        let result = apply(request(), None, false, &registry.snapshot())
            .await
            .unwrap();

        assert_eq!(signatures(&result), vec!["slow", "fast"]);
    }

    #[tokio::test]
    async fn test_failing_interceptor_stops_chain() {
        let registry = InterceptorRegistry::new();
        registry.add(async_interceptor_fn(|_request: TransportRequest| async move {
            Err::<TransportRequest, _>(crate::Error::InterceptorFailed(
                "no credentials".to_string(),
            ))
        }));
        registry.add(tag("never"));

        let result = apply(request(), None, false, &registry.snapshot()).await;
        assert!(matches!(result, Err(crate::Error::InterceptorFailed(_))));
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_changes() {
        let registry = InterceptorRegistry::new();
        registry.add(tag("first"));

        let snapshot = registry.snapshot();
        registry.add(tag("second"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.len(), 2);

        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(snapshot.len(), 1);
    }
}
