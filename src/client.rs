//! The cache-aware request orchestrator.
//!
//! The [`Client`] type is the main entry point. It resolves a cache policy
//! for each call, encodes the descriptor, runs the interceptor chain, hands
//! the request to its [`Transport`] and decodes the body into the
//! descriptor's model. Use [`ClientBuilder`] to configure and create clients.

use crate::cache::{CachePolicy, ResponseType};
use crate::encoding::{self, TransportRequest};
use crate::formatter::curl_command;
use crate::interceptor::{self, Interceptor, InterceptorRegistry};
use crate::model::Model;
use crate::request::{LoggingPolicy, Request};
use crate::transport::{ReqwestTransport, Transport, TransportResponse};
use crate::{BatchResult, Error, Response, Result};
use futures_util::future::{self, join_all};
use futures_util::stream::{self, Stream, StreamExt};
use http::{HeaderMap, StatusCode};
use std::sync::Arc;

/// A cache-aware client that decodes typed models.
///
/// The client is cheap to clone and designed to be reused; clones share the
/// transport and the interceptor registry.
///
/// # Examples
///
/// ```no_run
/// use cachet::{decodable_model, Client, Request};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Player {
///     first_name: String,
/// }
///
/// decodable_model!(Player);
///
/// # async fn example() -> Result<(), cachet::Error> {
/// let client = Client::builder().build()?;
///
/// let request = Request::<Vec<Player>>::new("https://api.example.com/teams/1")?
///     .path("team/players");
///
/// let response = client.models(&request).await?;
/// for player in response.result.iter() {
///     println!("{} ({:?})", player.first_name, response.response_type);
/// }
///
/// // Whatever the transport has stored, without touching the network
/// if let Some(cached) = client.cached_models(&request).await? {
///     println!("{} cached players", cached.result.len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    /// Interceptors given to the builder; they run before the registry's.
    configured: Vec<Arc<dyn Interceptor>>,
    interceptors: Arc<InterceptorRegistry>,
    logging: LoggingPolicy,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Registry of interceptors applied to every request of this client.
    ///
    /// Interceptors added here affect requests encoded afterwards. They run
    /// after the ones passed to [`ClientBuilder::interceptor`].
    pub fn interceptors(&self) -> &Arc<InterceptorRegistry> {
        &self.inner.interceptors
    }

    /// The transport requests are executed with.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    /// Logging policy for descriptors that don't set their own.
    pub fn logging(&self) -> LoggingPolicy {
        self.inner.logging
    }

    /// Fetches `request` from the network.
    ///
    /// The response is [`ResponseType::Regular`], or
    /// [`ResponseType::HttpCache`] when the transport satisfied the call
    /// from its HTTP cache and the descriptor allows HTTP caching.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding, an interceptor, the transport, the
    /// status check or decoding fails.
    pub async fn models<M: Model>(&self, request: &Request<M>) -> Result<Response<M>> {
        let policy = CachePolicy::resolve(
            false,
            request.disable_local_cache,
            request.disable_http_cache,
        )?;
        self.fetch(request, policy).await
    }

    /// Reads `request` from the local cache, returning `None` on a miss.
    ///
    /// Transport and decode failures are treated as misses; use
    /// [`Client::try_cached_models`] to see them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CachePolicyConflict`] if the descriptor disabled its
    /// local cache. The transport is not called in that case.
    pub async fn cached_models<M: Model>(
        &self,
        request: &Request<M>,
    ) -> Result<Option<Response<M>>> {
        match self.try_cached_models(request).await {
            Ok(response) => Ok(Some(response)),
            Err(Error::CachePolicyConflict) => Err(Error::CachePolicyConflict),
            Err(e) => {
                tracing::debug!(error = %e, url = %request.url, "No cached response");
                Ok(None)
            }
        }
    }

    /// Reads `request` from the local cache, surfacing every failure.
    ///
    /// # Errors
    ///
    /// A miss is reported as [`Error::ResourceUnavailable`]; a descriptor
    /// with its local cache disabled fails with [`Error::CachePolicyConflict`].
    pub async fn try_cached_models<M: Model>(&self, request: &Request<M>) -> Result<Response<M>> {
        let policy = CachePolicy::resolve(
            true,
            request.disable_local_cache,
            request.disable_http_cache,
        )?;
        self.fetch(request, policy).await
    }

    /// Emits the cached response (if any) followed by the network response.
    ///
    /// The cached phase is skipped when the descriptor disables its local
    /// cache, and its failures are swallowed. On a miss, models with an
    /// empty value (`Option<T>`) emit a [`ResponseType::LocalCache`]
    /// response carrying that value; other models emit nothing. The network
    /// phase starts only after the cached phase finished, so the stream
    /// yields at most two items in that order.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use cachet::{Client, Request};
    /// use futures_util::StreamExt;
    ///
    /// # async fn example() -> Result<(), cachet::Error> {
    /// let client = Client::builder().build()?;
    /// let request = Request::<Option<serde_json::Value>>::new("https://api.example.com/feed")?;
    ///
    /// let responses: Vec<_> = client.cached_then_fetch(&request).collect().await;
    /// assert!(responses.len() <= 2);
    /// # Ok(())
    /// # }
    /// ```
    pub fn cached_then_fetch<'a, M: Model>(
        &'a self,
        request: &'a Request<M>,
    ) -> impl Stream<Item = Result<Response<M>>> + 'a {
        let cached =
            stream::once(async move { self.cached_phase(request).await.map(Ok::<_, Error>) })
                .filter_map(future::ready);

        let network = stream::once(self.models(request));

        cached.chain(network)
    }

    /// Fetches every request from the network concurrently.
    ///
    /// Results are index-aligned with `requests`; one request failing
    /// doesn't affect the others. Dropping the returned future cancels all
    /// outstanding requests.
    pub async fn models_batch<M: Model>(
        &self,
        requests: &[Request<M>],
    ) -> Vec<BatchResult<Response<M>>> {
        join_all(requests.iter().map(|request| self.models(request))).await
    }

    /// Reads every request from the local cache concurrently, with misses
    /// and failures reported in their slot.
    pub async fn cached_models_batch<M: Model>(
        &self,
        requests: &[Request<M>],
    ) -> Vec<BatchResult<Response<M>>> {
        join_all(requests.iter().map(|request| self.try_cached_models(request))).await
    }

    /// Emits the cached batch followed by the network batch.
    ///
    /// Each slot's cached phase behaves like [`Client::cached_then_fetch`]:
    /// a descriptor with its local cache disabled produces no cached value.
    /// The cached list is emitted only when every slot produced one (so an
    /// empty batch emits two empty lists). Cached failures are swallowed;
    /// the network list always follows, index-aligned with `requests`.
    pub fn cached_then_fetch_batch<'a, M: Model>(
        &'a self,
        requests: &'a [Request<M>],
    ) -> impl Stream<Item = Vec<BatchResult<Response<M>>>> + 'a {
        let cached = stream::once(async move {
            let responses =
                join_all(requests.iter().map(|request| self.cached_phase(request))).await;
            responses
                .into_iter()
                .collect::<Option<Vec<_>>>()
                .map(|responses| {
                    responses
                        .into_iter()
                        .map(Ok)
                        .collect::<Vec<BatchResult<Response<M>>>>()
                })
        })
        .filter_map(future::ready);

        let network = stream::once(self.models_batch(requests));

        cached.chain(network)
    }

    /// The cached response, or the model's empty value on a miss. Nothing
    /// when the descriptor disabled its local cache.
    async fn cached_phase<M: Model>(&self, request: &Request<M>) -> Option<Response<M>> {
        if request.disable_local_cache {
            return None;
        }
        match self.try_cached_models(request).await {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::debug!(error = %e, url = %request.url, "No cached response");
                let empty = M::empty()?;
                let response = Response::new(
                    empty,
                    ResponseType::LocalCache,
                    HeaderMap::new(),
                    StatusCode::OK,
                );
                notify(request, &response);
                Some(response)
            }
        }
    }

    async fn fetch<M: Model>(
        &self,
        request: &Request<M>,
        policy: CachePolicy,
    ) -> Result<Response<M>> {
        let encoded = encoding::encode(request, policy)?;
        let registered: Vec<Arc<dyn Interceptor>> = self
            .inner
            .configured
            .iter()
            .chain(self.inner.interceptors.snapshot().iter())
            .cloned()
            .collect();
        let encoded = interceptor::apply(
            encoded,
            request.interceptor.as_ref(),
            request.exclusive_interceptor,
            &registered,
        )
        .await?;

        let logging = request.logging.unwrap_or(self.inner.logging);
        let transcript = match logging {
            LoggingPolicy::Never => None,
            LoggingPolicy::Always | LoggingPolicy::OnError => Some(self.transcript(&encoded)),
        };
        if let (LoggingPolicy::Always, Some(transcript)) = (logging, &transcript) {
            tracing::info!(target: "cachet::curl", "{}", transcript);
        }

        let result = self.execute(request, encoded, policy).await;

        if let (LoggingPolicy::OnError, Some(transcript), Err(e)) =
            (logging, &transcript, &result)
        {
            tracing::error!(target: "cachet::curl", error = %e, "{}", transcript);
        }

        result
    }

    async fn execute<M: Model>(
        &self,
        request: &Request<M>,
        encoded: TransportRequest,
        policy: CachePolicy,
    ) -> Result<Response<M>> {
        let method = encoded.method.clone();
        let url = encoded.url.clone();

        let response = match self.inner.transport.execute(encoded).await {
            Ok(response) => response,
            Err(e) if e.is_cache_miss() => {
                tracing::debug!(method = %method, url = %url, "Local cache miss");
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(error = %e, method = %method, url = %url, "Request failed");
                return Err(e);
            }
        };

        let TransportResponse {
            status,
            headers,
            body,
            from_cache,
        } = response;

        tracing::info!(
            status = status.as_u16(),
            from_cache = from_cache,
            url = %url,
            "Received HTTP response"
        );

        if !(200..400).contains(&status.as_u16()) {
            tracing::warn!(
                status = status.as_u16(),
                method = %method,
                url = %url,
                response = %String::from_utf8_lossy(&body),
                "HTTP error status"
            );
            return Err(Error::HttpError {
                status,
                raw_response: body,
                headers,
            });
        }

        let response_type = ResponseType::classify(policy, from_cache, request.disable_http_cache);

        let path = request.path.clone();
        let result = tokio::task::spawn_blocking(move || M::decode(&body, path.as_deref()))
            .await
            .map_err(|e| Error::DecodeTaskFailed(e.to_string()))?;
        let result = match result {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, url = %url, "Failed to decode response");
                return Err(e);
            }
        };

        let response = Response::new(result, response_type, headers, status);
        notify(request, &response);
        Ok(response)
    }

    fn transcript(&self, request: &TransportRequest) -> String {
        let cookies = if request.handle_cookies {
            self.inner.transport.cookie_header(&request.url)
        } else {
            None
        };
        curl_command(request, cookies.as_deref())
    }
}

fn notify<M>(request: &Request<M>, response: &Response<M>) {
    if let Some(observer) = &request.on_response {
        observer(response);
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use cachet::{interceptor_fn, ClientBuilder, LoggingPolicy, ReqwestTransport};
/// use http::HeaderValue;
///
/// # fn example() -> Result<(), cachet::Error> {
/// let transport = ReqwestTransport::builder().user_agent("my-app/1.0").build()?;
///
/// let client = ClientBuilder::new()
///     .transport(transport)
///     .logging(LoggingPolicy::OnError)
///     .interceptor(interceptor_fn(|mut request| {
///         request.headers.insert("x-client", HeaderValue::from_static("cachet"));
///         request
///     }))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    transport: Option<Arc<dyn Transport>>,
    interceptors: Option<Arc<InterceptorRegistry>>,
    configured: Vec<Arc<dyn Interceptor>>,
    logging: LoggingPolicy,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            transport: None,
            interceptors: None,
            configured: Vec::new(),
            logging: LoggingPolicy::Never,
        }
    }

    /// Sets the transport. Defaults to a [`ReqwestTransport`].
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets a transport that is already shared, e.g. with another client.
    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Uses an existing registry, e.g. one shared with another client.
    ///
    /// The registry is never modified by the builder; interceptors passed to
    /// [`ClientBuilder::interceptor`] stay private to the built client.
    pub fn interceptors(mut self, registry: Arc<InterceptorRegistry>) -> Self {
        self.interceptors = Some(registry);
        self
    }

    /// Adds an interceptor that runs for every request of the built client,
    /// before the registry's interceptors and in the order added.
    pub fn interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.configured.push(Arc::new(interceptor));
        self
    }

    /// Sets the default logging policy.
    pub fn logging(mut self, policy: LoggingPolicy) -> Self {
        self.logging = policy;
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the default transport can't be created.
    pub fn build(self) -> Result<Client> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport,
                configured: self.configured,
                interceptors: self.interceptors.unwrap_or_default(),
                logging: self.logging,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
