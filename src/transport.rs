//! The transport the pipeline runs requests through.
//!
//! [`Transport`] is the seam between the orchestrating [`Client`](crate::Client)
//! and the network. [`ReqwestTransport`] is the default implementation: a
//! reqwest client with an in-memory response store that honours each
//! request's [`CachePolicy`].

use crate::cache::CachePolicy;
use crate::encoding::TransportRequest;
use crate::response_cache::{self, CacheEntry, ResponseCache};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use reqwest::cookie::{CookieStore, Jar};
use std::sync::Arc;
use std::time::SystemTime;
use url::Url;

/// Raw result of a transport call.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Set when the body came from stored responses rather than the network.
    pub from_cache: bool,
}

impl TransportResponse {
    fn from_entry(entry: CacheEntry) -> Self {
        Self {
            status: entry.status,
            headers: entry.headers,
            body: entry.body,
            from_cache: true,
        }
    }
}

/// Executes encoded requests.
///
/// Implementations must honour `request.cache_policy`: a
/// [`CachePolicy::LocalCacheOnly`] call must never reach the network and
/// reports a miss with [`Error::ResourceUnavailable`].
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use bytes::Bytes;
/// use cachet::{CachePolicy, Error, Result, Transport, TransportRequest, TransportResponse};
/// use http::{HeaderMap, StatusCode};
///
/// struct Fixed(&'static str);
///
/// #[async_trait]
/// impl Transport for Fixed {
///     async fn execute(&self, request: TransportRequest) -> Result<TransportResponse> {
///         if request.cache_policy == CachePolicy::LocalCacheOnly {
///             return Err(Error::ResourceUnavailable);
///         }
///         Ok(TransportResponse {
///             status: StatusCode::OK,
///             headers: HeaderMap::new(),
///             body: Bytes::from_static(self.0.as_bytes()),
///             from_cache: false,
///         })
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Runs `request` according to its cache policy.
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse>;

    /// Cookies that would accompany a request to `url`, for diagnostics.
    fn cookie_header(&self, _url: &Url) -> Option<String> {
        None
    }
}

/// reqwest-backed [`Transport`] with an in-memory HTTP response store.
///
/// - [`CachePolicy::LocalCacheOnly`] answers from the store only.
/// - [`CachePolicy::UseProtocolCache`] serves fresh entries directly,
///   revalidates stale ones with `If-None-Match`/`If-Modified-Since` and
///   stores new `200` GET responses.
/// - [`CachePolicy::BypassHttpCache`] always goes to the network but still
///   stores the response for later local reads.
///
/// Cookies are kept in a shared jar and only sent or stored for requests
/// that opt in with [`Request::handle_cookies`](crate::Request::handle_cookies).
///
/// # Examples
///
/// ```no_run
/// use cachet::ReqwestTransport;
///
/// # fn example() -> Result<(), cachet::Error> {
/// let transport = ReqwestTransport::builder()
///     .user_agent("my-app/1.0")
///     .default_header("Accept", "application/json")?
///     .cache_capacity(1024)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ReqwestTransport {
    client: reqwest::Client,
    cookie_client: reqwest::Client,
    cookies: Arc<Jar>,
    cache: ResponseCache,
}

impl ReqwestTransport {
    /// Creates a builder for configuring a transport.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::new()
    }

    /// Creates a transport with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] if the TLS backend can't be initialized.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// The jar used for requests that handle cookies.
    pub fn cookie_jar(&self) -> Arc<Jar> {
        Arc::clone(&self.cookies)
    }

    /// The store backing local-cache reads and HTTP caching.
    pub fn response_cache(&self) -> &ResponseCache {
        &self.cache
    }

    async fn send(
        &self,
        request: &TransportRequest,
        validators: HeaderMap,
    ) -> Result<TransportResponse> {
        let client = if request.handle_cookies {
            &self.cookie_client
        } else {
            &self.client
        };

        let mut headers = request.headers.clone();
        for (name, value) in validators {
            if let Some(name) = name {
                headers.entry(name).or_insert(value);
            }
        }

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            cache_policy = ?request.cache_policy,
            "Executing HTTP request"
        );

        let mut builder = client
            .request(request.method.clone(), request.url.clone())
            .headers(headers)
            .timeout(request.timeout);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(transport_error)?;

        Ok(TransportResponse {
            status,
            headers,
            body,
            from_cache: false,
        })
    }

    fn store(&self, key: String, request: &TransportRequest, response: &TransportResponse) {
        if response_cache::is_storable(
            &request.method,
            &request.headers,
            response.status,
            &response.headers,
        ) {
            self.cache.insert(
                key,
                CacheEntry::new(response.status, response.headers.clone(), response.body.clone()),
            );
        }
    }
}

fn transport_error(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::Timeout
    } else {
        Error::Network(error)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse> {
        let key = response_cache::cache_key(&request.method, &request.url, &request.headers);

        match request.cache_policy {
            CachePolicy::LocalCacheOnly => {
                let entry = self.cache.get(&key).ok_or(Error::ResourceUnavailable)?;
                tracing::debug!(url = %request.url, "Serving stored response");
                Ok(TransportResponse::from_entry(entry))
            }
            CachePolicy::BypassHttpCache => {
                let response = self.send(&request, HeaderMap::new()).await?;
                self.store(key, &request, &response);
                Ok(response)
            }
            CachePolicy::UseProtocolCache => {
                let stored = self.cache.get(&key);
                if let Some(entry) = stored.as_ref().filter(|e| e.is_fresh(SystemTime::now())) {
                    tracing::debug!(url = %request.url, "Serving fresh stored response");
                    return Ok(TransportResponse::from_entry(entry.clone()));
                }

                let validators = stored.as_ref().map(CacheEntry::validators).unwrap_or_default();
                let response = self.send(&request, validators).await?;

                if response.status == StatusCode::NOT_MODIFIED {
                    if let Some(mut entry) = stored {
                        tracing::debug!(url = %request.url, "Stored response revalidated");
                        entry.refresh(&response.headers);
                        self.cache.insert(key, entry.clone());
                        return Ok(TransportResponse::from_entry(entry));
                    }
                }

                self.store(key, &request, &response);
                Ok(response)
            }
        }
    }

    fn cookie_header(&self, url: &Url) -> Option<String> {
        let value = self.cookies.cookies(url)?;
        value.to_str().ok().map(str::to_string)
    }
}

/// Builder for [`ReqwestTransport`].
pub struct ReqwestTransportBuilder {
    default_headers: HeaderMap,
    user_agent: Option<String>,
    root_certificates: Vec<reqwest::Certificate>,
    accept_invalid_certs: bool,
    cache_capacity: usize,
    cookies: Option<Arc<Jar>>,
}

impl ReqwestTransportBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self {
            default_headers: HeaderMap::new(),
            user_agent: None,
            root_certificates: Vec::new(),
            accept_invalid_certs: false,
            cache_capacity: response_cache::DEFAULT_CAPACITY,
            cookies: None,
        }
    }

    /// Adds a header sent with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the `User-Agent` header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Trusts an additional PEM-encoded root certificate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] if the PEM can't be parsed.
    pub fn add_root_certificate(mut self, pem: &[u8]) -> Result<Self> {
        let certificate = reqwest::Certificate::from_pem(pem)
            .map_err(|e| Error::ConfigurationError(format!("Invalid root certificate: {}", e)))?;
        self.root_certificates.push(certificate);
        Ok(self)
    }

    /// Disables certificate validation. Only meant for local test servers.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Maximum number of stored responses; zero disables storage.
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Shares an existing cookie jar.
    pub fn cookie_jar(mut self, jar: Arc<Jar>) -> Self {
        self.cookies = Some(jar);
        self
    }

    fn configure(&self, mut builder: reqwest::ClientBuilder) -> reqwest::ClientBuilder {
        builder = builder
            .default_headers(self.default_headers.clone())
            .danger_accept_invalid_certs(self.accept_invalid_certs);
        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        for certificate in &self.root_certificates {
            builder = builder.add_root_certificate(certificate.clone());
        }
        builder
    }

    /// Builds the transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] if a reqwest client can't be built.
    pub fn build(self) -> Result<ReqwestTransport> {
        let cookies = self.cookies.clone().unwrap_or_default();

        let client = self.configure(reqwest::Client::builder()).build().map_err(|e| {
            Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
        })?;
        let cookie_client = self
            .configure(reqwest::Client::builder())
            .cookie_provider(Arc::clone(&cookies))
            .build()
            .map_err(|e| Error::ConfigurationError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(ReqwestTransport {
            client,
            cookie_client,
            cookies,
            cache: ResponseCache::new(self.cache_capacity),
        })
    }
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}
