//! Request descriptors and their configuration types.
//!
//! A [`Request`] describes one logical request together with the model type
//! its response decodes into. Descriptors are built once with the consuming
//! `with`-style setters below and then handed to the [`Client`](crate::Client)
//! by reference, so the same descriptor can drive several fetches.

use crate::interceptor::Interceptor;
use crate::response::Response;
use crate::Error;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default transport timeout for a request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// The HTTP method of a request.
///
/// Besides the standard verbs, a custom method can be declared together with
/// whether it may carry a body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Custom {
        /// The method token sent on the wire
        name: String,
        /// Whether body-carrying params are allowed
        has_body: bool,
    },
}

impl Method {
    /// Returns `true` if requests with this method may carry a body.
    pub fn can_have_body(&self) -> bool {
        match self {
            Method::Get | Method::Head | Method::Delete => false,
            Method::Post | Method::Put | Method::Patch | Method::Options => true,
            Method::Custom { has_body, .. } => *has_body,
        }
    }

    /// Returns the method token, e.g. `"GET"`.
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Custom { name, .. } => name,
        }
    }

    pub(crate) fn to_http(&self) -> Result<http::Method, Error> {
        http::Method::from_bytes(self.as_str().as_bytes()).map_err(|e| {
            Error::ConfigurationError(format!("Invalid method {:?}: {}", self.as_str(), e))
        })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file part of a multipart body.
#[derive(Debug, Clone, PartialEq)]
pub struct MultipartFile {
    pub data: Bytes,
    pub content_type: String,
    pub filename: String,
}

impl MultipartFile {
    /// Creates a file part from its bytes, MIME type and file name.
    pub fn new(
        data: impl Into<Bytes>,
        content_type: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            data: data.into(),
            content_type: content_type.into(),
            filename: filename.into(),
        }
    }
}

/// How the request's parameters are encoded.
///
/// Parameter maps are JSON objects so that nested dictionaries and arrays
/// can be flattened into `parent[child]` / `parent[]` query keys.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Params {
    /// No parameters.
    #[default]
    None,
    /// Leave the URL exactly as given.
    SkipEncoding,
    /// Flattened into the URL's query string, for any method.
    Query(Map<String, Value>),
    /// `application/x-www-form-urlencoded` body.
    UrlEncoded(Map<String, Value>),
    /// `application/json` body.
    Json(Map<String, Value>),
    /// `multipart/form-data` body with form fields and files.
    Multipart {
        form: BTreeMap<String, String>,
        files: BTreeMap<String, MultipartFile>,
    },
    /// A raw body with an explicit content type.
    Data { body: Bytes, content_type: String },
}

impl Params {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Params::None => "no",
            Params::SkipEncoding => "unencoded",
            Params::Query(_) => "query",
            Params::UrlEncoded(_) => "URL-encoded",
            Params::Json(_) => "JSON",
            Params::Multipart { .. } => "multipart",
            Params::Data { .. } => "raw data",
        }
    }

    pub(crate) fn has_body(&self) -> bool {
        matches!(
            self,
            Params::UrlEncoded(_) | Params::Json(_) | Params::Multipart { .. } | Params::Data { .. }
        )
    }
}

/// When the curl transcript of a request is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoggingPolicy {
    #[default]
    Never,
    Always,
    /// Only when the request fails.
    OnError,
}

/// Callback invoked with every response decoded for a descriptor.
pub type ResponseObserver<M> = Arc<dyn Fn(&Response<M>) + Send + Sync>;

/// Describes one logical request whose response decodes into `M`.
///
/// # Examples
///
/// ```
/// use cachet::{Method, Params, Request};
/// use serde_json::json;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), cachet::Error> {
/// let params = json!({"query": "rust"}).as_object().cloned().unwrap_or_default();
/// let request = Request::<serde_json::Value>::new("https://api.example.com/search")?
///     .method(Method::Post)
///     .params(Params::Json(params))
///     .header("X-Api-Key", "secret")?
///     .path("data/results")
///     .timeout(Duration::from_secs(10));
///
/// assert_eq!(request.path.as_deref(), Some("data/results"));
/// # Ok(())
/// # }
/// ```
pub struct Request<M> {
    pub url: Url,
    pub method: Method,
    pub params: Params,
    pub headers: HeaderMap,
    /// Slash-delimited location of the model inside the response body.
    pub path: Option<String>,
    pub disable_local_cache: bool,
    pub disable_http_cache: bool,
    pub should_handle_cookies: bool,
    pub timeout: Duration,
    pub interceptor: Option<Arc<dyn Interceptor>>,
    /// When set, only [`Request::interceptor`] runs; registered interceptors are skipped.
    pub exclusive_interceptor: bool,
    /// Overrides the client's logging policy.
    pub logging: Option<LoggingPolicy>,
    pub on_response: Option<ResponseObserver<M>>,
    _model: PhantomData<fn() -> M>,
}

impl<M> Request<M> {
    /// Creates a GET descriptor for `url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the URL does not parse.
    pub fn new(url: impl AsRef<str>) -> Result<Self, Error> {
        Ok(Self {
            url: Url::parse(url.as_ref())?,
            method: Method::Get,
            params: Params::None,
            headers: HeaderMap::new(),
            path: None,
            disable_local_cache: false,
            disable_http_cache: false,
            should_handle_cookies: false,
            timeout: DEFAULT_TIMEOUT,
            interceptor: None,
            exclusive_interceptor: false,
            logging: None,
            on_response: None,
            _model: PhantomData,
        })
    }

    /// Sets the HTTP method. Defaults to `GET`.
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets how parameters are encoded into the URL or body.
    pub fn params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self, Error> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds multiple headers to the request.
    ///
    /// # Errors
    ///
    /// Returns an error on the first invalid header name or value.
    pub fn headers<K, V>(self, headers: impl IntoIterator<Item = (K, V)>) -> Result<Self, Error>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        headers
            .into_iter()
            .try_fold(self, |request, (name, value)| request.header(name, value))
    }

    /// Sets where the model lives in the body, e.g. `teams[0]/players`.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Disallows answering from the local cache.
    pub fn disable_local_cache(mut self, disable: bool) -> Self {
        self.disable_local_cache = disable;
        self
    }

    /// Makes network calls skip the transport's HTTP cache.
    pub fn disable_http_cache(mut self, disable: bool) -> Self {
        self.disable_http_cache = disable;
        self
    }

    /// Sets both cache flags at once.
    pub fn disable_cache(self, disable: bool) -> Self {
        self.disable_local_cache(disable).disable_http_cache(disable)
    }

    /// Sends and stores cookies for this request.
    pub fn handle_cookies(mut self, handle: bool) -> Self {
        self.should_handle_cookies = handle;
        self
    }

    /// Sets the request timeout. Defaults to [`DEFAULT_TIMEOUT`].
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the request's own interceptor.
    ///
    /// A non-exclusive interceptor runs before the client's registered
    /// interceptors; an exclusive one replaces them for this request.
    pub fn interceptor(mut self, interceptor: impl Interceptor + 'static, exclusive: bool) -> Self {
        self.interceptor = Some(Arc::new(interceptor));
        self.exclusive_interceptor = exclusive;
        self
    }

    /// Sets when the curl transcript is logged, overriding the client default.
    pub fn logging(mut self, policy: LoggingPolicy) -> Self {
        self.logging = Some(policy);
        self
    }

    /// Registers a callback that sees every response produced for this descriptor.
    pub fn on_response(mut self, observer: impl Fn(&Response<M>) + Send + Sync + 'static) -> Self {
        self.on_response = Some(Arc::new(observer));
        self
    }
}

impl<M> Clone for Request<M> {
    fn clone(&self) -> Self {
        Self {
            url: self.url.clone(),
            method: self.method.clone(),
            params: self.params.clone(),
            headers: self.headers.clone(),
            path: self.path.clone(),
            disable_local_cache: self.disable_local_cache,
            disable_http_cache: self.disable_http_cache,
            should_handle_cookies: self.should_handle_cookies,
            timeout: self.timeout,
            interceptor: self.interceptor.clone(),
            exclusive_interceptor: self.exclusive_interceptor,
            logging: self.logging,
            on_response: self.on_response.clone(),
            _model: PhantomData,
        }
    }
}

impl<M> fmt::Debug for Request<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("url", &self.url.as_str())
            .field("method", &self.method)
            .field("params", &self.params)
            .field("headers", &self.headers)
            .field("path", &self.path)
            .field("disable_local_cache", &self.disable_local_cache)
            .field("disable_http_cache", &self.disable_http_cache)
            .field("should_handle_cookies", &self.should_handle_cookies)
            .field("timeout", &self.timeout)
            .field("has_interceptor", &self.interceptor.is_some())
            .field("exclusive_interceptor", &self.exclusive_interceptor)
            .field("logging", &self.logging)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_fails_construction() {
        let result = Request::<String>::new("not a url");
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_defaults() {
        let request = Request::<String>::new("https://example.com/").unwrap();
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.params, Params::None);
        assert_eq!(request.timeout, DEFAULT_TIMEOUT);
        assert!(!request.disable_local_cache);
        assert!(!request.disable_http_cache);
        assert!(!request.should_handle_cookies);
        assert!(request.logging.is_none());
    }

    #[test]
    fn test_disable_cache_sets_both_flags() {
        let request = Request::<String>::new("https://example.com/")
            .unwrap()
            .disable_cache(true);
        assert!(request.disable_local_cache);
        assert!(request.disable_http_cache);
    }

    #[test]
    fn test_invalid_header_is_rejected() {
        let result = Request::<String>::new("https://example.com/")
            .unwrap()
            .header("bad header", "value");
        assert!(matches!(result, Err(Error::ConfigurationError(_))));
    }

    #[test]
    fn test_method_bodies() {
        assert!(!Method::Get.can_have_body());
        assert!(!Method::Head.can_have_body());
        assert!(!Method::Delete.can_have_body());
        assert!(Method::Post.can_have_body());
        assert!(Method::Patch.can_have_body());

        let purge = Method::Custom {
            name: "PURGE".to_string(),
            has_body: false,
        };
        assert!(!purge.can_have_body());
        assert_eq!(purge.to_http().unwrap().as_str(), "PURGE");
    }
}
