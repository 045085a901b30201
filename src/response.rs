//! Decoded response wrapper.
//!
//! A [`Response`] carries the decoded model together with where it came
//! from and the transport's status and headers, so callers can tell cached
//! placeholders from fresh data.

use crate::cache::ResponseType;
use http::{HeaderMap, StatusCode};

/// A successfully decoded response.
///
/// # Type Parameters
///
/// * `M` - The decoded model
///
/// # Examples
///
/// ```no_run
/// use cachet::{Client, Request, ResponseType};
/// use futures_util::StreamExt;
///
/// # async fn example() -> Result<(), cachet::Error> {
/// let client = Client::builder().build()?;
/// let request = Request::<serde_json::Value>::new("https://api.example.com/teams")?
///     .path("teams");
///
/// let mut updates = Box::pin(client.cached_then_fetch(&request));
/// while let Some(response) = updates.next().await {
///     let response = response?;
///     match response.response_type {
///         ResponseType::LocalCache => println!("cached: {}", response.result),
///         _ => println!("fresh ({}): {}", response.status, response.result),
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<M> {
    /// The decoded model.
    pub result: M,

    /// Where the response came from.
    pub response_type: ResponseType,

    /// The response headers.
    ///
    /// Empty for placeholder responses produced without a transport result.
    pub headers: HeaderMap,

    /// The HTTP status code of the response.
    pub status: StatusCode,
}

impl<M> Response<M> {
    /// Creates a response from its decoded model and transport details.
    pub fn new(
        result: M,
        response_type: ResponseType,
        headers: HeaderMap,
        status: StatusCode,
    ) -> Self {
        Self {
            result,
            response_type,
            headers,
            status,
        }
    }

    /// Maps the decoded model while keeping the response details.
    ///
    /// # Examples
    ///
    /// ```
    /// # use cachet::{Response, ResponseType};
    /// # use http::{HeaderMap, StatusCode};
    /// let response = Response::new(vec![1, 2, 3], ResponseType::Regular, HeaderMap::new(), StatusCode::OK);
    ///
    /// let count = response.map(|items| items.len());
    /// assert_eq!(count.result, 3);
    /// assert_eq!(count.response_type, ResponseType::Regular);
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(M) -> U,
    {
        Response {
            result: f(self.result),
            response_type: self.response_type,
            headers: self.headers,
            status: self.status,
        }
    }

    /// Returns `true` unless the body came live from the network.
    pub fn is_cached(&self) -> bool {
        self.response_type != ResponseType::Regular
    }

    /// Returns a header value by name.
    ///
    /// # Examples
    ///
    /// ```
    /// # use cachet::{Response, ResponseType};
    /// # use http::{HeaderMap, HeaderValue, StatusCode};
    /// let mut headers = HeaderMap::new();
    /// headers.insert("etag", HeaderValue::from_static("\"v1\""));
    ///
    /// let response = Response::new((), ResponseType::HttpCache, headers, StatusCode::OK);
    /// assert_eq!(response.header("ETag"), Some("\"v1\""));
    /// assert!(response.is_cached());
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

impl<M> AsRef<M> for Response<M> {
    fn as_ref(&self) -> &M {
        &self.result
    }
}

impl<M> std::ops::Deref for Response<M> {
    type Target = M;

    fn deref(&self) -> &Self::Target {
        &self.result
    }
}
