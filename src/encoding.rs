//! Turns request descriptors into transport-ready requests.
//!
//! Encoding is deterministic: dictionary keys are always visited in sorted
//! order, so the same descriptor produces byte-identical URLs and bodies.

use crate::cache::CachePolicy;
use crate::request::{MultipartFile, Params, Request};
use crate::{Error, Result};
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Boundary token used for every multipart body.
pub const MULTIPART_BOUNDARY: &str = "__X_NST_BOUNDARY__";

/// A fully encoded request, ready for the transport.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: http::Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    /// Bounds the transport call only.
    pub timeout: Duration,
    pub handle_cookies: bool,
    pub cache_policy: CachePolicy,
}

/// Encodes `request` for a call made under `cache_policy`.
///
/// # Errors
///
/// Returns [`Error::UnsupportedBodyForMethod`] when body-carrying params are
/// combined with a method that can't have a body, and
/// [`Error::SerializationFailed`] if a body can't be serialized.
pub fn encode<M>(request: &Request<M>, cache_policy: CachePolicy) -> Result<TransportRequest> {
    if request.params.has_body() && !request.method.can_have_body() {
        return Err(Error::UnsupportedBodyForMethod {
            method: request.method.to_string(),
            params: request.params.kind(),
        });
    }

    let method = request.method.to_http()?;
    let mut url = request.url.clone();
    let mut headers = request.headers.clone();
    let mut body = None;

    match &request.params {
        Params::None | Params::SkipEncoding => {}
        Params::Query(params) => append_query(&mut url, &flatten_query(params)),
        Params::UrlEncoded(params) => {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(flatten_query(params))
                .finish();
            body = Some(Bytes::from(encoded));
            headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            );
        }
        Params::Json(params) => {
            let encoded = serde_json::to_vec(params)
                .map_err(|e| Error::SerializationFailed(e.to_string()))?;
            body = Some(Bytes::from(encoded));
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        Params::Multipart { form, files } => {
            let (encoded, content_type) = multipart_body(form, files);
            body = Some(encoded);
            headers.insert(CONTENT_TYPE, header_value(&content_type)?);
        }
        Params::Data { body: data, content_type } => {
            body = Some(data.clone());
            headers.insert(CONTENT_TYPE, header_value(content_type)?);
        }
    }

    Ok(TransportRequest {
        method,
        url,
        headers,
        body,
        timeout: request.timeout,
        handle_cookies: request.should_handle_cookies,
        cache_policy,
    })
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::try_from(value)
        .map_err(|e| Error::ConfigurationError(format!("Invalid content type: {}", e)))
}

fn append_query(url: &mut Url, pairs: &[(String, String)]) {
    if pairs.is_empty() {
        return;
    }
    url.query_pairs_mut().extend_pairs(pairs);
}

/// Flattens nested parameters into query pairs.
///
/// Nested dictionaries produce `parent[child]` keys and arrays produce
/// `parent[]` keys. Keys are visited in sorted order; `null` values are
/// skipped.
///
/// # Examples
///
/// ```
/// use cachet::encoding::flatten_query;
/// use serde_json::json;
///
/// let params = json!({"b": [1, 2], "a": {"y": true, "x": "1"}});
/// let pairs = flatten_query(params.as_object().unwrap());
/// let keys: Vec<_> = pairs.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
/// assert_eq!(keys, vec!["a[x]=1", "a[y]=true", "b[]=1", "b[]=2"]);
/// ```
pub fn flatten_query(params: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in sorted(params) {
        flatten_value(value, key.clone(), &mut pairs);
    }
    pairs
}

fn sorted(map: &Map<String, Value>) -> Vec<(&String, &Value)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

fn flatten_value(value: &Value, key: String, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (nested_key, nested) in sorted(map) {
                flatten_value(nested, format!("{}[{}]", key, nested_key), pairs);
            }
        }
        Value::Array(items) => {
            for item in items {
                flatten_value(item, format!("{}[]", key), pairs);
            }
        }
        Value::String(s) => pairs.push((key, s.clone())),
        Value::Number(n) => pairs.push((key, n.to_string())),
        Value::Bool(b) => pairs.push((key, b.to_string())),
        Value::Null => {}
    }
}

/// Builds a `multipart/form-data` body and its content type.
///
/// Form fields come first, then files, each group in key order.
pub fn multipart_body(
    form: &BTreeMap<String, String>,
    files: &BTreeMap<String, MultipartFile>,
) -> (Bytes, String) {
    let boundary = format!("--{}\r\n", MULTIPART_BOUNDARY);
    let mut data = Vec::new();

    for (key, value) in form {
        data.extend_from_slice(boundary.as_bytes());
        data.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", key).as_bytes(),
        );
        data.extend_from_slice(value.as_bytes());
        data.extend_from_slice(b"\r\n");
    }

    for (key, file) in files {
        data.extend_from_slice(boundary.as_bytes());
        data.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                key, file.filename
            )
            .as_bytes(),
        );
        data.extend_from_slice(format!("Content-Type: {}\r\n\r\n", file.content_type).as_bytes());
        data.extend_from_slice(&file.data);
        data.extend_from_slice(b"\r\n");
    }

    data.extend_from_slice(format!("--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());

    (
        Bytes::from(data),
        format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
    )
}
