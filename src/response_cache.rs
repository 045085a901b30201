//! In-memory HTTP response store used by [`ReqwestTransport`](crate::ReqwestTransport).
//!
//! Responses are keyed by method, URL and request headers. Freshness comes
//! from `Cache-Control: max-age` or `Expires`; stale entries are revalidated
//! with the validators they were stored with.

use bytes::Bytes;
use http::header::{
    CACHE_CONTROL, CONNECTION, CONTENT_LENGTH, DATE, ETAG, EXPIRES, IF_MODIFIED_SINCE,
    IF_NONE_MATCH, LAST_MODIFIED, TE, TRAILER, TRANSFER_ENCODING, UPGRADE,
};
use http::{HeaderMap, HeaderName, StatusCode};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use url::Url;

/// Number of responses kept when no capacity is configured.
pub const DEFAULT_CAPACITY: usize = 256;

/// A stored response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub stored_at: SystemTime,
}

impl CacheEntry {
    /// Creates an entry stored now.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            stored_at: SystemTime::now(),
        }
    }

    /// How long the entry may be served without revalidation.
    ///
    /// `max-age` wins over `Expires`; `no-cache` means zero. `None` when the
    /// response carries no freshness information.
    pub fn freshness_lifetime(&self) -> Option<Duration> {
        let directives = cache_directives(&self.headers);
        if directives.iter().any(|d| d == "no-cache") {
            return Some(Duration::ZERO);
        }
        if let Some(max_age) = directives
            .iter()
            .find_map(|d| d.strip_prefix("max-age="))
            .and_then(|v| v.trim_matches('"').parse::<u64>().ok())
        {
            return Some(Duration::from_secs(max_age));
        }

        let expires = http_date(&self.headers, EXPIRES.as_str());
        let origin = http_date(&self.headers, DATE.as_str()).unwrap_or(self.stored_at);
        match expires {
            Some(expires) => Some(expires.duration_since(origin).unwrap_or(Duration::ZERO)),
            // unparseable Expires means already expired
            None if self.headers.contains_key(EXPIRES) => Some(Duration::ZERO),
            None => None,
        }
    }

    /// Returns `true` if the entry may be served at `now` without revalidation.
    pub fn is_fresh(&self, now: SystemTime) -> bool {
        let age = now.duration_since(self.stored_at).unwrap_or(Duration::ZERO);
        self.freshness_lifetime()
            .map(|lifetime| age < lifetime)
            .unwrap_or(false)
    }

    /// Conditional request headers built from the stored `ETag` and `Last-Modified`.
    pub fn validators(&self) -> HeaderMap {
        let mut validators = HeaderMap::new();
        if let Some(etag) = self.headers.get(ETAG) {
            validators.insert(IF_NONE_MATCH, etag.clone());
        }
        if let Some(modified) = self.headers.get(LAST_MODIFIED) {
            validators.insert(IF_MODIFIED_SINCE, modified.clone());
        }
        validators
    }

    /// Applies the headers of a `304 Not Modified` and restarts the entry's age.
    ///
    /// `Content-Length` and hop-by-hop headers describe the 304 itself and
    /// are not merged.
    pub fn refresh(&mut self, not_modified: &HeaderMap) {
        let updates = || not_modified.iter().filter(|(name, _)| is_mergeable(name));
        for (name, _) in updates() {
            self.headers.remove(name);
        }
        for (name, value) in updates() {
            self.headers.append(name, value.clone());
        }
        self.stored_at = SystemTime::now();
    }
}

fn is_mergeable(name: &HeaderName) -> bool {
    let excluded = [CONTENT_LENGTH, CONNECTION, TE, TRAILER, TRANSFER_ENCODING, UPGRADE];
    !excluded.contains(name) && !matches!(name.as_str(), "keep-alive" | "proxy-connection")
}

fn cache_directives(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(CACHE_CONTROL)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|directive| directive.trim().to_ascii_lowercase())
        .filter(|directive| !directive.is_empty())
        .collect()
}

fn http_date(headers: &HeaderMap, name: &str) -> Option<SystemTime> {
    let value = headers.get(name)?.to_str().ok()?;
    httpdate::parse_http_date(value).ok()
}

/// Returns `true` if a response to `method` may be stored.
///
/// Only successful `GET` responses are stored, and neither side may have
/// asked for `no-store`.
pub fn is_storable(
    method: &http::Method,
    request_headers: &HeaderMap,
    status: StatusCode,
    response_headers: &HeaderMap,
) -> bool {
    *method == http::Method::GET
        && status == StatusCode::OK
        && !cache_directives(request_headers).iter().any(|d| d == "no-store")
        && !cache_directives(response_headers).iter().any(|d| d == "no-store")
}

/// Builds the lookup key for a request.
///
/// # Examples
///
/// ```
/// use cachet::response_cache::cache_key;
/// use http::{HeaderMap, HeaderValue};
/// use url::Url;
///
/// let url = Url::parse("https://example.com/teams").unwrap();
/// let mut headers = HeaderMap::new();
/// headers.insert("x-b", HeaderValue::from_static("2"));
/// headers.insert("x-a", HeaderValue::from_static("1"));
///
/// assert_eq!(
///     cache_key(&http::Method::GET, &url, &headers),
///     "GET https://example.com/teams x-a:1 x-b:2"
/// );
/// ```
pub fn cache_key(method: &http::Method, url: &Url, headers: &HeaderMap) -> String {
    let mut pairs: Vec<String> = headers
        .iter()
        .map(|(name, value)| format!("{}:{}", name, String::from_utf8_lossy(value.as_bytes())))
        .collect();
    pairs.sort();

    let mut key = format!("{} {}", method, url);
    for pair in pairs {
        key.push(' ');
        key.push_str(&pair);
    }
    key
}

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, CacheEntry>,
    order: VecDeque<String>,
}

/// Bounded response store; the oldest entry is evicted first.
#[derive(Debug)]
pub struct ResponseCache {
    capacity: usize,
    entries: Mutex<Entries>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ResponseCache {
    /// A capacity of zero disables storage.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(Entries::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Entries> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns a copy of the entry stored under `key`.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.lock().map.get(key).cloned()
    }

    /// Stores `entry`, replacing any entry under `key` and evicting the oldest when full.
    pub fn insert(&self, key: String, entry: CacheEntry) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.lock();
        if entries.map.insert(key.clone(), entry).is_some() {
            entries.order.retain(|existing| existing != &key);
        }
        entries.order.push_back(key);

        while entries.map.len() > self.capacity {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            entries.map.remove(&oldest);
        }
    }

    /// Removes and returns the entry stored under `key`.
    pub fn remove(&self, key: &str) -> Option<CacheEntry> {
        let mut entries = self.lock();
        entries.order.retain(|existing| existing != key);
        entries.map.remove(key)
    }

    /// Removes every entry.
    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.map.clear();
        entries.order.clear();
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn entry(headers: &[(&'static str, &str)]) -> CacheEntry {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        CacheEntry::new(StatusCode::OK, map, Bytes::from_static(b"{}"))
    }

    #[test]
    fn test_max_age_freshness() {
        let entry = entry(&[("cache-control", "public, max-age=60")]);
        assert_eq!(entry.freshness_lifetime(), Some(Duration::from_secs(60)));
        assert!(entry.is_fresh(entry.stored_at + Duration::from_secs(30)));
        assert!(!entry.is_fresh(entry.stored_at + Duration::from_secs(61)));
    }

    #[test]
    fn test_max_age_wins_over_expires() {
        let entry = entry(&[
            ("cache-control", "max-age=10"),
            ("expires", "Thu, 01 Jan 1970 00:00:00 GMT"),
        ]);
        assert_eq!(entry.freshness_lifetime(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_expires_relative_to_date() {
        let date = SystemTime::now();
        let expires = date + Duration::from_secs(120);
        let entry = entry(&[
            ("date", &httpdate::fmt_http_date(date)),
            ("expires", &httpdate::fmt_http_date(expires)),
        ]);
        let lifetime = entry.freshness_lifetime().unwrap();
        assert!(lifetime >= Duration::from_secs(119) && lifetime <= Duration::from_secs(120));
        assert!(entry.is_fresh(SystemTime::now()));
    }

    #[test]
    fn test_invalid_expires_and_no_cache_are_stale() {
        let invalid = entry(&[("expires", "0")]);
        assert_eq!(invalid.freshness_lifetime(), Some(Duration::ZERO));
        assert!(!invalid.is_fresh(SystemTime::now()));

        let no_cache = entry(&[("cache-control", "no-cache, max-age=60")]);
        assert!(!no_cache.is_fresh(SystemTime::now()));
    }

    #[test]
    fn test_no_freshness_information() {
        let entry = entry(&[("etag", "\"v1\"")]);
        assert_eq!(entry.freshness_lifetime(), None);
        assert!(!entry.is_fresh(SystemTime::now()));
    }

    #[test]
    fn test_validators() {
        let entry = entry(&[
            ("etag", "\"v1\""),
            ("last-modified", "Wed, 21 Oct 2015 07:28:00 GMT"),
        ]);
        let validators = entry.validators();
        assert_eq!(validators.get(IF_NONE_MATCH).unwrap(), "\"v1\"");
        assert_eq!(
            validators.get(IF_MODIFIED_SINCE).unwrap(),
            "Wed, 21 Oct 2015 07:28:00 GMT"
        );
    }

    #[test]
    fn test_refresh_merges_headers() {
        let mut entry = entry(&[("etag", "\"v1\""), ("cache-control", "max-age=0")]);
        let mut not_modified = HeaderMap::new();
        not_modified.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=30"));
        entry.refresh(&not_modified);

        assert_eq!(entry.headers.get(ETAG).unwrap(), "\"v1\"");
        assert_eq!(entry.freshness_lifetime(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_refresh_keeps_content_length() {
        let mut entry = entry(&[("content-length", "2"), ("etag", "\"v1\"")]);
        let mut not_modified = HeaderMap::new();
        not_modified.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
        not_modified.insert(CONNECTION, HeaderValue::from_static("close"));
        not_modified.insert(ETAG, HeaderValue::from_static("\"v2\""));
        entry.refresh(&not_modified);

        assert_eq!(entry.headers.get(CONTENT_LENGTH).unwrap(), "2");
        assert!(entry.headers.get(CONNECTION).is_none());
        assert_eq!(entry.headers.get(ETAG).unwrap(), "\"v2\"");
        assert_eq!(&entry.body[..], b"{}");
    }

    #[test]
    fn test_storable() {
        let none = HeaderMap::new();
        let mut no_store = HeaderMap::new();
        no_store.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));

        assert!(is_storable(&http::Method::GET, &none, StatusCode::OK, &none));
        assert!(!is_storable(&http::Method::POST, &none, StatusCode::OK, &none));
        assert!(!is_storable(&http::Method::GET, &none, StatusCode::NOT_FOUND, &none));
        assert!(!is_storable(&http::Method::GET, &none, StatusCode::OK, &no_store));
        assert!(!is_storable(&http::Method::GET, &no_store, StatusCode::OK, &none));
    }

    #[test]
    fn test_key_depends_on_headers() {
        let url = Url::parse("https://example.com/").unwrap();
        let mut headers = HeaderMap::new();
        let plain = cache_key(&http::Method::GET, &url, &headers);
        headers.insert("accept", HeaderValue::from_static("text/xml"));
        assert_ne!(plain, cache_key(&http::Method::GET, &url, &headers));
    }

    #[test]
    fn test_eviction_order() {
        let cache = ResponseCache::new(2);
        cache.insert("a".into(), entry(&[]));
        cache.insert("b".into(), entry(&[]));
        cache.insert("a".into(), entry(&[]));
        cache.insert("c".into(), entry(&[]));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_remove_and_reinsert() {
        let cache = ResponseCache::new(2);
        cache.insert("a".into(), entry(&[]));
        cache.insert("b".into(), entry(&[]));

        assert!(cache.remove("a").is_some());
        assert!(cache.remove("a").is_none());
        assert_eq!(cache.len(), 1);

        // a removed key no longer counts towards eviction order
        cache.insert("c".into(), entry(&[]));
        cache.insert("a".into(), entry(&[]));
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
        assert!(cache.get("a").is_some());
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let cache = ResponseCache::new(0);
        cache.insert("a".into(), entry(&[]));
        assert!(cache.is_empty());
    }
}
