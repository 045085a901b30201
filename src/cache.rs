//! Cache policies and response classification.

use crate::{Error, Result};

/// How the transport may use stored responses for one call.
///
/// Derived per call from the descriptor's cache flags, never stored on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Answer only from stored responses; never touch the network.
    LocalCacheOnly,
    /// Go to the network without consulting stored responses.
    BypassHttpCache,
    /// Let the transport apply HTTP caching rules (freshness, revalidation).
    UseProtocolCache,
}

impl CachePolicy {
    /// Resolves the policy for a local-cache read or a network fetch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CachePolicyConflict`] when a local-cache read is
    /// requested while the local cache is disabled.
    pub fn resolve(
        local_cache: bool,
        disable_local_cache: bool,
        disable_http_cache: bool,
    ) -> Result<Self> {
        if local_cache {
            if disable_local_cache {
                return Err(Error::CachePolicyConflict);
            }
            Ok(CachePolicy::LocalCacheOnly)
        } else if disable_http_cache {
            Ok(CachePolicy::BypassHttpCache)
        } else {
            Ok(CachePolicy::UseProtocolCache)
        }
    }
}

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    /// Served from stored responses without contacting the network.
    LocalCache,
    /// The network layer was consulted but HTTP caching satisfied it.
    HttpCache,
    /// A live response body.
    Regular,
}

impl ResponseType {
    /// Classifies a transport result.
    ///
    /// Never looks at the body: the decision depends only on the policy the
    /// call used, the transport's cache-hit marker and whether the descriptor
    /// disabled HTTP caching.
    ///
    /// # Examples
    ///
    /// ```
    /// use cachet::{CachePolicy, ResponseType};
    ///
    /// assert_eq!(
    ///     ResponseType::classify(CachePolicy::UseProtocolCache, true, false),
    ///     ResponseType::HttpCache
    /// );
    /// assert_eq!(
    ///     ResponseType::classify(CachePolicy::UseProtocolCache, true, true),
    ///     ResponseType::Regular
    /// );
    /// ```
    pub fn classify(policy: CachePolicy, from_cache: bool, disable_http_cache: bool) -> Self {
        match policy {
            CachePolicy::LocalCacheOnly => ResponseType::LocalCache,
            _ if from_cache && !disable_http_cache => ResponseType::HttpCache,
            _ => ResponseType::Regular,
        }
    }
}
