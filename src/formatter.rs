//! Curl transcripts of outgoing requests for debug logging.

use crate::encoding::TransportRequest;
use http::header::ACCEPT_ENCODING;

/// Renders `request` as a curl command line.
///
/// The command lists the method, the body (if it is UTF-8), `--compressed`
/// when gzip is accepted, the cookies the transport would send, each header
/// in name order and finally the URL.
///
/// # Examples
///
/// ```
/// use cachet::{curl_command, CachePolicy, TransportRequest};
/// use http::HeaderMap;
/// use std::time::Duration;
/// use url::Url;
///
/// let request = TransportRequest {
///     method: http::Method::GET,
///     url: Url::parse("https://example.com/").unwrap(),
///     headers: HeaderMap::new(),
///     body: None,
///     timeout: Duration::from_secs(60),
///     handle_cookies: false,
///     cache_policy: CachePolicy::UseProtocolCache,
/// };
///
/// assert_eq!(curl_command(&request, None), r#"curl -X GET "https://example.com/""#);
/// ```
pub fn curl_command(request: &TransportRequest, cookies: Option<&str>) -> String {
    let mut command = format!("curl -X {}", request.method);

    if let Some(body) = request.body.as_ref() {
        if let Ok(body) = std::str::from_utf8(body) {
            push(&mut command, &format!("-d \"{}\"", escape_body(body)));
        }
    }

    let gzip = request
        .headers
        .get_all(ACCEPT_ENCODING)
        .iter()
        .any(|value| String::from_utf8_lossy(value.as_bytes()).contains("gzip"));
    if gzip {
        push(&mut command, "--compressed");
    }

    if let Some(cookies) = cookies.filter(|c| !c.is_empty()) {
        push(&mut command, &format!("--cookie \"{}\"", cookies));
    }

    let mut headers: Vec<_> = request.headers.iter().collect();
    headers.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).replace('\'', "\\'");
        push(&mut command, &format!("-H '{}: {}'", name, value));
    }

    push(&mut command, &format!("\"{}\"", request.url));
    command
}

fn push(command: &mut String, part: &str) {
    command.push(' ');
    command.push_str(part.trim());
}

fn escape_body(body: &str) -> String {
    body.replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace('"', "\\\"")
        .replace('$', "\\$")
}
