//! Curl transcripts on the `cachet::curl` target, per logging policy.

mod common;

use cachet::{Client, LoggingPolicy, Request};
use common::ScriptedTransport;
use std::io;
use std::sync::{Arc, Mutex};

const OK_URL: &str = "https://example.com/ok";
const FAILING_URL: &str = "https://example.com/failing";

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Captured {
    /// Captured lines logged on the transcript target.
    fn transcripts(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .filter(|line| line.contains("cachet::curl:"))
            .map(str::to_string)
            .collect()
    }
}

/// Sends a succeeding and a failing request and returns the transcript lines.
async fn transcripts(
    client_policy: LoggingPolicy,
    request_policy: Option<LoggingPolicy>,
) -> Vec<String> {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .without_time()
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let transport = Arc::new(
        ScriptedTransport::new()
            .network(OK_URL, 200, "true")
            .network(FAILING_URL, 500, "boom"),
    );
    let client = Client::builder()
        .shared_transport(transport)
        .logging(client_policy)
        .build()
        .unwrap();

    for url in [OK_URL, FAILING_URL] {
        let mut request = Request::<bool>::new(url).unwrap();
        if let Some(policy) = request_policy {
            request = request.logging(policy);
        }
        let _ = client.models(&request).await;
    }

    captured.transcripts()
}

#[tokio::test]
async fn test_always_logs_every_request_at_info() {
    let lines = transcripts(LoggingPolicy::Always, None).await;

    assert_eq!(lines.len(), 2, "{:?}", lines);
    assert!(lines.iter().all(|line| line.contains("INFO")));
    assert!(lines[0].contains("curl -X GET") && lines[0].contains(OK_URL));
    assert!(lines[1].contains(FAILING_URL));
}

#[tokio::test]
async fn test_on_error_logs_only_failures_at_error() {
    let lines = transcripts(LoggingPolicy::OnError, None).await;

    assert_eq!(lines.len(), 1, "{:?}", lines);
    assert!(lines[0].contains("ERROR"));
    assert!(lines[0].contains(FAILING_URL));
    assert!(!lines[0].contains(OK_URL));
}

#[tokio::test]
async fn test_never_logs_nothing() {
    let lines = transcripts(LoggingPolicy::Never, None).await;
    assert!(lines.is_empty(), "{:?}", lines);
}

#[tokio::test]
async fn test_request_policy_overrides_client_default() {
    let lines = transcripts(LoggingPolicy::Always, Some(LoggingPolicy::Never)).await;
    assert!(lines.is_empty(), "{:?}", lines);

    let lines = transcripts(LoggingPolicy::Never, Some(LoggingPolicy::OnError)).await;
    assert_eq!(lines.len(), 1, "{:?}", lines);
    assert!(lines[0].contains(FAILING_URL));
}
