//! DAS (Domain Availability Service) client for the `.lt` registry.
//!
//! One cheap round-trip per query: `get 1.0 <domain>\n` over TCP, answered by
//! `Domain:` / `Status:` lines. Every failure mode degrades conservatively to
//! "assume registered" so the orchestrator never skips a live domain on a
//! transport hiccup.

use crate::utils::{AnalyzerError, AnalyzerResult, TokenBucket};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{Instant, timeout};

/// Status values the registry reports for a taken domain.
/// Compared after lowercasing the wire value.
const REGISTERED_STATUSES: &[&str] = &[
    "registered",
    "blocked",
    "reserved",
    "restricteddisposal",
    "restrictedrights",
    "stopped",
    "pendingcreate",
    "pendingdelete",
    "pendingrelease",
    "outofservice",
];

/// Outcome of one DAS query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DasResponse {
    pub domain: String,
    /// Domain name echoed by the server, when present
    pub echoed_domain: Option<String>,
    /// Lowercased wire status, e.g. "registered" or "available"
    pub status: Option<String>,
    /// `None` means unknown; callers must treat unknown as registered
    pub registered: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DasResponse {
    fn unknown(domain: &str, error: impl Into<String>) -> Self {
        Self {
            domain: domain.to_string(),
            echoed_domain: None,
            status: None,
            registered: None,
            error: Some(error.into()),
        }
    }

    /// Registration view with the conservative default applied
    pub fn assume_registered(&self) -> bool {
        self.registered.unwrap_or(true)
    }
}

/// Plain DAS line-protocol client. One query per connection.
pub struct DasClient {
    server: String,
    port: u16,
    timeout: Duration,
}

impl DasClient {
    pub fn new(server: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self { server: server.into(), port, timeout }
    }

    /// Query registration status. Transport and parse failures come back as
    /// an unknown-status response, never as an error.
    pub async fn query(&self, domain: &str) -> DasResponse {
        match self.query_inner(domain).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("DAS query for {} failed: {} (assuming registered)", domain, e);
                DasResponse::unknown(domain, e.to_string())
            },
        }
    }

    async fn query_inner(&self, domain: &str) -> AnalyzerResult<DasResponse> {
        let addr = format!("{}:{}", self.server, self.port);

        let stream = timeout(self.timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| AnalyzerError::network(format!("DAS connect timeout to {addr}")))?
            .map_err(|e| AnalyzerError::network(format!("DAS connect to {addr} failed: {e}")))?;

        let (read_half, mut write_half) = stream.into_split();

        // Wire format: ASCII, LF-terminated, no CR
        let request = format!("get 1.0 {domain}\n");
        timeout(self.timeout, write_half.write_all(request.as_bytes()))
            .await
            .map_err(|_| AnalyzerError::network("DAS write timeout"))?
            .map_err(|e| AnalyzerError::network(format!("DAS write failed: {e}")))?;

        let mut lines = BufReader::new(read_half).lines();
        let mut echoed_domain = None;
        let mut status: Option<String> = None;

        // Read until remote close or the first Status: line
        loop {
            let line = timeout(self.timeout, lines.next_line())
                .await
                .map_err(|_| AnalyzerError::network("DAS read timeout"))?
                .map_err(|e| AnalyzerError::network(format!("DAS read failed: {e}")))?;

            let Some(line) = line else { break };

            if let Some(value) = line.strip_prefix("Domain:") {
                echoed_domain = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("Status:") {
                status = Some(value.trim().to_lowercase());
                break;
            }
        }

        let Some(status) = status else {
            return Err(AnalyzerError::malformed(format!(
                "DAS response for {domain} carried no Status line"
            )));
        };

        let (registered, error) = if REGISTERED_STATUSES.contains(&status.as_str()) {
            (Some(true), None)
        } else if status == "available" {
            (Some(false), None)
        } else {
            // Unrecognized status: keep it, treat registration as unknown
            (None, Some(format!("unrecognized DAS status '{status}'")))
        };

        Ok(DasResponse {
            domain: domain.to_string(),
            echoed_domain,
            status: Some(status),
            registered,
            error,
        })
    }
}

/// Rate-limited DAS front. The registry tolerates dozens of queries per
/// second; the bucket is a soft self-imposed cap, so callers wait for a
/// token instead of being refused.
pub struct RateLimitedDas {
    client: DasClient,
    bucket: TokenBucket,
    min_interval: Duration,
    last_query: Mutex<Option<Instant>>,
    queries: AtomicU64,
}

impl RateLimitedDas {
    pub fn new(client: DasClient, max_per_second: f64) -> Self {
        Self {
            client,
            bucket: TokenBucket::per_second(max_per_second),
            min_interval: Duration::from_secs_f64(1.0 / max_per_second.max(f64::EPSILON)),
            last_query: Mutex::new(None),
            queries: AtomicU64::new(0),
        }
    }

    /// Check one domain, sleeping as needed to stay under the cap.
    pub async fn check(&self, domain: &str) -> DasResponse {
        while !self.bucket.try_acquire() {
            tokio::time::sleep(self.bucket.time_until_token()).await;
        }

        // Minimum spacing between consecutive queries
        {
            let mut last = self.last_query.lock().await;
            if let Some(previous) = *last {
                let elapsed = previous.elapsed();
                if elapsed < self.min_interval {
                    tokio::time::sleep(self.min_interval - elapsed).await;
                }
            }
            *last = Some(Instant::now());
        }

        let total = self.queries.fetch_add(1, Ordering::Relaxed) + 1;
        if total % 100 == 0 {
            tracing::info!("DAS stats: {} queries issued", total);
        }

        self.client.query(domain).await
    }

    pub fn queries_issued(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// One-shot mock DAS server; asserts the exact request wire format.
    async fn spawn_das_server(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 256];
            let n = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            assert!(request.starts_with("get 1.0 "), "bad request: {request:?}");
            assert!(request.ends_with('\n') && !request.ends_with("\r\n"));
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        addr.to_string()
    }

    fn client_for(addr: &str) -> DasClient {
        let (host, port) = addr.rsplit_once(':').unwrap();
        DasClient::new(host, port.parse().unwrap(), Duration::from_secs(2))
    }

    #[tokio::test]
    async fn registered_status_parses() {
        let addr = spawn_das_server("Domain: example.lt\nStatus: registered\n").await;
        let response = client_for(&addr).query("example.lt").await;
        assert_eq!(response.registered, Some(true));
        assert_eq!(response.status.as_deref(), Some("registered"));
        assert_eq!(response.echoed_domain.as_deref(), Some("example.lt"));
    }

    #[tokio::test]
    async fn available_status_is_authoritative_unregistered() {
        let addr = spawn_das_server("Domain: laisvas.lt\nStatus: available\n").await;
        let response = client_for(&addr).query("laisvas.lt").await;
        assert_eq!(response.registered, Some(false));
        assert!(!response.assume_registered());
    }

    #[tokio::test]
    async fn status_value_is_lowercased() {
        let addr = spawn_das_server("Status: restrictedDisposal\n").await;
        let response = client_for(&addr).query("example.lt").await;
        assert_eq!(response.status.as_deref(), Some("restricteddisposal"));
        assert_eq!(response.registered, Some(true));
    }

    #[tokio::test]
    async fn parser_accepts_any_whitespace_after_colon() {
        let addr = spawn_das_server("Domain:\texample.lt\nStatus:   registered\n").await;
        let response = client_for(&addr).query("example.lt").await;
        assert_eq!(response.registered, Some(true));
        assert_eq!(response.echoed_domain.as_deref(), Some("example.lt"));
    }

    #[tokio::test]
    async fn unrecognized_status_is_unknown_but_assumed_registered() {
        let addr = spawn_das_server("Status: quarantined\n").await;
        let response = client_for(&addr).query("example.lt").await;
        assert_eq!(response.registered, None);
        assert!(response.assume_registered());
        assert_eq!(response.status.as_deref(), Some("quarantined"));
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn missing_status_line_degrades_to_unknown() {
        let addr = spawn_das_server("Domain: example.lt\n").await;
        let response = client_for(&addr).query("example.lt").await;
        assert_eq!(response.registered, None);
        assert!(response.assume_registered());
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn connect_failure_degrades_to_unknown() {
        // Bind-then-drop to get a port with nothing listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = DasClient::new("127.0.0.1", addr.port(), Duration::from_millis(500));
        let response = client.query("example.lt").await;
        assert_eq!(response.registered, None);
        assert!(response.assume_registered());
    }

    #[tokio::test]
    async fn rate_limited_wrapper_counts_queries() {
        let addr = spawn_das_server("Status: available\n").await;
        let limited = RateLimitedDas::new(client_for(&addr), 100.0);
        let response = limited.check("laisvas.lt").await;
        assert_eq!(response.registered, Some(false));
        assert_eq!(limited.queries_issued(), 1);
    }
}
