//! Port-43 WHOIS client and `.lt` response parser.
//!
//! The registry enforces a hard ceiling of 100 queries per 30 minutes on this
//! endpoint. The bucket here is therefore non-negotiable: when it denies, the
//! caller gets a rate-limited outcome immediately and carries on with DAS
//! data alone.

use crate::utils::{AnalyzerError, AnalyzerResult, TokenBucket, clean_optional_string};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Parsed WHOIS record. Every field is optional; parse failures on a single
/// field never fail the lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhoisRecord {
    pub domain: Option<String>,
    pub status: Option<String>,
    pub registered_date: Option<NaiveDate>,
    pub expires_date: Option<NaiveDate>,
    pub registrar: Option<String>,
    pub registrar_website: Option<String>,
    pub registrar_email: Option<String>,
    pub contact_organization: Option<String>,
    pub contact_email: Option<String>,
    /// Raw nameserver values; both `<host>` and `<host> [<ip>]` forms kept
    pub nameservers: Vec<String>,

    pub age_days: Option<i64>,
    pub days_until_expiry: Option<i64>,
    pub privacy_protected: bool,
}

/// Outcome of one WHOIS lookup
#[derive(Debug, Clone)]
pub enum WhoisOutcome {
    Success(Box<WhoisRecord>),
    RateLimited { retry_after: Duration },
    Error { message: String },
}

pub struct WhoisClient {
    server: String,
    port: u16,
    timeout: Duration,
    bucket: TokenBucket,
}

impl WhoisClient {
    pub fn new(
        server: impl Into<String>,
        port: u16,
        timeout: Duration,
        bucket: TokenBucket,
    ) -> Self {
        Self { server: server.into(), port, timeout, bucket }
    }

    /// Look up one domain. Bucket denial is non-blocking: the caller gets
    /// `RateLimited` with the expected wait and must not retry.
    pub async fn lookup(&self, domain: &str) -> WhoisOutcome {
        if !self.bucket.try_acquire() {
            let retry_after = self.bucket.time_until_token();
            tracing::debug!(
                "WHOIS bucket empty for {} (next token in {:?})",
                domain,
                retry_after
            );
            return WhoisOutcome::RateLimited { retry_after };
        }

        match self.lookup_inner(domain).await {
            Ok(record) => WhoisOutcome::Success(Box::new(record)),
            Err(e) => {
                tracing::warn!("WHOIS lookup for {} failed: {}", domain, e);
                WhoisOutcome::Error { message: e.to_string() }
            },
        }
    }

    async fn lookup_inner(&self, domain: &str) -> AnalyzerResult<WhoisRecord> {
        let addr = format!("{}:{}", self.server, self.port);

        let mut stream = timeout(self.timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| AnalyzerError::network(format!("WHOIS connect timeout to {addr}")))?
            .map_err(|e| AnalyzerError::network(format!("WHOIS connect to {addr} failed: {e}")))?;

        // Wire format: query terminated by CRLF, response read to EOF
        let request = format!("{domain}\r\n");
        timeout(self.timeout, stream.write_all(request.as_bytes()))
            .await
            .map_err(|_| AnalyzerError::network("WHOIS write timeout"))?
            .map_err(|e| AnalyzerError::network(format!("WHOIS write failed: {e}")))?;

        let mut body = String::new();
        timeout(self.timeout, stream.read_to_string(&mut body))
            .await
            .map_err(|_| AnalyzerError::network("WHOIS read timeout"))?
            .map_err(|e| AnalyzerError::network(format!("WHOIS read failed: {e}")))?;

        Ok(parse_whois_response(&body, Utc::now().date_naive()))
    }
}

/// Parse a `.lt` WHOIS response body.
///
/// Line-oriented `key: value` format; `%`-prefixed lines are comments. Key
/// matching is case-exact. `today` is injected so derived date fields stay
/// testable.
pub fn parse_whois_response(body: &str, today: NaiveDate) -> WhoisRecord {
    let mut fields: HashMap<&str, String> = HashMap::new();
    let mut nameservers = Vec::new();

    for line in body.lines() {
        if line.starts_with('%') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else { continue };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match key {
            "Nameserver" => nameservers.push(value.to_string()),
            "Domain" | "Status" | "Registered" | "Expires" | "Registrar"
            | "Registrar website" | "Registrar email" | "Contact organization"
            | "Contact email" => {
                // First occurrence wins for scalar fields
                fields.entry(key).or_insert_with(|| value.to_string());
            },
            _ => {},
        }
    }

    let parse_date = |key: &str| -> Option<NaiveDate> {
        let value = fields.get(key)?;
        match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(e) => {
                tracing::warn!("WHOIS field {} has unparseable date '{}': {}", key, value, e);
                None
            },
        }
    };

    let registered_date = parse_date("Registered");
    let expires_date = parse_date("Expires");
    let contact_organization = clean_optional_string(fields.get("Contact organization"));

    WhoisRecord {
        domain: fields.get("Domain").cloned(),
        status: fields.get("Status").cloned(),
        registered_date,
        expires_date,
        registrar: fields.get("Registrar").cloned(),
        registrar_website: fields.get("Registrar website").cloned(),
        registrar_email: fields.get("Registrar email").cloned(),
        contact_email: fields.get("Contact email").cloned(),
        nameservers,
        age_days: registered_date.map(|d| (today - d).num_days()),
        days_until_expiry: expires_date.map(|d| (d - today).num_days()),
        privacy_protected: contact_organization.is_none(),
        contact_organization,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
% Hello, this is the DOMREG whois service.
%
Domain: example.lt
Status: registered
Registered: 2015-03-20
Expires: 2026-03-20
Registrar: UAB Interneto vizija
Registrar website: https://www.iv.lt
Registrar email: hostmaster@iv.lt
Contact organization: Example UAB
Contact email: info@example.lt
Nameserver: ns1.example.lt
Nameserver: ns2.example.lt\t[203.0.113.7]
";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 20).unwrap()
    }

    #[test]
    fn full_record_parses() {
        let record = parse_whois_response(SAMPLE, today());
        assert_eq!(record.domain.as_deref(), Some("example.lt"));
        assert_eq!(record.status.as_deref(), Some("registered"));
        assert_eq!(record.registrar.as_deref(), Some("UAB Interneto vizija"));
        assert_eq!(record.registrar_website.as_deref(), Some("https://www.iv.lt"));
        assert_eq!(record.contact_email.as_deref(), Some("info@example.lt"));
        assert_eq!(
            record.nameservers,
            vec!["ns1.example.lt".to_string(), "ns2.example.lt\t[203.0.113.7]".to_string()]
        );
    }

    #[test]
    fn derived_date_fields() {
        let record = parse_whois_response(SAMPLE, today());
        assert_eq!(record.age_days, Some(3653));
        assert_eq!(record.days_until_expiry, Some(365));
    }

    #[test]
    fn privacy_protected_when_no_contact_organization() {
        let record = parse_whois_response(SAMPLE, today());
        assert!(!record.privacy_protected);

        let without = SAMPLE
            .lines()
            .filter(|l| !l.starts_with("Contact organization"))
            .collect::<Vec<_>>()
            .join("\n");
        let record = parse_whois_response(&without, today());
        assert!(record.privacy_protected);
        assert_eq!(record.contact_organization, None);
    }

    #[test]
    fn comment_lines_are_ignored() {
        let record = parse_whois_response("% Domain: not-this.lt\nDomain: real.lt\n", today());
        assert_eq!(record.domain.as_deref(), Some("real.lt"));
    }

    #[test]
    fn key_match_is_case_exact() {
        let record = parse_whois_response("domain: lower.lt\nDomain: exact.lt\n", today());
        assert_eq!(record.domain.as_deref(), Some("exact.lt"));
    }

    #[test]
    fn bad_date_is_nonfatal() {
        let body = "Domain: example.lt\nRegistered: not-a-date\nExpires: 2026-01-01\n";
        let record = parse_whois_response(body, today());
        assert_eq!(record.registered_date, None);
        assert_eq!(record.age_days, None);
        assert!(record.expires_date.is_some());
        assert!(record.days_until_expiry.is_some());
    }

    #[tokio::test]
    async fn bucket_denial_is_nonblocking() {
        let bucket = TokenBucket::new(1, Duration::from_secs(1800));
        assert!(bucket.try_acquire());
        let client = WhoisClient::new("127.0.0.1", 1, Duration::from_secs(1), bucket);

        let started = std::time::Instant::now();
        let outcome = client.lookup("example.lt").await;
        assert!(started.elapsed() < Duration::from_millis(100));
        match outcome {
            WhoisOutcome::RateLimited { retry_after } => {
                assert!(retry_after > Duration::ZERO);
                assert!(retry_after <= Duration::from_secs(1800));
            },
            other => panic!("expected rate-limited outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn lookup_reads_mock_server_to_eof() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 128];
            let n = socket.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"example.lt\r\n");
            socket.write_all(SAMPLE.as_bytes()).await.unwrap();
        });

        let bucket = TokenBucket::new(100, Duration::from_secs(1800));
        let client =
            WhoisClient::new("127.0.0.1", addr.port(), Duration::from_secs(2), bucket);
        match client.lookup("example.lt").await {
            WhoisOutcome::Success(record) => {
                assert_eq!(record.domain.as_deref(), Some("example.lt"));
                assert_eq!(record.nameservers.len(), 2);
            },
            other => panic!("expected success, got {other:?}"),
        }
    }
}
