//! TLS prober: one handshake on 443, certificate chain captured and the leaf
//! parsed for identity and validity.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use x509_parser::prelude::{FromDer, GeneralName, X509Certificate};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsProbeResult {
    pub domain: String,
    pub handshake_ok: bool,
    pub protocol: Option<String>,
    pub cipher_suite: Option<String>,
    pub issuer: Option<String>,
    pub subject: Option<String>,
    pub san: Vec<String>,
    pub not_before: Option<String>,
    pub not_after: Option<String>,
    pub days_until_expiry: Option<i64>,
    pub chain_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct TlsProber {
    connector: TlsConnector,
    timeout: Duration,
}

impl TlsProber {
    pub fn new(timeout: Duration) -> Self {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();

        Self { connector: TlsConnector::from(Arc::new(config)), timeout }
    }

    /// Handshake with `<domain>:443` and capture certificate details.
    pub async fn probe(&self, domain: &str) -> TlsProbeResult {
        let mut result = TlsProbeResult { domain: domain.to_string(), ..Default::default() };

        let server_name = match ServerName::try_from(domain.to_string()) {
            Ok(name) => name,
            Err(e) => {
                result.error = Some(format!("invalid server name: {e}"));
                return result;
            },
        };

        let tcp = match timeout(self.timeout, TcpStream::connect((domain, 443))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                result.error = Some(format!("connect failed: {e}"));
                return result;
            },
            Err(_) => {
                result.error = Some("connect timeout".to_string());
                return result;
            },
        };

        let stream = match timeout(self.timeout, self.connector.connect(server_name, tcp)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                // rustls reports received alerts in the error display
                result.error = Some(format!("handshake failed: {e}"));
                return result;
            },
            Err(_) => {
                result.error = Some("handshake timeout".to_string());
                return result;
            },
        };

        result.handshake_ok = true;

        let (_, session) = stream.get_ref();
        result.protocol = session.protocol_version().map(|v| format!("{v:?}"));
        result.cipher_suite = session.negotiated_cipher_suite().map(|c| format!("{:?}", c.suite()));

        if let Some(certs) = session.peer_certificates() {
            result.chain_length = certs.len();
            if let Some(leaf) = certs.first() {
                match X509Certificate::from_der(leaf.as_ref()) {
                    Ok((_, cert)) => fill_certificate_fields(&mut result, &cert),
                    Err(e) => {
                        tracing::warn!("Leaf certificate for {} unparseable: {}", domain, e);
                        result.error = Some(format!("certificate parse failed: {e}"));
                    },
                }
            }
        }

        result
    }
}

fn fill_certificate_fields(result: &mut TlsProbeResult, cert: &X509Certificate<'_>) {
    result.issuer = Some(cert.issuer().to_string());
    result.subject = Some(cert.subject().to_string());

    let validity = cert.validity();
    result.not_before = Some(validity.not_before.to_string());
    result.not_after = Some(validity.not_after.to_string());
    result.days_until_expiry =
        Some((validity.not_after.timestamp() - Utc::now().timestamp()) / 86_400);

    if let Ok(Some(san)) = cert.subject_alternative_name() {
        result.san = san
            .value
            .general_names
            .iter()
            .filter_map(|name| match name {
                GeneralName::DNSName(dns) => Some(dns.to_string()),
                _ => None,
            })
            .collect();
    }
}
