//! HTTP prober: one HEAD (GET on 405) per hop, redirects followed manually so
//! the full chain is observable.

use crate::utils::{AnalyzerError, AnalyzerResult};
use reqwest::{Client, Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Maximum body bytes retained by [`HttpProber::fetch_body`]
const BODY_CAP_BYTES: usize = 512 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpProbeResult {
    pub requested_url: String,
    pub final_url: Option<String>,
    pub final_status: Option<u16>,
    /// Every URL visited, in order, including the first and the final one
    pub redirect_chain: Vec<String>,
    /// True when the final hop was served over https
    pub https: bool,
    pub response_time_ms: u64,
    /// Method that produced the final response (HEAD, or GET after a 405)
    pub method: String,
    /// Lowercased header names of the final response
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// timeout | connect | tls | too_many_redirects | request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl HttpProbeResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.final_status.is_some()
    }

    /// True when the probe never got a response at all
    pub fn connect_failed(&self) -> bool {
        matches!(self.error_kind.as_deref(), Some("timeout") | Some("connect") | Some("tls"))
    }
}

pub struct HttpProber {
    client: Client,
    max_redirects: usize,
}

impl HttpProber {
    pub fn new(request_timeout: Duration, max_redirects: usize) -> Self {
        let client = Client::builder()
            .timeout(request_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent("domain-analyzer/1.0")
            .build()
            .unwrap_or_else(|e| {
                tracing::error!("Failed to build HTTP client: {}. Falling back to defaults.", e);
                Client::default()
            });
        Self { client, max_redirects }
    }

    /// Probe `http://<domain>/`, following redirects up to the hop cap.
    pub async fn probe(&self, domain: &str) -> HttpProbeResult {
        let start_url = format!("http://{domain}/");
        let started = Instant::now();

        let mut result = HttpProbeResult {
            requested_url: start_url.clone(),
            method: "HEAD".to_string(),
            ..Default::default()
        };

        let mut current = match Url::parse(&start_url) {
            Ok(url) => url,
            Err(e) => {
                result.error = Some(format!("invalid URL {start_url}: {e}"));
                result.error_kind = Some("request".to_string());
                return result;
            },
        };

        for _hop in 0..=self.max_redirects {
            result.redirect_chain.push(current.to_string());

            let response = match self.request_with_fallback(&current, &mut result.method).await {
                Ok(response) => response,
                Err(e) => {
                    result.error = Some(e.to_string());
                    result.error_kind = Some(classify_reqwest_error(&e));
                    result.response_time_ms = started.elapsed().as_millis() as u64;
                    return result;
                },
            };

            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);

                if let Some(location) = location {
                    match current.join(&location) {
                        Ok(next) => {
                            current = next;
                            continue;
                        },
                        Err(e) => {
                            result.error = Some(format!("unjoinable Location '{location}': {e}"));
                            result.error_kind = Some("request".to_string());
                            break;
                        },
                    }
                }
                // Redirect without a Location header terminates the chain
            }

            result.final_status = Some(status.as_u16());
            result.final_url = Some(current.to_string());
            result.https = current.scheme() == "https";
            result.headers = response
                .headers()
                .iter()
                .map(|(k, v)| {
                    (k.as_str().to_lowercase(), v.to_str().unwrap_or_default().to_string())
                })
                .collect();
            result.response_time_ms = started.elapsed().as_millis() as u64;
            return result;
        }

        if result.final_status.is_none() && result.error.is_none() {
            result.error =
                Some(format!("redirect chain exceeded {} hops", self.max_redirects));
            result.error_kind = Some("too_many_redirects".to_string());
        }
        result.response_time_ms = started.elapsed().as_millis() as u64;
        result
    }

    async fn request_with_fallback(
        &self,
        url: &Url,
        method_used: &mut String,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let response = self.client.request(Method::HEAD, url.clone()).send().await?;
        if response.status() == StatusCode::METHOD_NOT_ALLOWED {
            *method_used = "GET".to_string();
            return self.client.request(Method::GET, url.clone()).send().await;
        }
        Ok(response)
    }

    /// Fetch a page body for the content checks, capped at 512 KiB.
    pub async fn fetch_body(&self, url: &str) -> AnalyzerResult<(u16, String)> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AnalyzerError::network(format!("GET {url} failed: {e}")))?;

        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AnalyzerError::network(format!("body read from {url} failed: {e}")))?;

        let capped = &bytes[..bytes.len().min(BODY_CAP_BYTES)];
        Ok((status, String::from_utf8_lossy(capped).into_owned()))
    }
}

fn classify_reqwest_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "timeout".to_string()
    } else if error.is_connect() {
        // TLS handshake problems surface as connect errors; look one level in
        let detail = error.to_string().to_lowercase();
        if detail.contains("certificate") || detail.contains("tls") || detail.contains("ssl") {
            "tls".to_string()
        } else {
            "connect".to_string()
        }
    } else {
        "request".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_failure_classification_covers_gate_logic() {
        let mut result = HttpProbeResult {
            error: Some("connection refused".into()),
            error_kind: Some("connect".into()),
            ..Default::default()
        };
        assert!(result.connect_failed());
        assert!(!result.succeeded());

        result.error_kind = Some("too_many_redirects".into());
        assert!(!result.connect_failed());
    }

    #[tokio::test]
    async fn probe_records_error_for_unreachable_host() {
        use tokio::net::TcpListener;

        // Bind-then-drop to find a dead local port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let prober = HttpProber::new(Duration::from_millis(800), 10);
        let result = prober.probe(&format!("127.0.0.1:{port}")).await;
        assert!(!result.succeeded());
        assert!(result.connect_failed());
        assert_eq!(result.redirect_chain.len(), 1);
    }
}
