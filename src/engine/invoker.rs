//! Single-request execution with timing.
//!
//! One pooled client is shared by every worker of every run; per-request TLS
//! handshakes at thousands of concurrent users would dominate and distort the
//! measured latency. All failure modes are converted into an [`Outcome`] at
//! this boundary — a failing request must never take its worker down.

use crate::config::{Config, TargetMode};
use crate::domain::EndpointRequest;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use std::time::Duration;
use tokio::time::Instant;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

/// Result of one timed request. `status == 0` means the request never got an
/// HTTP response (timeout, connection failure, DNS), with the reason in
/// `failure`.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub status: u16,
    pub latency: Duration,
    pub failure: Option<&'static str>,
}

impl Outcome {
    pub fn is_transport_failure(&self) -> bool {
        self.status == 0
    }
}

pub struct HttpInvoker {
    client: reqwest::Client,
    base_url: String,
    host_header: Option<HeaderValue>,
    throttle: Option<Duration>,
}

impl HttpInvoker {
    pub fn new(cfg: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("id-ID,id;q=0.9,en-US;q=0.8,en;q=0.7"),
        );
        if let Ok(referer) = HeaderValue::from_str(&format!("{}/", cfg.target.base_url)) {
            headers.insert(REFERER, referer);
        }
        if !cfg.http.bypass_header.is_empty() {
            headers.insert(
                "x-stress-bypass",
                HeaderValue::from_str(&cfg.http.bypass_header)
                    .context("invalid bypass header value")?,
            );
        }

        let direct = cfg.target.mode == TargetMode::Direct;
        let client = reqwest::Client::builder()
            .timeout(cfg.http.timeout())
            .default_headers(headers)
            .pool_max_idle_per_host(cfg.http.pool_max_idle_per_host)
            .gzip(true)
            // The origin serves a cert for the public hostname; hitting it by
            // IP in direct mode can only work with validation off.
            .danger_accept_invalid_certs(direct)
            .build()
            .context("building http client")?;

        let host_header = direct
            .then(|| HeaderValue::from_str(&cfg.target.host_header))
            .transpose()
            .context("invalid host header")?;

        Ok(Self {
            client,
            base_url: cfg.target.effective_base_url().trim_end_matches('/').to_string(),
            host_header,
            throttle: cfg.http.throttle(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Execute one request and time it. Never returns an error: transport
    /// failures become `status = 0` outcomes.
    pub async fn invoke(&self, request: &EndpointRequest) -> Outcome {
        if let Some(delay) = self.throttle {
            tokio::time::sleep(delay).await;
        }

        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.client.request(request.method.as_reqwest(), url);
        if let Some(host) = &self.host_header {
            builder = builder.header(reqwest::header::HOST, host.clone());
        }
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let start = Instant::now();
        match builder.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                // Pull the body so latency covers the full exchange and the
                // connection is clean for keep-alive reuse.
                let _ = response.bytes().await;
                Outcome {
                    status,
                    latency: start.elapsed(),
                    failure: None,
                }
            }
            Err(err) => Outcome {
                status: 0,
                latency: start.elapsed(),
                failure: Some(failure_reason(&err)),
            },
        }
    }
}

fn failure_reason(err: &reqwest::Error) -> &'static str {
    if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connect"
    } else if err.is_request() {
        "request"
    } else {
        "transport"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, HttpConfig, ReportConfig, TargetConfig};

    fn config(mode: TargetMode) -> Config {
        Config {
            target: TargetConfig {
                base_url: "https://edge.example".into(),
                direct_url: "https://10.0.0.1".into(),
                host_header: "edge.example".into(),
                mode,
            },
            http: HttpConfig {
                timeout_seconds: 30,
                throttle_ms: 0,
                pool_max_idle_per_host: 50,
                bypass_header: String::new(),
            },
            engine: EngineConfig {
                progress_interval_seconds: 3,
                seed: None,
            },
            report: ReportConfig { dir: "results".into() },
        }
    }

    #[test]
    fn edge_mode_has_no_host_override() {
        let invoker = HttpInvoker::new(&config(TargetMode::Edge)).unwrap();
        assert!(invoker.host_header.is_none());
        assert_eq!(invoker.base_url(), "https://edge.example");
    }

    #[test]
    fn direct_mode_overrides_host() {
        let invoker = HttpInvoker::new(&config(TargetMode::Direct)).unwrap();
        assert_eq!(
            invoker.host_header.as_ref().and_then(|h| h.to_str().ok()),
            Some("edge.example")
        );
        assert_eq!(invoker.base_url(), "https://10.0.0.1");
    }
}
