use anyhow::Result;
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub target: TargetConfig,
    pub http: HttpConfig,
    pub engine: EngineConfig,
    pub report: ReportConfig,
}

/// Which address requests are sent to. `Direct` bypasses the CDN and talks to
/// the origin by IP, which requires the origin's Host header and accepting its
/// self-signed certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetMode {
    Edge,
    Direct,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    pub base_url: String,
    pub direct_url: String,
    pub host_header: String,
    pub mode: TargetMode,
}

impl TargetConfig {
    /// Base URL requests are actually sent to under the configured mode.
    pub fn effective_base_url(&self) -> &str {
        match self.mode {
            TargetMode::Edge => &self.base_url,
            TargetMode::Direct => &self.direct_url,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub throttle_ms: u64,
    pub pool_max_idle_per_host: usize,
    pub bypass_header: String,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn throttle(&self) -> Option<Duration> {
        (self.throttle_ms > 0).then(|| Duration::from_millis(self.throttle_ms))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub progress_interval_seconds: u64,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    pub dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("STAMPEDE__").split("__"));
        Ok(figment.extract()?)
    }
}
