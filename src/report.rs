//! Finalized run reports and their persistence.
//!
//! The JSON shape is a stable contract for downstream tooling — field names
//! here must not drift. Reports are keyed by scenario id; a later run with
//! the same id overwrites the prior report.

use crate::engine::{FailureSample, Snapshot};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub test: String,
    pub target: String,
    pub system_info: SystemInfo,
    pub results: RunResults,
    pub latency: LatencySummary,
    pub status_codes: BTreeMap<u16, u64>,
    pub top_errors: Vec<FailureSample>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResults {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub expected_errors: u64,
    pub error_rate: f64,
    pub rps: f64,
    /// Wall-clock run length in milliseconds.
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    pub vus: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencySummary {
    pub avg: f64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub min: u64,
    pub max: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub cpus: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

impl SystemInfo {
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpus: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            hostname: std::env::var("HOSTNAME").ok(),
        }
    }
}

impl Report {
    /// Freeze a final snapshot into a report.
    pub fn from_run(
        scenario_id: &str,
        target: &str,
        vus: usize,
        started_at: DateTime<Utc>,
        snapshot: &Snapshot,
    ) -> Self {
        Self {
            test: scenario_id.to_string(),
            target: target.to_string(),
            system_info: SystemInfo::current(),
            results: RunResults {
                total: snapshot.total,
                success: snapshot.success,
                failed: snapshot.failed,
                expected_errors: snapshot.expected_errors,
                error_rate: snapshot.error_rate,
                rps: snapshot.rps,
                duration_ms: snapshot.elapsed_ms,
                vus,
                started_at,
                completed_at: Utc::now(),
            },
            latency: LatencySummary {
                avg: snapshot.avg_latency_ms,
                p50: snapshot.p50_ms,
                p95: snapshot.p95_ms,
                p99: snapshot.p99_ms,
                min: snapshot.min_ms,
                max: snapshot.max_ms,
            },
            status_codes: snapshot.status_counts.clone(),
            top_errors: snapshot.recent_failures.clone(),
        }
    }
}

/// Where finalized reports live, keyed by scenario id.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn save(&self, report: &Report) -> Result<()>;
    async fn load(&self, scenario_id: &str) -> Result<Option<Report>>;
}

/// One pretty-printed JSON file per scenario id under a results directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, scenario_id: &str) -> PathBuf {
        self.dir.join(format!("{scenario_id}.json"))
    }
}

#[async_trait]
impl ReportStore for JsonFileStore {
    async fn save(&self, report: &Report) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating report dir {}", self.dir.display()))?;
        let json = serde_json::to_vec_pretty(report).context("serializing report")?;
        let path = self.path_for(&report.test);
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("writing report {}", path.display()))?;
        Ok(())
    }

    async fn load(&self, scenario_id: &str) -> Result<Option<Report>> {
        let path = self.path_for(scenario_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("reading report {}", path.display()))
            }
        };
        let report = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing report {}", path.display()))?;
        Ok(Some(report))
    }
}

/// In-memory store used by tests and embedders that do their own persistence.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, Report>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn save(&self, report: &Report) -> Result<()> {
        self.inner.lock().insert(report.test.clone(), report.clone());
        Ok(())
    }

    async fn load(&self, scenario_id: &str) -> Result<Option<Report>> {
        Ok(self.inner.lock().get(scenario_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> Report {
        Report {
            test: "quick".into(),
            target: "https://edge.example".into(),
            system_info: SystemInfo::current(),
            results: RunResults {
                total: 100,
                success: 98,
                failed: 2,
                expected_errors: 3,
                error_rate: 0.02,
                rps: 3.3,
                duration_ms: 30_000,
                vus: 50,
                started_at: Utc::now(),
                completed_at: Utc::now(),
            },
            latency: LatencySummary { avg: 41.5, p50: 38, p95: 95, p99: 180, min: 9, max: 204 },
            status_codes: BTreeMap::from([(200, 95), (429, 3), (500, 2)]),
            top_errors: vec![FailureSample {
                path: "/api/dramabox/trending".into(),
                detail: "500".into(),
                latency_ms: 120,
            }],
        }
    }

    #[test]
    fn report_uses_stable_external_field_names() {
        let value = serde_json::to_value(sample_report()).unwrap();
        assert!(value.get("test").is_some());
        assert!(value.get("target").is_some());
        assert!(value.get("systemInfo").is_some());
        assert!(value.get("statusCodes").is_some());
        assert!(value.get("topErrors").is_some());

        let results = value.get("results").unwrap();
        for field in ["total", "success", "failed", "expectedErrors", "errorRate", "rps", "duration", "vus"] {
            assert!(results.get(field).is_some(), "missing results.{field}");
        }
        let latency = value.get("latency").unwrap();
        for field in ["avg", "p50", "p95", "p99", "min", "max"] {
            assert!(latency.get(field).is_some(), "missing latency.{field}");
        }
        // status codes serialize as string keys
        assert_eq!(value["statusCodes"]["200"], 95);
    }

    #[test]
    fn report_round_trips() {
        let report = sample_report();
        let json = serde_json::to_string(&report).unwrap();
        let back: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(back.test, "quick");
        assert_eq!(back.results.total, 100);
        assert_eq!(back.status_codes[&429], 3);
        assert_eq!(back.top_errors, report.top_errors);
    }

    #[tokio::test]
    async fn memory_store_overwrites_by_id() {
        let store = MemoryStore::new();
        assert!(store.load("quick").await.unwrap().is_none());

        let mut report = sample_report();
        store.save(&report).await.unwrap();
        report.results.total = 200;
        store.save(&report).await.unwrap();

        let loaded = store.load("quick").await.unwrap().unwrap();
        assert_eq!(loaded.results.total, 200);
    }

    #[tokio::test]
    async fn json_file_store_round_trips_and_overwrites() {
        let dir = std::env::temp_dir().join(format!("stampede-report-{}", uuid::Uuid::new_v4()));
        let store = JsonFileStore::new(&dir);
        assert!(store.load("quick").await.unwrap().is_none());

        let mut report = sample_report();
        store.save(&report).await.unwrap();
        report.results.failed = 7;
        store.save(&report).await.unwrap();

        let loaded = store.load("quick").await.unwrap().unwrap();
        assert_eq!(loaded.results.failed, 7);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
