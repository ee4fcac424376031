//! Structured check report
//!
//! The JSON written after `gatecheck check`:
//!
//! ```json
//! {
//!   "timestamp_ms": 1737264000000,
//!   "target": {"host": "127.0.0.1", "port": 18789},
//!   "device": {"id": "device_...", "fingerprint": "..."},
//!   "summary": {"total": 3, "passed": 2, "failed": 1, "skipped": 0},
//!   "results": [{"name": "reachability", "status": "pass", ...}]
//! }
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};

use gc_core::time::{current_time_millis, duration_ms};
use gc_core::{DeviceInfo, Endpoint};

/// Default report file name, relative to the working directory
pub const DEFAULT_REPORT_FILE: &str = "gatecheck_report.json";

/// Outcome of one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pass,
    Fail,
    Skip,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StageStatus::Pass => "PASS",
            StageStatus::Fail => "FAIL",
            StageStatus::Skip => "SKIP",
        };
        f.write_str(label)
    }
}

/// Result of one diagnostic stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageResult {
    /// Stage name (`tunnel`, `reachability`, `transport`, `handshake`)
    pub name: String,
    pub status: StageStatus,
    /// Milliseconds, two decimals
    pub duration_ms: f64,
    pub message: String,
    /// Stage-specific structured data
    pub details: Map<String, Value>,
}

impl StageResult {
    pub fn pass(name: &str, elapsed: Duration, message: impl Into<String>) -> Self {
        Self::new(name, StageStatus::Pass, elapsed, message)
    }

    pub fn fail(name: &str, elapsed: Duration, message: impl Into<String>) -> Self {
        Self::new(name, StageStatus::Fail, elapsed, message)
    }

    /// A stage that did not run because an earlier one failed
    pub fn skip(name: &str, reason: impl Into<String>) -> Self {
        Self::new(name, StageStatus::Skip, Duration::ZERO, reason)
    }

    fn new(name: &str, status: StageStatus, elapsed: Duration, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            duration_ms: duration_ms(elapsed),
            message: message.into(),
            details: Map::new(),
        }
    }

    /// Attach a detail entry
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Pass/fail/skip counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Summary {
    pub fn from_results(results: &[StageResult]) -> Self {
        let count = |status: StageStatus| results.iter().filter(|r| r.status == status).count();
        Self {
            total: results.len(),
            passed: count(StageStatus::Pass),
            failed: count(StageStatus::Fail),
            skipped: count(StageStatus::Skip),
        }
    }

    /// Whether every stage passed
    pub fn all_passed(&self) -> bool {
        self.total > 0 && self.passed == self.total
    }
}

/// Full report of one `gatecheck check` run
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub timestamp_ms: u64,
    pub target: Endpoint,
    pub device: Option<DeviceInfo>,
    pub summary: Summary,
    pub results: Vec<StageResult>,
}

impl CheckReport {
    pub fn new(target: Endpoint, device: Option<DeviceInfo>, results: Vec<StageResult>) -> Self {
        Self {
            timestamp_ms: current_time_millis(),
            target,
            device,
            summary: Summary::from_results(&results),
            results,
        }
    }

    /// Find a stage result by name
    pub fn stage(&self, name: &str) -> Option<&StageResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// Write the report as pretty JSON
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {:?}", path))?;
        Ok(())
    }
}
