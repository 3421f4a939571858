//! Canonical per-scan result record.
//!
//! This is the one structure the orchestrator emits per domain; exporters and
//! the store treat its `data` as an opaque blob, so the shape here is the
//! compatibility surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const RESULT_SCHEMA_VERSION: u32 = 1;

/// Overall disposition of one domain scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Success,
    Partial,
    Skipped,
    Error,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Skipped => "skipped",
            Self::Error => "error",
        }
    }
}

/// Why a scan bailed out early
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkipReason {
    Unregistered,
    Inactive,
}

/// Status of a single check inside a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Success,
    Error,
    RateLimited,
    Skipped,
}

/// Result of one check. `data` is free-form JSON, typed per check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub status: CheckStatus,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

impl CheckResult {
    pub fn success(data: Value) -> Self {
        Self { status: CheckStatus::Success, data, error: None, elapsed_ms: None }
    }

    pub fn error(message: impl Into<String>, data: Value) -> Self {
        Self { status: CheckStatus::Error, data, error: Some(message.into()), elapsed_ms: None }
    }

    pub fn rate_limited(time_until_available_secs: f64) -> Self {
        Self {
            status: CheckStatus::RateLimited,
            data: serde_json::json!({ "time_until_available": time_until_available_secs }),
            error: None,
            elapsed_ms: None,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Skipped,
            data: Value::Null,
            error: Some(reason.into()),
            elapsed_ms: None,
        }
    }

    pub fn with_elapsed(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = Some(elapsed_ms);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == CheckStatus::Success
    }
}

/// Aggregate summary attached to every result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanSummary {
    pub reachable: bool,
    pub https: bool,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub grade: String,
}

/// Profile bookkeeping carried in result metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfilesMeta {
    pub requested: Vec<String>,
    pub expanded: Vec<String>,
    pub executed: Vec<String>,
    pub execution_order: Vec<String>,
    pub parallel_groups: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultMeta {
    pub timestamp: DateTime<Utc>,
    pub execution_time_sec: f64,
    pub schema_version: u32,
    pub profiles: ProfilesMeta,
}

/// The record emitted once per domain scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    pub domain: String,
    pub status: ScanStatus,
    pub skip_reason: Option<SkipReason>,
    /// Check results keyed by profile or check name. BTreeMap keeps the
    /// serialized order stable across runs.
    pub checks: BTreeMap<String, CheckResult>,
    pub summary: ScanSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub meta: ResultMeta,
}

impl ResultRecord {
    pub fn new(domain: impl Into<String>, profiles: ProfilesMeta) -> Self {
        Self {
            domain: domain.into(),
            status: ScanStatus::Error,
            skip_reason: None,
            checks: BTreeMap::new(),
            summary: ScanSummary::default(),
            error: None,
            meta: ResultMeta {
                timestamp: Utc::now(),
                execution_time_sec: 0.0,
                schema_version: RESULT_SCHEMA_VERSION,
                profiles,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&ScanStatus::Partial).unwrap(), "\"partial\"");
        assert_eq!(serde_json::to_string(&CheckStatus::RateLimited).unwrap(), "\"rate_limited\"");
        assert_eq!(serde_json::to_string(&SkipReason::Unregistered).unwrap(), "\"unregistered\"");
    }

    #[test]
    fn result_record_round_trips() {
        let mut record = ResultRecord::new("example.lt", ProfilesMeta::default());
        record.status = ScanStatus::Skipped;
        record.skip_reason = Some(SkipReason::Unregistered);
        record
            .checks
            .insert("whois".into(), CheckResult::success(serde_json::json!({"registered": false})));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["skip_reason"], "unregistered");
        assert_eq!(json["checks"]["whois"]["data"]["registered"], false);
        assert_eq!(json["meta"]["schema_version"], 1);

        let back: ResultRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.domain, "example.lt");
        assert_eq!(back.status, ScanStatus::Skipped);
    }

    #[test]
    fn rate_limited_result_carries_wait_hint() {
        let result = CheckResult::rate_limited(17.5);
        assert_eq!(result.status, CheckStatus::RateLimited);
        assert_eq!(result.data["time_until_available"], 17.5);
    }
}
