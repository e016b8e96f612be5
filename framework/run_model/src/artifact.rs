use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::{LoadError, LoadLevel, Proxy, TestType};

/// Default pattern for the run metadata artifact written next to the k6 output.
pub const DEFAULT_METADATA_PATTERN: &str =
    r"^k6-out-(?P<proxy_name>go-proxy|java-proxy|node-proxy)-(?P<test_name>.+)\.json$";
/// Default pattern for the k6 `--summary-export` artifact.
pub const DEFAULT_SUMMARY_PATTERN: &str =
    r"^k6-summary-(?P<proxy_name>go-proxy|java-proxy|node-proxy)-(?P<test_name>.+)\.json$";
/// Default pattern for the test name embedded in artifact file names.
pub const DEFAULT_TEST_NAME_PATTERN: &str =
    r"^(?P<test_type>soak|image|injection|smoke)-(?P<users>\d+k)$";

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Timing metadata for a single run, as recorded by the load test runner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunMetadata {
    /// The unique run id
    ///
    /// This is also the `test_run_id` tag attached to every k6 sample of the run.
    pub test_id: String,
    /// Unix timestamp in seconds at which the load started
    pub start_time: f64,
    /// Unix timestamp in seconds at which the load finished
    pub end_time: f64,
}

impl RunMetadata {
    pub fn start(&self) -> Result<DateTime<Utc>, LoadError> {
        epoch_seconds_to_utc(self.start_time)
    }

    pub fn end(&self) -> Result<DateTime<Utc>, LoadError> {
        epoch_seconds_to_utc(self.end_time)
    }

    /// Measured run duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Check the measured duration against the configured run length.
    ///
    /// Runs that stopped early or overran are not comparable with their siblings.
    pub fn validate_duration(&self, expected: f64, tolerance: f64) -> Result<(), LoadError> {
        let actual = self.duration_secs();
        if (actual - expected).abs() > tolerance {
            return Err(LoadError::Duration {
                actual,
                expected,
                tolerance,
            });
        }

        Ok(())
    }
}

fn epoch_seconds_to_utc(seconds: f64) -> Result<DateTime<Utc>, LoadError> {
    if !seconds.is_finite() {
        return Err(LoadError::Timestamp(seconds));
    }
    DateTime::from_timestamp_millis((seconds * 1000.0).round() as i64)
        .ok_or(LoadError::Timestamp(seconds))
}

/// One metric of a k6 summary export, flattened to its numeric sub-keys.
///
/// Both the `--summary-export` layout (`{"count": 10, "rate": 2.5}`) and the `handleSummary`
/// layout (`{"type": "counter", "values": {"count": 10, "rate": 2.5}}`) are accepted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct MetricEntry {
    values: BTreeMap<String, f64>,
}

impl MetricEntry {
    pub fn get(&self, sub_key: &str) -> Option<f64> {
        self.values.get(sub_key).copied()
    }
}

impl From<Map<String, Value>> for MetricEntry {
    fn from(map: Map<String, Value>) -> Self {
        let source = match map.get("values") {
            Some(Value::Object(nested)) => nested,
            _ => &map,
        };

        Self {
            values: source
                .iter()
                .filter_map(|(k, v)| v.as_f64().map(|v| (k.clone(), v)))
                .collect(),
        }
    }
}

/// A k6 summary export document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SummaryExport {
    #[serde(default)]
    pub metrics: BTreeMap<String, MetricEntry>,
}

/// Distribution metrics whose statistics become `{base}_{stat}` columns.
const DISTRIBUTION_METRICS: [(&str, &str); 5] = [
    ("http_req_duration", "duration"),
    ("http_req_blocked", "blocked"),
    ("http_req_connecting", "connecting"),
    ("http_req_tls_handshaking", "tls_handshaking"),
    ("http_req_waiting", "waiting"),
];

const DISTRIBUTION_STATS: [(&str, &str); 6] = [
    ("avg", "avg"),
    ("min", "min"),
    ("med", "med"),
    ("max", "max"),
    ("p(90)", "p90"),
    ("p(95)", "p95"),
];

impl SummaryExport {
    pub fn get(&self, metric: &str, sub_key: &str) -> Option<f64> {
        self.metrics.get(metric).and_then(|m| m.get(sub_key))
    }

    /// Flatten the export into the named summary columns of a run.
    ///
    /// Metrics k6 did not report are left out rather than defaulted to zero.
    pub fn summary_columns(&self) -> BTreeMap<String, f64> {
        let mut columns = BTreeMap::new();
        let mut put = |name: &str, value: Option<f64>| {
            if let Some(value) = value {
                columns.insert(name.to_string(), value);
            }
        };

        put("total_reqs", self.get("http_reqs", "count"));
        put("rps", self.get("http_reqs", "rate"));
        put(
            "fail_rate",
            self.get("http_req_failed", "value")
                .or_else(|| self.get("http_req_failed", "rate")),
        );
        put("fail_count", self.get("http_req_failed", "passes"));
        put(
            "data_sent_mb_s",
            self.get("data_sent", "rate").map(|r| r / BYTES_PER_MIB),
        );
        put(
            "data_recv_mb_s",
            self.get("data_received", "rate").map(|r| r / BYTES_PER_MIB),
        );
        put("iterations_count", self.get("iterations", "count"));
        put("iterations_rate", self.get("iterations", "rate"));
        put("vus_min", self.get("vus", "min"));
        put("vus_max", self.get("vus", "max"));

        for (metric, base) in DISTRIBUTION_METRICS {
            for (sub_key, stat) in DISTRIBUTION_STATS {
                put(&format!("{base}_{stat}"), self.get(metric, sub_key));
            }
        }

        columns
    }
}

/// Identity of a run as encoded in its artifact file names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    pub proxy: Proxy,
    pub test_type: TestType,
    pub users: LoadLevel,
}

/// Compiled file name patterns for run artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactPatterns {
    metadata: Regex,
    summary: Regex,
    test_name: Regex,
}

impl ArtifactPatterns {
    /// Compile the k6 artifact naming convention used by the benchmark runner.
    pub fn k6_defaults() -> Result<Self, LoadError> {
        Self::new(
            DEFAULT_METADATA_PATTERN,
            DEFAULT_SUMMARY_PATTERN,
            DEFAULT_TEST_NAME_PATTERN,
        )
    }

    pub fn new(metadata: &str, summary: &str, test_name: &str) -> Result<Self, LoadError> {
        Ok(Self {
            metadata: Regex::new(metadata)?,
            summary: Regex::new(summary)?,
            test_name: Regex::new(test_name)?,
        })
    }

    pub fn is_metadata(&self, file_name: &str) -> bool {
        self.metadata.is_match(file_name)
    }

    pub fn is_summary(&self, file_name: &str) -> bool {
        self.summary.is_match(file_name)
    }

    /// The `(proxy_name, test_name)` pair captured from a metadata artifact file name.
    pub fn metadata_key(&self, file_name: &str) -> Option<(String, String)> {
        capture_key(&self.metadata, file_name)
    }

    /// The `(proxy_name, test_name)` pair captured from a summary artifact file name.
    pub fn summary_key(&self, file_name: &str) -> Option<(String, String)> {
        capture_key(&self.summary, file_name)
    }

    /// Parse the run identity out of a summary artifact file name.
    pub fn parse_summary_name(&self, file_name: &str) -> Result<ArtifactName, LoadError> {
        let captures = self
            .summary
            .captures(file_name)
            .ok_or_else(|| LoadError::TestName(file_name.to_string()))?;
        let proxy_name = captures
            .name("proxy_name")
            .ok_or_else(|| LoadError::TestName(file_name.to_string()))?
            .as_str();
        let test_name = captures
            .name("test_name")
            .ok_or_else(|| LoadError::TestName(file_name.to_string()))?
            .as_str();

        let proxy =
            Proxy::from_str(proxy_name).map_err(|_| LoadError::Proxy(proxy_name.to_string()))?;

        let test = self
            .test_name
            .captures(test_name)
            .ok_or_else(|| LoadError::TestName(test_name.to_string()))?;
        let test_type = test
            .name("test_type")
            .and_then(|m| TestType::from_str(m.as_str()).ok())
            .ok_or_else(|| LoadError::TestName(test_name.to_string()))?;
        let users = test
            .name("users")
            .ok_or_else(|| LoadError::TestName(test_name.to_string()))?
            .as_str()
            .parse()?;

        Ok(ArtifactName {
            proxy,
            test_type,
            users,
        })
    }
}

fn capture_key(pattern: &Regex, file_name: &str) -> Option<(String, String)> {
    let captures = pattern.captures(file_name)?;
    Some((
        captures.name("proxy_name")?.as_str().to_string(),
        captures.name("test_name")?.as_str().to_string(),
    ))
}
