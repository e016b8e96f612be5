use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use strum::IntoEnumIterator;
use thiserror::Error;

use crate::model::{AVG_CPU, AVG_MEM_MIB};

/// Name fragments marking a metric where a smaller value is the better result.
const LOWER_IS_BETTER_KEYWORDS: &[&str] = &[
    "Latency",
    "TTFB",
    "Connection Time",
    "CPU",
    "Memory",
    "Failure",
    "Error",
    "Duration",
    "Time",
    "Usage",
];

/// A run metric tracked by the comparative statements, in reporting order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, strum::EnumIter,
)]
pub enum Metric {
    AverageRps,
    TotalRequests,
    FailureRate,
    FailureCount,
    AverageLatency,
    MedianLatency,
    P90Latency,
    P95Latency,
    MaxLatency,
    AverageTtfb,
    P95Ttfb,
    AverageConnectionTime,
    P95ConnectionTime,
    AverageBlockedTime,
    AverageTlsHandshakeTime,
    DataSent,
    DataReceived,
    IterationRate,
    IterationsCount,
    AverageCpuUsage,
    AverageMemoryUsage,
}

impl Metric {
    /// Human readable name used in statements.
    pub fn name(&self) -> &'static str {
        self.descriptor().0
    }

    /// Column of the run this metric reads from.
    pub fn column(&self) -> &'static str {
        self.descriptor().1
    }

    /// The polarity this metric is reported with by default.
    pub fn polarity(&self) -> Polarity {
        use Polarity::*;

        match self {
            Metric::AverageRps
            | Metric::TotalRequests
            | Metric::DataSent
            | Metric::DataReceived
            | Metric::IterationRate
            | Metric::IterationsCount => HigherIsBetter,
            Metric::FailureRate
            | Metric::FailureCount
            | Metric::AverageLatency
            | Metric::MedianLatency
            | Metric::P90Latency
            | Metric::P95Latency
            | Metric::MaxLatency
            | Metric::AverageTtfb
            | Metric::P95Ttfb
            | Metric::AverageConnectionTime
            | Metric::P95ConnectionTime
            | Metric::AverageBlockedTime
            | Metric::AverageTlsHandshakeTime
            | Metric::AverageCpuUsage
            | Metric::AverageMemoryUsage => LowerIsBetter,
        }
    }

    /// Counts are reported as whole numbers.
    pub fn is_count(&self) -> bool {
        let name = self.name();
        name.contains("Count") || name.contains("Requests")
    }

    fn descriptor(&self) -> (&'static str, &'static str) {
        match self {
            Metric::AverageRps => ("Average RPS", "rps"),
            Metric::TotalRequests => ("Total Requests", "total_reqs"),
            Metric::FailureRate => ("Failure Rate", "fail_rate"),
            Metric::FailureCount => ("Failure Count", "fail_count"),
            Metric::AverageLatency => ("Average Latency", "duration_avg"),
            Metric::MedianLatency => ("Median Latency", "duration_med"),
            Metric::P90Latency => ("P90 Latency", "duration_p90"),
            Metric::P95Latency => ("P95 Latency", "duration_p95"),
            Metric::MaxLatency => ("Max Latency", "duration_max"),
            Metric::AverageTtfb => ("Average TTFB", "waiting_avg"),
            Metric::P95Ttfb => ("P95 TTFB", "waiting_p95"),
            Metric::AverageConnectionTime => ("Average Connection Time", "connecting_avg"),
            Metric::P95ConnectionTime => ("P95 Connection Time", "connecting_p95"),
            Metric::AverageBlockedTime => ("Average Blocked Time", "blocked_avg"),
            Metric::AverageTlsHandshakeTime => {
                ("Average TLS Handshake Time", "tls_handshaking_avg")
            }
            Metric::DataSent => ("Data Sent (MB/s)", "data_sent_mb_s"),
            Metric::DataReceived => ("Data Received (MB/s)", "data_recv_mb_s"),
            Metric::IterationRate => ("Iteration Rate", "iterations_rate"),
            Metric::IterationsCount => ("Iterations Count", "iterations_count"),
            Metric::AverageCpuUsage => ("Average CPU Usage (%)", AVG_CPU),
            Metric::AverageMemoryUsage => ("Average Memory Usage (MiB)", AVG_MEM_MIB),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether an increase of a metric is an improvement or a regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Polarity {
    LowerIsBetter,
    HigherIsBetter,
}

impl Polarity {
    /// Classify a metric by name.
    ///
    /// Names containing a latency, time, failure or resource usage keyword are lower is better,
    /// everything else is higher is better.
    pub fn infer(name: &str) -> Self {
        if LOWER_IS_BETTER_KEYWORDS.iter().any(|k| name.contains(k)) {
            Polarity::LowerIsBetter
        } else {
            Polarity::HigherIsBetter
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PolarityError {
    #[error("No polarity configured for metric {0}")]
    Missing(Metric),
}

/// Explicit polarity of every tracked [`Metric`].
#[derive(Debug, Clone, PartialEq)]
pub struct PolarityTable {
    entries: BTreeMap<Metric, Polarity>,
}

impl PolarityTable {
    pub fn from_entries(entries: impl IntoIterator<Item = (Metric, Polarity)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Check that every [`Metric`] has a polarity.
    pub fn validate(&self) -> Result<(), PolarityError> {
        match Metric::iter().find(|m| !self.entries.contains_key(m)) {
            Some(missing) => Err(PolarityError::Missing(missing)),
            None => Ok(()),
        }
    }

    /// Metrics with their polarity, in reporting order.
    pub fn iter(&self) -> impl Iterator<Item = (Metric, Polarity)> + '_ {
        self.entries.iter().map(|(m, p)| (*m, *p))
    }
}

impl Default for PolarityTable {
    fn default() -> Self {
        Self::from_entries(Metric::iter().map(|m| (m, m.polarity())))
    }
}
