use std::collections::BTreeMap;

use polars::frame::DataFrame;
use serde::Serialize;

/// Temporal partition of resource samples relative to a run's active interval.
///
/// A sample taken exactly at the start or end of the run belongs to [`Window::During`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Window {
    Before,
    During,
    After,
}

impl Window {
    /// The window a sample at `time_ms` falls into for a run active over `[start_ms, end_ms]`.
    pub fn of(time_ms: i64, start_ms: i64, end_ms: i64) -> Self {
        if time_ms < start_ms {
            Window::Before
        } else if time_ms > end_ms {
            Window::After
        } else {
            Window::During
        }
    }
}

/// Resource usage metric sampled per container.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResourceMetric {
    /// CPU usage in percent
    Cpu,
    /// Memory usage in MiB
    Mem,
}

impl ResourceMetric {
    /// Column holding this metric in the aligned resource frame.
    pub fn column(&self) -> &'static str {
        match self {
            ResourceMetric::Cpu => "cpu_perc",
            ResourceMetric::Mem => "mem_usage_mib",
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Statistic {
    Avg,
    Min,
    Max,
    P90,
    P95,
}

/// Summary statistics of one metric over one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatSummary {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub p90: f64,
    pub p95: f64,
}

impl StatSummary {
    pub fn get(&self, statistic: Statistic) -> f64 {
        match statistic {
            Statistic::Avg => self.avg,
            Statistic::Min => self.min,
            Statistic::Max => self.max,
            Statistic::P90 => self.p90,
            Statistic::P95 => self.p95,
        }
    }
}

/// Resource statistics keyed by component, then [`Window`], then [`ResourceMetric`].
///
/// Only combinations that had at least one sample are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WindowedStats {
    components: BTreeMap<String, BTreeMap<Window, BTreeMap<ResourceMetric, StatSummary>>>,
}

impl WindowedStats {
    pub fn insert(
        &mut self,
        component: &str,
        window: Window,
        metric: ResourceMetric,
        summary: StatSummary,
    ) {
        self.components
            .entry(component.to_string())
            .or_default()
            .entry(window)
            .or_default()
            .insert(metric, summary);
    }

    pub fn get(
        &self,
        component: &str,
        window: Window,
        metric: ResourceMetric,
    ) -> Option<&StatSummary> {
        self.components
            .get(component)
            .and_then(|windows| windows.get(&window))
            .and_then(|metrics| metrics.get(&metric))
    }

    pub fn value(
        &self,
        component: &str,
        window: Window,
        metric: ResourceMetric,
        statistic: Statistic,
    ) -> Option<f64> {
        self.get(component, window, metric).map(|s| s.get(statistic))
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Flatten into `{component}_{metric}_{window}_{stat}` keyed values for tabular output.
    pub fn flatten(&self) -> BTreeMap<String, f64> {
        let mut flat = BTreeMap::new();
        for (component, windows) in &self.components {
            for (window, metrics) in windows {
                for (metric, summary) in metrics {
                    for statistic in <Statistic as strum::IntoEnumIterator>::iter() {
                        flat.insert(
                            format!("{component}_{metric}_{window}_{statistic}"),
                            summary.get(statistic),
                        );
                    }
                }
            }
        }
        flat
    }
}

/// Resource usage attached to a run by the resource stats aggregator.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceUsage {
    pub stats: WindowedStats,
    /// Mean CPU usage of the run's own proxy container during the run
    pub avg_cpu: Option<f64>,
    /// Mean memory usage in MiB of the run's own proxy container during the run
    pub avg_mem_mib: Option<f64>,
    /// Aligned per-second samples with columns `time`, `name`, `cpu_perc`, `mem_usage_mib`
    /// and `relative_time`
    #[serde(skip)]
    pub aligned: DataFrame,
}

impl ResourceUsage {
    /// Resource usage for a run whose samples could not be loaded.
    pub fn empty() -> Self {
        Self {
            stats: WindowedStats::default(),
            avg_cpu: None,
            avg_mem_mib: None,
            aligned: DataFrame::empty(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty() && self.aligned.height() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(base: f64) -> StatSummary {
        StatSummary {
            avg: base,
            min: base - 1.0,
            max: base + 1.0,
            p90: base + 0.5,
            p95: base + 0.75,
        }
    }

    #[test]
    fn window_boundaries_are_inclusive_for_during() {
        assert_eq!(Window::of(999, 1_000, 2_000), Window::Before);
        assert_eq!(Window::of(1_000, 1_000, 2_000), Window::During);
        assert_eq!(Window::of(2_000, 1_000, 2_000), Window::During);
        assert_eq!(Window::of(2_001, 1_000, 2_000), Window::After);
    }

    #[test]
    fn flatten_uses_composite_keys() {
        let mut stats = WindowedStats::default();
        stats.insert("go-proxy", Window::During, ResourceMetric::Cpu, summary(10.0));

        let flat = stats.flatten();
        assert_eq!(flat.len(), 5);
        assert_eq!(flat["go-proxy_cpu_during_avg"], 10.0);
        assert_eq!(flat["go-proxy_cpu_during_p95"], 10.75);
        assert_eq!(flat["go-proxy_cpu_during_min"], 9.0);
    }

    #[test]
    fn typed_lookup() {
        let mut stats = WindowedStats::default();
        stats.insert("influxdb", Window::After, ResourceMetric::Mem, summary(512.0));

        assert_eq!(
            stats.value("influxdb", Window::After, ResourceMetric::Mem, Statistic::Max),
            Some(513.0)
        );
        assert_eq!(
            stats.value("influxdb", Window::Before, ResourceMetric::Mem, Statistic::Max),
            None
        );
        assert_eq!(stats.components().collect::<Vec<_>>(), vec!["influxdb"]);
    }
}
