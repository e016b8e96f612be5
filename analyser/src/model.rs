use chrono::{DateTime, SecondsFormat, Utc};
use polars::prelude::*;
use proxy_bench_run_model::{LoadLevel, Proxy, TestType};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

mod resource_usage;
mod timeseries;

pub use resource_usage::{
    ResourceMetric, ResourceUsage, StatSummary, Statistic, Window, WindowedStats,
};
pub use timeseries::{LoadMetric, TimePoint, TimeSeries, TimeseriesSet};

/// Column name of the proxy's mean CPU usage during the run.
pub const AVG_CPU: &str = "avg_cpu";
/// Column name of the proxy's mean memory usage in MiB during the run.
pub const AVG_MEM_MIB: &str = "avg_mem_mib";

/// One completed benchmark run.
///
/// Created by the catalog builder and enriched in place by the resource stats aggregator and
/// the timeseries correlator. Enrichment only ever fills in [`RunRecord::resources`] and
/// [`RunRecord::timeseries`].
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub test_id: String,
    pub proxy: Proxy,
    pub test_type: TestType,
    pub users: LoadLevel,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Summary metrics by column name; metrics k6 did not report are absent
    pub metrics: BTreeMap<String, f64>,
    /// `None` until resource usage enrichment has run against an available store
    pub resources: Option<ResourceUsage>,
    pub timeseries: BTreeMap<LoadMetric, TimeSeries>,
}

impl RunRecord {
    pub fn duration_secs(&self) -> f64 {
        (self.end_time - self.start_time).num_milliseconds() as f64 / 1000.0
    }

    /// Look up a scalar by column name.
    ///
    /// Summary metric columns come from the k6 summary, [`AVG_CPU`] and [`AVG_MEM_MIB`] from
    /// resource usage enrichment. Missing and non-finite values are `None`.
    pub fn metric(&self, column: &str) -> Option<f64> {
        let value = match column {
            AVG_CPU => self.resources.as_ref().and_then(|r| r.avg_cpu),
            AVG_MEM_MIB => self.resources.as_ref().and_then(|r| r.avg_mem_mib),
            _ => self.metrics.get(column).copied(),
        };
        value.filter(|v| v.is_finite())
    }
}

/// Ordered collection of runs, unique by `test_id`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct RunCatalog {
    records: Vec<RunRecord>,
}

impl RunCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record, keeping `test_id` unique.
    ///
    /// Returns `false` and leaves the catalog unchanged if the `test_id` is already present.
    pub fn push(&mut self, record: RunRecord) -> bool {
        if self.get(&record.test_id).is_some() {
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn get(&self, test_id: &str) -> Option<&RunRecord> {
        self.records.iter().find(|r| r.test_id == test_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RunRecord> {
        self.records.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut RunRecord> {
        self.records.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The catalog as a summary table, one row per run.
    ///
    /// Columns are the union of every field observed across runs. Values a run does not have
    /// are null.
    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let metric_names: BTreeSet<&str> = self
            .records
            .iter()
            .flat_map(|r| r.metrics.keys().map(String::as_str))
            .collect();
        let flattened: Vec<BTreeMap<String, f64>> = self
            .records
            .iter()
            .map(|r| {
                r.resources
                    .as_ref()
                    .map(|u| u.stats.flatten())
                    .unwrap_or_default()
            })
            .collect();
        let resource_names: BTreeSet<&str> = flattened
            .iter()
            .flat_map(|f| f.keys().map(String::as_str))
            .collect();

        let text = |name: &str, f: &dyn Fn(&RunRecord) -> String| {
            Column::new(name.into(), self.records.iter().map(f).collect::<Vec<_>>())
        };
        let timestamp = |t: &DateTime<Utc>| t.to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut columns = vec![
            text("test_id", &|r| r.test_id.clone()),
            text("proxy", &|r| r.proxy.to_string()),
            text("test_type", &|r| r.test_type.to_string()),
            text("users", &|r| r.users.to_string()),
            text("start_time", &|r| timestamp(&r.start_time)),
            text("end_time", &|r| timestamp(&r.end_time)),
            Column::new(
                "duration_s".into(),
                self.records
                    .iter()
                    .map(RunRecord::duration_secs)
                    .collect::<Vec<_>>(),
            ),
        ];

        for name in metric_names.into_iter().chain([AVG_CPU, AVG_MEM_MIB]) {
            columns.push(Column::new(
                name.into(),
                self.records
                    .iter()
                    .map(|r| r.metric(name))
                    .collect::<Vec<_>>(),
            ));
        }

        for name in resource_names {
            columns.push(Column::new(
                name.into(),
                flattened
                    .iter()
                    .map(|f| f.get(name).copied())
                    .collect::<Vec<_>>(),
            ));
        }

        DataFrame::new(columns)
    }
}
