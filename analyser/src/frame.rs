use crate::query::{InfluxSourced, QuerySeries};
use crate::model::ResourceMetric;
use anyhow::Context;
use influxdb::integrations::serde_integration::DatabaseQueryResult;
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("No series in result: {result:?}")]
    NoSeriesInResult { result: serde_json::Value },
    #[error("Query failed: {0}")]
    QueryFailed(String),
}

pub(crate) fn series_from_response(
    response: DatabaseQueryResult,
) -> anyhow::Result<Vec<QuerySeries>> {
    let result = response
        .results
        .into_iter()
        .next()
        .context("Empty query response")?;

    if let Some(error) = result.get("error").and_then(|e| e.as_str()) {
        return Err(LoadError::QueryFailed(error.to_string()).into());
    }

    let series = result
        .get("series")
        .filter(|s| s.as_array().is_some_and(|s| !s.is_empty()))
        .cloned();
    let Some(series) = series else {
        return Err(LoadError::NoSeriesInResult { result }.into());
    };

    serde_json::from_value(series).context("Malformed series in query result")
}

/// Per-second samples of one container, `(cpu_perc, mem_bytes)` keyed by time in milliseconds.
type ContainerSamples = BTreeMap<i64, (Option<f64>, Option<f64>)>;

/// Merge tagged CPU and memory series into one aligned frame.
///
/// Every container gets a row at every second sampled for any container, with gaps forward
/// filled and then backward filled from that container's own samples. Each metric is filled
/// on its own: a container without any samples of one metric keeps a null column for it.
/// Containers outside `components` are dropped after alignment.
///
/// The resulting columns are `time` (ms), `name`, `cpu_perc`, `mem_usage_mib` and
/// `relative_time` (seconds since the first sample).
pub(crate) fn align_resource_samples(
    cpu: &[QuerySeries],
    mem: &[QuerySeries],
    tag_key: &str,
    components: &[String],
) -> anyhow::Result<DataFrame> {
    let mut containers: BTreeMap<String, ContainerSamples> = BTreeMap::new();

    for (series_set, metric) in [(cpu, ResourceMetric::Cpu), (mem, ResourceMetric::Mem)] {
        let mut tagged = 0;
        for series in series_set {
            let Some(name) = series.tag(tag_key) else {
                log::debug!("Ignoring series {} without tag {tag_key}", series.name);
                continue;
            };
            tagged += 1;

            let samples = containers.entry(name.to_string()).or_default();
            for (time, value) in series.samples(metric.value_column())? {
                let slot = samples.entry(time).or_default();
                match metric {
                    ResourceMetric::Cpu => slot.0 = value,
                    ResourceMetric::Mem => slot.1 = value,
                }
            }
        }

        if tagged == 0 {
            log::warn!("No {metric} series tagged with {tag_key}");
        }
    }

    let grid: BTreeSet<i64> = containers
        .values()
        .flat_map(|samples| samples.keys().copied())
        .collect();
    let Some(&origin) = grid.first() else {
        anyhow::bail!("No resource samples in range");
    };

    let mut times = Vec::new();
    let mut names = Vec::new();
    let mut cpu_perc = Vec::new();
    let mut mem_usage_mib = Vec::new();
    let mut relative_time = Vec::new();

    for (name, samples) in &containers {
        if !components.iter().any(|c| c == name) {
            continue;
        }

        let cpu = fill_gaps(grid.iter().map(|t| samples.get(t).and_then(|s| s.0)));
        let mem = fill_gaps(grid.iter().map(|t| samples.get(t).and_then(|s| s.1)));
        if cpu.is_none() && mem.is_none() {
            log::warn!("Dropping container {name} without any samples");
            continue;
        }

        for (i, time) in grid.iter().enumerate() {
            times.push(*time);
            names.push(name.clone());
            cpu_perc.push(cpu.as_ref().map(|v| v[i]));
            mem_usage_mib.push(mem.as_ref().map(|v| v[i] / BYTES_PER_MIB));
            relative_time.push((time - origin) as f64 / 1000.0);
        }
    }

    let frame = df!(
        "time" => times,
        "name" => names,
        ResourceMetric::Cpu.column() => cpu_perc,
        ResourceMetric::Mem.column() => mem_usage_mib,
        "relative_time" => relative_time,
    )?;
    log::trace!("Aligned resource frame: {}", frame);

    Ok(frame)
}

/// Forward fill, then backward fill the leading gap.
///
/// Returns `None` if there is no value at all to fill from.
fn fill_gaps(values: impl Iterator<Item = Option<f64>>) -> Option<Vec<f64>> {
    let mut last = None;
    let forward: Vec<Option<f64>> = values
        .map(|v| {
            if v.is_some() {
                last = v;
            }
            last
        })
        .collect();

    let first = forward.iter().flatten().next().copied()?;
    Some(forward.into_iter().map(|v| v.unwrap_or(first)).collect())
}
