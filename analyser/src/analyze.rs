use crate::model::{ResourceMetric, StatSummary, Window, WindowedStats};
use crate::partition::partition_by_column;
use anyhow::Context;
use polars::frame::DataFrame;
use polars::prelude::*;
use strum::IntoEnumIterator;

/// Rows of an aligned resource frame whose `time` falls into `window`.
fn rows_in_window(
    frame: &DataFrame,
    window: Window,
    start_ms: i64,
    end_ms: i64,
) -> anyhow::Result<DataFrame> {
    let mask: BooleanChunked = frame
        .column("time")?
        .i64()?
        .into_iter()
        .map(|time| time.is_some_and(|t| Window::of(t, start_ms, end_ms) == window))
        .collect();

    Ok(frame.filter(&mask)?)
}

/// Mean, min, max and linearly interpolated p90/p95 of a column.
///
/// Returns `None` when the column has no non-null value.
pub(crate) fn stat_summary(frame: &DataFrame, column: &str) -> anyhow::Result<Option<StatSummary>> {
    if frame.column(column)?.null_count() == frame.height() {
        return Ok(None);
    }

    let out = frame
        .clone()
        .lazy()
        .select([
            col(column).mean().alias("avg"),
            col(column).min().alias("min"),
            col(column).max().alias("max"),
            col(column)
                .quantile(lit(0.90), QuantileMethod::Linear)
                .alias("p90"),
            col(column)
                .quantile(lit(0.95), QuantileMethod::Linear)
                .alias("p95"),
        ])
        .collect()?;

    Ok(Some(StatSummary {
        avg: scalar(&out, "avg")?,
        min: scalar(&out, "min")?,
        max: scalar(&out, "max")?,
        p90: scalar(&out, "p90")?,
        p95: scalar(&out, "p95")?,
    }))
}

fn scalar(frame: &DataFrame, column: &str) -> anyhow::Result<f64> {
    frame
        .column(column)?
        .f64()?
        .get(0)
        .with_context(|| format!("Missing {column}"))
}

/// Statistics per container, window and metric for a run active over `[start_ms, end_ms]`.
pub(crate) fn windowed_stats(
    aligned: &DataFrame,
    start_ms: i64,
    end_ms: i64,
) -> anyhow::Result<WindowedStats> {
    let mut stats = WindowedStats::default();
    if aligned.height() == 0 {
        return Ok(stats);
    }

    for (component, frame) in partition_by_column(aligned, "name")? {
        for window in Window::iter() {
            let in_window = rows_in_window(&frame, window, start_ms, end_ms)?;

            for metric in ResourceMetric::iter() {
                if let Some(summary) = stat_summary(&in_window, metric.column())
                    .with_context(|| format!("{component} {metric} {window}"))?
                {
                    stats.insert(&component, window, metric, summary);
                }
            }
        }
    }

    Ok(stats)
}
