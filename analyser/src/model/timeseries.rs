use polars::prelude::*;
use serde::Serialize;

/// Load test metrics correlated per second for each run.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LoadMetric {
    /// Requests per second
    Rps,
    /// Failed requests per second
    ErrorRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimePoint {
    /// Seconds since the first sample of the series
    pub relative_time: f64,
    pub value: f64,
}

/// One per-second series of a [`LoadMetric`] for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    pub test_id: String,
    pub metric: LoadMetric,
    pub points: Vec<TimePoint>,
}

impl TimeSeries {
    /// Build a series from absolute `(time_ms, value)` samples.
    ///
    /// Samples are sorted by time and re-based so the earliest sample sits at `0.0`.
    pub fn from_samples(
        test_id: impl Into<String>,
        metric: LoadMetric,
        mut samples: Vec<(i64, f64)>,
    ) -> Self {
        samples.sort_by_key(|(time, _)| *time);
        let origin = samples.first().map(|(time, _)| *time).unwrap_or_default();

        Self {
            test_id: test_id.into(),
            metric,
            points: samples
                .into_iter()
                .map(|(time, value)| TimePoint {
                    relative_time: (time - origin) as f64 / 1000.0,
                    value,
                })
                .collect(),
        }
    }

    /// `(relative_time, value)` pairs in time order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.points.iter().map(|p| (p.relative_time, p.value))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// All series produced by one correlation pass.
///
/// An empty set is a valid result: it means no load test time series were available.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TimeseriesSet {
    series: Vec<TimeSeries>,
}

impl TimeseriesSet {
    pub fn push(&mut self, series: TimeSeries) {
        self.series.push(series);
    }

    pub fn get(&self, test_id: &str, metric: LoadMetric) -> Option<&TimeSeries> {
        self.series
            .iter()
            .find(|s| s.test_id == test_id && s.metric == metric)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimeSeries> {
        self.series.iter()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Long-format frame with columns `test_id`, `metric`, `relative_time` and `value`.
    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let rows = self
            .series
            .iter()
            .flat_map(|s| s.points.iter().map(move |p| (s, p)));

        let mut test_ids = Vec::new();
        let mut metrics = Vec::new();
        let mut relative_times = Vec::new();
        let mut values = Vec::new();
        for (series, point) in rows {
            test_ids.push(series.test_id.clone());
            metrics.push(series.metric.to_string());
            relative_times.push(point.relative_time);
            values.push(point.value);
        }

        df!(
            "test_id" => test_ids,
            "metric" => metrics,
            "relative_time" => relative_times,
            "value" => values,
        )
    }
}
