use crate::config::StoreConfig;
use anyhow::Context;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use influxdb::ReadQuery;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub mod load_timeseries;
pub mod resource_usage;

/// A trait to describe how to source a metric from InfluxDB.
pub trait InfluxSourced {
    /// The measurement name, usable as a table name in InfluxDB queries.
    fn measurement(&self) -> &'static str;

    /// The aggregated field expression to select, including its alias.
    fn select(&self) -> &'static str;

    /// The column the selected value comes back under.
    fn value_column(&self) -> &'static str;
}

/// One series of an InfluxDB query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySeries {
    pub name: String,
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,
    pub columns: Vec<String>,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

impl QuerySeries {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .as_ref()
            .and_then(|t| t.get(key))
            .map(String::as_str)
    }

    /// Extract `(time_ms, value)` samples for a column.
    ///
    /// `null` values are kept as `None` so gaps can be filled by the caller.
    pub fn samples(&self, column: &str) -> anyhow::Result<Vec<(i64, Option<f64>)>> {
        let time_idx = self.column_index("time")?;
        let value_idx = self.column_index(column)?;

        self.values
            .iter()
            .map(|row| {
                let time = row
                    .get(time_idx)
                    .context("Row is missing the time column")
                    .and_then(parse_time)?;
                let value = row.get(value_idx).and_then(Value::as_f64);
                Ok((time, value))
            })
            .collect()
    }

    fn column_index(&self, column: &str) -> anyhow::Result<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .with_context(|| format!("No column {column} in series {}", self.name))
    }
}

fn parse_time(value: &Value) -> anyhow::Result<i64> {
    match value {
        Value::String(s) => Ok(DateTime::parse_from_rfc3339(s)
            .with_context(|| format!("Invalid time: {s}"))?
            .with_timezone(&Utc)
            .timestamp_millis()),
        Value::Number(n) => n
            .as_i64()
            .with_context(|| format!("Invalid epoch time: {n}")),
        other => anyhow::bail!("Unexpected time value: {other:?}"),
    }
}

/// Read access to a time-series store.
///
/// One handle serves one enrichment pass and is dropped when the pass ends.
pub trait SeriesStore: Send + Sync {
    /// Check that the store can be reached.
    fn ping(&self) -> BoxFuture<'_, anyhow::Result<()>>;

    /// Run a query, returning every series of the first statement result.
    ///
    /// A result without series is reported as [`crate::frame::LoadError::NoSeriesInResult`].
    fn query(&self, query: String) -> BoxFuture<'_, anyhow::Result<Vec<QuerySeries>>>;
}

/// [`SeriesStore`] backed by an InfluxDB 1.x database.
pub struct InfluxStore {
    client: influxdb::Client,
}

impl InfluxStore {
    pub fn new(config: &StoreConfig) -> Self {
        let mut client = influxdb::Client::new(config.url.clone(), config.database.clone());
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            client = client.with_auth(username, password);
        }
        if let Some(token) = &config.token {
            client = client.with_token(token);
        }

        Self { client }
    }
}

impl SeriesStore for InfluxStore {
    fn ping(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        async move {
            let (build, version) = self
                .client
                .ping()
                .await
                .with_context(|| format!("Failed to reach {}", self.client.database_url()))?;
            log::debug!("Connected to InfluxDB {version} ({build})");
            Ok(())
        }
        .boxed()
    }

    fn query(&self, query: String) -> BoxFuture<'_, anyhow::Result<Vec<QuerySeries>>> {
        async move {
            let q = ReadQuery::new(query);
            log::debug!("Querying: {:?}", q);

            let res = self.client.json_query(q).await?;
            let series = crate::frame::series_from_response(res)?;

            log::trace!("Loaded {} series", series.len());

            Ok(series)
        }
        .boxed()
    }
}

/// Format a timestamp the way InfluxQL time literals expect it.
pub(crate) fn time_literal(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn series() -> QuerySeries {
        serde_json::from_value(json!({
            "name": "docker_container_cpu",
            "tags": {"io.telegraf.group.name": "go-proxy"},
            "columns": ["time", "cpu_perc"],
            "values": [
                ["2023-11-14T22:13:20Z", 1.5],
                ["2023-11-14T22:13:21Z", null],
                [1700000002000i64, 3]
            ]
        }))
        .unwrap()
    }

    #[test]
    fn samples_parse_times_and_keep_gaps() {
        let samples = series().samples("cpu_perc").unwrap();
        assert_eq!(
            samples,
            vec![
                (1_700_000_000_000, Some(1.5)),
                (1_700_000_001_000, None),
                (1_700_000_002_000, Some(3.0)),
            ]
        );
    }

    #[test]
    fn missing_column_is_an_error() {
        assert!(series().samples("mem_bytes").is_err());
    }

    #[test]
    fn tag_lookup() {
        let s = series();
        assert_eq!(s.tag("io.telegraf.group.name"), Some("go-proxy"));
        assert_eq!(s.tag("host"), None);
    }

    #[test]
    fn time_literal_uses_utc_suffix() {
        let t = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(time_literal(t), "2023-11-14T22:13:20Z");
        let t = DateTime::from_timestamp_millis(1_700_000_000_250).unwrap();
        assert_eq!(time_literal(t), "2023-11-14T22:13:20.250Z");
    }
}
