//! An in-memory [`SeriesStore`] with canned query results.

use crate::frame::LoadError;
use crate::query::{QuerySeries, SeriesStore};
use futures::future::{ready, BoxFuture};
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::BTreeMap;

enum Response {
    Series(Vec<QuerySeries>),
    Failure,
}

/// Answers queries by exact query text.
///
/// Queries without a configured response behave like a result without series. Every query
/// is recorded, in order.
pub struct StaticStore {
    available: bool,
    responses: BTreeMap<String, Response>,
    queries: Mutex<Vec<String>>,
}

impl StaticStore {
    pub fn new() -> Self {
        Self {
            available: true,
            responses: BTreeMap::new(),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// A store that fails to connect.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn with_series(mut self, query: impl Into<String>, series: Vec<QuerySeries>) -> Self {
        self.responses.insert(query.into(), Response::Series(series));
        self
    }

    pub fn with_failure(mut self, query: impl Into<String>) -> Self {
        self.responses.insert(query.into(), Response::Failure);
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

impl Default for StaticStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SeriesStore for StaticStore {
    fn ping(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        let result = if self.available {
            Ok(())
        } else {
            Err(anyhow::anyhow!("Connection refused"))
        };
        ready(result).boxed()
    }

    fn query(&self, query: String) -> BoxFuture<'_, anyhow::Result<Vec<QuerySeries>>> {
        let result = match self.responses.get(&query) {
            Some(Response::Series(series)) => Ok(series.clone()),
            Some(Response::Failure) => Err(anyhow::anyhow!("Query failed: {query}")),
            None => Err(LoadError::NoSeriesInResult {
                result: json!({"statement_id": 0}),
            }
            .into()),
        };
        self.queries.lock().push(query);
        ready(result).boxed()
    }
}

/// A series tagged with a component, as returned for `GROUP BY "<tag_key>"` queries.
pub fn tagged_series(
    name: &str,
    tag_key: &str,
    component: &str,
    column: &str,
    rows: &[(i64, Option<f64>)],
) -> QuerySeries {
    QuerySeries {
        tags: Some([(tag_key.to_string(), component.to_string())].into()),
        ..untagged_series(name, column, rows)
    }
}

/// A series without tags, with rows of `(time_ms, value)`.
pub fn untagged_series(name: &str, column: &str, rows: &[(i64, Option<f64>)]) -> QuerySeries {
    QuerySeries {
        name: name.to_string(),
        tags: None,
        columns: vec!["time".to_string(), column.to_string()],
        values: rows
            .iter()
            .map(|(time, value)| vec![Value::from(*time), json!(value)])
            .collect(),
    }
}
