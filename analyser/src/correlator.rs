use crate::frame::LoadError;
use crate::model::{LoadMetric, RunCatalog, RunRecord, TimeSeries, TimeseriesSet};
use crate::query::load_timeseries::load_timeseries_query;
use crate::query::{InfluxSourced, SeriesStore};
use strum::IntoEnumIterator;

/// Query the per-second series of every [`LoadMetric`] for every run.
///
/// Each series is attached to its run and collected into the returned set. A failed query
/// only leaves that (run, metric) pair out. If the store cannot be reached the result is
/// empty, which is a valid outcome.
pub async fn correlate_timeseries(
    catalog: &mut RunCatalog,
    store: &dyn SeriesStore,
) -> TimeseriesSet {
    let mut set = TimeseriesSet::default();

    if let Err(e) = store.ping().await {
        log::error!("Could not connect to the load test store, skipping: {e:#}");
        return set;
    }

    for record in catalog.iter_mut() {
        for metric in LoadMetric::iter() {
            match query_series(store, record, metric).await {
                Ok(Some(series)) => {
                    record.timeseries.insert(metric, series.clone());
                    set.push(series);
                }
                Ok(None) => {
                    log::debug!("No {metric} samples for run {}", record.test_id);
                }
                Err(e) => {
                    log::warn!(
                        "Error querying {} for run {}: {e:#}",
                        metric.measurement(),
                        record.test_id
                    );
                }
            }
        }
    }

    if set.is_empty() {
        log::warn!("No load test time series were found");
    } else {
        log::info!("Correlated {} load test time series", set.len());
    }

    set
}

async fn query_series(
    store: &dyn SeriesStore,
    record: &RunRecord,
    metric: LoadMetric,
) -> anyhow::Result<Option<TimeSeries>> {
    let result = store.query(load_timeseries_query(metric, record)).await;
    let series = match result {
        Ok(series) => series,
        Err(e) => match e.downcast_ref::<LoadError>() {
            Some(LoadError::NoSeriesInResult { .. }) => return Ok(None),
            _ => return Err(e),
        },
    };

    let mut samples = Vec::new();
    for s in series.iter().filter(|s| s.name == metric.measurement()) {
        samples.extend(
            s.samples(metric.value_column())?
                .into_iter()
                .map(|(time, value)| (time, value.unwrap_or_default())),
        );
    }
    if samples.is_empty() {
        return Ok(None);
    }

    Ok(Some(TimeSeries::from_samples(
        record.test_id.clone(),
        metric,
        samples,
    )))
}
