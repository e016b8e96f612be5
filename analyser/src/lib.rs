//! Correlates proxy benchmark runs with their resource usage and load time series, and
//! derives comparative statements between them.

use crate::compare::{StatementGenerator, StatementReport};
use crate::config::AnalysisConfig;
use crate::model::{RunCatalog, TimeseriesSet};
use crate::query::SeriesStore;
use anyhow::Context;

pub mod aggregator;
mod analyze;
pub mod catalog;
pub mod compare;
pub mod config;
pub mod correlator;
pub mod frame;
pub mod model;
mod partition;
pub mod query;
pub mod report;

#[cfg(any(test, feature = "test_data"))]
pub mod test_data;

/// The outcome of one analysis.
#[derive(Debug)]
pub struct Analysis {
    pub catalog: RunCatalog,
    pub timeseries: TimeseriesSet,
    /// `None` when there were no runs to compare
    pub intra_proxy: Option<StatementReport>,
    /// `None` when there were no runs to compare
    pub cross_proxy: Option<StatementReport>,
}

/// Load, enrich and compare every run described by `config`.
///
/// Store problems never fail the analysis, they only leave the affected fields empty.
pub async fn analyse(
    config: &AnalysisConfig,
    resource_store: &dyn SeriesStore,
    load_store: &dyn SeriesStore,
) -> anyhow::Result<Analysis> {
    let generator =
        StatementGenerator::new(&config.statements).context("Invalid metric polarities")?;

    let mut catalog = catalog::load_catalog(&config.loader).context("Load run catalog")?;
    if catalog.is_empty() {
        log::warn!("No valid runs found, skipping enrichment and statement generation");
        return Ok(Analysis {
            catalog,
            timeseries: TimeseriesSet::default(),
            intra_proxy: None,
            cross_proxy: None,
        });
    }

    aggregator::resource_usage::enrich_resource_usage(
        &mut catalog,
        resource_store,
        &config.resource_store,
    )
    .await;
    let timeseries = correlator::correlate_timeseries(&mut catalog, load_store).await;

    let intra_proxy = generator.intra_proxy(&catalog);
    let cross_proxy = generator.cross_proxy(&catalog);

    Ok(Analysis {
        catalog,
        timeseries,
        intra_proxy: Some(intra_proxy),
        cross_proxy: Some(cross_proxy),
    })
}
