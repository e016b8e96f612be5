use crate::analyze::windowed_stats;
use crate::config::ResourceStoreConfig;
use crate::frame::align_resource_samples;
use crate::model::{ResourceMetric, ResourceUsage, RunCatalog, RunRecord, Statistic, Window};
use crate::query::resource_usage::resource_query;
use crate::query::SeriesStore;

/// The resource usage aggregator collects container resource samples around one run and
/// summarises them per window.
pub struct ResourceUsageAggregator<'a> {
    store: &'a dyn SeriesStore,
    config: &'a ResourceStoreConfig,
    record: &'a RunRecord,
}

impl<'a> ResourceUsageAggregator<'a> {
    pub fn new(
        store: &'a dyn SeriesStore,
        config: &'a ResourceStoreConfig,
        record: &'a RunRecord,
    ) -> Self {
        Self {
            store,
            config,
            record,
        }
    }
}

impl ResourceUsageAggregator<'_> {
    /// Try to aggregate resource usage.
    ///
    /// If it fails to collect samples it returns an empty [`ResourceUsage`] and reports the
    /// error in the logs.
    pub async fn try_aggregate(&self) -> ResourceUsage {
        match self.aggregate().await {
            Ok(usage) => usage,
            Err(e) => {
                log::warn!(
                    "Failed to aggregate resource usage for run {}: {e:#}",
                    self.record.test_id
                );
                ResourceUsage::empty()
            }
        }
    }

    pub async fn aggregate(&self) -> anyhow::Result<ResourceUsage> {
        log::debug!("Aggregating resource usage for run {}", self.record.test_id);

        let cpu = self.query(ResourceMetric::Cpu).await?;
        let mem = self.query(ResourceMetric::Mem).await?;
        let aligned = align_resource_samples(
            &cpu,
            &mem,
            &self.config.tag_key,
            &self.config.components,
        )?;

        let stats = windowed_stats(
            &aligned,
            self.record.start_time.timestamp_millis(),
            self.record.end_time.timestamp_millis(),
        )?;

        let proxy = self.record.proxy.container_name();
        let during_avg =
            |metric| stats.value(proxy, Window::During, metric, Statistic::Avg);

        Ok(ResourceUsage {
            avg_cpu: during_avg(ResourceMetric::Cpu),
            avg_mem_mib: during_avg(ResourceMetric::Mem),
            stats,
            aligned,
        })
    }

    async fn query(&self, metric: ResourceMetric) -> anyhow::Result<Vec<crate::query::QuerySeries>> {
        self.store
            .query(resource_query(
                metric,
                &self.config.tag_key,
                self.record.start_time,
                self.record.end_time,
                self.config.buffer_s,
            ))
            .await
    }
}

/// Attach [`ResourceUsage`] to every run in the catalog.
///
/// If the store cannot be reached the whole pass is skipped and every run keeps
/// `resources: None`. A run whose samples cannot be loaded gets an empty [`ResourceUsage`].
pub async fn enrich_resource_usage(
    catalog: &mut RunCatalog,
    store: &dyn SeriesStore,
    config: &ResourceStoreConfig,
) {
    if let Err(e) = store.ping().await {
        log::error!("Could not connect to the resource usage store, skipping: {e:#}");
        return;
    }

    for record in catalog.iter_mut() {
        let usage = ResourceUsageAggregator::new(store, config, record)
            .try_aggregate()
            .await;
        record.resources = Some(usage);
    }

    log::info!("Resource usage enrichment complete");
}
