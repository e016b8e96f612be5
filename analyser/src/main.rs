use anyhow::Context;
use clap::Parser;
use proxy_bench_analyser::config::{AnalysisConfig, StoreConfig};
use proxy_bench_analyser::query::InfluxStore;
use proxy_bench_analyser::report;
use std::path::PathBuf;

/// Correlate proxy benchmark runs and write comparative statements.
#[derive(Debug, Parser)]
#[command(version, about)]
struct CliArgs {
    /// Directory holding one subdirectory per run
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory the reports are written to, replaced on every run
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// TOML analysis configuration
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Apply the `INFLUX_*` environment variables to a store connection.
fn apply_env_overrides(store: &mut StoreConfig) {
    if let Ok(host) = std::env::var("INFLUX_HOST") {
        store.url = host;
    }
    if let Ok(username) = std::env::var("INFLUX_USERNAME") {
        store.username = Some(username);
    }
    if let Ok(password) = std::env::var("INFLUX_PASSWORD") {
        store.password = Some(password);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = CliArgs::parse();

    let mut config = match &args.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(data_dir) = args.data_dir {
        config.loader.data_dir = data_dir;
    }
    apply_env_overrides(&mut config.resource_store.connection);
    apply_env_overrides(&mut config.load_store);
    log::debug!("Using config: {config:?}");

    let resource_store = InfluxStore::new(&config.resource_store.connection);
    let load_store = InfluxStore::new(&config.load_store);

    let analysis = proxy_bench_analyser::analyse(&config, &resource_store, &load_store).await?;

    if analysis.catalog.is_empty() {
        anyhow::bail!(
            "No valid runs found in {}",
            config.loader.data_dir.display()
        );
    }

    report::prepare_output_dir(&args.output_dir)?;
    let catalog_path = report::write_catalog(&args.output_dir, &analysis.catalog)?;
    log::info!("Saved run catalog to {}", catalog_path.display());

    if let (Some(intra), Some(cross)) = (&analysis.intra_proxy, &analysis.cross_proxy) {
        report::write_statements(&args.output_dir, intra, cross)
            .context("Failed to write statements")?;
    }

    Ok(())
}
