use crate::compare::StatementReport;
use crate::model::RunCatalog;
use anyhow::Context;
use std::fs::File;
use std::path::{Path, PathBuf};

pub const INTRA_PROXY_LOG: &str = "statements/comparative/comparative_analysis_log.txt";
pub const CROSS_PROXY_LOG: &str = "statements/cross-proxy/cross_proxy_analysis_log.txt";
pub const CATALOG_FILE: &str = "catalog.json";

/// Replace `output_dir` with a fresh directory.
pub fn prepare_output_dir(output_dir: &Path) -> anyhow::Result<()> {
    if output_dir.exists() {
        log::info!("Clearing previous output in {}", output_dir.display());
        std::fs::remove_dir_all(output_dir)
            .with_context(|| format!("Failed to clear {}", output_dir.display()))?;
    }
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))
}

/// Write the enriched catalog as JSON.
pub fn write_catalog(output_dir: &Path, catalog: &RunCatalog) -> anyhow::Result<PathBuf> {
    let path = output_dir.join(CATALOG_FILE);
    let file = File::create(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, catalog).context("Failed to write catalog")?;

    Ok(path)
}

/// Write both statement logs.
pub fn write_statements(
    output_dir: &Path,
    intra: &StatementReport,
    cross: &StatementReport,
) -> anyhow::Result<()> {
    for (relative, report) in [(INTRA_PROXY_LOG, intra), (CROSS_PROXY_LOG, cross)] {
        let path = output_dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, report.render())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Saved {} to {}", report.title, path.display());
    }

    Ok(())
}
