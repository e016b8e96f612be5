use crate::config::LoaderConfig;
use crate::model::{RunCatalog, RunRecord};
use anyhow::Context;
use proxy_bench_run_model::{load_run_artifacts, ArtifactPatterns, RunArtifacts};
use std::collections::BTreeMap;
use std::path::Path;

/// Build the catalog from every run directory under `config.data_dir`.
///
/// Run directories are visited in lexicographic order. A directory without valid artifacts is
/// skipped with a warning. A missing data directory gives an empty catalog.
pub fn load_catalog(config: &LoaderConfig) -> anyhow::Result<RunCatalog> {
    let patterns = config.patterns()?;
    let mut catalog = RunCatalog::new();

    let root = &config.data_dir;
    if !root.is_dir() {
        log::error!("Data directory not found: {}", root.display());
        return Ok(catalog);
    }

    for dir in run_directories(root)? {
        let Some(record) = load_record(&dir, &patterns, config) else {
            continue;
        };

        let test_id = record.test_id.clone();
        if !catalog.push(record) {
            log::warn!(
                "Skipping {}: run {test_id} is already in the catalog",
                dir.display()
            );
        }
    }

    log::info!(
        "Loaded {} runs from {}",
        catalog.len(),
        config.data_dir.display()
    );

    Ok(catalog)
}

fn run_directories(root: &Path) -> anyhow::Result<Vec<std::path::PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(root)
        .with_context(|| format!("Failed to read data directory {}", root.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();

    Ok(dirs)
}

fn load_record(dir: &Path, patterns: &ArtifactPatterns, config: &LoaderConfig) -> Option<RunRecord> {
    let artifacts = match load_run_artifacts(
        dir,
        patterns,
        config.expected_duration_s,
        config.tolerance_s,
    ) {
        Ok(artifacts) => artifacts,
        Err(e) => {
            log::warn!("Skipping {}: {e}", dir.display());
            return None;
        }
    };

    match record_from_artifacts(artifacts) {
        Ok(record) => Some(record),
        Err(e) => {
            log::warn!("Skipping {}: {e}", dir.display());
            None
        }
    }
}

fn record_from_artifacts(
    artifacts: RunArtifacts,
) -> Result<RunRecord, proxy_bench_run_model::LoadError> {
    let RunArtifacts {
        name,
        metadata,
        summary,
    } = artifacts;

    Ok(RunRecord {
        start_time: metadata.start()?,
        end_time: metadata.end()?,
        test_id: metadata.test_id,
        proxy: name.proxy,
        test_type: name.test_type,
        users: name.users,
        metrics: summary.summary_columns(),
        resources: None,
        timeseries: BTreeMap::new(),
    })
}
