//! Model of the artifacts a benchmark run leaves on disk.
//!
//! Every run directory holds a run metadata document (`k6-out-<proxy>-<test>.json`) written by
//! the runner and a k6 summary export (`k6-summary-<proxy>-<test>.json`). This crate parses and
//! validates both so that consumers only ever see complete, comparable runs.

use std::io::Read;
use std::path::{Path, PathBuf};

mod artifact;
mod identity;

pub use artifact::{
    ArtifactName, ArtifactPatterns, MetricEntry, RunMetadata, SummaryExport,
    DEFAULT_METADATA_PATTERN, DEFAULT_SUMMARY_PATTERN, DEFAULT_TEST_NAME_PATTERN,
};
pub use identity::{LoadLevel, Proxy, TestType};

/// Reasons a run directory cannot produce a run.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("No {kind} artifact found in {dir}")]
    MissingArtifact { kind: &'static str, dir: PathBuf },
    #[error("Metadata {metadata} has no matching summary artifact")]
    UnmatchedSummary { metadata: String },
    #[error("Artifact name does not describe a known test: {0}")]
    TestName(String),
    #[error("Unknown proxy: {0}")]
    Proxy(String),
    #[error("Invalid load level: {0}")]
    LoadLevel(String),
    #[error("Invalid duration. Got {actual:.2}s, expected {expected}s (tolerance {tolerance}s)")]
    Duration {
        actual: f64,
        expected: f64,
        tolerance: f64,
    },
    #[error("Invalid timestamp: {0}")]
    Timestamp(f64),
    #[error("Invalid artifact pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// The validated pair of artifacts for one run.
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    pub name: ArtifactName,
    pub metadata: RunMetadata,
    pub summary: SummaryExport,
}

/// Load run metadata from a reader
pub fn load_run_metadata<R: Read>(reader: R) -> Result<RunMetadata, serde_json::Error> {
    serde_json::from_reader(std::io::BufReader::new(reader))
}

/// Load a k6 summary export from a reader
pub fn load_summary_export<R: Read>(reader: R) -> Result<SummaryExport, serde_json::Error> {
    serde_json::from_reader(std::io::BufReader::new(reader))
}

/// Load and validate the artifacts of a single run directory.
///
/// The metadata artifact is checked first, so a run with an out-of-tolerance duration is
/// rejected without reading its summary. The summary artifact must carry the same proxy and
/// test name as the metadata artifact.
pub fn load_run_artifacts(
    dir: &Path,
    patterns: &ArtifactPatterns,
    expected_duration_s: f64,
    tolerance_s: f64,
) -> Result<RunArtifacts, LoadError> {
    let file_names = sorted_file_names(dir)?;

    let metadata_name = file_names
        .iter()
        .find(|name| patterns.is_metadata(name))
        .ok_or_else(|| LoadError::MissingArtifact {
            kind: "run metadata",
            dir: dir.to_path_buf(),
        })?;
    let metadata = read_json(&dir.join(metadata_name), load_run_metadata)?;
    metadata.validate_duration(expected_duration_s, tolerance_s)?;
    // Both timestamps must be representable before the run is accepted.
    metadata.start()?;
    metadata.end()?;

    let key = patterns
        .metadata_key(metadata_name)
        .ok_or_else(|| LoadError::TestName(metadata_name.clone()))?;
    let summary_name = file_names
        .iter()
        .filter(|name| patterns.is_summary(name))
        .find(|name| patterns.summary_key(name).as_ref() == Some(&key))
        .ok_or_else(|| {
            if file_names.iter().any(|name| patterns.is_summary(name)) {
                LoadError::UnmatchedSummary {
                    metadata: metadata_name.clone(),
                }
            } else {
                LoadError::MissingArtifact {
                    kind: "summary",
                    dir: dir.to_path_buf(),
                }
            }
        })?;

    let name = patterns.parse_summary_name(summary_name)?;
    let summary = read_json(&dir.join(summary_name), load_summary_export)?;
    log::debug!(
        "Loaded run {} ({} {} @ {}) from {}",
        metadata.test_id,
        name.proxy,
        name.test_type,
        name.users,
        dir.display()
    );

    Ok(RunArtifacts {
        name,
        metadata,
        summary,
    })
}

fn sorted_file_names(dir: &Path) -> Result<Vec<String>, LoadError> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

fn read_json<T>(
    path: &Path,
    parse: impl FnOnce(std::fs::File) -> Result<T, serde_json::Error>,
) -> Result<T, LoadError> {
    let file = std::fs::File::open(path)?;
    parse(file).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}
