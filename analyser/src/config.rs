use anyhow::Context;
use proxy_bench_run_model::{
    ArtifactPatterns, DEFAULT_METADATA_PATTERN, DEFAULT_SUMMARY_PATTERN,
    DEFAULT_TEST_NAME_PATTERN,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for a full analysis, passed explicitly to every component.
///
/// All sections have defaults matching the benchmark environment, so an empty TOML document is
/// a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub loader: LoaderConfig,
    pub resource_store: ResourceStoreConfig,
    pub load_store: StoreConfig,
    pub statements: StatementConfig,
}

impl AnalysisConfig {
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("Failed to parse analysis config")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
    }
}

/// Where run artifacts live and what makes a run valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Directory holding one subdirectory per run
    pub data_dir: PathBuf,
    /// The configured run length in seconds
    pub expected_duration_s: f64,
    /// Allowed deviation of the measured run length from `expected_duration_s`
    pub tolerance_s: f64,
    pub metadata_pattern: String,
    pub summary_pattern: String,
    pub test_name_pattern: String,
}

impl LoaderConfig {
    pub fn patterns(&self) -> anyhow::Result<ArtifactPatterns> {
        ArtifactPatterns::new(
            &self.metadata_pattern,
            &self.summary_pattern,
            &self.test_name_pattern,
        )
        .context("Invalid artifact file name pattern")
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("outputs-k6"),
            expected_duration_s: 300.0,
            tolerance_s: 45.0,
            metadata_pattern: DEFAULT_METADATA_PATTERN.to_string(),
            summary_pattern: DEFAULT_SUMMARY_PATTERN.to_string(),
            test_name_pattern: DEFAULT_TEST_NAME_PATTERN.to_string(),
        }
    }
}

/// Connection settings for an InfluxDB 1.x database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub url: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
}

impl StoreConfig {
    fn with_database(database: &str) -> Self {
        Self {
            url: "http://localhost:8086".to_string(),
            database: database.to_string(),
            username: None,
            password: None,
            token: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::with_database(LOAD_DATABASE)
    }
}

pub const LOAD_DATABASE: &str = "k6";
pub const RESOURCE_DATABASE: &str = "dockerstats";

/// A store table where every key is optional, resolved against a per-store default.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StoreOverrides {
    url: Option<String>,
    database: Option<String>,
    username: Option<String>,
    password: Option<String>,
    token: Option<String>,
}

impl StoreOverrides {
    fn apply(self, base: StoreConfig) -> StoreConfig {
        StoreConfig {
            url: self.url.unwrap_or(base.url),
            database: self.database.unwrap_or(base.database),
            username: self.username.or(base.username),
            password: self.password.or(base.password),
            token: self.token.or(base.token),
        }
    }
}

fn resource_connection<'de, D>(deserializer: D) -> Result<StoreConfig, D::Error>
where
    D: serde::Deserializer<'de>,
{
    StoreOverrides::deserialize(deserializer)
        .map(|overrides| overrides.apply(StoreConfig::with_database(RESOURCE_DATABASE)))
}

/// Settings for the container resource usage store fed by Telegraf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceStoreConfig {
    /// Keys left out of this table keep their `dockerstats` defaults
    #[serde(deserialize_with = "resource_connection")]
    pub connection: StoreConfig,
    /// Tag holding the container name on every docker stats sample
    pub tag_key: String,
    /// Containers worth reporting on; samples for anything else are dropped
    pub components: Vec<String>,
    /// Padding added around each run to capture ramp-up and ramp-down
    pub buffer_s: i64,
}

impl Default for ResourceStoreConfig {
    fn default() -> Self {
        Self {
            connection: StoreConfig::with_database(RESOURCE_DATABASE),
            tag_key: "io.telegraf.group.name".to_string(),
            components: [
                "go-proxy",
                "java-proxy",
                "node-proxy",
                "target-server",
                "influxdb",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
            buffer_s: 60,
        }
    }
}

/// How pairs of proxies are enumerated in cross-proxy comparisons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairOrder {
    /// Pair runs in the order they appear in the catalog
    #[default]
    CatalogOrder,
    /// Sort runs by proxy before pairing
    ProxyName,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementConfig {
    pub pair_order: PairOrder,
}
