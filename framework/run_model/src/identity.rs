use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::LoadError;

/// The reverse proxy implementation under test.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum Proxy {
    #[strum(to_string = "Go", serialize = "go-proxy", serialize = "go")]
    Go,
    #[strum(to_string = "Java", serialize = "java-proxy", serialize = "java")]
    Java,
    #[strum(to_string = "Node", serialize = "node-proxy", serialize = "node")]
    Node,
}

impl Proxy {
    /// Name of the container running this proxy.
    ///
    /// This is also the component tag value reported by the resource metrics store.
    pub fn container_name(&self) -> &'static str {
        match self {
            Proxy::Go => "go-proxy",
            Proxy::Java => "java-proxy",
            Proxy::Node => "node-proxy",
        }
    }
}

/// The category of load test that was run.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TestType {
    Image,
    Injection,
    Smoke,
    Soak,
}

impl TestType {
    /// Title-cased name, as used in report headings.
    pub fn title(&self) -> &'static str {
        match self {
            TestType::Image => "Image",
            TestType::Injection => "Injection",
            TestType::Smoke => "Smoke",
            TestType::Soak => "Soak",
        }
    }
}

/// A labelled virtual-user load level such as `1k` or `10k`.
///
/// Load levels order by the magnitude encoded in their label, so `5k` sorts before `10k`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LoadLevel {
    label: String,
    magnitude: u64,
}

impl LoadLevel {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The number of virtual users the label stands for.
    pub fn magnitude(&self) -> u64 {
        self.magnitude
    }
}

impl FromStr for LoadLevel {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        let digits_end = label
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(label.len());
        let (digits, suffix) = label.split_at(digits_end);

        let multiplier = match suffix.to_ascii_lowercase().as_str() {
            "" => 1,
            "k" => 1_000,
            "m" => 1_000_000,
            _ => return Err(LoadError::LoadLevel(s.to_string())),
        };
        let value = digits
            .parse::<u64>()
            .map_err(|_| LoadError::LoadLevel(s.to_string()))?;

        Ok(Self {
            label: label.to_string(),
            magnitude: value.saturating_mul(multiplier),
        })
    }
}

impl TryFrom<String> for LoadLevel {
    type Error = LoadError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LoadLevel> for String {
    fn from(value: LoadLevel) -> Self {
        value.label
    }
}

impl fmt::Display for LoadLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

impl Ord for LoadLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.magnitude
            .cmp(&other.magnitude)
            .then_with(|| self.label.cmp(&other.label))
    }
}

impl PartialOrd for LoadLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_parses_from_container_and_display_names() {
        assert_eq!(Proxy::from_str("go-proxy").unwrap(), Proxy::Go);
        assert_eq!(Proxy::from_str("Java").unwrap(), Proxy::Java);
        assert_eq!(Proxy::from_str("node").unwrap(), Proxy::Node);
        assert!(Proxy::from_str("rust-proxy").is_err());

        assert_eq!(Proxy::Go.to_string(), "Go");
        assert_eq!(Proxy::Node.container_name(), "node-proxy");
    }

    #[test]
    fn test_type_round_trips_through_lowercase() {
        assert_eq!(TestType::from_str("smoke").unwrap(), TestType::Smoke);
        assert_eq!(TestType::Injection.to_string(), "injection");
        assert_eq!(TestType::Soak.title(), "Soak");
    }

    #[test]
    fn load_levels_order_by_magnitude() {
        let mut levels: Vec<LoadLevel> = ["10k", "1k", "5k", "500"]
            .iter()
            .map(|l| l.parse().unwrap())
            .collect();
        levels.sort();

        let labels: Vec<&str> = levels.iter().map(|l| l.label()).collect();
        assert_eq!(labels, vec!["500", "1k", "5k", "10k"]);
        assert_eq!(levels[3].magnitude(), 10_000);
    }

    #[test]
    fn load_level_rejects_unknown_suffix() {
        assert!("5x".parse::<LoadLevel>().is_err());
        assert!("k".parse::<LoadLevel>().is_err());
    }

    #[test]
    fn load_level_serializes_as_label() {
        let level: LoadLevel = "5k".parse().unwrap();
        assert_eq!(serde_json::to_string(&level).unwrap(), "\"5k\"");
        let back: LoadLevel = serde_json::from_str("\"5k\"").unwrap();
        assert_eq!(back, level);
    }
}
