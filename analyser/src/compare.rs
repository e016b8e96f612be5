//! Directional comparison statements between runs.
//!
//! Two families are produced from an enriched [`RunCatalog`]:
//!
//! - intra-proxy statements, following each metric of one proxy and test type as the user load
//!   increases,
//! - cross-proxy statements, comparing every pair of proxies at one test type and user load.
//!
//! Whether a change is an improvement is decided by an explicit [`PolarityTable`].

use crate::config::{PairOrder, StatementConfig};
use crate::model::RunCatalog;
use serde::Serialize;

mod cross_proxy;
mod format;
mod intra_proxy;
mod polarity;

pub use format::{format_count, format_float, format_value};
pub use polarity::{Metric, Polarity, PolarityError, PolarityTable};

pub const INTRA_PROXY_TITLE: &str = "Comparative Metric Statements (Intra-Proxy)";
pub const CROSS_PROXY_TITLE: &str = "Cross-Proxy Comparative Statements (Pairwise Comparisons)";

/// Statements under one heading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementBlock {
    pub heading: String,
    pub statements: Vec<String>,
}

/// One family of statements.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementReport {
    pub title: String,
    pub blocks: Vec<StatementBlock>,
}

impl StatementReport {
    /// Render as text: the title, then each heading followed by its tab indented statements.
    pub fn render(&self) -> String {
        let mut lines = vec![self.title.clone()];
        for block in &self.blocks {
            lines.push(block.heading.clone());
            lines.extend(block.statements.iter().map(|s| format!("\t{s}")));
        }
        lines.join("\n")
    }
}

/// Generates both statement families with a validated [`PolarityTable`].
///
/// Generation has no side effects and gives the same output for the same catalog.
#[derive(Debug, Clone)]
pub struct StatementGenerator {
    polarities: PolarityTable,
    pair_order: PairOrder,
}

impl StatementGenerator {
    pub fn new(config: &StatementConfig) -> Result<Self, PolarityError> {
        Self::with_polarities(PolarityTable::default(), config)
    }

    pub fn with_polarities(
        polarities: PolarityTable,
        config: &StatementConfig,
    ) -> Result<Self, PolarityError> {
        polarities.validate()?;
        Ok(Self {
            polarities,
            pair_order: config.pair_order,
        })
    }

    pub fn intra_proxy(&self, catalog: &RunCatalog) -> StatementReport {
        StatementReport {
            title: INTRA_PROXY_TITLE.to_string(),
            blocks: intra_proxy::blocks(catalog, &self.polarities),
        }
    }

    pub fn cross_proxy(&self, catalog: &RunCatalog) -> StatementReport {
        StatementReport {
            title: CROSS_PROXY_TITLE.to_string(),
            blocks: cross_proxy::blocks(catalog, &self.polarities, self.pair_order),
        }
    }
}
