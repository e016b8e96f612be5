use std::collections::BTreeSet;

use super::format::{format_float, format_value};
use super::{Metric, Polarity, PolarityTable, StatementBlock};
use crate::model::{RunCatalog, RunRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
enum Trend {
    Improving,
    Worsening,
    Stable,
}

impl Trend {
    fn of(pct_change: f64, polarity: Polarity) -> Self {
        if pct_change == 0.0 {
            Trend::Stable
        } else if (pct_change > 0.0) == (polarity == Polarity::HigherIsBetter) {
            Trend::Improving
        } else {
            Trend::Worsening
        }
    }
}

/// One block per proxy and test type with at least two runs, runs ordered by user load.
pub(super) fn blocks(catalog: &RunCatalog, polarities: &PolarityTable) -> Vec<StatementBlock> {
    let test_types: BTreeSet<_> = catalog.iter().map(|r| r.test_type).collect();
    let proxies: BTreeSet<_> = catalog.iter().map(|r| r.proxy).collect();

    let mut blocks = Vec::new();
    for test_type in &test_types {
        for proxy in &proxies {
            let mut members: Vec<&RunRecord> = catalog
                .iter()
                .filter(|r| r.proxy == *proxy && r.test_type == *test_type)
                .collect();
            if members.len() < 2 {
                continue;
            }
            members.sort_by_key(|r| r.users.magnitude());

            let statements = polarities
                .iter()
                .filter_map(|(metric, polarity)| statement(&members, metric, polarity))
                .collect();

            blocks.push(StatementBlock {
                heading: format!(
                    "Comparisons for {proxy} ({} test) as User Load Increases",
                    test_type.title()
                ),
                statements,
            });
        }
    }

    blocks
}

fn statement(members: &[&RunRecord], metric: Metric, polarity: Polarity) -> Option<String> {
    let present: Vec<(&RunRecord, f64)> = members
        .iter()
        .filter_map(|r| r.metric(metric.column()).map(|v| (*r, v)))
        .collect();
    if present.len() < 2 {
        return None;
    }

    let segments: Vec<String> = present
        .windows(2)
        .map(|pair| segment(pair[0], pair[1], metric, polarity))
        .collect();

    Some(format!("{metric}: {}.", segments.join("; ")))
}

fn segment(
    (old_run, old): (&RunRecord, f64),
    (new_run, new): (&RunRecord, f64),
    metric: Metric,
    polarity: Polarity,
) -> String {
    let old_text = format_value(metric, old);
    let new_text = format_value(metric, new);

    if old <= 0.0 {
        return format!(
            "from {} to {}: changed from {old_text} to {new_text}",
            old_run.users, new_run.users
        );
    }

    let pct_change = (new - old) / old * 100.0;
    let change = if pct_change >= 0.0 {
        "increase"
    } else {
        "decrease"
    };

    format!(
        "from {} to {}: {}% {change} ({}, from {old_text} to {new_text})",
        old_run.users,
        new_run.users,
        format_float(pct_change.abs()),
        Trend::of(pct_change, polarity),
    )
}
