use std::collections::BTreeMap;

use itertools::Itertools;
use proxy_bench_run_model::{LoadLevel, TestType};

use super::format::{format_float, format_value};
use super::{Metric, Polarity, PolarityTable, StatementBlock};
use crate::config::PairOrder;
use crate::model::{RunCatalog, RunRecord};

/// One block per test type and user load with at least two runs.
pub(super) fn blocks(
    catalog: &RunCatalog,
    polarities: &PolarityTable,
    pair_order: PairOrder,
) -> Vec<StatementBlock> {
    let mut groups: BTreeMap<(TestType, &LoadLevel), Vec<&RunRecord>> = BTreeMap::new();
    for record in catalog.iter() {
        groups
            .entry((record.test_type, &record.users))
            .or_default()
            .push(record);
    }

    groups
        .into_iter()
        .filter(|(_, members)| members.len() >= 2)
        .map(|((test_type, users), mut members)| {
            if pair_order == PairOrder::ProxyName {
                members.sort_by_key(|r| r.proxy);
            }

            StatementBlock {
                heading: format!("Comparison for {} Test @ {users} Users", test_type.title()),
                statements: polarities
                    .iter()
                    .filter_map(|(metric, polarity)| statement(&members, metric, polarity))
                    .collect(),
            }
        })
        .collect()
}

fn statement(members: &[&RunRecord], metric: Metric, polarity: Polarity) -> Option<String> {
    let present: Vec<(&RunRecord, f64)> = members
        .iter()
        .filter_map(|r| r.metric(metric.column()).map(|v| (*r, v)))
        .collect();
    if present.len() < 2 {
        return None;
    }

    let parts: Vec<String> = present
        .iter()
        .tuple_combinations()
        .map(|(a, b)| pair(*a, *b, metric, polarity))
        .collect();

    Some(format!("{metric}: {}.", parts.join("; ")))
}

fn pair(
    (a_run, a): (&RunRecord, f64),
    (b_run, b): (&RunRecord, f64),
    metric: Metric,
    polarity: Polarity,
) -> String {
    let (a_name, b_name) = (a_run.proxy, b_run.proxy);
    let (a_text, b_text) = (format_value(metric, a), format_value(metric, b));

    if a <= 0.0 || b <= 0.0 {
        return format!("{a_name} ({a_text}) vs {b_name} ({b_text})");
    }
    if a == b {
        return format!("{a_name} and {b_name} were equal ({a_text} vs {b_text})");
    }

    let a_wins = match polarity {
        Polarity::LowerIsBetter => a < b,
        Polarity::HigherIsBetter => a > b,
    };
    let (smaller, larger) = (a.min(b), a.max(b));
    let pct = format_float((larger - smaller) / smaller * 100.0);

    if a_wins {
        format!("{a_name} was {pct}% better than {b_name} ({a_text} vs {b_text})")
    } else {
        format!("{b_name} was {pct}% better than {a_name} ({b_text} vs {a_text})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::record;
    use proxy_bench_run_model::Proxy;

    fn run(test_id: &str, proxy: Proxy, users: &str, metrics: &[(&str, f64)]) -> RunRecord {
        let mut run = record(test_id, proxy, users);
        run.metrics = metrics
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        run
    }

    fn catalog(runs: Vec<RunRecord>) -> RunCatalog {
        let mut catalog = RunCatalog::new();
        for run in runs {
            catalog.push(run);
        }
        catalog
    }

    fn statements(catalog: &RunCatalog, pair_order: PairOrder) -> Vec<String> {
        blocks(catalog, &PolarityTable::default(), pair_order)
            .into_iter()
            .flat_map(|b| b.statements)
            .collect()
    }

    #[test]
    fn lower_latency_wins() {
        let catalog = catalog(vec![
            run("go", Proxy::Go, "1k", &[("duration_p95", 120.0)]),
            run("java", Proxy::Java, "1k", &[("duration_p95", 90.0)]),
        ]);

        let blocks = blocks(&catalog, &PolarityTable::default(), PairOrder::CatalogOrder);

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].heading, "Comparison for Smoke Test @ 1k Users");
        assert_eq!(
            blocks[0].statements,
            vec!["P95 Latency: Java was 33.33333% better than Go (90.00000 vs 120.00000)."]
        );
    }

    #[test]
    fn higher_throughput_wins() {
        let catalog = catalog(vec![
            run("go", Proxy::Go, "1k", &[("rps", 100.0)]),
            run("node", Proxy::Node, "1k", &[("rps", 125.0)]),
        ]);

        assert_eq!(
            statements(&catalog, PairOrder::CatalogOrder),
            vec!["Average RPS: Node was 25.00000% better than Go (125.00000 vs 100.00000)."]
        );
    }

    #[test]
    fn winner_does_not_depend_on_pair_order() {
        let forward = catalog(vec![
            run("go", Proxy::Go, "1k", &[("waiting_avg", 2.0)]),
            run("java", Proxy::Java, "1k", &[("waiting_avg", 3.0)]),
        ]);
        let backward = catalog(vec![
            run("java", Proxy::Java, "1k", &[("waiting_avg", 3.0)]),
            run("go", Proxy::Go, "1k", &[("waiting_avg", 2.0)]),
        ]);

        let expected = "Average TTFB: Go was 50.00000% better than Java (2.00000 vs 3.00000).";
        assert_eq!(statements(&forward, PairOrder::CatalogOrder), vec![expected]);
        assert_eq!(statements(&backward, PairOrder::CatalogOrder), vec![expected]);
    }

    #[test]
    fn non_positive_values_are_neutral() {
        let catalog = catalog(vec![
            run("go", Proxy::Go, "1k", &[("fail_count", 0.0)]),
            run("java", Proxy::Java, "1k", &[("fail_count", 12_000.0)]),
        ]);

        assert_eq!(
            statements(&catalog, PairOrder::CatalogOrder),
            vec!["Failure Count: Go (0) vs Java (12,000)."]
        );
    }

    #[test]
    fn equal_values_have_no_winner() {
        let catalog = catalog(vec![
            run("go", Proxy::Go, "1k", &[("rps", 10.0)]),
            run("java", Proxy::Java, "1k", &[("rps", 10.0)]),
        ]);

        assert_eq!(
            statements(&catalog, PairOrder::CatalogOrder),
            vec!["Average RPS: Go and Java were equal (10.00000 vs 10.00000)."]
        );
    }

    #[test]
    fn pairs_follow_member_order() {
        let catalog = catalog(vec![
            run("node", Proxy::Node, "1k", &[("rps", 3.0)]),
            run("go", Proxy::Go, "1k", &[("rps", 1.0)]),
            run("java", Proxy::Java, "1k", &[("rps", 2.0)]),
        ]);

        assert_eq!(
            statements(&catalog, PairOrder::CatalogOrder),
            vec!["Average RPS: Node was 200.00000% better than Go (3.00000 vs 1.00000); Node was 50.00000% better than Java (3.00000 vs 2.00000); Java was 100.00000% better than Go (2.00000 vs 1.00000)."]
        );
        assert_eq!(
            statements(&catalog, PairOrder::ProxyName),
            vec!["Average RPS: Java was 100.00000% better than Go (2.00000 vs 1.00000); Node was 200.00000% better than Go (3.00000 vs 1.00000); Node was 50.00000% better than Java (3.00000 vs 2.00000)."]
        );
    }

    #[test]
    fn groups_are_split_by_load_and_ordered_by_magnitude() {
        let catalog = catalog(vec![
            run("go-10k", Proxy::Go, "10k", &[]),
            run("java-10k", Proxy::Java, "10k", &[]),
            run("go-5k", Proxy::Go, "5k", &[]),
            run("java-5k", Proxy::Java, "5k", &[]),
            run("node-1k", Proxy::Node, "1k", &[]),
        ]);

        let headings: Vec<String> = blocks(&catalog, &PolarityTable::default(), PairOrder::CatalogOrder)
            .into_iter()
            .map(|b| b.heading)
            .collect();

        assert_eq!(
            headings,
            vec![
                "Comparison for Smoke Test @ 5k Users",
                "Comparison for Smoke Test @ 10k Users",
            ]
        );
    }
}
