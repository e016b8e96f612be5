use anyhow::Context;
use proxy_bench_analyser::catalog::load_catalog;
use proxy_bench_analyser::config::AnalysisConfig;
use proxy_bench_analyser::model::{LoadMetric, ResourceMetric, RunRecord};
use proxy_bench_analyser::query::load_timeseries::load_timeseries_query;
use proxy_bench_analyser::query::resource_usage::resource_query;
use proxy_bench_analyser::report::{CROSS_PROXY_LOG, INTRA_PROXY_LOG};
use proxy_bench_analyser::test_data::{tagged_series, untagged_series, StaticStore};
use proxy_bench_analyser::{analyse, report};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

macro_rules! run_snapshot_test {
    ($scenario:literal, $resource_store:expr, $load_store:expr) => {{
        env_logger::try_init().ok();

        let config = scenario_config($scenario);
        let analysis = analyse(&config, &$resource_store, &$load_store)
            .await
            .context("Analysis failed")?;

        let output = tempfile::tempdir()?;
        report::write_statements(
            output.path(),
            analysis.intra_proxy.as_ref().context("No intra-proxy report")?,
            analysis.cross_proxy.as_ref().context("No cross-proxy report")?,
        )?;

        for relative in [INTRA_PROXY_LOG, CROSS_PROXY_LOG] {
            let actual = std::fs::read_to_string(output.path().join(relative))?;
            let expected_path = expected_file($scenario, relative)?;

            if option_env!("UPDATE_SNAPSHOTS") == Some("1") {
                std::fs::write(&expected_path, &actual)?;
            } else {
                let expected = std::fs::read_to_string(&expected_path).with_context(|| {
                    format!("Expected output not found: {}", expected_path.display())
                })?;
                pretty_assertions::assert_eq!(expected, actual, "Snapshot mismatch, run with `UPDATE_SNAPSHOTS=1 cargo test --test snapshot` to update");
            }
        }

        analysis
    }};
}

#[tokio::test]
async fn smoke_go_java_without_stores() -> anyhow::Result<()> {
    let analysis = run_snapshot_test!(
        "smoke_go_java",
        StaticStore::unavailable(),
        StaticStore::unavailable()
    );

    let ids: Vec<&str> = analysis.catalog.iter().map(|r| r.test_id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["go-smoke-1k", "go-smoke-5k", "java-smoke-1k", "java-smoke-5k"]
    );
    assert!(analysis.catalog.iter().all(|r| r.resources.is_none()));
    assert!(analysis.timeseries.is_empty());

    Ok(())
}

#[tokio::test]
async fn smoke_go_java_with_partial_store_data() -> anyhow::Result<()> {
    let config = scenario_config("smoke_go_java");
    let catalog = load_catalog(&config.loader)?;
    let go_1k = catalog.get("go-smoke-1k").context("Missing go-smoke-1k")?;
    let start_ms = go_1k.start_time.timestamp_millis();
    let end_ms = go_1k.end_time.timestamp_millis();
    let tag_key = config.resource_store.tag_key.as_str();

    let resource_store = StaticStore::new()
        .with_series(
            resource_query(
                ResourceMetric::Cpu,
                tag_key,
                go_1k.start_time,
                go_1k.end_time,
                config.resource_store.buffer_s,
            ),
            vec![tagged_series(
                "docker_container_cpu",
                tag_key,
                "go-proxy",
                "cpu_perc",
                &[(start_ms, Some(10.0)), (end_ms, Some(30.0))],
            )],
        )
        .with_series(
            resource_query(
                ResourceMetric::Mem,
                tag_key,
                go_1k.start_time,
                go_1k.end_time,
                config.resource_store.buffer_s,
            ),
            vec![tagged_series(
                "docker_container_mem",
                tag_key,
                "go-proxy",
                "mem_bytes",
                &[(start_ms, Some(104_857_600.0)), (end_ms, Some(104_857_600.0))],
            )],
        );
    let load_store = StaticStore::new().with_series(
        load_timeseries_query(LoadMetric::Rps, go_1k),
        vec![untagged_series(
            "http_reqs",
            "sum",
            &[(start_ms, Some(95.0)), (start_ms + 1000, Some(105.0))],
        )],
    );

    // A single run with resource data has nothing to be compared against, so the statements
    // match the run without any store.
    let analysis = run_snapshot_test!("smoke_go_java", resource_store, load_store);

    let go_1k = analysis.catalog.get("go-smoke-1k").context("Missing go-smoke-1k")?;
    let resources = go_1k.resources.as_ref().context("No resources for go-smoke-1k")?;
    assert_eq!(resources.avg_cpu, Some(20.0));
    assert_eq!(resources.avg_mem_mib, Some(100.0));
    assert_eq!(go_1k.metric("avg_cpu"), Some(20.0));

    let java_5k = analysis.catalog.get("java-smoke-5k").context("Missing java-smoke-5k")?;
    assert!(java_5k
        .resources
        .as_ref()
        .is_some_and(|resources| resources.is_empty()));

    assert_eq!(analysis.timeseries.len(), 1);
    let rps = go_1k
        .timeseries
        .get(&LoadMetric::Rps)
        .context("No rps series for go-smoke-1k")?;
    assert_eq!(rps.len(), 2);
    assert!(!go_1k.timeseries.contains_key(&LoadMetric::ErrorRate));

    Ok(())
}

#[tokio::test]
async fn only_rejected_runs_gives_no_reports() -> anyhow::Result<()> {
    let config = scenario_config("rejected_only");

    let analysis = analyse(&config, &StaticStore::new(), &StaticStore::new()).await?;

    assert!(analysis.catalog.is_empty());
    assert!(analysis.intra_proxy.is_none());
    assert!(analysis.cross_proxy.is_none());

    Ok(())
}

#[tokio::test]
async fn enriched_runs_compare_resource_usage() -> anyhow::Result<()> {
    env_logger::try_init().ok();

    let config = scenario_config("smoke_go_java");
    let catalog = load_catalog(&config.loader)?;
    let run = |id: &str| catalog.get(id).with_context(|| format!("Missing {id}"));

    let resource_store = StaticStore::new();
    let resource_store = with_resources(resource_store, &config, run("go-smoke-1k")?, "go-proxy", [10.0, 30.0], 100.0);
    let resource_store = with_resources(resource_store, &config, run("go-smoke-5k")?, "go-proxy", [30.0, 50.0], 150.0);
    let resource_store = with_resources(resource_store, &config, run("java-smoke-1k")?, "java-proxy", [25.0, 35.0], 200.0);

    let analysis = analyse(&config, &resource_store, &StaticStore::unavailable()).await?;

    let intra = analysis.intra_proxy.context("No intra-proxy report")?;
    let go = intra
        .blocks
        .iter()
        .find(|b| b.heading.starts_with("Comparisons for Go "))
        .context("No Go block")?;
    assert!(go.statements.contains(&"Average CPU Usage (%): from 1k to 5k: 100.00000% increase (worsening, from 20.00000 to 40.00000).".to_string()));
    assert!(go.statements.contains(&"Average Memory Usage (MiB): from 1k to 5k: 50.00000% increase (worsening, from 100.00000 to 150.00000).".to_string()));

    // java-smoke-5k has no resource samples, so there is nothing to compare its 1k run with
    let java = intra
        .blocks
        .iter()
        .find(|b| b.heading.starts_with("Comparisons for Java "))
        .context("No Java block")?;
    assert!(!java.statements.iter().any(|s| s.starts_with("Average CPU Usage")));

    let cross = analysis.cross_proxy.context("No cross-proxy report")?;
    let at_1k = cross
        .blocks
        .iter()
        .find(|b| b.heading == "Comparison for Smoke Test @ 1k Users")
        .context("No 1k block")?;
    pretty_assertions::assert_eq!(
        at_1k.statements[at_1k.statements.len() - 2..].to_vec(),
        vec![
            "Average CPU Usage (%): Go was 50.00000% better than Java (20.00000 vs 30.00000).".to_string(),
            "Average Memory Usage (MiB): Go was 100.00000% better than Java (100.00000 vs 200.00000).".to_string(),
        ]
    );

    let at_5k = cross
        .blocks
        .iter()
        .find(|b| b.heading == "Comparison for Smoke Test @ 5k Users")
        .context("No 5k block")?;
    assert!(!at_5k.statements.iter().any(|s| s.starts_with("Average Memory Usage")));

    Ok(())
}

#[test]
fn catalog_holds_every_complete_run_within_tolerance() -> anyhow::Result<()> {
    for scenario in ["smoke_go_java", "rejected_only"] {
        let config = scenario_config(scenario);

        let mut expected = Vec::new();
        for run_dir in WalkDir::new(&config.loader.data_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let run_dir = run_dir?;
            if !run_dir.file_type().is_dir() {
                continue;
            }

            let files: Vec<String> = WalkDir::new(run_dir.path())
                .min_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter_map(|e| e.file_name().to_str().map(str::to_string))
                .collect();
            let Some(metadata) = files.iter().find(|f| f.starts_with("k6-out-")) else {
                continue;
            };
            if !files.iter().any(|f| f.starts_with("k6-summary-")) {
                continue;
            }

            let metadata: serde_json::Value =
                serde_json::from_reader(std::fs::File::open(run_dir.path().join(metadata))?)?;
            let duration = metadata["end_time"].as_f64().context("end_time")?
                - metadata["start_time"].as_f64().context("start_time")?;
            if (duration - config.loader.expected_duration_s).abs() <= config.loader.tolerance_s {
                expected.push(metadata["test_id"].as_str().context("test_id")?.to_string());
            }
        }

        let catalog = load_catalog(&config.loader)?;
        let loaded: Vec<String> = catalog.iter().map(|r| r.test_id.clone()).collect();
        pretty_assertions::assert_eq!(expected, loaded, "{scenario}");
    }

    Ok(())
}

/// Serve both resource queries of `record` with `component` samples at its start and end.
fn with_resources(
    store: StaticStore,
    config: &AnalysisConfig,
    record: &RunRecord,
    component: &str,
    cpu: [f64; 2],
    mem_mib: f64,
) -> StaticStore {
    let tag_key = config.resource_store.tag_key.as_str();
    let query = |metric| {
        resource_query(
            metric,
            tag_key,
            record.start_time,
            record.end_time,
            config.resource_store.buffer_s,
        )
    };
    let start_ms = record.start_time.timestamp_millis();
    let end_ms = record.end_time.timestamp_millis();
    let mem_bytes = mem_mib * 1024.0 * 1024.0;

    store
        .with_series(
            query(ResourceMetric::Cpu),
            vec![tagged_series(
                "docker_container_cpu",
                tag_key,
                component,
                "cpu_perc",
                &[(start_ms, Some(cpu[0])), (end_ms, Some(cpu[1]))],
            )],
        )
        .with_series(
            query(ResourceMetric::Mem),
            vec![tagged_series(
                "docker_container_mem",
                tag_key,
                component,
                "mem_bytes",
                &[(start_ms, Some(mem_bytes)), (end_ms, Some(mem_bytes))],
            )],
        )
}

fn scenario_config(scenario: &str) -> AnalysisConfig {
    let mut config = AnalysisConfig::default();
    config.loader.data_dir = scenario_dir(scenario).join("runs");
    config
}

fn scenario_dir(scenario: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("test_data")
        .join(scenario)
}

fn expected_file(scenario: &str, relative: &str) -> anyhow::Result<PathBuf> {
    let file_name = Path::new(relative)
        .file_name()
        .context("Report path has no file name")?;
    Ok(scenario_dir(scenario).join("expected").join(file_name))
}
