use super::{time_literal, InfluxSourced};
use crate::model::{LoadMetric, RunRecord};

/// k6 InfluxDB output metrics -> https://grafana.com/docs/k6/latest/results-output/real-time/influxdb/
impl InfluxSourced for LoadMetric {
    fn measurement(&self) -> &'static str {
        match self {
            LoadMetric::Rps => "http_reqs",
            LoadMetric::ErrorRate => "http_req_failed",
        }
    }

    fn select(&self) -> &'static str {
        r#"sum("value")"#
    }

    fn value_column(&self) -> &'static str {
        "sum"
    }
}

/// Per-second totals of `metric` for one run, with zero for seconds without samples.
pub fn load_timeseries_query(metric: LoadMetric, record: &RunRecord) -> String {
    format!(
        r#"SELECT {} FROM "{}" WHERE "test_run_id" = '{}' AND time >= '{}' AND time <= '{}' GROUP BY time(1s) fill(0)"#,
        metric.select(),
        metric.measurement(),
        record.test_id,
        time_literal(record.start_time),
        time_literal(record.end_time),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::record;
    use proxy_bench_run_model::Proxy;

    #[test]
    fn query_is_scoped_to_run() {
        let run = record("run-1", Proxy::Go, "1k");

        assert_eq!(
            load_timeseries_query(LoadMetric::Rps, &run),
            r#"SELECT sum("value") FROM "http_reqs" WHERE "test_run_id" = 'run-1' AND time >= '2023-11-14T22:13:20Z' AND time <= '2023-11-14T22:18:20Z' GROUP BY time(1s) fill(0)"#
        );
        assert!(load_timeseries_query(LoadMetric::ErrorRate, &run).contains(r#"FROM "http_req_failed""#));
    }
}
