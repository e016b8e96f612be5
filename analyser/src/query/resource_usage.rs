use chrono::{DateTime, Duration, Utc};

use super::{time_literal, InfluxSourced};
use crate::model::ResourceMetric;

/// Telegraf docker input plugin metrics -> https://docs.influxdata.com/telegraf/v1/input-plugins/docker/
impl InfluxSourced for ResourceMetric {
    fn measurement(&self) -> &'static str {
        match self {
            ResourceMetric::Cpu => "docker_container_cpu",
            ResourceMetric::Mem => "docker_container_mem",
        }
    }

    fn select(&self) -> &'static str {
        match self {
            ResourceMetric::Cpu => r#"mean("usage_percent") AS cpu_perc"#,
            ResourceMetric::Mem => r#"mean("usage") AS mem_bytes"#,
        }
    }

    fn value_column(&self) -> &'static str {
        match self {
            ResourceMetric::Cpu => "cpu_perc",
            ResourceMetric::Mem => "mem_bytes",
        }
    }
}

/// Per-second, per-container samples of `metric` over a run padded by `buffer_s` on both sides.
///
/// Empty buckets take the previous value of the same container.
pub fn resource_query(
    metric: ResourceMetric,
    tag_key: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    buffer_s: i64,
) -> String {
    let buffer = Duration::seconds(buffer_s);
    format!(
        r#"SELECT {} FROM "{}" WHERE time >= '{}' AND time <= '{}' GROUP BY time(1s), "{}" fill(previous)"#,
        metric.select(),
        metric.measurement(),
        time_literal(start - buffer),
        time_literal(end + buffer),
        tag_key,
    )
}
