use serde::Deserialize;

use crate::telemetry::{Datapoint, MetricDescriptor};

/// -------------------------------///
/// `cloudwatch list-metrics` body ///
/// -------------------------------///
#[derive(Default, Debug, Clone, PartialEq, Deserialize)]
pub struct ListMetricsResult {
    #[serde(rename = "Metrics", default)]
    pub metrics: Vec<MetricDescriptor>,
    #[serde(rename = "NextToken")]
    pub next_token: Option<String>,
}

/// -----------------------------------------///
/// `cloudwatch get-metric-statistics` body  ///
/// -----------------------------------------///
#[derive(Default, Debug, Clone, PartialEq, Deserialize)]
pub struct GetMetricStatisticsResult {
    #[serde(rename = "Label", default)]
    pub label: String,
    #[serde(rename = "Datapoints", default)]
    pub datapoints: Vec<Datapoint>,
}
