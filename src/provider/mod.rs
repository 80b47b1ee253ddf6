use async_trait::async_trait;

use crate::telemetry::{Datapoint, MetricDescriptor, Result, StatisticRequest};

pub mod aws_cli;
pub mod cloudwatch_json;
pub mod recorded;

pub use aws_cli::AwsCliProvider;
pub use recorded::RecordedProvider;

/// Source of metric catalogs and statistics.
///
/// Implementations report `ProviderUnavailable` when a call cannot complete
/// and `NoData` when the provider answered with nothing for the request.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    async fn list_available_metrics(&self, namespace: &str) -> Result<Vec<MetricDescriptor>>;

    async fn get_statistic(&self, request: &StatisticRequest) -> Result<Vec<Datapoint>>;
}
