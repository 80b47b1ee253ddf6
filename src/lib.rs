pub mod config;
pub mod logging;
pub mod provider;
pub mod telemetry;

pub use config::AppConfig;
pub use provider::{AwsCliProvider, MetricsProvider, RecordedProvider};

use std::time::Duration;

pub struct Settings {}

impl Settings {
    pub const NAMESPACE: &'static str = "AWS/RDS";
    pub const IDENTIFYING_DIMENSION: &'static str = "DBInstanceIdentifier";
    // Finest granularity CloudWatch keeps for standard RDS metrics.
    pub const PERIOD_SECS: u32 = 60;
    pub const BUCKET_WIDTH: Duration = Duration::from_secs(300);
    pub const WINDOW_HOURS: u32 = 24;
    pub const WORKERS: usize = 4;
    pub const CHART_WIDTH: u32 = 1000;
    pub const CHART_HEIGHT: u32 = 500;
}
