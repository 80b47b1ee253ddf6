use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;

use super::cloudwatch_json::{GetMetricStatisticsResult, ListMetricsResult};
use super::MetricsProvider;
use crate::telemetry::{Datapoint, MetricDescriptor, Result, StatisticRequest, TelemetryError};

pub const CATALOG_FILE: &str = "list-metrics.json";

/// Replays CloudWatch CLI output captured earlier into a directory.
///
/// Expected files:
///
/// * `list-metrics.json` - output of `aws cloudwatch list-metrics`.
/// * `<MetricName>.<Statistic>.json` - output of `aws cloudwatch get-metric-statistics`.
#[derive(Debug, Clone)]
pub struct RecordedProvider {
    dir: PathBuf,
}

impl RecordedProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        RecordedProvider { dir: dir.into() }
    }

    pub fn statistic_file(&self, request: &StatisticRequest) -> PathBuf {
        self.dir
            .join(format!("{}.{}.json", request.metric_name, request.statistic))
    }

    async fn read(path: &Path) -> std::io::Result<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl MetricsProvider for RecordedProvider {
    async fn list_available_metrics(&self, namespace: &str) -> Result<Vec<MetricDescriptor>> {
        let path = self.dir.join(CATALOG_FILE);
        let body = Self::read(&path)
            .await
            .map_err(|e| TelemetryError::ProviderUnavailable(format!("{}: {}", path.display(), e)))?
            .ok_or_else(|| {
                TelemetryError::ProviderUnavailable(format!("{} not found", path.display()))
            })?;

        let res: ListMetricsResult = serde_json::from_str(&body)
            .map_err(|e| TelemetryError::ProviderUnavailable(format!("{}: {}", path.display(), e)))?;

        Ok(res
            .metrics
            .into_iter()
            .filter(|m| m.namespace == namespace)
            .collect())
    }

    async fn get_statistic(&self, request: &StatisticRequest) -> Result<Vec<Datapoint>> {
        let path = self.statistic_file(request);
        let Some(body) = Self::read(&path)
            .await
            .map_err(|e| TelemetryError::ProviderUnavailable(format!("{}: {}", path.display(), e)))?
        else {
            debug!("No recording at {}", path.display());
            return Err(TelemetryError::NoData(format!(
                "{}/{}",
                request.metric_name, request.statistic
            )));
        };

        let res: GetMetricStatisticsResult = serde_json::from_str(&body)
            .map_err(|e| TelemetryError::ProviderUnavailable(format!("{}: {}", path.display(), e)))?;

        let datapoints: Vec<Datapoint> = res
            .datapoints
            .into_iter()
            .filter(|dp| request.window.contains(dp.timestamp))
            .collect();

        if datapoints.is_empty() {
            return Err(TelemetryError::NoData(format!(
                "{}/{}",
                request.metric_name, request.statistic
            )));
        }
        Ok(datapoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{Dimension, StatisticKind, TimeWindow};
    use chrono::{TimeZone, Utc};

    fn request(statistic: StatisticKind) -> StatisticRequest {
        StatisticRequest {
            namespace: "AWS/RDS".into(),
            metric_name: "CPUUtilization".into(),
            dimensions: vec![Dimension::new("DBInstanceIdentifier", "db-1")],
            statistic,
            window: TimeWindow::new(
                Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap(),
            )
            .unwrap(),
            period_secs: 60,
        }
    }

    #[tokio::test]
    async fn test_replays_catalog_for_namespace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CATALOG_FILE),
            r#"{"Metrics": [
                {"Namespace": "AWS/RDS", "MetricName": "CPUUtilization", "Dimensions": []},
                {"Namespace": "AWS/EC2", "MetricName": "NetworkIn", "Dimensions": []}
            ]}"#,
        )
        .unwrap();

        let provider = RecordedProvider::new(dir.path());
        let metrics = provider.list_available_metrics("AWS/RDS").await.unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].metric_name, "CPUUtilization");
    }

    #[tokio::test]
    async fn test_missing_catalog_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let provider = RecordedProvider::new(dir.path());
        let err = provider.list_available_metrics("AWS/RDS").await.unwrap_err();
        assert!(matches!(err, TelemetryError::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn test_filters_window_and_reports_no_data() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("CPUUtilization.Average.json"),
            r#"{"Label": "CPUUtilization", "Datapoints": [
                {"Timestamp": "2024-03-01T10:30:00Z", "Average": 4.0, "Unit": "Percent"},
                {"Timestamp": "2024-03-01T12:30:00Z", "Average": 8.0, "Unit": "Percent"}
            ]}"#,
        )
        .unwrap();

        let provider = RecordedProvider::new(dir.path());
        let dps = provider
            .get_statistic(&request(StatisticKind::Average))
            .await
            .unwrap();
        assert_eq!(dps.len(), 1);
        assert_eq!(dps[0].average, Some(4.0));

        let err = provider
            .get_statistic(&request(StatisticKind::Maximum))
            .await
            .unwrap_err();
        assert!(matches!(err, TelemetryError::NoData(_)));
    }
}
