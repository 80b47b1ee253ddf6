use std::process::Stdio;

use async_trait::async_trait;
use chrono::SecondsFormat;
use log::{debug, info};
use serde::de::DeserializeOwned;
use tokio::process::Command;

use super::cloudwatch_json::{GetMetricStatisticsResult, ListMetricsResult};
use super::MetricsProvider;
use crate::telemetry::{Datapoint, MetricDescriptor, Result, StatisticRequest, TelemetryError};

/// Talks to CloudWatch through the `aws` command line client.
///
/// Credentials are whatever the CLI resolves for the configured profile;
/// this type never touches them.
#[derive(Debug, Clone)]
pub struct AwsCliProvider {
    binary: String,
    profile: Option<String>,
    region: Option<String>,
}

impl AwsCliProvider {
    pub fn new(binary: impl Into<String>, profile: Option<String>, region: Option<String>) -> Self {
        AwsCliProvider {
            binary: binary.into(),
            profile,
            region,
        }
    }

    fn common_args(&self) -> Vec<String> {
        let mut args = vec!["--output".to_string(), "json".to_string()];
        if let Some(profile) = &self.profile {
            args.push("--profile".into());
            args.push(profile.clone());
        }
        if let Some(region) = &self.region {
            args.push("--region".into());
            args.push(region.clone());
        }
        args
    }

    fn list_metrics_args(&self, namespace: &str, starting_token: Option<&str>) -> Vec<String> {
        let mut args = vec![
            "cloudwatch".to_string(),
            "list-metrics".to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
        ];
        if let Some(token) = starting_token {
            args.push("--starting-token".into());
            args.push(token.to_string());
        }
        args.extend(self.common_args());
        args
    }

    fn statistic_args(&self, request: &StatisticRequest) -> Vec<String> {
        let mut args = vec![
            "cloudwatch".to_string(),
            "get-metric-statistics".to_string(),
            "--namespace".to_string(),
            request.namespace.clone(),
            "--metric-name".to_string(),
            request.metric_name.clone(),
            "--start-time".to_string(),
            request
                .window
                .start
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            "--end-time".to_string(),
            request.window.end.to_rfc3339_opts(SecondsFormat::Secs, true),
            "--period".to_string(),
            request.period_secs.to_string(),
            "--statistics".to_string(),
            request.statistic.to_string(),
        ];
        if !request.dimensions.is_empty() {
            args.push("--dimensions".into());
            for d in &request.dimensions {
                args.push(format!("Name={},Value={}", d.name, d.value));
            }
        }
        args.extend(self.common_args());
        args
    }

    /// Runs the CLI and decodes its stdout as JSON.
    async fn run_json<T: DeserializeOwned>(&self, args: &[String]) -> Result<T> {
        debug!("Running {} {}", self.binary, args.join(" "));
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                TelemetryError::ProviderUnavailable(format!("failed to start {}: {}", self.binary, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TelemetryError::ProviderUnavailable(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }

        serde_json::from_slice::<T>(&output.stdout).map_err(|e| {
            TelemetryError::ProviderUnavailable(format!("unexpected response from {}: {}", self.binary, e))
        })
    }
}

#[async_trait]
impl MetricsProvider for AwsCliProvider {
    async fn list_available_metrics(&self, namespace: &str) -> Result<Vec<MetricDescriptor>> {
        info!("Listing {} metrics", namespace);
        let mut metrics = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page: ListMetricsResult = self
                .run_json(&self.list_metrics_args(namespace, token.as_deref()))
                .await?;
            metrics.extend(page.metrics);
            match page.next_token {
                Some(next) if !next.is_empty() => token = Some(next),
                _ => break,
            }
        }
        Ok(metrics)
    }

    async fn get_statistic(&self, request: &StatisticRequest) -> Result<Vec<Datapoint>> {
        let res: GetMetricStatisticsResult = self.run_json(&self.statistic_args(request)).await?;
        if res.datapoints.is_empty() {
            return Err(TelemetryError::NoData(format!(
                "{}/{}",
                request.metric_name, request.statistic
            )));
        }
        Ok(res.datapoints)
    }
}
