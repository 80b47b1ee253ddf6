//! In-memory provider for exercising the pipeline without a cloud account.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{Datapoint, MetricDescriptor, Result, StatisticKind, StatisticRequest, TelemetryError};
use crate::provider::MetricsProvider;

#[derive(Default)]
pub struct ScriptedProvider {
    catalog: Vec<MetricDescriptor>,
    catalog_unavailable: bool,
    responses: HashMap<(String, StatisticKind), Vec<Datapoint>>,
    unavailable_metrics: Vec<String>,
    catalog_calls: AtomicUsize,
    statistic_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        ScriptedProvider::default()
    }

    pub fn with_catalog(mut self, catalog: Vec<MetricDescriptor>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_catalog_unavailable(mut self) -> Self {
        self.catalog_unavailable = true;
        self
    }

    pub fn with_datapoints(
        mut self,
        metric: &str,
        statistic: StatisticKind,
        datapoints: Vec<Datapoint>,
    ) -> Self {
        self.responses
            .insert((metric.to_string(), statistic), datapoints);
        self
    }

    /// Every statistic call for `metric` fails as if the provider were down.
    pub fn with_unavailable_metric(mut self, metric: &str) -> Self {
        self.unavailable_metrics.push(metric.to_string());
        self
    }

    pub fn catalog_calls(&self) -> usize {
        self.catalog_calls.load(Ordering::SeqCst)
    }

    pub fn statistic_calls(&self) -> usize {
        self.statistic_calls.load(Ordering::SeqCst)
    }
}

/// Builds a datapoint carrying `value` under `statistic` only.
pub fn datapoint(
    timestamp: chrono::DateTime<chrono::Utc>,
    statistic: StatisticKind,
    value: f64,
    unit: &str,
) -> Datapoint {
    let mut dp = Datapoint {
        timestamp,
        unit: unit.to_string(),
        ..Datapoint::default()
    };
    match statistic {
        StatisticKind::SampleCount => dp.sample_count = Some(value),
        StatisticKind::Average => dp.average = Some(value),
        StatisticKind::Sum => dp.sum = Some(value),
        StatisticKind::Minimum => dp.minimum = Some(value),
        StatisticKind::Maximum => dp.maximum = Some(value),
    }
    dp
}

#[async_trait]
impl MetricsProvider for ScriptedProvider {
    async fn list_available_metrics(&self, _namespace: &str) -> Result<Vec<MetricDescriptor>> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        if self.catalog_unavailable {
            return Err(TelemetryError::ProviderUnavailable("catalog offline".into()));
        }
        Ok(self.catalog.clone())
    }

    async fn get_statistic(&self, request: &StatisticRequest) -> Result<Vec<Datapoint>> {
        self.statistic_calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable_metrics.contains(&request.metric_name) {
            return Err(TelemetryError::ProviderUnavailable(format!(
                "{} offline",
                request.metric_name
            )));
        }
        match self
            .responses
            .get(&(request.metric_name.clone(), request.statistic))
        {
            Some(dps) if !dps.is_empty() => Ok(dps.clone()),
            _ => Err(TelemetryError::NoData(request.metric_name.clone())),
        }
    }
}
