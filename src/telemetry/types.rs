use std::fmt::{self, Display};
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of the monitored database instance, as the provider knows it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        ResourceId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Dimension {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl Dimension {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Dimension {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One named, dimensioned time-series family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricDescriptor {
    #[serde(rename = "Namespace")]
    pub namespace: String,
    #[serde(rename = "MetricName")]
    pub metric_name: String,
    #[serde(rename = "Dimensions", default)]
    pub dimensions: Vec<Dimension>,
}

impl MetricDescriptor {
    pub fn has_dimension(&self, name: &str, value: &str) -> bool {
        self.dimensions
            .iter()
            .any(|d| d.name == name && d.value == value)
    }
}

/// Server-side aggregation a provider computes over one sampling period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatisticKind {
    SampleCount,
    Average,
    Sum,
    Minimum,
    Maximum,
}

impl StatisticKind {
    pub const ALL: [StatisticKind; 5] = [
        StatisticKind::SampleCount,
        StatisticKind::Average,
        StatisticKind::Sum,
        StatisticKind::Minimum,
        StatisticKind::Maximum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatisticKind::SampleCount => "SampleCount",
            StatisticKind::Average => "Average",
            StatisticKind::Sum => "Sum",
            StatisticKind::Minimum => "Minimum",
            StatisticKind::Maximum => "Maximum",
        }
    }

    /// Picks the value this statistic refers to out of a provider datapoint.
    pub fn extract(&self, dp: &Datapoint) -> Option<f64> {
        match self {
            StatisticKind::SampleCount => dp.sample_count,
            StatisticKind::Average => dp.average,
            StatisticKind::Sum => dp.sum,
            StatisticKind::Minimum => dp.minimum,
            StatisticKind::Maximum => dp.maximum,
        }
    }
}

impl Display for StatisticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatisticKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StatisticKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown statistic: {}", s))
    }
}

/// A datapoint as returned by the provider, one optional field per statistic.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Datapoint {
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "SampleCount")]
    pub sample_count: Option<f64>,
    #[serde(rename = "Average")]
    pub average: Option<f64>,
    #[serde(rename = "Sum")]
    pub sum: Option<f64>,
    #[serde(rename = "Minimum")]
    pub minimum: Option<f64>,
    #[serde(rename = "Maximum")]
    pub maximum: Option<f64>,
    #[serde(rename = "Unit", default)]
    pub unit: String,
}

/// One raw sample for a single statistic.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub unit: String,
}

impl Observation {
    pub fn new(timestamp: DateTime<Utc>, value: f64, unit: impl Into<String>) -> Self {
        Observation {
            timestamp,
            value,
            unit: unit.into(),
        }
    }
}

/// Half-open time range `[start, end)` to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Returns `None` unless `start < end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start < end).then_some(TimeWindow { start, end })
    }

    /// The 24 hours ending at `now`.
    pub fn last_day(now: DateTime<Utc>) -> Self {
        TimeWindow {
            start: now - Duration::hours(24),
            end: now,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// Parameters of a single `GetStatistic` call.
#[derive(Debug, Clone)]
pub struct StatisticRequest {
    pub namespace: String,
    pub metric_name: String,
    pub dimensions: Vec<Dimension>,
    pub statistic: StatisticKind,
    pub window: TimeWindow,
    pub period_secs: u32,
}
