pub mod catalog;
pub mod chart;
mod error;
pub mod fetcher;
pub mod layout;
pub mod pipeline;
pub mod report;
pub mod resample;
mod session;
pub mod sink;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use chart::{ChartArtifact, ChartRenderer};
pub use error::{Result, TelemetryError};
pub use layout::SeriesKey;
pub use pipeline::{run, PipelineOptions, RunSummary, TripleOutcome};
pub use report::ReportDocument;
pub use resample::{Bucket, ResampledSeries};
pub use session::{ProviderSettings, Session};
pub use sink::SeriesArtifact;
pub use types::{
    Datapoint, Dimension, MetricDescriptor, Observation, ResourceId, StatisticKind,
    StatisticRequest, TimeWindow,
};
