use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use log::{info, warn};
use pg_telemetry::config::{self, AppConfig, CliArgs, ProviderKind};
use pg_telemetry::logging::logger;
use pg_telemetry::telemetry::{
    self, ChartRenderer, PipelineOptions, ProviderSettings, ResourceId, RunSummary, Session,
    TimeWindow,
};
use pg_telemetry::{AwsCliProvider, MetricsProvider, RecordedProvider};
use std::sync::Arc;

// Struct representation of one reporting run.
pub struct MetricsReporter {
    config: AppConfig,
    resource: ResourceId,
    window: TimeWindow,
}

impl MetricsReporter {
    pub fn new(config: AppConfig, window: TimeWindow) -> Result<Self> {
        let Some(resource) = config.pipeline.resource.clone() else {
            bail!("No resource given, pass --resource or set pipeline.resource");
        };
        Ok(Self {
            config,
            resource: ResourceId::new(resource),
            window,
        })
    }

    fn init_provider(&self) -> Result<Arc<dyn MetricsProvider>> {
        let cfg = &self.config.provider;
        let provider: Arc<dyn MetricsProvider> = match cfg.kind {
            ProviderKind::AwsCli => Arc::new(AwsCliProvider::new(
                cfg.aws_bin.clone(),
                cfg.profile.clone(),
                cfg.region.clone(),
            )),
            ProviderKind::Recorded => {
                let dir = cfg
                    .recorded_dir
                    .clone()
                    .context("provider.recorded_dir is not set")?;
                info!("Replaying recorded provider output from {}", dir.display());
                Arc::new(RecordedProvider::new(dir))
            }
        };
        Ok(provider)
    }

    fn init_options(&self) -> Result<PipelineOptions> {
        let pipeline = &self.config.pipeline;
        let chart = ChartRenderer {
            width: self.config.chart.width,
            height: self.config.chart.height,
            min_span_secs: pipeline.bucket_width.as_secs() as i64,
            ..ChartRenderer::default()
        }
        .with_font(self.config.chart.font.as_deref());

        Ok(PipelineOptions {
            root: pipeline.output_dir.clone(),
            statistics: pipeline.statistics.clone(),
            bucket_width: chrono::Duration::from_std(pipeline.bucket_width)
                .context("pipeline.bucket_width out of range")?,
            workers: pipeline.workers,
            deadline: pipeline.deadline,
            chart,
        })
    }

    pub async fn start(self) -> Result<RunSummary> {
        let settings = ProviderSettings {
            namespace: self.config.provider.namespace.clone(),
            identifying_dimension: self.config.provider.identifying_dimension.clone(),
            period_secs: self.config.provider.period,
        };
        let session = Arc::new(Session::new(self.init_provider()?, settings));
        let options = self.init_options()?;

        info!(
            "Collecting metrics for {} from {} to {}",
            self.resource, self.window.start, self.window.end
        );
        let summary = telemetry::run(session, &self.resource, self.window, &options)
            .await
            .with_context(|| format!("Run for {} failed", self.resource))?;
        Ok(summary)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();
    let config = config::load_config(&cli_args)?;
    logger::setup_logging(&config.logging.level, config.logging.file.as_deref())?;

    let window = config::resolve_window(
        cli_args.start.as_deref(),
        cli_args.end.as_deref(),
        config.pipeline.window_hours,
        Utc::now(),
    )?;

    let reporter = MetricsReporter::new(config, window)?;
    let summary = reporter.start().await?;

    info!("Report written to {}", summary.report.path.display());
    if summary.warnings() > 0 {
        warn!("Finished with {} warnings", summary.warnings());
    }
    Ok(())
}
