use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Duration;
use log::{debug, error, info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

use super::catalog::{self, identifying_dimension};
use super::chart::{ChartArtifact, ChartRenderer};
use super::fetcher::Fetcher;
use super::report::{self, ReportDocument};
use super::resample::{self, DEFAULT_BUCKET_WIDTH};
use super::sink;
use super::{
    MetricDescriptor, Observation, ResourceId, Result, SeriesKey, Session, StatisticKind,
    TelemetryError, TimeWindow,
};

/// Knobs of a single run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Output root; `metrics/` and the report land here.
    pub root: PathBuf,
    pub statistics: Vec<StatisticKind>,
    pub bucket_width: Duration,
    /// Triples processed at the same time. 1 keeps the run strictly sequential.
    pub workers: usize,
    /// Once elapsed, no new fetch is started. The report is still written.
    pub deadline: Option<std::time::Duration>,
    pub chart: ChartRenderer,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            root: PathBuf::from("."),
            statistics: StatisticKind::ALL.to_vec(),
            bucket_width: DEFAULT_BUCKET_WIDTH,
            workers: 4,
            deadline: None,
            chart: ChartRenderer::default(),
        }
    }
}

/// What happened to one (metric, dimension, statistic).
#[derive(Debug)]
pub enum TripleOutcome {
    Charted(ChartArtifact),
    /// Fetched fine but nothing to draw.
    Empty(SeriesKey),
    Failed(SeriesKey, TelemetryError),
    DeadlineExceeded(SeriesKey),
    /// Not attempted because the provider went away.
    Aborted(SeriesKey),
    Fatal(SeriesKey, TelemetryError),
}

#[derive(Debug)]
pub struct RunSummary {
    pub report: ReportDocument,
    pub triples: usize,
    pub charts: usize,
    pub empty: usize,
    pub deadline_skipped: usize,
    /// `<series>: <reason>` for every series skipped on error.
    pub failures: Vec<String>,
}

impl RunSummary {
    pub fn warnings(&self) -> usize {
        self.failures.len()
    }
}

/// Persist, resample and chart one fetched series. Blocking.
///
/// A chart left by an earlier run is removed whenever this run draws none.
pub fn process_series(
    root: &Path,
    key: &SeriesKey,
    observations: &[Observation],
    bucket_width: Duration,
    renderer: &ChartRenderer,
) -> Result<Option<ChartArtifact>> {
    match draw_series(root, key, observations, bucket_width, renderer) {
        Ok(Some(chart)) => Ok(Some(chart)),
        Ok(None) => {
            remove_stale_chart(&key.png_path(root))?;
            Ok(None)
        }
        Err(e) => {
            if let Err(rm) = remove_stale_chart(&key.png_path(root)) {
                debug!("{}", rm);
            }
            Err(e)
        }
    }
}

fn draw_series(
    root: &Path,
    key: &SeriesKey,
    observations: &[Observation],
    bucket_width: Duration,
    renderer: &ChartRenderer,
) -> Result<Option<ChartArtifact>> {
    let artifact = sink::persist(root, key, observations)?;
    if artifact.is_empty() {
        debug!("{} has no rows", artifact.path.display());
    }

    let series = resample::resample(&artifact.path, bucket_width)?;
    if series.is_empty() {
        return Ok(None);
    }
    renderer.render(root, key, &series.buckets, &series.y_label())
}

fn remove_stale_chart(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed stale chart {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(TelemetryError::artifact_io(path, e)),
    }
}

struct Triple {
    descriptor: MetricDescriptor,
    key: SeriesKey,
}

fn plan(
    descriptors: Vec<MetricDescriptor>,
    session: &Session,
    resource: &ResourceId,
    statistics: &[StatisticKind],
) -> Vec<Triple> {
    let dimension = identifying_dimension(session, resource);
    descriptors
        .into_iter()
        .flat_map(|descriptor| {
            let dimension = dimension.clone();
            statistics.iter().map(move |&statistic| Triple {
                key: SeriesKey::new(dimension.clone(), descriptor.metric_name.clone(), statistic),
                descriptor: descriptor.clone(),
            })
        })
        .collect()
}

struct TripleContext {
    session: Arc<Session>,
    window: TimeWindow,
    root: PathBuf,
    bucket_width: Duration,
    renderer: ChartRenderer,
    deadline: Option<Instant>,
    abort: AtomicBool,
}

async fn run_triple(ctx: Arc<TripleContext>, triple: Triple) -> TripleOutcome {
    let Triple { descriptor, key } = triple;

    if ctx.abort.load(Ordering::SeqCst) {
        return TripleOutcome::Aborted(key);
    }
    if ctx.deadline.is_some_and(|d| Instant::now() >= d) {
        return TripleOutcome::DeadlineExceeded(key);
    }

    let observations = match Fetcher::new(&ctx.session)
        .fetch(&descriptor, &key.dimension, key.statistic, ctx.window)
        .await
    {
        Ok(obs) => obs,
        Err(e) if e.is_fatal() => {
            ctx.abort.store(true, Ordering::SeqCst);
            return TripleOutcome::Fatal(key, e);
        }
        Err(e) => return TripleOutcome::Failed(key, e),
    };

    let blocking_ctx = ctx.clone();
    let blocking_key = key.clone();
    let res = tokio::task::spawn_blocking(move || {
        process_series(
            &blocking_ctx.root,
            &blocking_key,
            &observations,
            blocking_ctx.bucket_width,
            &blocking_ctx.renderer,
        )
    })
    .await;

    match res {
        Ok(Ok(Some(chart))) => TripleOutcome::Charted(chart),
        Ok(Ok(None)) => TripleOutcome::Empty(key),
        Ok(Err(e)) => TripleOutcome::Failed(key, e),
        Err(join_err) => {
            let path = key.csv_path(&ctx.root);
            TripleOutcome::Failed(
                key,
                TelemetryError::artifact_io(path, std::io::Error::other(join_err.to_string())),
            )
        }
    }
}

/// Runs the whole pipeline for `resource` and writes the report.
///
/// Returns an error only when the provider is unavailable or the report
/// cannot be written. Per-series failures end up in the summary.
pub async fn run(
    session: Arc<Session>,
    resource: &ResourceId,
    window: TimeWindow,
    options: &PipelineOptions,
) -> Result<RunSummary> {
    let started = Instant::now();
    let deadline = options.deadline.map(|d| started + d);

    let descriptors = catalog::resolve(&session, resource).await?;
    let triples = plan(descriptors, &session, resource, &options.statistics);
    let total = triples.len();
    info!(
        "Processing {} series for {} between {} and {}",
        total, resource, window.start, window.end
    );

    let ctx = Arc::new(TripleContext {
        session,
        window,
        root: options.root.clone(),
        bucket_width: options.bucket_width,
        renderer: options.chart,
        deadline,
        abort: AtomicBool::new(false),
    });

    let semaphore = Arc::new(Semaphore::new(
        options.workers.clamp(1, Semaphore::MAX_PERMITS),
    ));
    let mut set = JoinSet::new();
    for triple in triples {
        let ctx = ctx.clone();
        let semaphore = semaphore.clone();
        set.spawn(async move {
            // The semaphore is never closed, so acquiring only fails on a bug.
            let _permit = semaphore.acquire_owned().await;
            run_triple(ctx, triple).await
        });
    }

    let mut charts = Vec::new();
    let mut empty = 0;
    let mut deadline_skipped = 0;
    let mut failures = Vec::new();
    let mut fatal: Option<TelemetryError> = None;

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(TripleOutcome::Charted(chart)) => charts.push(chart),
            Ok(TripleOutcome::Empty(key)) => {
                debug!("{}: no data, skipped", key.file_stem());
                empty += 1;
            }
            Ok(TripleOutcome::Failed(key, e)) => {
                warn!("{}: {}", key.file_stem(), e);
                failures.push(format!("{}: {}", key.file_stem(), e));
            }
            Ok(TripleOutcome::DeadlineExceeded(_)) => deadline_skipped += 1,
            Ok(TripleOutcome::Aborted(_)) => {}
            Ok(TripleOutcome::Fatal(key, e)) => {
                error!("{}: {}", key.file_stem(), e);
                fatal.get_or_insert(e);
            }
            Err(e) => {
                warn!("Series task failed: {}", e);
                failures.push(format!("task: {}", e));
            }
        }
    }

    if let Some(e) = fatal {
        return Err(e);
    }
    if deadline_skipped > 0 {
        warn!(
            "Deadline reached, {} of {} series were not fetched",
            deadline_skipped, total
        );
    }

    let charts_written = charts.len();
    let report = report::assemble(&options.root, resource, charts)?;

    info!(
        "Done in {:.1}s: {} charts, {} empty, {} failed",
        started.elapsed().as_secs_f64(),
        charts_written,
        empty,
        failures.len()
    );
    Ok(RunSummary {
        report,
        triples: total,
        charts: charts_written,
        empty,
        deadline_skipped,
        failures,
    })
}
