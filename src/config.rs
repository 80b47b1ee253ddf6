use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Utc};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::telemetry::{StatisticKind, TimeWindow};
use crate::Settings;

#[derive(Deserialize, Debug, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: Provider,
    #[serde(default)]
    pub pipeline: Pipeline,
    #[serde(default)]
    pub chart: Chart,
    #[serde(default)]
    pub logging: Logging,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    AwsCli,
    Recorded,
}

#[derive(Deserialize, Debug)]
pub struct Provider {
    #[serde(default = "default_provider_kind")]
    pub kind: ProviderKind,
    #[serde(default = "default_aws_bin")]
    pub aws_bin: String,
    pub profile: Option<String>,
    pub region: Option<String>,
    pub recorded_dir: Option<PathBuf>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_identifying_dimension")]
    pub identifying_dimension: String,
    #[serde(default = "default_period")]
    pub period: u32,
}

#[derive(Deserialize, Debug)]
pub struct Pipeline {
    pub resource: Option<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_statistics")]
    pub statistics: Vec<StatisticKind>,
    #[serde(
        default = "default_bucket_width",
        deserialize_with = "duration_deserialize"
    )]
    pub bucket_width: Duration,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default, deserialize_with = "opt_duration_deserialize")]
    pub deadline: Option<Duration>,
    #[serde(default = "default_window_hours")]
    pub window_hours: u32,
}

#[derive(Deserialize, Debug)]
pub struct Chart {
    #[serde(default = "default_chart_width")]
    pub width: u32,
    #[serde(default = "default_chart_height")]
    pub height: u32,
    pub font: Option<PathBuf>,
}

#[derive(Deserialize, Debug)]
pub struct Logging {
    #[serde(default = "default_log_level")]
    pub level: String,
    pub file: Option<PathBuf>,
}

fn default_provider_kind() -> ProviderKind {
    ProviderKind::AwsCli
}
fn default_aws_bin() -> String {
    String::from("aws")
}
fn default_namespace() -> String {
    String::from(Settings::NAMESPACE)
}
fn default_identifying_dimension() -> String {
    String::from(Settings::IDENTIFYING_DIMENSION)
}
fn default_period() -> u32 {
    Settings::PERIOD_SECS
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./")
}
fn default_statistics() -> Vec<StatisticKind> {
    StatisticKind::ALL.to_vec()
}
fn default_bucket_width() -> Duration {
    Settings::BUCKET_WIDTH
}
fn default_workers() -> usize {
    Settings::WORKERS
}
fn default_window_hours() -> u32 {
    Settings::WINDOW_HOURS
}
fn default_chart_width() -> u32 {
    Settings::CHART_WIDTH
}
fn default_chart_height() -> u32 {
    Settings::CHART_HEIGHT
}
fn default_log_level() -> String {
    String::from("info")
}

fn duration_deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = u32::deserialize(deserializer)?;
    if s == 0 {
        return Err(serde::de::Error::custom("Duration must be at least one second"));
    }
    Ok(Duration::from_secs(s as u64))
}

fn opt_duration_deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = Option::<u64>::deserialize(deserializer)?;
    Ok(s.map(Duration::from_secs))
}

impl Default for Provider {
    fn default() -> Self {
        Provider {
            kind: default_provider_kind(),
            aws_bin: default_aws_bin(),
            profile: None,
            region: None,
            recorded_dir: None,
            namespace: default_namespace(),
            identifying_dimension: default_identifying_dimension(),
            period: default_period(),
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Pipeline {
            resource: None,
            output_dir: default_output_dir(),
            statistics: default_statistics(),
            bucket_width: default_bucket_width(),
            workers: default_workers(),
            deadline: None,
            window_hours: default_window_hours(),
        }
    }
}

impl Default for Chart {
    fn default() -> Self {
        Chart {
            width: default_chart_width(),
            height: default_chart_height(),
            font: None,
        }
    }
}

impl Default for Logging {
    fn default() -> Self {
        Logging {
            level: default_log_level(),
            file: None,
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,

    /// Database instance identifier.
    #[arg(short, long)]
    pub resource: Option<String>,

    /// Window start, `YYYY/MM/DD HH:MM:SS` (UTC) or RFC 3339.
    #[arg(long, requires = "end")]
    pub start: Option<String>,

    /// Window end, same formats as --start.
    #[arg(long, requires = "start")]
    pub end: Option<String>,

    /// Output root for `metrics/` and the report.
    #[arg(short, long)]
    pub directory: Option<PathBuf>,

    #[arg(long)]
    pub profile: Option<String>,

    #[arg(long)]
    pub region: Option<String>,

    /// Replay captured CLI output from this directory instead of calling AWS.
    #[arg(long)]
    pub recorded: Option<PathBuf>,

    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Stop starting new fetches after this many seconds.
    #[arg(long)]
    pub deadline: Option<u64>,

    #[arg(long)]
    pub log_level: Option<String>,
}

/// Reads the config file if it exists, then applies command line overrides.
pub fn load_config(cli_args: &CliArgs) -> Result<AppConfig> {
    let mut config = AppConfig::default();

    if Path::new(&cli_args.config).exists() {
        let contents = fs::read_to_string(&cli_args.config)
            .with_context(|| format!("Failed to read config file {}", cli_args.config))?;
        config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", cli_args.config))?;
    }

    if let Some(resource) = &cli_args.resource {
        config.pipeline.resource = Some(resource.clone());
    }
    if let Some(dir) = &cli_args.directory {
        config.pipeline.output_dir = dir.clone();
    }
    if let Some(profile) = &cli_args.profile {
        config.provider.profile = Some(profile.clone());
    }
    if let Some(region) = &cli_args.region {
        config.provider.region = Some(region.clone());
    }
    if let Some(dir) = &cli_args.recorded {
        config.provider.kind = ProviderKind::Recorded;
        config.provider.recorded_dir = Some(dir.clone());
    }
    if let Some(workers) = cli_args.workers {
        config.pipeline.workers = workers;
    }
    if let Some(secs) = cli_args.deadline {
        config.pipeline.deadline = Some(Duration::from_secs(secs));
    }
    if let Some(level) = &cli_args.log_level {
        config.logging.level = level.clone();
    }

    if config.pipeline.statistics.is_empty() {
        bail!("At least one statistic must be configured");
    }
    if config.provider.kind == ProviderKind::Recorded && config.provider.recorded_dir.is_none() {
        bail!("provider.kind = \"recorded\" needs provider.recorded_dir");
    }

    Ok(config)
}

/// Parses `YYYY/MM/DD HH:MM[:SS]` as UTC, or an RFC 3339 timestamp.
pub fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y/%m/%d %H:%M:%S", "%Y/%m/%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(naive.and_utc());
        }
    }
    bail!("Invalid time {:?}, expected YYYY/MM/DD HH:MM:SS or RFC 3339", raw)
}

/// Window from the command line, or the last `window_hours` ending at `now`.
pub fn resolve_window(
    start: Option<&str>,
    end: Option<&str>,
    window_hours: u32,
    now: DateTime<Utc>,
) -> Result<TimeWindow> {
    match (start, end) {
        (None, None) => {
            let start = now - ChronoDuration::hours(i64::from(window_hours.max(1)));
            TimeWindow::new(start, now).context("Empty default window")
        }
        (Some(start), Some(end)) => {
            let (start, end) = (parse_time(start)?, parse_time(end)?);
            TimeWindow::new(start, end)
                .with_context(|| format!("Window start {} is not before end {}", start, end))
        }
        _ => bail!("--start and --end must be given together"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cli(args: &[&str]) -> CliArgs {
        let mut full = vec!["pg_telemetry", "--config", "/nonexistent/config.toml"];
        full.extend_from_slice(args);
        CliArgs::parse_from(full)
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider.kind, ProviderKind::AwsCli);
        assert_eq!(config.provider.namespace, "AWS/RDS");
        assert_eq!(config.provider.period, 60);
        assert_eq!(config.pipeline.bucket_width, Duration::from_secs(300));
        assert_eq!(config.pipeline.statistics.len(), 5);
        assert_eq!(config.pipeline.window_hours, 24);
        assert_eq!(config.pipeline.resource, None);
    }

    #[test]
    fn test_parse_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [provider]
            kind = "recorded"
            recorded_dir = "captures"
            period = 300

            [pipeline]
            resource = "db-1"
            statistics = ["Average", "Maximum"]
            bucket_width = 600
            deadline = 30

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.provider.kind, ProviderKind::Recorded);
        assert_eq!(config.provider.period, 300);
        assert_eq!(config.provider.aws_bin, "aws");
        assert_eq!(
            config.pipeline.statistics,
            vec![StatisticKind::Average, StatisticKind::Maximum]
        );
        assert_eq!(config.pipeline.bucket_width, Duration::from_secs(600));
        assert_eq!(config.pipeline.deadline, Some(Duration::from_secs(30)));
        assert_eq!(config.chart.width, 1000);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_zero_bucket_width_rejected() {
        let res: std::result::Result<AppConfig, _> = toml::from_str("[pipeline]\nbucket_width = 0\n");
        assert!(res.is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let config = load_config(&cli(&[
            "--resource",
            "db-9",
            "--recorded",
            "captures",
            "--workers",
            "1",
            "--directory",
            "/tmp/out",
        ]))
        .unwrap();

        assert_eq!(config.pipeline.resource.as_deref(), Some("db-9"));
        assert_eq!(config.provider.kind, ProviderKind::Recorded);
        assert_eq!(config.provider.recorded_dir, Some(PathBuf::from("captures")));
        assert_eq!(config.pipeline.workers, 1);
        assert_eq!(config.pipeline.output_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_start_requires_end() {
        let res = CliArgs::try_parse_from(["pg_telemetry", "--start", "2024/03/01 10:00:00"]);
        assert!(res.is_err());
    }

    #[test]
    fn test_parse_time() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_time("2024/03/01 10:00:00").unwrap(), expected);
        assert_eq!(parse_time("2024/03/01 10:00").unwrap(), expected);
        assert_eq!(parse_time("2024-03-01T11:00:00+01:00").unwrap(), expected);
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn test_resolve_window() {
        let now = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let w = resolve_window(None, None, 24, now).unwrap();
        assert_eq!(w.start, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(w.end, now);

        let w = resolve_window(Some("2024/03/01 10:00:00"), Some("2024/03/01 10:10:00"), 24, now)
            .unwrap();
        assert_eq!(w.end - w.start, ChronoDuration::minutes(10));

        assert!(resolve_window(Some("2024/03/01 10:10:00"), Some("2024/03/01 10:00:00"), 24, now).is_err());
        assert!(resolve_window(Some("2024/03/01 10:00:00"), None, 24, now).is_err());
    }
}
