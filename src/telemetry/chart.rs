use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::DateTime;
use log::{debug, info, warn};
use plotters::prelude::*;
use plotters::style::register_font;

use super::{Bucket, Result, SeriesKey, TelemetryError};

pub const X_LABEL: &str = "Timestamp";
const LINE_COLOR: RGBColor = RGBColor(255, 0, 255);
const FONT_FAMILY: &str = "sans-serif";

/// Searched in order when no font file is configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

static FONT_LOADED: OnceLock<bool> = OnceLock::new();

/// Registers a TTF font for chart text, once per process.
///
/// Returns whether charts can carry text. Later calls return the first outcome.
pub fn load_chart_font(configured: Option<&Path>) -> bool {
    *FONT_LOADED.get_or_init(|| {
        let candidates: Vec<PathBuf> = match configured {
            Some(path) => vec![path.to_path_buf()],
            None => SYSTEM_FONTS.iter().map(PathBuf::from).collect(),
        };
        for path in candidates {
            let Ok(bytes) = fs::read(&path) else {
                continue;
            };
            // The font registry keeps `&'static` data for the life of the process.
            let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
            if register_font(FONT_FAMILY, FontStyle::Normal, bytes).is_ok() {
                info!("Using chart font {}", path.display());
                return true;
            }
            warn!("Could not load font {}", path.display());
        }
        warn!("No usable font found, charts will be drawn without labels");
        false
    })
}

/// A chart image written for one series.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartArtifact {
    pub key: SeriesKey,
    pub path: PathBuf,
    /// Path relative to the output root, as referenced by the report.
    pub relative_path: PathBuf,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
}

impl ChartArtifact {
    pub fn category(&self) -> &str {
        self.key.category()
    }
}

fn draw_error(path: &Path, e: impl Display) -> TelemetryError {
    TelemetryError::artifact_io(path, io::Error::other(e.to_string()))
}

#[derive(Debug, Clone, Copy)]
pub struct ChartRenderer {
    pub width: u32,
    pub height: u32,
    /// Bucket width in seconds, used to pad a single-point x axis.
    pub min_span_secs: i64,
    /// Draw caption, axis descriptions and tick labels. Needs a loaded font.
    pub labels: bool,
}

impl Default for ChartRenderer {
    fn default() -> Self {
        ChartRenderer {
            width: 1000,
            height: 500,
            min_span_secs: 300,
            labels: false,
        }
    }
}

impl ChartRenderer {
    /// Turns labels on if a font can be loaded.
    pub fn with_font(mut self, configured: Option<&Path>) -> Self {
        self.labels = load_chart_font(configured);
        self
    }

    /// Draws `buckets` as a PNG line chart at `root/<key layout>.png`.
    ///
    /// `buckets` must already be ascending by start. Returns `Ok(None)`
    /// without touching the filesystem when there is nothing to draw.
    pub fn render(
        &self,
        root: &Path,
        key: &SeriesKey,
        buckets: &[Bucket],
        y_label: &str,
    ) -> Result<Option<ChartArtifact>> {
        let (Some(first), Some(last)) = (buckets.first(), buckets.last()) else {
            return Ok(None);
        };

        let relative_path = key.relative_png();
        let path = root.join(&relative_path);
        let title = key.file_stem();

        let x_start = first.start.timestamp();
        let mut x_end = last.start.timestamp();
        if x_end <= x_start {
            x_end = x_start + self.min_span_secs.max(1);
        }

        let (mut y_min, mut y_max) = buckets
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), b| {
                (lo.min(b.value), hi.max(b.value))
            });
        let pad = if y_max > y_min {
            (y_max - y_min) * 0.05
        } else {
            y_max.abs().max(1.0) * 0.1
        };
        y_min -= pad;
        y_max += pad;

        {
            let root_area =
                BitMapBackend::new(&path, (self.width, self.height)).into_drawing_area();
            root_area.fill(&WHITE).map_err(|e| draw_error(&path, e))?;

            let mut builder = ChartBuilder::on(&root_area);
            builder.margin(15);
            if self.labels {
                builder
                    .caption(&title, (FONT_FAMILY, 18))
                    .x_label_area_size(70)
                    .y_label_area_size(80);
            }
            let mut chart = builder
                .build_cartesian_2d(x_start..x_end, y_min..y_max)
                .map_err(|e| draw_error(&path, e))?;

            let time_label = |x: &i64| {
                DateTime::from_timestamp(*x, 0)
                    .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default()
            };

            if self.labels {
                chart
                    .configure_mesh()
                    .x_desc(X_LABEL)
                    .y_desc(y_label)
                    .x_labels(8)
                    .x_label_formatter(&time_label)
                    .draw()
                    .map_err(|e| draw_error(&path, e))?;
            } else {
                chart
                    .plotting_area()
                    .draw(&Rectangle::new(
                        [(x_start, y_min), (x_end, y_max)],
                        BLACK.stroke_width(1),
                    ))
                    .map_err(|e| draw_error(&path, e))?;
            }

            let points: Vec<(i64, f64)> = buckets
                .iter()
                .map(|b| (b.start.timestamp(), b.value))
                .collect();

            chart
                .draw_series(LineSeries::new(points.iter().copied(), &LINE_COLOR))
                .map_err(|e| draw_error(&path, e))?;
            chart
                .draw_series(
                    points
                        .iter()
                        .map(|&(x, y)| Circle::new((x, y), 2, LINE_COLOR.filled())),
                )
                .map_err(|e| draw_error(&path, e))?;

            root_area.present().map_err(|e| draw_error(&path, e))?;
        }

        debug!("Rendered {} points to {}", buckets.len(), path.display());
        Ok(Some(ChartArtifact {
            key: key.clone(),
            path,
            relative_path,
            title,
            x_label: X_LABEL.to_string(),
            y_label: y_label.to_string(),
        }))
    }
}
