use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use super::layout::segment;
use super::{ChartArtifact, ResourceId, Result, StatisticKind, TelemetryError};

const BOOTSTRAP_CSS: &str = "https://stackpath.bootstrapcdn.com/bootstrap/4.3.1/css/bootstrap.min.css";
const JQUERY_JS: &str = "https://code.jquery.com/jquery-3.3.1.slim.min.js";
const POPPER_JS: &str = "https://cdn.jsdelivr.net/npm/popper.js@1.14.7/dist/umd/popper.min.js";
const BOOTSTRAP_JS: &str = "https://stackpath.bootstrapcdn.com/bootstrap/4.3.1/js/bootstrap.min.js";
const ALL_CHARTS_ID: &str = "otherMetrics";

/// Charts of one category shown in the featured section.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportCategory {
    pub name: String,
    pub title: String,
    pub charts: Vec<ChartArtifact>,
}

/// The HTML report of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDocument {
    pub path: PathBuf,
    pub resource: ResourceId,
    /// One entry per category, `Average` charts only.
    pub featured: Vec<ReportCategory>,
    /// Every chart, shown in the collapsed section.
    pub all: Vec<ChartArtifact>,
}

pub fn category_title(category: &str) -> String {
    format!("{} Metrics", category)
}

/// `<root>/<resource>.html`.
pub fn report_path(root: &Path, resource: &ResourceId) -> PathBuf {
    root.join(format!("{}.html", segment(resource.as_str())))
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Forward slashes regardless of platform, so the page works from any browser.
fn href(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

impl ReportDocument {
    /// Groups `charts` by category. Order is deterministic whatever order
    /// the charts were produced in.
    pub fn new(root: &Path, resource: &ResourceId, mut charts: Vec<ChartArtifact>) -> Self {
        charts.sort_by(|a, b| a.key.cmp(&b.key));

        let mut categories: BTreeMap<String, Vec<ChartArtifact>> = BTreeMap::new();
        for chart in &charts {
            let featured = categories.entry(chart.category().to_string()).or_default();
            if chart.key.statistic == StatisticKind::Average {
                featured.push(chart.clone());
            }
        }

        ReportDocument {
            path: report_path(root, resource),
            resource: resource.clone(),
            featured: categories
                .into_iter()
                .map(|(name, charts)| ReportCategory {
                    title: category_title(&name),
                    name,
                    charts,
                })
                .collect(),
            all: charts,
        }
    }

    fn img(html: &mut String, chart: &ChartArtifact) {
        let alt = chart
            .relative_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let _ = writeln!(
            html,
            "<img src=\"{}\" class=\"img-fluid\" alt=\"{}\" title=\"{}\">",
            escape(&href(&chart.relative_path)),
            escape(&alt),
            escape(&chart.y_label)
        );
    }

    pub fn to_html(&self) -> String {
        let mut html = String::new();
        let _ = writeln!(html, "<!DOCTYPE html>\n<html lang=\"en\">\n<head>");
        let _ = writeln!(
            html,
            "<meta charset=\"UTF-8\">\n<meta name=\"viewport\" content=\"width=device-width, initial-scale=1, shrink-to-fit=no\">"
        );
        let _ = writeln!(html, "<link rel=\"stylesheet\" href=\"{}\">", BOOTSTRAP_CSS);
        let _ = writeln!(
            html,
            "<title>Metrics Viewer - {}</title>\n</head>\n<body>",
            escape(self.resource.as_str())
        );
        let _ = writeln!(
            html,
            "<div class=\"container mt-4\">\n<h2>Metrics for {}</h2>",
            escape(self.resource.as_str())
        );

        for category in &self.featured {
            let _ = writeln!(html, "<div class=\"mt-3\" id=\"{}\">", escape(&category.name));
            let _ = writeln!(html, "<div class=\"card card-body\">");
            let _ = writeln!(html, "<h5 class=\"card-title\">{}</h5>", escape(&category.title));
            for chart in &category.charts {
                Self::img(&mut html, chart);
            }
            let _ = writeln!(html, "</div>\n</div>");
        }

        let _ = writeln!(
            html,
            "<button class=\"btn btn-secondary mt-3\" type=\"button\" data-toggle=\"collapse\" data-target=\"#{id}\" aria-expanded=\"false\" aria-controls=\"{id}\">",
            id = ALL_CHARTS_ID
        );
        let _ = writeln!(html, "Show all metrics ({})\n</button>", self.all.len());
        let _ = writeln!(html, "<div class=\"collapse mt-3\" id=\"{}\">", ALL_CHARTS_ID);
        let _ = writeln!(html, "<div class=\"card card-body\">");
        for chart in &self.all {
            Self::img(&mut html, chart);
        }
        let _ = writeln!(html, "</div>\n</div>\n</div>");

        for script in [JQUERY_JS, POPPER_JS, BOOTSTRAP_JS] {
            let _ = writeln!(html, "<script src=\"{}\"></script>", script);
        }
        let _ = writeln!(html, "</body>\n</html>");
        html
    }
}

/// Writes the report for `charts` to `<root>/<resource>.html`.
///
/// Zero charts still produce a report. Failing to write it is fatal.
pub fn assemble(root: &Path, resource: &ResourceId, charts: Vec<ChartArtifact>) -> Result<ReportDocument> {
    let doc = ReportDocument::new(root, resource, charts);
    let assembly_err = |source| TelemetryError::Assembly {
        path: doc.path.clone(),
        source,
    };

    if let Some(parent) = doc.path.parent() {
        fs::create_dir_all(parent).map_err(assembly_err)?;
    }
    fs::write(&doc.path, doc.to_html()).map_err(assembly_err)?;

    info!(
        "Wrote report {} ({} charts, {} categories)",
        doc.path.display(),
        doc.all.len(),
        doc.featured.len()
    );
    Ok(doc)
}
