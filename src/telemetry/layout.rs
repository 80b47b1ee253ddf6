use std::path::{Path, PathBuf};

use super::{Dimension, StatisticKind};

pub const METRICS_DIR: &str = "metrics";

/// Addresses every artifact produced for one (dimension, metric, statistic).
///
/// Layout under the output root:
///
/// ```text
/// metrics/<DimName>/<DimValue>/<Metric>/<DimName>.<DimValue>.<Metric>.<Statistic>.{csv,png}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub dimension: Dimension,
    pub metric_name: String,
    pub statistic: StatisticKind,
}

impl SeriesKey {
    pub fn new(dimension: Dimension, metric_name: impl Into<String>, statistic: StatisticKind) -> Self {
        SeriesKey {
            dimension,
            metric_name: metric_name.into(),
            statistic,
        }
    }

    /// Report category, i.e. the dimension name.
    pub fn category(&self) -> &str {
        &self.dimension.name
    }

    pub fn relative_dir(&self) -> PathBuf {
        PathBuf::from(METRICS_DIR)
            .join(segment(&self.dimension.name))
            .join(segment(&self.dimension.value))
            .join(segment(&self.metric_name))
    }

    pub fn file_stem(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            segment(&self.dimension.name),
            segment(&self.dimension.value),
            segment(&self.metric_name),
            self.statistic
        )
    }

    pub fn relative_csv(&self) -> PathBuf {
        self.relative_dir().join(format!("{}.csv", self.file_stem()))
    }

    pub fn relative_png(&self) -> PathBuf {
        self.relative_dir().join(format!("{}.png", self.file_stem()))
    }

    pub fn csv_path(&self, root: &Path) -> PathBuf {
        root.join(self.relative_csv())
    }

    pub fn png_path(&self, root: &Path) -> PathBuf {
        root.join(self.relative_png())
    }
}

/// Keeps a name on a single directory level below its parent.
pub(crate) fn segment(name: &str) -> String {
    match name {
        "" | "." | ".." => String::from("_"),
        _ => name.replace(['/', '\\'], "_"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let key = SeriesKey::new(
            Dimension::new("DBInstanceIdentifier", "db-1"),
            "CPUUtilization",
            StatisticKind::Average,
        );
        let root = Path::new("/tmp/out");
        assert_eq!(
            key.csv_path(root),
            PathBuf::from(
                "/tmp/out/metrics/DBInstanceIdentifier/db-1/CPUUtilization/DBInstanceIdentifier.db-1.CPUUtilization.Average.csv"
            )
        );
        assert_eq!(
            key.relative_png(),
            PathBuf::from(
                "metrics/DBInstanceIdentifier/db-1/CPUUtilization/DBInstanceIdentifier.db-1.CPUUtilization.Average.png"
            )
        );
        assert_eq!(key.category(), "DBInstanceIdentifier");
    }

    #[test]
    fn test_separator_in_value_stays_one_level() {
        let key = SeriesKey::new(
            Dimension::new("DBClusterIdentifier", "team/db"),
            "ReadIOPS",
            StatisticKind::Sum,
        );
        assert_eq!(key.relative_dir().components().count(), 4);
        assert_eq!(key.file_stem(), "DBClusterIdentifier.team_db.ReadIOPS.Sum");
    }

    #[test]
    fn test_dot_names_stay_inside_layout() {
        let key = SeriesKey::new(
            Dimension::new("DBInstanceIdentifier", ".."),
            ".",
            StatisticKind::Average,
        );
        assert_eq!(
            key.relative_dir(),
            PathBuf::from("metrics/DBInstanceIdentifier/_/_")
        );
        assert!(key
            .relative_csv()
            .components()
            .all(|c| matches!(c, std::path::Component::Normal(_))));
        assert_eq!(segment("db..1"), "db..1");
    }
}
