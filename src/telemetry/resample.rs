use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};

use super::{Observation, Result, TelemetryError};

pub const DEFAULT_BUCKET_WIDTH: Duration = Duration::minutes(5);

/// One point of a resampled series.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    /// Start of the window, aligned on the bucket width.
    pub start: DateTime<Utc>,
    /// Mean of the values that fell into the window.
    pub value: f64,
    pub count: usize,
}

/// Buckets read back from a persisted series, plus what the chart needs to label them.
#[derive(Debug, Clone, PartialEq)]
pub struct ResampledSeries {
    /// Value column header, i.e. the statistic name.
    pub label: String,
    pub unit: Option<String>,
    pub buckets: Vec<Bucket>,
}

impl ResampledSeries {
    pub fn y_label(&self) -> String {
        match &self.unit {
            Some(unit) => format!("{} ({})", self.label, unit),
            None => self.label.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Floors `ts` to the start of its `width`-wide bucket.
pub fn bucket_start(ts: DateTime<Utc>, width: Duration) -> DateTime<Utc> {
    let width_ms = width.num_milliseconds().max(1);
    let start_ms = ts.timestamp_millis().div_euclid(width_ms) * width_ms;
    DateTime::from_timestamp_millis(start_ms).unwrap_or(ts)
}

fn bucketize<I>(points: I, width: Duration) -> Vec<Bucket>
where
    I: IntoIterator<Item = (DateTime<Utc>, f64)>,
{
    // BTreeMap keeps bucket starts unique and ascending whatever the input order.
    let mut groups: BTreeMap<DateTime<Utc>, (f64, usize)> = BTreeMap::new();
    for (ts, value) in points {
        let entry = groups.entry(bucket_start(ts, width)).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }

    groups
        .into_iter()
        .map(|(start, (sum, count))| Bucket {
            start,
            value: sum / count as f64,
            count,
        })
        .collect()
}

/// Averages in-memory observations into `width`-wide buckets.
pub fn resample_observations(observations: &[Observation], width: Duration) -> Vec<Bucket> {
    bucketize(observations.iter().map(|o| (o.timestamp, o.value)), width)
}

/// Reads the series at `path` and averages it into `width`-wide buckets.
///
/// Any row with an unparsable timestamp or value fails the whole series.
pub fn resample(path: &Path, width: Duration) -> Result<ResampledSeries> {
    let body = fs::read_to_string(path).map_err(|e| TelemetryError::artifact_io(path, e))?;

    let mut lines = body
        .split('\n')
        .map(|l| l.trim_end_matches('\r'))
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());

    let (_, header) = lines
        .next()
        .ok_or_else(|| TelemetryError::malformed(path, 1, "missing header row"))?;
    let header = split_record(header);
    let label = match header.get(1) {
        Some(label) if !label.is_empty() => label.to_string(),
        _ => return Err(TelemetryError::malformed(path, 1, "header has no value column")),
    };

    let mut unit: Option<String> = None;
    let mut points = Vec::new();
    for (idx, line) in lines {
        let line_no = idx + 1;
        let fields = split_record(line);
        if fields.len() < 2 {
            return Err(TelemetryError::malformed(path, line_no, "expected at least two columns"));
        }

        let ts = parse_timestamp(fields[0]).ok_or_else(|| {
            TelemetryError::malformed(path, line_no, format!("bad timestamp {:?}", fields[0]))
        })?;
        let value = fields[1]
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                TelemetryError::malformed(path, line_no, format!("non-numeric value {:?}", fields[1]))
            })?;
        if unit.is_none() {
            unit = fields.get(2).filter(|u| !u.is_empty()).map(|u| u.to_string());
        }

        points.push((ts, value));
    }

    Ok(ResampledSeries {
        label,
        unit,
        buckets: bucketize(points, width),
    })
}

/// Splits a `"a";"b";"c";` record into unquoted fields, dropping the empty
/// field left by the trailing separator.
fn split_record(line: &str) -> Vec<&str> {
    let mut fields: Vec<&str> = line
        .split(';')
        .map(|f| {
            let f = f.trim();
            f.strip_prefix('"')
                .and_then(|f| f.strip_suffix('"'))
                .unwrap_or(f)
        })
        .collect();
    if fields.len() > 1 && fields.last().is_some_and(|f| f.is_empty()) {
        fields.pop();
    }
    fields
}

/// Accepts `2024-03-01 10:00:00[.fff] +0000 UTC` and RFC 3339.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    let without_zone_name = match raw.rsplit_once(' ') {
        Some((rest, abbr)) if !abbr.is_empty() && abbr.chars().all(|c| c.is_ascii_alphabetic()) => {
            rest
        }
        _ => raw,
    };

    DateTime::parse_from_str(without_zone_name, "%Y-%m-%d %H:%M:%S%.f %z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::sink::persist;
    use crate::telemetry::{Dimension, SeriesKey, StatisticKind};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    fn key() -> SeriesKey {
        SeriesKey::new(
            Dimension::new("DBInstanceIdentifier", "db-1"),
            "CPUUtilization",
            StatisticKind::Average,
        )
    }

    #[test]
    fn test_bucket_start_floors() {
        let w = DEFAULT_BUCKET_WIDTH;
        assert_eq!(bucket_start(t0(), w), t0());
        assert_eq!(bucket_start(t0() + Duration::seconds(299), w), t0());
        assert_eq!(
            bucket_start(t0() + Duration::seconds(300), w),
            t0() + Duration::minutes(5)
        );

        let before_epoch = Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 1).unwrap();
        assert_eq!(
            bucket_start(before_epoch, w),
            Utc.with_ymd_and_hms(1969, 12, 31, 23, 55, 0).unwrap()
        );
    }

    #[test]
    fn test_mean_within_bucket() {
        let obs = vec![
            Observation::new(t0(), 5.0, "Count"),
            Observation::new(t0() + Duration::seconds(1), 7.0, "Count"),
        ];
        let buckets = resample_observations(&obs, DEFAULT_BUCKET_WIDTH);
        assert_eq!(
            buckets,
            vec![Bucket {
                start: t0(),
                value: 6.0,
                count: 2
            }]
        );
    }

    #[test]
    fn test_order_does_not_matter() {
        let obs: Vec<Observation> = (0..40)
            .map(|i| Observation::new(t0() + Duration::seconds(37 * i), i as f64, "Count"))
            .collect();
        let mut reversed = obs.clone();
        reversed.reverse();
        let mut shuffled = obs.clone();
        shuffled.rotate_left(13);

        let sorted = resample_observations(&obs, DEFAULT_BUCKET_WIDTH);
        assert_eq!(sorted, resample_observations(&reversed, DEFAULT_BUCKET_WIDTH));
        assert_eq!(sorted, resample_observations(&shuffled, DEFAULT_BUCKET_WIDTH));
        assert!(sorted.windows(2).all(|w| w[0].start < w[1].start));
        assert_eq!(sorted.iter().map(|b| b.count).sum::<usize>(), 40);
    }

    #[test]
    fn test_resample_persisted_series() {
        let dir = tempfile::tempdir().unwrap();
        let obs = vec![
            Observation::new(t0() + Duration::seconds(301), 30.0, "Percent"),
            Observation::new(t0() + Duration::seconds(61), 20.0, "Percent"),
            Observation::new(t0(), 10.0, "Percent"),
        ];
        let artifact = persist(dir.path(), &key(), &obs).unwrap();

        let series = resample(&artifact.path, DEFAULT_BUCKET_WIDTH).unwrap();
        assert_eq!(series.label, "Average");
        assert_eq!(series.y_label(), "Average (Percent)");
        assert_eq!(
            series.buckets,
            vec![
                Bucket {
                    start: t0(),
                    value: 15.0,
                    count: 2
                },
                Bucket {
                    start: t0() + Duration::minutes(5),
                    value: 30.0,
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn test_header_only_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = persist(dir.path(), &key(), &[]).unwrap();
        let series = resample(&artifact.path, DEFAULT_BUCKET_WIDTH).unwrap();
        assert!(series.is_empty());
        assert_eq!(series.y_label(), "Average");
    }

    #[test]
    fn test_bad_value_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(
            &path,
            "\"Timestamp\";\"Average\";\"Unit\";\r\n\
             \"2024-03-01 10:00:00 +0000 UTC\";\"1.0\";\"Percent\";\r\n\
             \"2024-03-01 10:01:00 +0000 UTC\";\"n/a\";\"Percent\";\r\n",
        )
        .unwrap();

        match resample(&path, DEFAULT_BUCKET_WIDTH) {
            Err(TelemetryError::MalformedSeries { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected malformed series, got {:?}", other),
        }
    }

    #[test]
    fn test_nan_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let obs = vec![Observation::new(t0(), f64::NAN, "Percent")];
        let artifact = persist(dir.path(), &key(), &obs).unwrap();
        assert!(matches!(
            resample(&artifact.path, DEFAULT_BUCKET_WIDTH),
            Err(TelemetryError::MalformedSeries { line: 2, .. })
        ));
    }

    #[test]
    fn test_bad_timestamp_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(
            &path,
            "\"Timestamp\";\"Sum\";\"Unit\";\r\n\"yesterday\";\"1.0\";\"Count\";\r\n",
        )
        .unwrap();
        assert!(matches!(
            resample(&path, DEFAULT_BUCKET_WIDTH),
            Err(TelemetryError::MalformedSeries { line: 2, .. })
        ));
    }

    #[test]
    fn test_empty_file_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, "").unwrap();
        assert!(matches!(
            resample(&path, DEFAULT_BUCKET_WIDTH),
            Err(TelemetryError::MalformedSeries { line: 1, .. })
        ));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01 10:00:00 +0000 UTC"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 12:00:00 +0200 CEST"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T10:00:00Z"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-03-01 10:00:00.250 +0000 UTC"),
            Some(expected + Duration::milliseconds(250))
        );
        assert_eq!(parse_timestamp("10:00"), None);
    }
}
