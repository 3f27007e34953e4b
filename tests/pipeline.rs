use chrono::{NaiveDate, TimeZone, Utc};
use commitgrid::config::{Config, OutputConfig};
use commitgrid::fetch::{CommitSource, RetryPolicy};
use commitgrid::model::{DateRange, DayCount, Identity};
use commitgrid::{run, CommitGridError};
use pretty_assertions::assert_eq;
use std::cell::Cell;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn config(dir: &Path) -> Config {
    let raw = r#"
        title = "Family"
        window_days = 14

        [[contributors]]
        id = "dad"
        name = "Dad"
        logins = ["dad"]
        emails = ["dad@example.com"]

        [[contributors]]
        id = "bot"
        name = "Bot"
        role = "agent"
        logins = ["bot"]
    "#;
    let mut config = Config::from_toml_str(raw).unwrap();
    config.retry = RetryPolicy::immediate(3);
    config.output = OutputConfig {
        svg: dir.join("stats/contributions.svg"),
        summary: dir.join("stats/README.md"),
        data: dir.join("stats/contributions.json"),
    };
    config
}

/// Fixed answers, failing the first `failures` calls with a transient error.
struct FlakySource {
    failures: usize,
    calls: Cell<usize>,
}

impl FlakySource {
    fn new(failures: usize) -> Self {
        Self { failures, calls: Cell::new(0) }
    }
}

impl CommitSource for FlakySource {
    fn name(&self) -> &str {
        "fake"
    }

    fn daily_counts(&self, identity: &Identity, _range: &DateRange) -> commitgrid::Result<Vec<DayCount>> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        if call < self.failures {
            return Err(CommitGridError::transient("fake", "connection reset"));
        }
        let days = match identity.value() {
            "dad" => vec![
                DayCount { date: date("2024-03-08"), count: 2 },
                DayCount { date: date("2024-03-09"), count: 1 },
            ],
            "dad@example.com" => vec![DayCount { date: date("2024-03-09"), count: 3 }],
            "bot" => vec![
                DayCount { date: date("2024-03-01"), count: 12 },
                DayCount { date: date("2024-01-01"), count: 99 },
            ],
            _ => Vec::new(),
        };
        Ok(days)
    }
}

struct DownSource;

impl CommitSource for DownSource {
    fn name(&self) -> &str {
        "down"
    }

    fn daily_counts(&self, _identity: &Identity, _range: &DateRange) -> commitgrid::Result<Vec<DayCount>> {
        Err(CommitGridError::transient("down", "unreachable"))
    }
}

#[test]
fn run_writes_all_outputs() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    let now = Utc.with_ymd_and_hms(2024, 3, 10, 6, 0, 0).unwrap();

    let out = run(&config, &FlakySource::new(0), now).unwrap();

    assert_eq!(out.range, DateRange::new(date("2024-02-26"), date("2024-03-10")).unwrap());
    assert_eq!(out.total_commits, 18);

    let svg = fs::read_to_string(&out.artifact_path).unwrap();
    assert!(svg.contains("<title>2024-03-09: 4 commits</title>"));
    assert_eq!(svg.matches("<title>").count(), 14);

    let summary = fs::read_to_string(&out.summary_path).unwrap();
    assert!(summary.contains("![Contributions](contributions.svg)"));
    assert!(summary.contains("| Dad | human | 6 | 2 |"));

    let data: serde_json::Value = serde_json::from_slice(&fs::read(&out.data_path).unwrap()).unwrap();
    assert_eq!(data["source"], "fake");
    assert_eq!(data["combined"]["total_commits"], 18);
    assert_eq!(data["contributors"][0]["contributions_by_date"]["2024-03-09"], 4);
    assert_eq!(data["contributors"][1]["max_streak"], 1);
    assert_eq!(data["official_count"], 15);
    assert_eq!(data["manual_count"], 3);
    assert_eq!(data["contributors"][0]["official_count"], 3);
    assert_eq!(data["contributors"][0]["manual_count"], 3);
    assert!(summary.contains("- Official count (login calendars): 15"));
    assert!(summary.contains("- Additional from email scan: 3"));
}

#[test]
fn upstream_failures_are_retried_transparently() {
    let baseline_dir = tempdir().unwrap();
    let flaky_dir = tempdir().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 3, 10, 6, 0, 0).unwrap();

    let baseline = run(&config(baseline_dir.path()), &FlakySource::new(0), now).unwrap();
    let flaky_source = FlakySource::new(2);
    let flaky = run(&config(flaky_dir.path()), &flaky_source, now).unwrap();

    assert_eq!(flaky_source.calls.get(), 5);
    assert_eq!(
        fs::read(&baseline.artifact_path).unwrap(),
        fs::read(&flaky.artifact_path).unwrap()
    );
    assert_eq!(
        fs::read_to_string(&baseline.summary_path).unwrap(),
        fs::read_to_string(&flaky.summary_path).unwrap()
    );
}

#[test]
fn heatmap_is_stable_across_runs_on_the_same_day() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());

    let morning = run(&config, &FlakySource::new(0), Utc.with_ymd_and_hms(2024, 3, 10, 1, 0, 0).unwrap()).unwrap();
    let first = fs::read(&morning.artifact_path).unwrap();
    let evening = run(&config, &FlakySource::new(0), Utc.with_ymd_and_hms(2024, 3, 10, 23, 0, 0).unwrap()).unwrap();
    let second = fs::read(&evening.artifact_path).unwrap();

    assert_eq!(first, second);
}

#[test]
fn failed_run_leaves_previous_artifacts_untouched() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    let now = Utc.with_ymd_and_hms(2024, 3, 10, 6, 0, 0).unwrap();

    let good = run(&config, &FlakySource::new(0), now).unwrap();
    let svg_before = fs::read(&good.artifact_path).unwrap();
    let summary_before = fs::read(&good.summary_path).unwrap();

    let later = Utc.with_ymd_and_hms(2024, 3, 11, 6, 0, 0).unwrap();
    let err = run(&config, &DownSource, later).unwrap_err();
    assert!(err.is_retryable());

    assert_eq!(fs::read(&good.artifact_path).unwrap(), svg_before);
    assert_eq!(fs::read(&good.summary_path).unwrap(), summary_before);
}

#[test]
fn unwritable_output_leaves_every_artifact_untouched() {
    let dir = tempdir().unwrap();
    let mut config = config(dir.path());
    config.output.data = dir.path().join("data/contributions.json");
    let now = Utc.with_ymd_and_hms(2024, 3, 10, 6, 0, 0).unwrap();

    let good = run(&config, &FlakySource::new(0), now).unwrap();
    let svg_before = fs::read(&good.artifact_path).unwrap();
    let summary_before = fs::read(&good.summary_path).unwrap();

    fs::remove_dir_all(dir.path().join("data")).unwrap();
    fs::write(dir.path().join("data"), "in the way").unwrap();

    let later = Utc.with_ymd_and_hms(2024, 3, 12, 6, 0, 0).unwrap();
    let err = run(&config, &FlakySource::new(0), later).unwrap_err();
    assert!(matches!(err, CommitGridError::Write { .. }));

    assert_eq!(fs::read(&good.artifact_path).unwrap(), svg_before);
    assert_eq!(fs::read(&good.summary_path).unwrap(), summary_before);
}

#[test]
fn inconsistent_palette_is_rejected_before_rendering() {
    let dir = tempdir().unwrap();
    let mut config = config(dir.path());
    config.render.palette.truncate(2);
    let now = Utc.with_ymd_and_hms(2024, 3, 10, 6, 0, 0).unwrap();

    let result = run(&config, &FlakySource::new(0), now);
    assert!(matches!(result, Err(CommitGridError::Config(_))));
    assert!(!config.output.svg.exists());
}

#[test]
fn too_many_failures_fail_the_run() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    let now = Utc.with_ymd_and_hms(2024, 3, 10, 6, 0, 0).unwrap();

    let result = run(&config, &FlakySource::new(3), now);
    assert!(matches!(result, Err(CommitGridError::Fetch { .. })));
    assert!(!config.output.svg.exists());
}
