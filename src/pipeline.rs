//! The fetch, aggregate, render and write sequence behind `generate`.

use crate::aggregate::{aggregate, combine};
use crate::config::Config;
use crate::error::Result;
use crate::fetch::{CommitSource, Fetcher};
use crate::model::{CalendarGrid, ContributorSnapshot, CountBreakdown, DateRange, SnapshotOutput, SCHEMA_VERSION};
use crate::output::{relative_link, write_all_atomic};
use crate::render::{render_heatmap, render_summary};
use crate::stats::streak_stats;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub artifact_path: PathBuf,
    pub summary_path: PathBuf,
    pub data_path: PathBuf,
    pub range: DateRange,
    pub total_commits: u64,
}

/// File contents for one run, fully rendered before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub svg: String,
    pub summary: String,
    pub data: String,
}

/// Aggregated grids for one window, in contributor order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collected {
    pub range: DateRange,
    pub grids: Vec<CalendarGrid>,
    pub breakdown: BTreeMap<String, CountBreakdown>,
}

impl Collected {
    pub fn breakdown_for(&self, contributor_id: &str) -> CountBreakdown {
        self.breakdown.get(contributor_id).copied().unwrap_or_default()
    }

    pub fn combined_breakdown(&self) -> CountBreakdown {
        self.breakdown
            .values()
            .fold(CountBreakdown::default(), |acc, b| acc.merge(*b))
    }
}

/// The trailing window that ends on the day of `now`.
pub fn window(config: &Config, now: DateTime<Utc>) -> Result<DateRange> {
    DateRange::trailing(now.date_naive(), config.window_days)
}

/// Fetches and aggregates; no files are touched.
pub fn collect(config: &Config, source: &dyn CommitSource, now: DateTime<Utc>) -> Result<Collected> {
    config.validate()?;
    let range = window(config, now)?;
    info!(source = source.name(), %range, contributors = config.contributors.len(), "fetching contributions");

    let fetched = Fetcher::new(source, config.retry).fetch(&config.contributors, &range)?;
    let grids = aggregate(&config.contributors, &fetched.records, &range);
    Ok(Collected {
        range,
        grids,
        breakdown: fetched.breakdown,
    })
}

pub fn build_artifacts(
    config: &Config,
    source_name: &str,
    collected: &Collected,
    now: DateTime<Utc>,
) -> Result<Artifacts> {
    let Collected { range, grids, .. } = collected;
    let svg = render_heatmap(&config.title, &config.contributors, grids, config.layout, &config.render)?;

    let combined = streak_stats(&combine("combined", grids));
    let breakdown = collected.combined_breakdown();
    let snapshot = SnapshotOutput {
        version: SCHEMA_VERSION,
        generated_at: now,
        source: source_name.to_string(),
        range: *range,
        combined,
        breakdown,
        contributors: config
            .contributors
            .iter()
            .zip(grids)
            .map(|(c, g)| ContributorSnapshot {
                id: c.id.clone(),
                name: c.name.clone(),
                role: c.role,
                stats: streak_stats(g),
                breakdown: collected.breakdown_for(&c.id),
                contributions_by_date: g.sparse(),
            })
            .collect(),
    };
    let mut data = serde_json::to_string_pretty(&snapshot)?;
    data.push('\n');

    let link = relative_link(&config.output.summary, &config.output.svg);
    let summary = render_summary(
        &config.title,
        &config.contributors,
        grids,
        &combined,
        &breakdown,
        range,
        now,
        &link,
    );

    Ok(Artifacts { svg, summary, data })
}

/// One scheduled run: fetch, aggregate, render, then replace the outputs.
///
/// Any failure before the final renames leaves the previous outputs alone.
pub fn run(config: &Config, source: &dyn CommitSource, now: DateTime<Utc>) -> Result<RunOutput> {
    let collected = collect(config, source, now)?;
    let artifacts = build_artifacts(config, source.name(), &collected, now)?;

    write_all_atomic(&[
        (config.output.svg.as_path(), artifacts.svg.as_bytes()),
        (config.output.data.as_path(), artifacts.data.as_bytes()),
        (config.output.summary.as_path(), artifacts.summary.as_bytes()),
    ])?;

    let total_commits: u64 = collected.grids.iter().map(CalendarGrid::total).sum();
    info!(
        svg = %config.output.svg.display(),
        summary = %config.output.summary.display(),
        total_commits,
        "wrote artifacts"
    );

    Ok(RunOutput {
        artifact_path: config.output.svg.clone(),
        summary_path: config.output.summary.clone(),
        data_path: config.output.data.clone(),
        range: collected.range,
        total_commits,
    })
}
