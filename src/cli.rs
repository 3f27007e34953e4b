use crate::config::{Config, GitSourceConfig, SourceConfig};
use crate::fetch::{CommitSource, GithubSource};
use crate::git::GitRepo;
use crate::model::{ContributionRecord, GridOutput, SCHEMA_VERSION};
use crate::pipeline;
use crate::render::print_heatmap;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Args, Parser, Subcommand};
use console::style;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "commitgrid")]
#[command(about = "Collect daily commit counts for a set of contributors and render a calendar heatmap")]
#[command(version)]
pub struct Cli {
    #[clap(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone)]
pub struct CommonArgs {
    #[arg(long, global = true, help = "Path to the configuration file", default_value = "commitgrid.toml")]
    pub config: PathBuf,

    #[arg(short, long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Read history from a local git repository instead of the configured source")]
    pub repo: Option<PathBuf>,

    #[arg(long, global = true, help = "Include merge commits when reading a local repository", default_value_t = false)]
    pub include_merges: bool,

    #[arg(long, global = true, help = "Last day of the window (YYYY-MM-DD), defaults to today in UTC")]
    pub date: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch, render and write the heatmap, summary and data files
    Generate,
    /// Print the heatmap to the terminal without writing anything
    Preview,
    /// Print the aggregated calendar grids
    Export {
        #[arg(long, help = "Output as JSON")]
        json: bool,

        #[arg(long, help = "Output as NDJSON")]
        ndjson: bool,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn execute(self) -> Result<()> {
        let mut config = Config::from_path(&self.common.config)
            .with_context(|| format!("Failed to load config from {}", self.common.config.display()))?;
        if let Some(repo) = &self.common.repo {
            config.source = SourceConfig::Git(GitSourceConfig {
                path: repo.clone(),
                include_merges: self.common.include_merges,
            });
        }

        let now = resolve_now(self.common.date.as_deref())?;
        let source = open_source(&config.source)?;

        match self.command {
            Commands::Generate => generate(&config, source.as_ref(), now),
            Commands::Preview => preview(&config, source.as_ref(), now),
            Commands::Export { json, ndjson } => export(&config, source.as_ref(), now, json, ndjson),
        }
    }
}

fn resolve_now(date: Option<&str>) -> Result<DateTime<Utc>> {
    match date {
        None => Ok(Utc::now()),
        Some(raw) => {
            let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .with_context(|| format!("Invalid --date '{raw}', expected YYYY-MM-DD"))?;
            Ok(day.and_time(NaiveTime::MIN).and_utc())
        }
    }
}

fn open_source(source: &SourceConfig) -> Result<Box<dyn CommitSource>> {
    let source: Box<dyn CommitSource> = match source {
        SourceConfig::Github(github) => {
            Box::new(GithubSource::from_config(github).context("Failed to set up GitHub client")?)
        }
        SourceConfig::Git(git) => Box::new(
            GitRepo::open(Some(&git.path), git.include_merges).context("Failed to open git repository")?,
        ),
    };
    Ok(source)
}

fn generate(config: &Config, source: &dyn CommitSource, now: DateTime<Utc>) -> Result<()> {
    let out = pipeline::run(config, source, now).context("Pipeline run failed")?;
    println!(
        "{} {} commits between {} and {}",
        style("✓").green(),
        style(out.total_commits).cyan(),
        out.range.start,
        out.range.end
    );
    println!("  heatmap: {}", out.artifact_path.display());
    println!("  summary: {}", out.summary_path.display());
    println!("  data:    {}", out.data_path.display());
    Ok(())
}

fn preview(config: &Config, source: &dyn CommitSource, now: DateTime<Utc>) -> Result<()> {
    let collected = pipeline::collect(config, source, now).context("Failed to collect contributions")?;
    println!("{} {}", style(&config.title).bold(), style(format!("{}", collected.range)).dim());
    println!();
    print_heatmap(&config.contributors, &collected.grids, &config.render);
    Ok(())
}

fn export(config: &Config, source: &dyn CommitSource, now: DateTime<Utc>, json: bool, ndjson: bool) -> Result<()> {
    let pipeline::Collected { range, grids, breakdown } =
        pipeline::collect(config, source, now).context("Failed to collect contributions")?;

    if ndjson {
        for grid in &grids {
            for day in &grid.days {
                let record = ContributionRecord::new(grid.contributor_id.clone(), day.date, day.count);
                println!("{}", serde_json::to_string(&record)?);
            }
        }
    } else if json {
        let output = GridOutput {
            version: SCHEMA_VERSION,
            generated_at: now,
            range,
            grids,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", style("Export Summary").bold());
        println!("{}", "─".repeat(50));
        for (contributor, grid) in config.contributors.iter().zip(&grids) {
            let split = breakdown.get(&contributor.id).copied().unwrap_or_default();
            println!(
                "{:<24} {:>8} commits {:>5} active days  ({} official, {} scanned)",
                contributor.name,
                style(grid.total()).cyan(),
                style(grid.active_days()).yellow(),
                split.official_count,
                split.manual_count
            );
        }
        println!("\nUse --json or --ndjson flags to export the raw data.");
    }
    Ok(())
}
