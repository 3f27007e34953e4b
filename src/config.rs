use crate::error::{CommitGridError, Result};
use crate::fetch::RetryPolicy;
use crate::model::Contributor;
use crate::render::{Layout, TierScale};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const DEFAULT_WINDOW_DAYS: u32 = 365;
pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";
pub const DEFAULT_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Everything one pipeline run needs, loaded once and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub render: TierScale,
    #[serde(default)]
    pub output: OutputConfig,
    pub contributors: Vec<Contributor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    Github(GithubConfig),
    Git(GitSourceConfig),
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Github(GithubConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GithubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// `owner/name` repositories scanned for email identities.
    #[serde(default)]
    pub repos: Vec<String>,
    /// Account or organisation whose owned repositories are scanned too.
    #[serde(default)]
    pub discover_owner: Option<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token_env: default_token_env(),
            repos: Vec::new(),
            discover_owner: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitSourceConfig {
    #[serde(default = "default_repo_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub include_merges: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_svg_path")]
    pub svg: PathBuf,
    #[serde(default = "default_summary_path")]
    pub summary: PathBuf,
    #[serde(default = "default_data_path")]
    pub data: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            svg: default_svg_path(),
            summary: default_summary_path(),
            data: default_data_path(),
        }
    }
}

fn default_title() -> String {
    "Contributions".to_string()
}

fn default_window_days() -> u32 {
    DEFAULT_WINDOW_DAYS
}

fn default_api_url() -> String {
    DEFAULT_GITHUB_API.to_string()
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

fn default_repo_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_svg_path() -> PathBuf {
    PathBuf::from("stats/contributions.svg")
}

fn default_summary_path() -> PathBuf {
    PathBuf::from("stats/README.md")
}

fn default_data_path() -> PathBuf {
    PathBuf::from("stats/contributions.json")
}

impl Config {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CommitGridError::Config(format!("Cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.contributors.is_empty() {
            return Err(CommitGridError::Config(
                "At least one contributor must be configured".to_string(),
            ));
        }
        if self.window_days == 0 {
            return Err(CommitGridError::Config("window_days must be at least 1".to_string()));
        }

        let mut ids = HashSet::new();
        for contributor in &self.contributors {
            if contributor.id.trim().is_empty() {
                return Err(CommitGridError::Config("Contributor id must not be empty".to_string()));
            }
            if !ids.insert(contributor.id.as_str()) {
                return Err(CommitGridError::Config(format!(
                    "Duplicate contributor id '{}'",
                    contributor.id
                )));
            }
            if contributor.identities().is_empty() {
                return Err(CommitGridError::Config(format!(
                    "Contributor '{}' has no logins or emails",
                    contributor.id
                )));
            }
        }

        if let SourceConfig::Github(github) = &self.source {
            for repo in &github.repos {
                match repo.split_once('/') {
                    Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {}
                    _ => {
                        return Err(CommitGridError::Config(format!(
                            "Repository '{repo}' must be in owner/name form"
                        )))
                    }
                }
            }
            if let Some(owner) = &github.discover_owner {
                if owner.trim().is_empty() || owner.contains('/') {
                    return Err(CommitGridError::Config(format!(
                        "source.discover_owner '{owner}' must be a bare account name"
                    )));
                }
            }
        }

        self.retry.validate()?;
        self.render.validate()?;
        Ok(())
    }
}
