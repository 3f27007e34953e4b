//! GitHub-backed commit source.
//!
//! Logins are answered from the GraphQL contribution calendar, emails by
//! scanning repositories through the REST commits endpoint. The scanned
//! repositories are the configured list plus, optionally, every repository
//! owned by `discover_owner`.

use crate::config::GithubConfig;
use crate::error::{CommitGridError, Result};
use crate::fetch::CommitSource;
use crate::model::{DateRange, DayCount, Identity};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, RETRY_AFTER, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tracing::{debug, warn};

const SOURCE_NAME: &str = "github";
const PER_PAGE: usize = 100;
const MAX_PAGES: usize = 10;
const MAX_DISCOVERY_PAGES: usize = 10;
/// contributionsCollection rejects spans longer than a year.
const MAX_CALENDAR_DAYS: i64 = 365;

const CALENDAR_QUERY: &str = r#"
query($login: String!, $from: DateTime!, $to: DateTime!) {
  user(login: $login) {
    contributionsCollection(from: $from, to: $to) {
      contributionCalendar {
        weeks {
          contributionDays {
            date
            contributionCount
          }
        }
      }
    }
  }
}
"#;

const DISCOVER_QUERY: &str = r#"
query($owner: String!, $cursor: String) {
  repositoryOwner(login: $owner) {
    repositories(first: 100, after: $cursor, ownerAffiliations: OWNER) {
      nodes {
        nameWithOwner
      }
      pageInfo {
        hasNextPage
        endCursor
      }
    }
  }
}
"#;

pub struct GithubSource {
    client: Client,
    api_url: String,
    token: Option<String>,
    repos: Vec<String>,
    discover_owner: Option<String>,
    resolved: RefCell<Option<Vec<String>>>,
}

impl GithubSource {
    pub fn from_config(config: &GithubConfig) -> Result<Self> {
        dotenvy::dotenv().ok();
        let token = std::env::var(&config.token_env)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if token.is_none() {
            warn!(env = %config.token_env, "no GitHub token found, requests are unauthenticated");
        }
        let source = Self::new(&config.api_url, token, config.repos.clone())?;
        Ok(source.discover_repos_of(config.discover_owner.clone()))
    }

    pub fn new(api_url: &str, token: Option<String>, repos: Vec<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CommitGridError::Config(format!("Cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
            repos,
            discover_owner: None,
            resolved: RefCell::new(None),
        })
    }

    /// Also scan every repository owned by `owner` for email identities.
    pub fn discover_repos_of(mut self, owner: Option<String>) -> Self {
        self.discover_owner = owner.filter(|o| !o.trim().is_empty());
        self
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("commitgrid/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        if let Some(token) = &self.token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers
    }

    fn calendar(&self, login: &str, range: &DateRange) -> Result<Vec<DayCount>> {
        if self.token.is_none() {
            return Err(CommitGridError::Config(format!(
                "GitHub GraphQL requires a token to look up login '{login}'"
            )));
        }

        let mut days = Vec::new();
        for chunk in calendar_chunks(range) {
            let body = json!({
                "query": CALENDAR_QUERY,
                "variables": {
                    "login": login,
                    "from": chunk.start_utc().to_rfc3339(),
                    "to": (chunk.end_utc_exclusive() - ChronoDuration::seconds(1)).to_rfc3339(),
                }
            });
            debug!(login, %chunk, "querying contribution calendar");
            let response = self
                .client
                .post(format!("{}/graphql", self.api_url))
                .headers(self.headers())
                .json(&body)
                .send()
                .map_err(transport_error)?;
            let payload: GraphqlResponse<CalendarData> = decode(check_status(response)?)?;
            days.extend(calendar_days(login, payload)?);
        }
        Ok(days)
    }

    fn commits_by_email(&self, email: &str, range: &DateRange) -> Result<Vec<DayCount>> {
        let repos = self.scan_targets()?;
        if repos.is_empty() {
            warn!(email, "email identity configured but no repositories to scan");
            return Ok(Vec::new());
        }
        scan_repos(&repos, |repo, page| self.commit_page(repo, email, range, page))
    }

    /// One page of `repo`'s commits by `email`, or `None` for an empty repository.
    fn commit_page(&self, repo: &str, email: &str, range: &DateRange, page: usize) -> Result<Option<Vec<CommitItem>>> {
        debug!(repo, email, page, "listing commits");
        let response = self
            .client
            .get(format!("{}/repos/{repo}/commits", self.api_url))
            .headers(self.headers())
            .query(&[
                ("author", email.to_string()),
                ("since", range.start_utc().to_rfc3339()),
                ("until", range.end_utc_exclusive().to_rfc3339()),
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ])
            .send()
            .map_err(transport_error)?;

        if response.status() == StatusCode::CONFLICT {
            return Ok(None);
        }
        decode(check_status(response)?).map(Some)
    }

    /// Configured repositories followed by discovered ones, resolved once.
    fn scan_targets(&self) -> Result<Vec<String>> {
        if let Some(repos) = self.resolved.borrow().as_ref() {
            return Ok(repos.clone());
        }
        let mut repos = self.repos.clone();
        if let Some(owner) = &self.discover_owner {
            let found = self.discover(owner)?;
            debug!(owner = %owner, repos = found.len(), "discovered repositories");
            repos.extend(found);
        }
        let repos = dedup_repos(repos);
        *self.resolved.borrow_mut() = Some(repos.clone());
        Ok(repos)
    }

    fn discover(&self, owner: &str) -> Result<Vec<String>> {
        if self.token.is_none() {
            return Err(CommitGridError::Config(format!(
                "GitHub GraphQL requires a token to discover repositories of '{owner}'"
            )));
        }

        let mut repos = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_DISCOVERY_PAGES {
            let body = json!({
                "query": DISCOVER_QUERY,
                "variables": { "owner": owner, "cursor": cursor },
            });
            let response = self
                .client
                .post(format!("{}/graphql", self.api_url))
                .headers(self.headers())
                .json(&body)
                .send()
                .map_err(transport_error)?;
            let payload: GraphqlResponse<DiscoverData> = decode(check_status(response)?)?;
            let (names, next) = discovered_repos(owner, payload)?;
            repos.extend(names);
            match next {
                Some(next) => cursor = Some(next),
                None => return Ok(repos),
            }
        }
        warn!(owner, "repository discovery truncated at {} pages", MAX_DISCOVERY_PAGES);
        Ok(repos)
    }
}

impl CommitSource for GithubSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn daily_counts(&self, identity: &Identity, range: &DateRange) -> Result<Vec<DayCount>> {
        match identity {
            Identity::Login(login) => self.calendar(login, range),
            Identity::Email(email) => self.commits_by_email(email, range),
        }
    }
}

/// Splits `range` into spans the calendar API accepts.
fn calendar_chunks(range: &DateRange) -> Vec<DateRange> {
    let mut chunks = Vec::new();
    let mut start = range.start;
    while start <= range.end {
        let end = (start + ChronoDuration::days(MAX_CALENDAR_DAYS - 1)).min(range.end);
        chunks.push(DateRange { start, end });
        start = end + ChronoDuration::days(1);
    }
    chunks
}

/// Counts commits per author day across `repos`, paging each listing with
/// `fetch_page(repo, page)` until a short page, an empty repository
/// (`None`) or the page cap.
fn scan_repos<F>(repos: &[String], mut fetch_page: F) -> Result<Vec<DayCount>>
where
    F: FnMut(&str, usize) -> Result<Option<Vec<CommitItem>>>,
{
    let mut by_date: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for repo in repos {
        let mut found = 0usize;
        for page in 1..=MAX_PAGES {
            let Some(items) = fetch_page(repo.as_str(), page)? else {
                debug!(repo = %repo, "repository is empty");
                break;
            };
            for date in commit_dates(&items) {
                *by_date.entry(date).or_insert(0) += 1;
            }
            found += items.len();
            if items.len() < PER_PAGE {
                break;
            }
            if page == MAX_PAGES {
                warn!(repo = %repo, "commit listing truncated at {} pages", MAX_PAGES);
            }
        }
        debug!(repo = %repo, commits = found, "scanned repository");
    }

    Ok(by_date
        .into_iter()
        .map(|(date, count)| DayCount { date, count })
        .collect())
}

/// Drops repeated `owner/name` entries, ignoring case, keeping first order.
fn dedup_repos(repos: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    repos
        .into_iter()
        .filter(|repo| seen.insert(repo.to_lowercase()))
        .collect()
}

fn transport_error(err: reqwest::Error) -> CommitGridError {
    CommitGridError::transient(SOURCE_NAME, format!("request failed: {err}"))
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let err = classify_status(status, response.headers(), Utc::now());
    let body = response.text().unwrap_or_default();
    debug!(%status, body = %body.chars().take(300).collect::<String>(), "github error response");
    Err(err)
}

fn classify_status(status: StatusCode, headers: &HeaderMap, now: DateTime<Utc>) -> CommitGridError {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim);

    let exhausted = header("x-ratelimit-remaining") == Some("0");
    let retry_after = header(RETRY_AFTER.as_str()).and_then(|v| v.parse::<u64>().ok());
    if status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && (exhausted || retry_after.is_some()))
    {
        let reset = header("x-ratelimit-reset")
            .and_then(|v| v.parse::<i64>().ok())
            .map(|epoch| Duration::from_secs(epoch.saturating_sub(now.timestamp()).max(0) as u64));
        return CommitGridError::RateLimited {
            source_name: SOURCE_NAME.to_string(),
            retry_after: retry_after.map(Duration::from_secs).or(reset),
        };
    }

    if status.is_server_error() {
        CommitGridError::transient(SOURCE_NAME, format!("server returned {status}"))
    } else {
        CommitGridError::permanent(SOURCE_NAME, format!("request rejected with {status}"))
    }
}

fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let text = response.text().map_err(transport_error)?;
    serde_json::from_str(&text)
        .map_err(|e| CommitGridError::permanent(SOURCE_NAME, format!("malformed response: {e}")))
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct CalendarData {
    user: Option<CalendarUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarUser {
    contributions_collection: ContributionsCollection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContributionsCollection {
    contribution_calendar: ContributionCalendar,
}

#[derive(Debug, Deserialize)]
struct ContributionCalendar {
    weeks: Vec<CalendarWeek>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarWeek {
    contribution_days: Vec<CalendarDay>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarDay {
    date: NaiveDate,
    contribution_count: u32,
}

fn calendar_days(login: &str, payload: GraphqlResponse<CalendarData>) -> Result<Vec<DayCount>> {
    if !payload.errors.is_empty() {
        let messages: Vec<_> = payload.errors.into_iter().map(|e| e.message).collect();
        return Err(CommitGridError::permanent(SOURCE_NAME, messages.join("; ")));
    }
    let user = payload
        .data
        .and_then(|d| d.user)
        .ok_or_else(|| CommitGridError::permanent(SOURCE_NAME, format!("no such user '{login}'")))?;

    Ok(user
        .contributions_collection
        .contribution_calendar
        .weeks
        .into_iter()
        .flat_map(|w| w.contribution_days)
        .map(|d| DayCount {
            date: d.date,
            count: d.contribution_count,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscoverData {
    repository_owner: Option<DiscoverOwner>,
}

#[derive(Debug, Deserialize)]
struct DiscoverOwner {
    repositories: RepositoryConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryConnection {
    nodes: Vec<RepositoryNode>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryNode {
    name_with_owner: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

/// Repository names on one discovery page and the cursor of the next page.
fn discovered_repos(owner: &str, payload: GraphqlResponse<DiscoverData>) -> Result<(Vec<String>, Option<String>)> {
    if !payload.errors.is_empty() {
        let messages: Vec<_> = payload.errors.into_iter().map(|e| e.message).collect();
        return Err(CommitGridError::permanent(SOURCE_NAME, messages.join("; ")));
    }
    let connection = payload
        .data
        .and_then(|d| d.repository_owner)
        .ok_or_else(|| CommitGridError::permanent(SOURCE_NAME, format!("no such owner '{owner}'")))?
        .repositories;

    let names = connection
        .nodes
        .into_iter()
        .map(|n| n.name_with_owner)
        .filter(|n| !n.is_empty())
        .collect();
    let next = if connection.page_info.has_next_page {
        connection.page_info.end_cursor
    } else {
        None
    };
    Ok((names, next))
}

#[derive(Debug, Deserialize)]
struct CommitItem {
    commit: CommitBody,
}

#[derive(Debug, Deserialize)]
struct CommitBody {
    author: Option<CommitActor>,
    committer: Option<CommitActor>,
}

#[derive(Debug, Deserialize)]
struct CommitActor {
    date: DateTime<Utc>,
}

/// Author date of each commit, falling back to the committer date.
fn commit_dates(items: &[CommitItem]) -> impl Iterator<Item = NaiveDate> + '_ {
    items.iter().filter_map(|item| {
        item.commit
            .author
            .as_ref()
            .or(item.commit.committer.as_ref())
            .map(|actor| actor.date.date_naive())
    })
}
