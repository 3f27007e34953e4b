use crate::error::{CommitGridError, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Human,
    Agent,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Human => write!(f, "human"),
            Role::Agent => write!(f, "agent"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Contributor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub logins: Vec<String>,
    #[serde(default)]
    pub emails: Vec<String>,
}

impl Contributor {
    /// Every identity this contributor commits under, case-insensitively
    /// deduplicated and in declaration order (logins first).
    pub fn identities(&self) -> Vec<Identity> {
        let mut seen = HashSet::new();
        let logins = self.logins.iter().map(|l| Identity::Login(l.trim().to_string()));
        let emails = self.emails.iter().map(|e| Identity::Email(e.trim().to_string()));

        logins
            .chain(emails)
            .filter(|identity| !identity.value().is_empty())
            .filter(|identity| seen.insert(identity.key()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Login(String),
    Email(String),
}

impl Identity {
    pub fn value(&self) -> &str {
        match self {
            Identity::Login(v) | Identity::Email(v) => v,
        }
    }

    fn key(&self) -> (u8, String) {
        match self {
            Identity::Login(v) => (0, v.to_lowercase()),
            Identity::Email(v) => (1, v.to_lowercase()),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Login(v) => write!(f, "login:{v}"),
            Identity::Email(v) => write!(f, "email:{v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionRecord {
    pub contributor_id: String,
    pub date: NaiveDate,
    pub commit_count: u32,
}

impl ContributionRecord {
    pub fn new(contributor_id: impl Into<String>, date: NaiveDate, commit_count: u32) -> Self {
        Self {
            contributor_id: contributor_id.into(),
            date,
            commit_count,
        }
    }
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(CommitGridError::InvalidDate(format!(
                "Invalid range: start ({start}) is after end ({end})"
            )));
        }
        Ok(Self { start, end })
    }

    /// The `days` calendar days ending on (and including) `end`.
    pub fn trailing(end: NaiveDate, days: u32) -> Result<Self> {
        if days == 0 {
            return Err(CommitGridError::InvalidDate(
                "Window must span at least one day".to_string(),
            ));
        }
        let start = end
            .checked_sub_signed(Duration::days(i64::from(days) - 1))
            .ok_or_else(|| CommitGridError::InvalidDate(format!("Window of {days} days before {end} underflows")))?;
        Ok(Self { start, end })
    }

    pub fn len(&self) -> usize {
        ((self.end - self.start).num_days() + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    pub fn start_utc(&self) -> DateTime<Utc> {
        self.start.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    /// First instant after the range, exclusive bound for timestamp queries.
    pub fn end_utc_exclusive(&self) -> DateTime<Utc> {
        (self.end + Duration::days(1)).and_time(chrono::NaiveTime::MIN).and_utc()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCount {
    pub date: NaiveDate,
    pub count: u32,
}

/// Dense per-day commit series for one contributor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarGrid {
    pub contributor_id: String,
    pub days: Vec<DayCount>,
}

impl CalendarGrid {
    pub fn total(&self) -> u64 {
        self.days.iter().map(|d| u64::from(d.count)).sum()
    }

    pub fn active_days(&self) -> usize {
        self.days.iter().filter(|d| d.count > 0).count()
    }

    pub fn range(&self) -> Option<DateRange> {
        let first = self.days.first()?;
        let last = self.days.last()?;
        Some(DateRange {
            start: first.date,
            end: last.date,
        })
    }

    /// Checks that dates are strictly increasing one day at a time.
    pub fn validate(&self) -> Result<()> {
        if self.days.is_empty() {
            return Err(CommitGridError::Render(format!(
                "Grid for '{}' has no days",
                self.contributor_id
            )));
        }
        for pair in self.days.windows(2) {
            if pair[1].date != pair[0].date + Duration::days(1) {
                return Err(CommitGridError::Render(format!(
                    "Grid for '{}' is not consecutive: {} followed by {}",
                    self.contributor_id, pair[0].date, pair[1].date
                )));
            }
        }
        Ok(())
    }

    pub fn sparse(&self) -> BTreeMap<NaiveDate, u32> {
        self.days
            .iter()
            .filter(|d| d.count > 0)
            .map(|d| (d.date, d.count))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StreakStats {
    pub total_commits: u64,
    pub active_days: usize,
    pub current_streak: usize,
    pub max_streak: usize,
    pub busiest_day: Option<DayCount>,
}

/// Commits credited through login identities (the account's contribution
/// calendar) versus email identities (found by scanning repositories).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CountBreakdown {
    pub official_count: u64,
    pub manual_count: u64,
}

impl CountBreakdown {
    pub fn record(&mut self, identity: &Identity, commits: u32) {
        let slot = match identity {
            Identity::Login(_) => &mut self.official_count,
            Identity::Email(_) => &mut self.manual_count,
        };
        *slot = slot.saturating_add(u64::from(commits));
    }

    pub fn merge(self, other: CountBreakdown) -> CountBreakdown {
        CountBreakdown {
            official_count: self.official_count.saturating_add(other.official_count),
            manual_count: self.manual_count.saturating_add(other.manual_count),
        }
    }

    pub fn total(&self) -> u64 {
        self.official_count.saturating_add(self.manual_count)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributorSnapshot {
    pub id: String,
    pub name: String,
    pub role: Role,
    #[serde(flatten)]
    pub stats: StreakStats,
    #[serde(flatten)]
    pub breakdown: CountBreakdown,
    pub contributions_by_date: BTreeMap<NaiveDate, u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotOutput {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub source: String,
    pub range: DateRange,
    pub combined: StreakStats,
    #[serde(flatten)]
    pub breakdown: CountBreakdown,
    pub contributors: Vec<ContributorSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridOutput {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub range: DateRange,
    pub grids: Vec<CalendarGrid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn trailing_window_includes_end_day() {
        let range = DateRange::trailing(date("2024-03-10"), 7).unwrap();
        assert_eq!(range.start, date("2024-03-04"));
        assert_eq!(range.len(), 7);
        assert_eq!(range.days().count(), 7);
    }

    #[test]
    fn trailing_window_crosses_leap_day() {
        let range = DateRange::trailing(date("2024-12-31"), 366).unwrap();
        assert_eq!(range.start, date("2024-01-01"));
    }

    #[test]
    fn rejects_inverted_range() {
        assert!(DateRange::new(date("2024-02-02"), date("2024-02-01")).is_err());
        assert!(DateRange::trailing(date("2024-02-02"), 0).is_err());
    }

    #[test]
    fn identities_are_deduplicated_case_insensitively() {
        let contributor = Contributor {
            id: "a".to_string(),
            name: "A".to_string(),
            role: Role::Human,
            logins: vec!["Octo".to_string(), "octo".to_string()],
            emails: vec!["a@x.io".to_string(), " A@X.io ".to_string(), String::new()],
        };
        assert_eq!(
            contributor.identities(),
            vec![
                Identity::Login("Octo".to_string()),
                Identity::Email("a@x.io".to_string())
            ]
        );
    }

    #[test]
    fn validate_rejects_gaps_and_duplicates() {
        let gap = CalendarGrid {
            contributor_id: "a".to_string(),
            days: vec![
                DayCount { date: date("2024-01-01"), count: 0 },
                DayCount { date: date("2024-01-03"), count: 0 },
            ],
        };
        assert!(matches!(gap.validate(), Err(CommitGridError::Render(_))));

        let dup = CalendarGrid {
            contributor_id: "a".to_string(),
            days: vec![
                DayCount { date: date("2024-01-01"), count: 0 },
                DayCount { date: date("2024-01-01"), count: 1 },
            ],
        };
        assert!(dup.validate().is_err());
    }

    #[test]
    fn breakdown_splits_by_identity_kind() {
        let mut breakdown = CountBreakdown::default();
        breakdown.record(&Identity::Login("octo".to_string()), 4);
        breakdown.record(&Identity::Email("octo@example.com".to_string()), 2);
        breakdown.record(&Identity::Login("octo-alt".to_string()), 1);
        assert_eq!(breakdown, CountBreakdown { official_count: 5, manual_count: 2 });

        let merged = breakdown.merge(CountBreakdown { official_count: 1, manual_count: 1 });
        assert_eq!(merged.total(), 9);
    }
}
