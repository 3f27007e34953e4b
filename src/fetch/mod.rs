pub mod github;
pub mod retry;

pub use github::GithubSource;
pub use retry::RetryPolicy;

use crate::error::Result;
use crate::model::{Contributor, ContributionRecord, CountBreakdown, DateRange, DayCount, Identity};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

/// Read-only view of some commit history.
///
/// Implementations answer for a single identity at a time; the returned
/// days may repeat, may fall outside `range` and may omit zero days.
pub trait CommitSource {
    fn name(&self) -> &str;

    fn daily_counts(&self, identity: &Identity, range: &DateRange) -> Result<Vec<DayCount>>;
}

/// Merged records plus, per contributor id, how the commits split between
/// login and email identities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fetched {
    pub records: Vec<ContributionRecord>,
    pub breakdown: BTreeMap<String, CountBreakdown>,
}

pub struct Fetcher<'a> {
    source: &'a dyn CommitSource,
    retry: RetryPolicy,
    sleep: Box<dyn Fn(Duration) + 'a>,
}

impl<'a> Fetcher<'a> {
    pub fn new(source: &'a dyn CommitSource, retry: RetryPolicy) -> Self {
        Self {
            source,
            retry,
            sleep: Box::new(std::thread::sleep),
        }
    }

    pub fn with_sleep(mut self, sleep: impl Fn(Duration) + 'a) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    /// Queries every identity of every contributor and merges them into
    /// one record per contributor per active day.
    pub fn fetch(&self, contributors: &[Contributor], range: &DateRange) -> Result<Fetched> {
        let mut fetched = Fetched::default();

        for contributor in contributors {
            let mut merged: BTreeMap<NaiveDate, u32> = BTreeMap::new();
            let mut breakdown = CountBreakdown::default();

            for identity in contributor.identities() {
                let what = format!("{} query for {identity}", self.source.name());
                let days = self.retry.run(
                    &what,
                    || self.source.daily_counts(&identity, range),
                    |delay| (self.sleep)(delay),
                )?;
                debug!(contributor = %contributor.id, %identity, days = days.len(), "fetched");

                for day in days {
                    if day.count == 0 {
                        continue;
                    }
                    if !range.contains(day.date) {
                        debug!(%identity, date = %day.date, "dropping day outside window");
                        continue;
                    }
                    let slot = merged.entry(day.date).or_insert(0);
                    *slot = slot.saturating_add(day.count);
                    breakdown.record(&identity, day.count);
                }
            }

            info!(
                contributor = %contributor.id,
                active_days = merged.len(),
                commits = merged.values().map(|c| u64::from(*c)).sum::<u64>(),
                official = breakdown.official_count,
                manual = breakdown.manual_count,
                "collected contributions"
            );

            fetched.records.extend(
                merged
                    .into_iter()
                    .map(|(date, count)| ContributionRecord::new(contributor.id.clone(), date, count)),
            );
            fetched.breakdown.insert(contributor.id.clone(), breakdown);
        }

        Ok(fetched)
    }
}
