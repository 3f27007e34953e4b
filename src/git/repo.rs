use crate::error::{CommitGridError, Result};
use crate::fetch::CommitSource;
use crate::model::{DateRange, DayCount, Identity};
use chrono::{DateTime, NaiveDate};
use gix::{discover, ObjectId, Repository};
use indicatif::{ProgressBar, ProgressStyle};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthoredCommit {
    pub author_name: String,
    pub author_email: String,
    pub date: NaiveDate,
}

impl AuthoredCommit {
    pub fn matches(&self, identity: &Identity) -> bool {
        let wanted = identity.value();
        match identity {
            Identity::Email(_) => self.author_email.eq_ignore_ascii_case(wanted),
            Identity::Login(_) => {
                self.author_name.eq_ignore_ascii_case(wanted) || self.author_email.eq_ignore_ascii_case(wanted)
            }
        }
    }
}

/// Local repository used as a commit source.
pub struct GitRepo {
    repo: Repository,
    path: PathBuf,
    include_merges: bool,
    walked: RefCell<Option<(DateRange, Vec<AuthoredCommit>)>>,
}

impl GitRepo {
    /// Open a repository at `path`, or current dir if `None`
    pub fn open<P: AsRef<Path>>(path: Option<P>, include_merges: bool) -> Result<Self> {
        let repo_path = path
            .map(|p| p.as_ref().to_path_buf())
            .unwrap_or(std::env::current_dir()?);

        let repo = discover(&repo_path)?;
        let path = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();

        Ok(Self {
            repo,
            path,
            include_merges,
            walked: RefCell::new(None),
        })
    }

    /// Every commit reachable from HEAD whose author date falls inside `range`.
    pub fn collect_commits(&self, range: &DateRange) -> Result<Vec<AuthoredCommit>> {
        let mut head = self.repo.head()?;
        if head.is_unborn() {
            debug!(path = %self.path.display(), "repository has no commits");
            return Ok(Vec::new());
        }
        let head_commit = head.peel_to_commit_in_place()?;

        let mut commits = Vec::new();
        let mut seen: HashSet<ObjectId> = HashSet::new();
        let mut stack: VecDeque<ObjectId> = VecDeque::from([head_commit.id]);

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("Walking history...");

        while let Some(commit_id) = stack.pop_back() {
            if !seen.insert(commit_id) {
                continue;
            }

            let commit = self.repo.find_commit(commit_id)?;
            let author = commit.author()?;
            let secs = author
                .time()
                .map_err(|e| CommitGridError::InvalidDate(format!("Unparseable author time on {commit_id}: {e}")))?
                .seconds;
            let timestamp = DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| CommitGridError::InvalidDate(format!("Invalid timestamp: {secs}")))?;

            let parents: Vec<ObjectId> = commit.parent_ids().map(|id| id.into()).collect();
            let date = timestamp.date_naive();

            let skip_merge = !self.include_merges && parents.len() > 1;
            if range.contains(date) && !skip_merge {
                commits.push(AuthoredCommit {
                    author_name: author.name.to_string(),
                    author_email: author.email.to_string(),
                    date,
                });
            }

            for pid in parents {
                stack.push_back(pid);
            }

            pb.inc(1);
        }

        pb.finish_and_clear();
        debug!(path = %self.path.display(), commits = commits.len(), %range, "walked history");
        Ok(commits)
    }

    fn commits_in(&self, range: &DateRange) -> Result<Vec<AuthoredCommit>> {
        if let Some((cached_range, commits)) = self.walked.borrow().as_ref() {
            if cached_range == range {
                return Ok(commits.clone());
            }
        }
        let commits = self.collect_commits(range)?;
        *self.walked.borrow_mut() = Some((*range, commits.clone()));
        Ok(commits)
    }
}

impl CommitSource for GitRepo {
    fn name(&self) -> &str {
        "git"
    }

    fn daily_counts(&self, identity: &Identity, range: &DateRange) -> Result<Vec<DayCount>> {
        let mut by_date: BTreeMap<NaiveDate, u32> = BTreeMap::new();
        for commit in self.commits_in(range)?.iter().filter(|c| c.matches(identity)) {
            *by_date.entry(commit.date).or_insert(0) += 1;
        }
        Ok(by_date
            .into_iter()
            .map(|(date, count)| DayCount { date, count })
            .collect())
    }
}
