use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CommitGridError>;

#[derive(Error, Debug)]
pub enum CommitGridError {
    #[error("Fetch error from {source_name}: {message}")]
    Fetch {
        source_name: String,
        message: String,
        transient: bool,
    },
    #[error("Rate limited by {source_name}{}", retry_suffix(.retry_after))]
    RateLimited {
        source_name: String,
        retry_after: Option<Duration>,
    },
    #[error("Render error: {0}")]
    Render(String),
    #[error("Write error for {}: {message}", .path.display())]
    Write { path: PathBuf, message: String },
    #[error("Config error: {0}")]
    Config(String),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Git error: {0}")]
    Git(#[from] Box<gix::discover::Error>),
    #[error("Reference find error: {0}")]
    RefFind(#[from] Box<gix::reference::find::existing::Error>),
    #[error("Head peel error: {0}")]
    HeadPeel(#[from] Box<gix::head::peel::to_commit::Error>),
    #[error("Object find with conversion error: {0}")]
    ObjectFindConv(#[from] Box<gix::object::find::existing::with_conversion::Error>),
    #[error("Object decode error: {0}")]
    ObjectDecode(#[from] Box<gix::objs::decode::Error>),
}

fn retry_suffix(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|d| format!(" (retry after {}s)", d.as_secs()))
        .unwrap_or_default()
}

impl CommitGridError {
    /// Upstream failure that is worth another attempt.
    pub fn transient(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        CommitGridError::Fetch {
            source_name: source_name.into(),
            message: message.into(),
            transient: true,
        }
    }

    /// Upstream answered, but with something we cannot use.
    pub fn permanent(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        CommitGridError::Fetch {
            source_name: source_name.into(),
            message: message.into(),
            transient: false,
        }
    }

    pub fn write(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        CommitGridError::Write {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            CommitGridError::Fetch { transient, .. } => *transient,
            CommitGridError::RateLimited { .. } => true,
            _ => false,
        }
    }

    /// Delay requested by the upstream, if it sent one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            CommitGridError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

// Manual From implementations for unboxed to boxed conversions
impl From<gix::discover::Error> for CommitGridError {
    fn from(err: gix::discover::Error) -> Self {
        CommitGridError::Git(Box::new(err))
    }
}

impl From<gix::reference::find::existing::Error> for CommitGridError {
    fn from(err: gix::reference::find::existing::Error) -> Self {
        CommitGridError::RefFind(Box::new(err))
    }
}

impl From<gix::head::peel::to_commit::Error> for CommitGridError {
    fn from(err: gix::head::peel::to_commit::Error) -> Self {
        CommitGridError::HeadPeel(Box::new(err))
    }
}

impl From<gix::object::find::existing::with_conversion::Error> for CommitGridError {
    fn from(err: gix::object::find::existing::with_conversion::Error) -> Self {
        CommitGridError::ObjectFindConv(Box::new(err))
    }
}

impl From<gix::objs::decode::Error> for CommitGridError {
    fn from(err: gix::objs::decode::Error) -> Self {
        CommitGridError::ObjectDecode(Box::new(err))
    }
}
