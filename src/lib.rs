pub mod aggregate;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod git;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod stats;

pub use config::Config;
pub use error::{CommitGridError, Result};
pub use pipeline::{run, RunOutput};
