mod repo;

pub use repo::{AuthoredCommit, GitRepo};
