// github module — API access layer

pub mod auth;
pub mod client;
pub mod graphql;
pub mod rate_limit;
pub mod stub;

pub use client::GitHubApi;
pub use stub::StubApi;

use anyhow::Result;

use crate::types::{Account, PullRequest, RemoteRepository};

/// Backend seam between the pull-request store and the GitHub API.
///
/// Implemented by both [`GitHubApi`] and [`StubApi`].
pub trait PullRequestApi: Send + Sync + 'static {
    /// Fetch the open pull requests for `remote`, newest first.
    fn fetch_open_pull_requests(
        &self,
        account: &Account,
        remote: &RemoteRepository,
    ) -> impl Future<Output = Result<Vec<PullRequest>>> + Send;
}
