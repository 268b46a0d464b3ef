use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{Result, bail};

use crate::types::{Account, PullRequest, RemoteRepository, RepoRef};

use super::PullRequestApi;

/// Record of one `fetch_open_pull_requests` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCall {
    pub slug: RepoRef,
    pub db_id: u64,
}

/// A stub backend serving pre-loaded pull requests without any network calls.
///
/// Useful for integration tests and demos that must not require a GitHub
/// token. Every fetch is recorded so tests can assert which remote was
/// actually queried.
#[derive(Default)]
pub struct StubApi {
    pull_requests: Mutex<HashMap<u64, Vec<PullRequest>>>,
    failing: Mutex<HashSet<u64>>,
    calls: Mutex<Vec<FetchCall>>,
}

impl StubApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `pull_requests` for fetches of the repository with `db_id`.
    pub fn set_pull_requests(&self, db_id: u64, pull_requests: Vec<PullRequest>) {
        self.pull_requests
            .lock()
            .unwrap()
            .insert(db_id, pull_requests);
    }

    /// Make subsequent fetches for `db_id` fail.
    pub fn fail_for(&self, db_id: u64) {
        self.failing.lock().unwrap().insert(db_id);
    }

    /// All fetches issued so far, oldest first.
    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of fetches issued for `db_id`.
    pub fn call_count(&self, db_id: u64) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.db_id == db_id)
            .count()
    }
}

impl PullRequestApi for StubApi {
    async fn fetch_open_pull_requests(
        &self,
        _account: &Account,
        remote: &RemoteRepository,
    ) -> Result<Vec<PullRequest>> {
        self.calls.lock().unwrap().push(FetchCall {
            slug: remote.slug.clone(),
            db_id: remote.db_id,
        });

        if self.failing.lock().unwrap().contains(&remote.db_id) {
            bail!("stub failure for {}", remote.slug);
        }
        Ok(self
            .pull_requests
            .lock()
            .unwrap()
            .get(&remote.db_id)
            .cloned()
            .unwrap_or_default())
    }
}
