use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::emitter::{Emitter, Subscription};
use crate::github::PullRequestApi;
use crate::types::{Account, PullRequest, RemoteRepository};

/// In-memory pull-request cache, keyed by remote repository.
///
/// One feed per remote: a refresh replaces the cached list wholesale and
/// notifies subscribers. Concurrent refreshes of the same remote are not
/// coalesced; the last completed fetch wins.
pub struct PullRequestStore<A> {
    api: A,
    pull_requests: Mutex<HashMap<u64, Vec<PullRequest>>>,
    last_refreshed: Mutex<HashMap<u64, DateTime<Utc>>>,
    prs_changed: Emitter<(RemoteRepository, Vec<PullRequest>)>,
    loading_changed: Emitter<(RemoteRepository, bool)>,
}

impl<A: PullRequestApi> PullRequestStore<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            pull_requests: Mutex::new(HashMap::new()),
            last_refreshed: Mutex::new(HashMap::new()),
            prs_changed: Emitter::new(),
            loading_changed: Emitter::new(),
        }
    }

    /// The backend this store fetches through.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Fetch the open pull requests for `remote` and replace the cached list.
    ///
    /// The loading event brackets the fetch; false is emitted even when the
    /// fetch fails. The changed event fires on success only. Fetch errors
    /// propagate to the caller unchanged.
    pub async fn refresh_pull_requests(
        &self,
        remote: &RemoteRepository,
        account: &Account,
    ) -> Result<()> {
        tracing::debug!("store: refreshing {}", remote.slug);
        self.loading_changed.emit(&(remote.clone(), true));

        let result = match self.api.fetch_open_pull_requests(account, remote).await {
            Ok(pull_requests) => {
                self.pull_requests
                    .lock()
                    .unwrap()
                    .insert(remote.db_id, pull_requests.clone());
                self.last_refreshed
                    .lock()
                    .unwrap()
                    .insert(remote.db_id, Utc::now());
                tracing::debug!(
                    "store: {} has {} open pull requests",
                    remote.slug,
                    pull_requests.len()
                );
                self.prs_changed.emit(&(remote.clone(), pull_requests));
                Ok(())
            }
            Err(e) => Err(e),
        };

        self.loading_changed.emit(&(remote.clone(), false));
        result
    }

    /// Cached open pull requests for `remote`; empty when nothing is cached.
    pub fn pull_requests(&self, remote: &RemoteRepository) -> Vec<PullRequest> {
        self.pull_requests
            .lock()
            .unwrap()
            .get(&remote.db_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Wall-clock time of the last successful refresh of `remote`.
    pub fn last_refreshed(&self, remote: &RemoteRepository) -> Option<DateTime<Utc>> {
        self.last_refreshed
            .lock()
            .unwrap()
            .get(&remote.db_id)
            .copied()
    }

    /// Register for `(remote, pull requests)` events fired after each
    /// successful refresh.
    pub fn on_pull_requests_changed(
        &self,
        callback: impl Fn(&RemoteRepository, &[PullRequest]) + Send + Sync + 'static,
    ) -> Subscription {
        self.prs_changed
            .subscribe(move |(remote, pull_requests)| callback(remote, pull_requests))
    }

    /// Register for `(remote, is_loading)` events bracketing each refresh.
    pub fn on_is_loading_changed(
        &self,
        callback: impl Fn(&RemoteRepository, bool) + Send + Sync + 'static,
    ) -> Subscription {
        self.loading_changed
            .subscribe(move |(remote, is_loading)| callback(remote, *is_loading))
    }
}
