use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};

use crate::emitter::{Emitter, Subscription};
use crate::github::PullRequestApi;
use crate::registry::RepositoryRegistry;
use crate::store::PullRequestStore;
use crate::types::{Account, LocalRepository, PullRequest, RemoteRepository};
use crate::updater::{DEFAULT_REFRESH_INTERVAL, PullRequestUpdater};

/// Maps store events keyed by remote repository onto the local repositories
/// they describe, and owns the background updater.
///
/// Consumers think in local repositories; the store thinks in remotes. One
/// remote feed can describe several locals at once, since a clone of a fork
/// reads the upstream feed. A single store event therefore fans out to one
/// callback per matching local, in registry order.
pub struct PullRequestCoordinator<A: PullRequestApi> {
    store: Arc<PullRequestStore<A>>,
    repositories: Arc<Mutex<Vec<LocalRepository>>>,
    updater: Mutex<Option<PullRequestUpdater<A>>>,
    updater_interval: Duration,
    prs_changed: Arc<Emitter<(LocalRepository, Vec<PullRequest>)>>,
    loading_changed: Arc<Emitter<(LocalRepository, bool)>>,
    // Keeps the registry and store subscriptions alive for the
    // coordinator's lifetime.
    _subscriptions: Vec<Subscription>,
}

impl<A: PullRequestApi> PullRequestCoordinator<A> {
    /// Wire the coordinator to `store` and `registry`.
    ///
    /// Subscriptions are established once, here; consumer callbacks
    /// registered later all share them.
    pub fn new(store: Arc<PullRequestStore<A>>, registry: &RepositoryRegistry) -> Self {
        let repositories = Arc::new(Mutex::new(with_remotes(registry.all_repositories())));
        let prs_changed = Arc::new(Emitter::new());
        let loading_changed = Arc::new(Emitter::new());

        let mut subscriptions = Vec::new();

        // Registry updates replace the snapshot wholesale.
        {
            let repositories = Arc::clone(&repositories);
            subscriptions.push(registry.on_did_update(move |all| {
                let snapshot = with_remotes(all.to_vec());
                tracing::debug!(
                    "coordinator: tracking {} repositories with remotes",
                    snapshot.len()
                );
                *repositories.lock().unwrap() = snapshot;
            }));
        }

        // Store events are re-keyed from the remote to every matching local.
        {
            let repositories = Arc::clone(&repositories);
            let emitter = Arc::clone(&prs_changed);
            subscriptions.push(store.on_pull_requests_changed(move |remote, pull_requests| {
                for local in matching_repositories(&repositories, remote) {
                    emitter.emit(&(local, pull_requests.to_vec()));
                }
            }));
        }
        {
            let repositories = Arc::clone(&repositories);
            let emitter = Arc::clone(&loading_changed);
            subscriptions.push(store.on_is_loading_changed(move |remote, is_loading| {
                for local in matching_repositories(&repositories, remote) {
                    emitter.emit(&(local, is_loading));
                }
            }));
        }

        Self {
            store,
            repositories,
            updater: Mutex::new(None),
            updater_interval: DEFAULT_REFRESH_INTERVAL,
            prs_changed,
            loading_changed,
            _subscriptions: subscriptions,
        }
    }

    /// Interval handed to updaters started by `start_pull_request_updater`.
    pub fn with_updater_interval(mut self, interval: Duration) -> Self {
        self.updater_interval = interval;
        self
    }

    /// Register for `(local repository, pull requests)` events.
    ///
    /// Fired once per matching local repository each time a remote feed
    /// changes. A feed with no matching repository fires nothing, which is
    /// not an error.
    pub fn on_pull_requests_changed(
        &self,
        callback: impl Fn(&LocalRepository, &[PullRequest]) + Send + Sync + 'static,
    ) -> Subscription {
        self.prs_changed
            .subscribe(move |(repository, pull_requests)| callback(repository, pull_requests))
    }

    /// Register for `(local repository, is_loading)` events.
    pub fn on_is_loading_pull_requests(
        &self,
        callback: impl Fn(&LocalRepository, bool) + Send + Sync + 'static,
    ) -> Subscription {
        self.loading_changed
            .subscribe(move |(repository, is_loading)| callback(repository, *is_loading))
    }

    /// Refresh the feed behind `repository`'s remote.
    ///
    /// Delegates to the store; fetch errors propagate unchanged. Callbacks
    /// fire through the store subscription as part of the refresh itself,
    /// before this returns.
    pub async fn refresh_pull_requests(
        &self,
        repository: &LocalRepository,
        account: &Account,
    ) -> Result<()> {
        let remote = require_remote(repository)?;
        self.store.refresh_pull_requests(remote, account).await
    }

    /// Cached pull requests for `repository`'s remote.
    ///
    /// Empty when the repository has no remote or nothing has been fetched
    /// yet.
    pub fn get_all_pull_requests(&self, repository: &LocalRepository) -> Vec<PullRequest> {
        repository
            .remote
            .as_ref()
            .map(|remote| self.store.pull_requests(remote))
            .unwrap_or_default()
    }

    /// Start background polling for `repository`, replacing any updater
    /// already running.
    ///
    /// At most one updater is alive at a time; the previous one is stopped
    /// before the new one starts and receives no further interaction.
    pub fn start_pull_request_updater(
        &self,
        repository: &LocalRepository,
        account: &Account,
    ) -> Result<()> {
        let remote = require_remote(repository)?;

        let mut slot = self.updater.lock().unwrap();
        if let Some(mut previous) = slot.take() {
            previous.stop();
        }

        let mut updater =
            PullRequestUpdater::new(remote.clone(), account.clone(), Arc::clone(&self.store))
                .with_interval(self.updater_interval);
        updater.start();
        *slot = Some(updater);
        Ok(())
    }

    /// Stop the background updater if one is running; otherwise a no-op.
    pub fn stop_pull_request_updater(&self) {
        if let Some(mut updater) = self.updater.lock().unwrap().take() {
            updater.stop();
        }
    }
}

/// Keep only repositories that can be mapped to a remote feed.
fn with_remotes(repositories: Vec<LocalRepository>) -> Vec<LocalRepository> {
    repositories
        .into_iter()
        .filter(|repository| repository.remote.is_some())
        .collect()
}

/// Locals whose remote reads the feed of `remote`, in snapshot order.
///
/// The guard is released before the caller invokes any callback.
fn matching_repositories(
    repositories: &Mutex<Vec<LocalRepository>>,
    remote: &RemoteRepository,
) -> Vec<LocalRepository> {
    repositories
        .lock()
        .unwrap()
        .iter()
        .filter(|local| {
            local
                .remote
                .as_ref()
                .is_some_and(|r| r.shares_feed_with(remote))
        })
        .cloned()
        .collect()
}

fn require_remote(repository: &LocalRepository) -> Result<&RemoteRepository> {
    match &repository.remote {
        Some(remote) => Ok(remote),
        None => bail!(
            "repository {} has no GitHub remote",
            repository.path.display()
        ),
    }
}
