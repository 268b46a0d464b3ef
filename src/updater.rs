use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::github::PullRequestApi;
use crate::github::rate_limit::{format_rate_limit_message, is_rate_limited};
use crate::store::PullRequestStore;
use crate::types::{Account, RemoteRepository};

/// Default wait between background refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Periodically refreshes one remote repository through the store.
///
/// `start` spawns a task on the ambient Tokio runtime that refreshes
/// immediately and then once per interval. `stop` signals shutdown and is
/// idempotent; once it returns, no further refresh is issued (one already in
/// flight still completes and lands in the store). Dropping the updater
/// implies `stop`.
pub struct PullRequestUpdater<A: PullRequestApi> {
    remote: RemoteRepository,
    account: Account,
    store: Arc<PullRequestStore<A>>,
    interval: Duration,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl<A: PullRequestApi> PullRequestUpdater<A> {
    pub fn new(
        remote: RemoteRepository,
        account: Account,
        store: Arc<PullRequestStore<A>>,
    ) -> Self {
        Self {
            remote,
            account,
            store,
            interval: DEFAULT_REFRESH_INTERVAL,
            shutdown_tx: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }

    /// Spawn the polling task. Starting an already-running updater is a no-op.
    pub fn start(&mut self) {
        if self.shutdown_tx.is_some() {
            return;
        }
        tracing::debug!("updater: starting for {}", self.remote.slug);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);
        tokio::spawn(run_loop(
            self.remote.clone(),
            self.account.clone(),
            Arc::clone(&self.store),
            self.interval,
            shutdown_rx,
        ));
    }

    /// Signal the polling task to stop. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            tracing::debug!("updater: stopping for {}", self.remote.slug);
            let _ = shutdown_tx.send(());
        }
    }
}

impl<A: PullRequestApi> Drop for PullRequestUpdater<A> {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_loop<A: PullRequestApi>(
    remote: RemoteRepository,
    account: Account,
    store: Arc<PullRequestStore<A>>,
    interval: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    // The first tick completes immediately, so a refresh happens right after
    // start rather than a full interval later.
    let mut refresh_tick = tokio::time::interval(interval);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => {
                tracing::debug!("updater: shut down for {}", remote.slug);
                break;
            }
            _ = refresh_tick.tick() => {
                if let Err(e) = store.refresh_pull_requests(&remote, &account).await {
                    if is_rate_limited(&e) {
                        tracing::warn!(
                            "updater: {}: {}",
                            remote.slug,
                            format_rate_limit_message(&e)
                        );
                    } else {
                        tracing::warn!("updater: refresh of {} failed: {e:#}", remote.slug);
                    }
                }
            }
        }
    }
}
