use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use moka::future::Cache;
use octocrab::Octocrab;

use crate::types::{Account, PullRequest, RemoteRepository, RepoRef};

use super::{PullRequestApi, graphql};

/// Open pull requests fetched per repository before pagination stops.
const MAX_OPEN_PRS: u32 = 300;

/// The real GitHub backend: per-host Octocrab instances plus a shared
/// response cache.
///
/// `instances` is guarded by a plain mutex; the guard is only held to get or
/// insert an instance, never across an await.
pub struct GitHubApi {
    instances: Mutex<HashMap<String, Arc<Octocrab>>>,
    cache: Cache<String, String>,
}

impl GitHubApi {
    /// Create a new client with the given response-cache TTL.
    pub fn new(cache_ttl_minutes: u32) -> Self {
        let cache = Cache::builder()
            .max_capacity(500)
            .time_to_live(Duration::from_secs(u64::from(cache_ttl_minutes) * 60))
            .build();

        Self {
            instances: Mutex::new(HashMap::new()),
            cache,
        }
    }

    /// Get or create an Octocrab instance for the given host.
    fn octocrab_for(&self, host: &str, token: &str) -> Result<Arc<Octocrab>> {
        let mut instances = self.instances.lock().unwrap();
        if let Some(instance) = instances.get(host) {
            return Ok(Arc::clone(instance));
        }

        let builder = if host == "github.com" {
            Octocrab::builder().personal_token(token.to_owned())
        } else {
            Octocrab::builder()
                .personal_token(token.to_owned())
                .base_uri(format!("https://{host}/api/v3"))
                .context("setting GHE base URI")?
        };

        let instance = Arc::new(builder.build().context("building octocrab instance")?);
        instances.insert(host.to_owned(), Arc::clone(&instance));
        Ok(instance)
    }

    /// Resolve `slug` to its GitHub identity (database ID and fork parent).
    pub async fn lookup_remote(
        &self,
        account: &Account,
        slug: &RepoRef,
    ) -> Result<RemoteRepository> {
        let octocrab = self.octocrab_for(&account.host, &account.token)?;
        graphql::repository_metadata(&octocrab, slug, Some(&self.cache)).await
    }

    /// Login of the user `token` belongs to.
    ///
    /// Takes host and token separately because this runs before an
    /// [`Account`] exists; the result is what fills in its login.
    pub async fn viewer_login(&self, host: &str, token: &str) -> Result<String> {
        let octocrab = self.octocrab_for(host, token)?;
        graphql::viewer_login(&octocrab).await
    }
}

impl PullRequestApi for GitHubApi {
    async fn fetch_open_pull_requests(
        &self,
        account: &Account,
        remote: &RemoteRepository,
    ) -> Result<Vec<PullRequest>> {
        let octocrab = self.octocrab_for(&account.host, &account.token)?;
        graphql::open_pull_requests_all(&octocrab, &remote.slug, MAX_OPEN_PRS, Some(&self.cache))
            .await
    }
}
