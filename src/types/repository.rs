use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid repository slug {value:?} (expected \"owner/name\")")]
pub struct RepoSlugError {
    pub value: String,
}

/// An `owner/name` pair identifying a repository on a GitHub host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

impl FromStr for RepoRef {
    type Err = RepoSlugError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let make_err = || RepoSlugError {
            value: s.to_owned(),
        };

        let (owner, name) = s.split_once('/').ok_or_else(make_err)?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(make_err());
        }
        Ok(Self::new(owner, name))
    }
}

/// A GitHub-hosted repository record.
///
/// `db_id` is GitHub's immutable `databaseId`; the slug can change when a
/// repository is renamed or transferred, the database ID cannot. All
/// pull-request caching and event routing is keyed on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepository {
    pub db_id: u64,
    pub slug: RepoRef,
    /// Upstream repository when this one is a fork.
    #[serde(default)]
    pub parent: Option<Box<RemoteRepository>>,
}

impl RemoteRepository {
    pub fn new(db_id: u64, slug: RepoRef) -> Self {
        Self {
            db_id,
            slug,
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: RemoteRepository) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    /// Whether pull-request data fetched for `upstream` also describes this
    /// repository: true when the two are the same repository, or when this
    /// repository is a fork of `upstream`.
    pub fn shares_feed_with(&self, upstream: &RemoteRepository) -> bool {
        self.db_id == upstream.db_id
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.db_id == upstream.db_id)
    }
}

/// A locally cloned repository tracked by the application.
///
/// The path is identity only; nothing here touches the working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRepository {
    pub id: u64,
    pub path: PathBuf,
    /// The GitHub repository this clone tracks, when known.
    pub remote: Option<RemoteRepository>,
}

impl LocalRepository {
    pub fn new(id: u64, path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            path: path.into(),
            remote: None,
        }
    }

    pub fn with_remote(mut self, remote: RemoteRepository) -> Self {
        self.remote = Some(remote);
        self
    }
}
