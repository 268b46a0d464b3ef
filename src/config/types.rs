use std::path::PathBuf;

use serde::Deserialize;

use crate::types::RepoRef;

// ---------------------------------------------------------------------------
// Custom slug deserialization
// ---------------------------------------------------------------------------

/// Deserialize a [`RepoRef`] from a TOML string value like `"owner/name"`.
pub(crate) mod slug_de {
    use serde::{self, Deserialize, Deserializer};

    use crate::types::RepoRef;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<RepoRef, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub defaults: Defaults,
    #[serde(default)]
    pub repositories: Vec<RepositoryEntry>,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub host: String,
    pub refresh_interval_minutes: u32,
    pub cache_ttl_minutes: u32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            host: "github.com".to_owned(),
            refresh_interval_minutes: 10,
            cache_ttl_minutes: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// Repositories
// ---------------------------------------------------------------------------

/// One watched clone: where it lives on disk and which GitHub repository
/// its push remote points at.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryEntry {
    pub path: PathBuf,
    #[serde(deserialize_with = "slug_de::deserialize")]
    pub remote: RepoRef,
    /// Overrides `defaults.host` for GitHub Enterprise remotes.
    pub host: Option<String>,
}
