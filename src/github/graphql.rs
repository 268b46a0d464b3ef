use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use moka::future::Cache;
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};

use crate::types::{Author, PullRequest, RemoteRepository, RepoRef};

// ---------------------------------------------------------------------------
// GraphQL query strings
// ---------------------------------------------------------------------------

const REPOSITORY_METADATA_QUERY: &str = r"
query RepositoryMetadata($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    databaseId
    nameWithOwner
    parent {
      databaseId
      nameWithOwner
    }
  }
}
";

const OPEN_PULL_REQUESTS_QUERY: &str = r"
query OpenPullRequests($owner: String!, $name: String!, $first: Int!, $after: String) {
  repository(owner: $owner, name: $name) {
    pullRequests(states: OPEN, first: $first, after: $after, orderBy: { field: CREATED_AT, direction: DESC }) {
      pageInfo {
        hasNextPage
        endCursor
      }
      nodes {
        number
        title
        isDraft
        baseRefName
        headRefName
        url
        createdAt
        updatedAt
        author { login avatarUrl }
      }
    }
  }
}
";

const VIEWER_QUERY: &str = r"
query Viewer {
  viewer { login }
}
";

// ---------------------------------------------------------------------------
// Request payload
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct GraphQLPayload<V: Serialize> {
    query: &'static str,
    variables: V,
}

#[derive(Serialize)]
struct RepositoryVariables {
    owner: String,
    name: String,
}

#[derive(Serialize)]
struct PullRequestsVariables {
    owner: String,
    name: String,
    first: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    after: Option<String>,
}

#[derive(Serialize)]
struct NoVariables {}

// ---------------------------------------------------------------------------
// Response types (mirror the GraphQL response shape)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GraphQLResponse<D> {
    data: Option<D>,
    errors: Option<Vec<GraphQLError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQLError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RepositoryData {
    repository: Option<RawRepository>,
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    #[serde(rename = "databaseId")]
    database_id: Option<u64>,
    #[serde(rename = "nameWithOwner")]
    name_with_owner: String,
    parent: Option<RawParentRepository>,
}

#[derive(Debug, Deserialize)]
struct RawParentRepository {
    #[serde(rename = "databaseId")]
    database_id: Option<u64>,
    #[serde(rename = "nameWithOwner")]
    name_with_owner: String,
}

#[derive(Debug, Deserialize)]
struct PullRequestsData {
    repository: Option<PullRequestsRepository>,
}

#[derive(Debug, Deserialize)]
struct PullRequestsRepository {
    #[serde(rename = "pullRequests")]
    pull_requests: PullRequestConnection,
}

#[derive(Debug, Deserialize)]
struct PullRequestConnection {
    #[serde(rename = "pageInfo")]
    page_info: PageInfo,
    #[serde(default)]
    nodes: Vec<Option<RawPullRequest>>,
}

/// Pagination info from GraphQL.
#[derive(Debug, Clone, Deserialize)]
pub struct PageInfo {
    #[serde(rename = "hasNextPage")]
    pub has_next_page: bool,
    #[serde(rename = "endCursor")]
    pub end_cursor: Option<String>,
}

/// Raw PR as returned by the GraphQL API (camelCase field names).
#[derive(Debug, Deserialize)]
struct RawPullRequest {
    number: u64,
    title: String,
    #[serde(rename = "isDraft", default)]
    is_draft: bool,
    #[serde(rename = "baseRefName", default)]
    base_ref_name: String,
    #[serde(rename = "headRefName", default)]
    head_ref_name: String,
    url: String,
    #[serde(rename = "createdAt")]
    created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    updated_at: DateTime<Utc>,
    author: Option<RawActor>,
}

#[derive(Debug, Deserialize)]
struct RawActor {
    login: String,
    #[serde(rename = "avatarUrl", default)]
    avatar_url: String,
}

#[derive(Debug, Deserialize)]
struct ViewerData {
    viewer: RawViewer,
}

#[derive(Debug, Deserialize)]
struct RawViewer {
    login: String,
}

// ---------------------------------------------------------------------------
// Conversion: Raw → Domain
// ---------------------------------------------------------------------------

impl RawPullRequest {
    fn into_domain(self) -> PullRequest {
        let author = self.author.map(|a| Author {
            login: a.login,
            avatar_url: a.avatar_url,
        });

        PullRequest {
            number: self.number,
            title: self.title,
            author,
            is_draft: self.is_draft,
            base_ref: self.base_ref_name,
            head_ref: self.head_ref_name,
            url: self.url,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl RawRepository {
    fn into_domain(self) -> Result<RemoteRepository> {
        // Everything downstream is keyed on the database ID; without one the
        // record is unusable.
        let db_id = self
            .database_id
            .with_context(|| format!("repository {} has no databaseId", self.name_with_owner))?;
        let slug: RepoRef = self.name_with_owner.parse()?;

        let mut remote = RemoteRepository::new(db_id, slug);
        if let Some(parent) = self.parent
            && let Some(parent_db_id) = parent.database_id
            && let Ok(parent_slug) = parent.name_with_owner.parse::<RepoRef>()
        {
            remote = remote.with_parent(RemoteRepository::new(parent_db_id, parent_slug));
        }
        Ok(remote)
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Resolve a slug to its GitHub identity: database ID plus fork parent.
///
/// When a `cache` is provided, a previous resolution is served from the moka
/// cache if a fresh entry exists (TTL is set at client creation time).
pub async fn repository_metadata(
    octocrab: &Arc<Octocrab>,
    slug: &RepoRef,
    cache: Option<&Cache<String, String>>,
) -> Result<RemoteRepository> {
    let cache_key = format!("repo:{slug}");

    if let Some(c) = cache
        && let Some(cached) = c.get(&cache_key).await
        && let Ok(remote) = serde_json::from_str::<RemoteRepository>(&cached)
    {
        tracing::debug!("cache hit for {cache_key}");
        return Ok(remote);
    }

    let payload = GraphQLPayload {
        query: REPOSITORY_METADATA_QUERY,
        variables: RepositoryVariables {
            owner: slug.owner.clone(),
            name: slug.name.clone(),
        },
    };

    let response: GraphQLResponse<RepositoryData> = octocrab
        .graphql(&payload)
        .await
        .with_context(|| format!("GraphQL repository lookup failed for {slug}"))?;

    fail_on_errors(response.errors)?;
    let data = response
        .data
        .context("GraphQL response missing data field")?;
    let raw = data
        .repository
        .with_context(|| format!("repository {slug} not found"))?;
    let remote = raw.into_domain()?;

    if let Some(c) = cache
        && let Ok(json) = serde_json::to_string(&remote)
    {
        c.insert(cache_key, json).await;
    }

    Ok(remote)
}

/// A single page of open pull requests.
pub struct PullRequestPage {
    pub pull_requests: Vec<PullRequest>,
    pub page_info: PageInfo,
}

/// Execute the `OpenPullRequests` GraphQL query for a single page.
pub async fn open_pull_requests(
    octocrab: &Arc<Octocrab>,
    slug: &RepoRef,
    first: u32,
    after: Option<String>,
) -> Result<PullRequestPage> {
    let payload = GraphQLPayload {
        query: OPEN_PULL_REQUESTS_QUERY,
        variables: PullRequestsVariables {
            owner: slug.owner.clone(),
            name: slug.name.clone(),
            first,
            after,
        },
    };

    let response: GraphQLResponse<PullRequestsData> = octocrab
        .graphql(&payload)
        .await
        .with_context(|| format!("GraphQL pull request fetch failed for {slug}"))?;

    fail_on_errors(response.errors)?;
    let data = response
        .data
        .context("GraphQL response missing data field")?;
    let connection = data
        .repository
        .with_context(|| format!("repository {slug} not found"))?
        .pull_requests;

    let pull_requests = connection
        .nodes
        .into_iter()
        .flatten()
        .map(RawPullRequest::into_domain)
        .collect();

    Ok(PullRequestPage {
        pull_requests,
        page_info: connection.page_info,
    })
}

/// Fetch all pages of open pull requests up to the given limit.
///
/// When a `cache` is provided, results are served from the moka cache if a
/// fresh entry exists; a background refresh therefore only hits the network
/// once the entry's TTL has expired.
pub async fn open_pull_requests_all(
    octocrab: &Arc<Octocrab>,
    slug: &RepoRef,
    limit: u32,
    cache: Option<&Cache<String, String>>,
) -> Result<Vec<PullRequest>> {
    let cache_key = format!("prs:{slug}:{limit}");

    if let Some(c) = cache
        && let Some(cached) = c.get(&cache_key).await
        && let Ok(prs) = serde_json::from_str::<Vec<PullRequest>>(&cached)
    {
        tracing::debug!("cache hit for {cache_key}");
        return Ok(prs);
    }

    let page_size = limit.min(100); // GitHub caps at 100 per page
    let mut all_prs: Vec<PullRequest> = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let remaining = limit.saturating_sub(u32::try_from(all_prs.len()).unwrap_or(u32::MAX));
        if remaining == 0 {
            break;
        }
        let fetch_count = remaining.min(page_size);

        let page = open_pull_requests(octocrab, slug, fetch_count, cursor).await?;
        all_prs.extend(page.pull_requests);

        if !page.page_info.has_next_page || page.page_info.end_cursor.is_none() {
            break;
        }
        cursor = page.page_info.end_cursor;
    }

    if let Some(c) = cache
        && let Ok(json) = serde_json::to_string(&all_prs)
    {
        c.insert(cache_key, json).await;
    }

    Ok(all_prs)
}

/// Login of the user the token belongs to.
pub async fn viewer_login(octocrab: &Arc<Octocrab>) -> Result<String> {
    let payload = GraphQLPayload {
        query: VIEWER_QUERY,
        variables: NoVariables {},
    };

    let response: GraphQLResponse<ViewerData> = octocrab
        .graphql(&payload)
        .await
        .context("GraphQL viewer lookup failed")?;

    fail_on_errors(response.errors)?;
    let data = response
        .data
        .context("GraphQL response missing data field")?;
    Ok(data.viewer.login)
}

fn fail_on_errors(errors: Option<Vec<GraphQLError>>) -> Result<()> {
    if let Some(errors) = errors
        && !errors.is_empty()
    {
        let messages: Vec<_> = errors.iter().map(|e| e.message.as_str()).collect();
        bail!("GraphQL errors: {}", messages.join("; "));
    }
    Ok(())
}
