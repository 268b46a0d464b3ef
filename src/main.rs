use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use gh_prwatch::config::{self, AppConfig, Defaults, RepositoryEntry};
use gh_prwatch::coordinator::PullRequestCoordinator;
use gh_prwatch::github::{GitHubApi, auth};
use gh_prwatch::registry::RepositoryRegistry;
use gh_prwatch::store::PullRequestStore;
use gh_prwatch::types::{Account, LocalRepository, PullRequest};
use gh_prwatch::util::format_relative_time;

#[derive(Parser)]
#[command(
    name = "gh-prwatch",
    version,
    about = "Watches GitHub pull requests for local clones"
)]
struct Cli {
    /// Path to config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll open pull requests for a configured repository until interrupted.
    Watch {
        /// Local clone to watch (defaults to the current directory).
        path: Option<PathBuf>,
    },
    /// Fetch and print open pull requests once.
    List {
        /// Local clone to query (defaults to the current directory).
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up tracing.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(if cli.debug { "debug" } else { "warn" })
            }),
        )
        .init();

    // Install the rustls CryptoProvider before any TLS client is constructed.
    // octocrab's rustls stack no longer auto-installs a provider.
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("failed to install default CryptoProvider");

    let config = config::load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Watch { path: None }) {
        Commands::Watch { path } => watch(config, path.as_deref()).await,
        Commands::List { path } => list(config, path.as_deref()).await,
    }
}

/// Poll the selected repository's feed until interrupted, printing each
/// update as it lands.
async fn watch(config: AppConfig, target: Option<&Path>) -> Result<()> {
    let selected_index = select_entry(&config, target)?;

    let api = GitHubApi::new(config.defaults.cache_ttl_minutes);
    let accounts = resolve_accounts(&api, &config).await?;
    let repositories = build_repositories(&api, &accounts, &config).await?;

    let selected = repositories[selected_index].clone();
    let host = entry_host(&config.repositories[selected_index], &config.defaults);
    let account = accounts[&host].clone();

    let registry = RepositoryRegistry::new();
    registry.set_repositories(repositories);

    let store = Arc::new(PullRequestStore::new(api));
    let coordinator = PullRequestCoordinator::new(Arc::clone(&store), &registry)
        .with_updater_interval(Duration::from_secs(
            u64::from(config.defaults.refresh_interval_minutes) * 60,
        ));

    let _changed = coordinator.on_pull_requests_changed(|repository, pull_requests| {
        println!(
            "{}: {} open pull requests",
            repository.path.display(),
            pull_requests.len()
        );
        print_pull_requests(pull_requests);
    });
    let _loading = coordinator.on_is_loading_pull_requests(|repository, is_loading| {
        if is_loading {
            tracing::debug!("refreshing {}", repository.path.display());
        }
    });

    coordinator.start_pull_request_updater(&selected, &account)?;
    println!(
        "watching {} every {}m (ctrl-c to stop)",
        selected.path.display(),
        config.defaults.refresh_interval_minutes
    );

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    coordinator.stop_pull_request_updater();
    Ok(())
}

/// Refresh the selected repository's feed once and print it.
async fn list(config: AppConfig, target: Option<&Path>) -> Result<()> {
    let selected_index = select_entry(&config, target)?;
    let entry = &config.repositories[selected_index];
    let host = entry_host(entry, &config.defaults);

    let api = GitHubApi::new(config.defaults.cache_ttl_minutes);
    let token = auth::resolve_token(&host)?;
    let login = api.viewer_login(&host, &token).await?;
    let account = Account::new(login, host, token);

    let remote = api
        .lookup_remote(&account, &entry.remote)
        .await
        .with_context(|| format!("resolving {}", entry.remote))?;
    let local = LocalRepository::new(0, config::expand_tilde(&entry.path)).with_remote(remote);

    let registry = RepositoryRegistry::new();
    registry.set_repositories(vec![local.clone()]);

    let store = Arc::new(PullRequestStore::new(api));
    let coordinator = PullRequestCoordinator::new(Arc::clone(&store), &registry);

    coordinator.refresh_pull_requests(&local, &account).await?;
    let pull_requests = coordinator.get_all_pull_requests(&local);
    if pull_requests.is_empty() {
        println!("no open pull requests");
        return Ok(());
    }
    print_pull_requests(&pull_requests);
    Ok(())
}

/// Resolve one account per distinct host used by the configured repositories.
async fn resolve_accounts(
    api: &GitHubApi,
    config: &AppConfig,
) -> Result<HashMap<String, Account>> {
    let mut accounts = HashMap::new();
    for entry in &config.repositories {
        let host = entry_host(entry, &config.defaults);
        if accounts.contains_key(&host) {
            continue;
        }
        let token = auth::resolve_token(&host)?;
        let login = api.viewer_login(&host, &token).await?;
        tracing::debug!("authenticated as {login}@{host}");
        accounts.insert(host.clone(), Account::new(login, host, token));
    }
    Ok(accounts)
}

/// Turn config entries into registry records, resolving each remote on GitHub.
async fn build_repositories(
    api: &GitHubApi,
    accounts: &HashMap<String, Account>,
    config: &AppConfig,
) -> Result<Vec<LocalRepository>> {
    let mut repositories = Vec::new();
    for (id, entry) in (0u64..).zip(config.repositories.iter()) {
        let account = &accounts[&entry_host(entry, &config.defaults)];
        let remote = api
            .lookup_remote(account, &entry.remote)
            .await
            .with_context(|| format!("resolving {}", entry.remote))?;
        repositories
            .push(LocalRepository::new(id, config::expand_tilde(&entry.path)).with_remote(remote));
    }
    Ok(repositories)
}

/// Pick the configured repository the command applies to.
///
/// An explicit path must match a configured entry. Without one, the current
/// directory is tried first; a single-entry config falls back to that entry.
fn select_entry(config: &AppConfig, target: Option<&Path>) -> Result<usize> {
    if config.repositories.is_empty() {
        bail!("no repositories configured; add a [[repositories]] entry to the config file");
    }

    let configured = config
        .repositories
        .iter()
        .map(|entry| entry.path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");

    match target {
        Some(path) => {
            let wanted = canonical(path);
            config
                .repositories
                .iter()
                .position(|entry| canonical(&config::expand_tilde(&entry.path)) == wanted)
                .with_context(|| {
                    format!(
                        "{} is not a configured repository (configured: {configured})",
                        path.display()
                    )
                })
        }
        None => {
            if let Ok(cwd) = std::env::current_dir()
                && let Some(index) = config
                    .repositories
                    .iter()
                    .position(|entry| canonical(&config::expand_tilde(&entry.path)) == canonical(&cwd))
            {
                return Ok(index);
            }
            if config.repositories.len() == 1 {
                return Ok(0);
            }
            bail!("no configured repository matches the current directory (configured: {configured})")
        }
    }
}

/// Resolve symlinks so config paths and CLI paths compare equal.
fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn entry_host(entry: &RepositoryEntry, defaults: &Defaults) -> String {
    entry.host.clone().unwrap_or_else(|| defaults.host.clone())
}

fn print_pull_requests(pull_requests: &[PullRequest]) {
    for pr in pull_requests {
        let author = pr.author.as_ref().map_or("-", |a| a.login.as_str());
        let draft = if pr.is_draft { " [draft]" } else { "" };
        println!(
            "#{:<5} {}{}  @{}  {}",
            pr.number,
            pr.title,
            draft,
            author,
            format_relative_time(&pr.updated_at)
        );
    }
}
