use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use gh_prwatch::coordinator::PullRequestCoordinator;
use gh_prwatch::emitter::Subscription;
use gh_prwatch::github::StubApi;
use gh_prwatch::github::stub::FetchCall;
use gh_prwatch::registry::RepositoryRegistry;
use gh_prwatch::store::PullRequestStore;
use gh_prwatch::types::{
    Account, Author, LocalRepository, PullRequest, RemoteRepository, RepoRef,
};

fn upstream_remote() -> RemoteRepository {
    RemoteRepository::new(100, RepoRef::new("octo", "lib"))
}

fn fork_remote() -> RemoteRepository {
    RemoteRepository::new(200, RepoRef::new("dev", "lib")).with_parent(upstream_remote())
}

fn unrelated_remote() -> RemoteRepository {
    RemoteRepository::new(900, RepoRef::new("acme", "tool"))
}

fn account() -> Account {
    Account::new("dev", "github.com", "token")
}

fn pr(number: u64) -> PullRequest {
    PullRequest {
        number,
        title: format!("Change #{number}"),
        author: Some(Author {
            login: "alice".to_owned(),
            avatar_url: String::new(),
        }),
        is_draft: false,
        base_ref: "main".to_owned(),
        head_ref: format!("feature-{number}"),
        url: format!("https://github.com/octo/lib/pull/{number}"),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// (repository id, pull request numbers) per callback invocation.
type Events = Arc<Mutex<Vec<(u64, Vec<u64>)>>>;

struct World {
    store: Arc<PullRequestStore<StubApi>>,
    registry: RepositoryRegistry,
    clone_of_upstream: LocalRepository,
    clone_of_fork: LocalRepository,
    unrelated: LocalRepository,
}

/// An upstream clone, a fork clone of the same library, and an unrelated
/// repository, all registered in that order.
fn world() -> World {
    let store = Arc::new(PullRequestStore::new(StubApi::new()));
    let registry = RepositoryRegistry::new();

    let clone_of_upstream = LocalRepository::new(1, "/tmp/lib").with_remote(upstream_remote());
    let clone_of_fork = LocalRepository::new(2, "/tmp/lib-fork").with_remote(fork_remote());
    let unrelated = LocalRepository::new(3, "/tmp/other").with_remote(unrelated_remote());
    registry.set_repositories(vec![
        clone_of_upstream.clone(),
        clone_of_fork.clone(),
        unrelated.clone(),
    ]);

    World {
        store,
        registry,
        clone_of_upstream,
        clone_of_fork,
        unrelated,
    }
}

fn collect_changed(coordinator: &PullRequestCoordinator<StubApi>) -> (Events, Subscription) {
    let seen: Events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let sub = coordinator.on_pull_requests_changed(move |repository, pull_requests| {
        sink.lock().unwrap().push((
            repository.id,
            pull_requests.iter().map(|p| p.number).collect(),
        ));
    });
    (seen, sub)
}

#[tokio::test]
async fn upstream_refresh_reaches_the_clone_and_the_fork() {
    let w = world();
    w.store.api().set_pull_requests(100, vec![pr(1), pr(2)]);
    let coordinator = PullRequestCoordinator::new(Arc::clone(&w.store), &w.registry);
    let (seen, _sub) = collect_changed(&coordinator);

    coordinator
        .refresh_pull_requests(&w.clone_of_upstream, &account())
        .await
        .unwrap();

    // Both clones read the upstream feed and see the same list, in registry
    // order; the unrelated repository sees nothing.
    assert_eq!(
        *seen.lock().unwrap(),
        vec![(1, vec![1, 2]), (2, vec![1, 2])]
    );
}

#[tokio::test]
async fn fork_refresh_reaches_only_the_fork_clone() {
    let w = world();
    w.store.api().set_pull_requests(200, vec![pr(7)]);
    let coordinator = PullRequestCoordinator::new(Arc::clone(&w.store), &w.registry);
    let (seen, _sub) = collect_changed(&coordinator);

    coordinator
        .refresh_pull_requests(&w.clone_of_fork, &account())
        .await
        .unwrap();

    // The feed relation is directional: the upstream clone is not fed by the
    // fork's own pull requests.
    assert_eq!(*seen.lock().unwrap(), vec![(2, vec![7])]);
}

#[tokio::test]
async fn feeds_with_no_matching_repository_fire_no_callbacks() {
    let w = world();
    w.store.api().set_pull_requests(100, vec![pr(1), pr(2)]);
    w.registry.set_repositories(vec![w.unrelated.clone()]);
    let coordinator = PullRequestCoordinator::new(Arc::clone(&w.store), &w.registry);
    let (seen, _sub) = collect_changed(&coordinator);

    let result = coordinator
        .refresh_pull_requests(&w.clone_of_upstream, &account())
        .await;

    // No match is not an error; the fetch still happens and is cached.
    assert!(result.is_ok());
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(w.store.pull_requests(&upstream_remote()).len(), 2);
}

#[tokio::test]
async fn loading_events_bracket_the_refresh_for_every_match() {
    let w = world();
    w.store.api().set_pull_requests(100, vec![pr(1)]);
    let coordinator = PullRequestCoordinator::new(Arc::clone(&w.store), &w.registry);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = coordinator.on_is_loading_pull_requests(move |repository, is_loading| {
        sink.lock().unwrap().push((repository.id, is_loading));
    });

    coordinator
        .refresh_pull_requests(&w.clone_of_upstream, &account())
        .await
        .unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![(1, true), (2, true), (1, false), (2, false)]
    );
}

#[tokio::test]
async fn fork_data_is_fetched_and_read_from_the_fork_remote() {
    let w = world();
    w.store.api().set_pull_requests(100, vec![pr(1)]);
    w.store.api().set_pull_requests(200, vec![pr(9)]);
    let coordinator = PullRequestCoordinator::new(Arc::clone(&w.store), &w.registry);

    coordinator
        .refresh_pull_requests(&w.clone_of_fork, &account())
        .await
        .unwrap();

    // The fork clone's own remote is queried, never the parent.
    assert_eq!(
        w.store.api().calls(),
        vec![FetchCall {
            slug: RepoRef::new("dev", "lib"),
            db_id: 200,
        }]
    );

    let numbers: Vec<u64> = coordinator
        .get_all_pull_requests(&w.clone_of_fork)
        .iter()
        .map(|p| p.number)
        .collect();
    assert_eq!(numbers, vec![9]);

    // The upstream clone's feed was never fetched.
    assert!(
        coordinator
            .get_all_pull_requests(&w.clone_of_upstream)
            .is_empty()
    );
}

#[tokio::test]
async fn registry_updates_replace_the_match_set() {
    let w = world();
    w.store.api().set_pull_requests(100, vec![pr(1)]);
    let coordinator = PullRequestCoordinator::new(Arc::clone(&w.store), &w.registry);
    let (seen, _sub) = collect_changed(&coordinator);

    coordinator
        .refresh_pull_requests(&w.clone_of_upstream, &account())
        .await
        .unwrap();
    assert_eq!(seen.lock().unwrap().len(), 2);

    // Drop everything that reads the upstream feed.
    w.registry.set_repositories(vec![w.unrelated.clone()]);
    coordinator
        .refresh_pull_requests(&w.clone_of_upstream, &account())
        .await
        .unwrap();
    assert_eq!(seen.lock().unwrap().len(), 2);

    // Bring the upstream clone back; events flow again.
    w.registry
        .set_repositories(vec![w.clone_of_upstream.clone()]);
    coordinator
        .refresh_pull_requests(&w.clone_of_upstream, &account())
        .await
        .unwrap();
    assert_eq!(seen.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn repositories_without_a_remote_never_match() {
    let w = world();
    w.store.api().set_pull_requests(100, vec![pr(1)]);
    let bare = LocalRepository::new(4, "/tmp/bare");
    w.registry
        .set_repositories(vec![bare, w.clone_of_upstream.clone()]);
    let coordinator = PullRequestCoordinator::new(Arc::clone(&w.store), &w.registry);
    let (seen, _sub) = collect_changed(&coordinator);

    coordinator
        .refresh_pull_requests(&w.clone_of_upstream, &account())
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![(1, vec![1])]);
}

#[tokio::test]
async fn refresh_without_a_remote_is_an_error() {
    let w = world();
    let coordinator = PullRequestCoordinator::new(Arc::clone(&w.store), &w.registry);
    let bare = LocalRepository::new(9, "/tmp/bare");

    let err = coordinator
        .refresh_pull_requests(&bare, &account())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no GitHub remote"));

    let err = coordinator
        .start_pull_request_updater(&bare, &account())
        .unwrap_err();
    assert!(err.to_string().contains("no GitHub remote"));

    // Reads are just empty, not an error.
    assert!(coordinator.get_all_pull_requests(&bare).is_empty());
}

#[tokio::test]
async fn stop_without_a_running_updater_is_a_noop() {
    let w = world();
    let coordinator = PullRequestCoordinator::new(Arc::clone(&w.store), &w.registry);

    coordinator.stop_pull_request_updater();
    coordinator.stop_pull_request_updater();
}

// ---------------------------------------------------------------------------
// Updater ownership
// ---------------------------------------------------------------------------

/// Let spawned polling tasks run until they wait on their timers again.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn starting_an_updater_replaces_the_previous_one() {
    let w = world();
    w.store.api().set_pull_requests(100, vec![]);
    w.store.api().set_pull_requests(900, vec![]);
    let coordinator = PullRequestCoordinator::new(Arc::clone(&w.store), &w.registry)
        .with_updater_interval(Duration::from_secs(600));

    coordinator
        .start_pull_request_updater(&w.clone_of_upstream, &account())
        .unwrap();
    settle().await;
    assert_eq!(w.store.api().call_count(100), 1);

    coordinator
        .start_pull_request_updater(&w.unrelated, &account())
        .unwrap();
    settle().await;
    assert_eq!(w.store.api().call_count(900), 1);

    tokio::time::sleep(Duration::from_secs(600)).await;
    settle().await;

    // The replaced updater received a stop and polls no further.
    assert_eq!(w.store.api().call_count(100), 1);
    assert_eq!(w.store.api().call_count(900), 2);

    coordinator.stop_pull_request_updater();
    tokio::time::sleep(Duration::from_secs(600)).await;
    settle().await;
    assert_eq!(w.store.api().call_count(900), 2);
}

#[tokio::test(start_paused = true)]
async fn updater_events_flow_through_the_coordinator() {
    let w = world();
    w.store.api().set_pull_requests(100, vec![pr(5)]);
    let coordinator = PullRequestCoordinator::new(Arc::clone(&w.store), &w.registry)
        .with_updater_interval(Duration::from_secs(600));
    let (seen, _sub) = collect_changed(&coordinator);

    coordinator
        .start_pull_request_updater(&w.clone_of_upstream, &account())
        .unwrap();
    settle().await;

    // The initial poll fans out to the upstream clone and the fork clone.
    assert_eq!(*seen.lock().unwrap(), vec![(1, vec![5]), (2, vec![5])]);

    coordinator.stop_pull_request_updater();
}

#[tokio::test(start_paused = true)]
async fn failed_start_leaves_the_running_updater_alone() {
    let w = world();
    w.store.api().set_pull_requests(100, vec![]);
    let coordinator = PullRequestCoordinator::new(Arc::clone(&w.store), &w.registry)
        .with_updater_interval(Duration::from_secs(600));

    coordinator
        .start_pull_request_updater(&w.clone_of_upstream, &account())
        .unwrap();
    settle().await;

    let bare = LocalRepository::new(9, "/tmp/bare");
    assert!(
        coordinator
            .start_pull_request_updater(&bare, &account())
            .is_err()
    );

    tokio::time::sleep(Duration::from_secs(600)).await;
    settle().await;
    assert_eq!(w.store.api().call_count(100), 2);

    coordinator.stop_pull_request_updater();
}
