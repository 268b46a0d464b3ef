use std::sync::Mutex;

use crate::emitter::{Emitter, Subscription};
use crate::types::LocalRepository;

/// Owns the list of local repositories known to the application.
///
/// Every mutation publishes the full current list (push model, wholesale
/// replace); consumers rebuild their own view of the world from each update
/// rather than applying deltas.
pub struct RepositoryRegistry {
    repositories: Mutex<Vec<LocalRepository>>,
    updated: Emitter<Vec<LocalRepository>>,
}

impl Default for RepositoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self {
            repositories: Mutex::new(Vec::new()),
            updated: Emitter::new(),
        }
    }

    /// Replace the tracked list wholesale.
    pub fn set_repositories(&self, repositories: Vec<LocalRepository>) {
        tracing::debug!("registry: tracking {} repositories", repositories.len());
        let snapshot = {
            let mut list = self.repositories.lock().unwrap();
            *list = repositories;
            list.clone()
        };
        self.updated.emit(&snapshot);
    }

    pub fn add_repository(&self, repository: LocalRepository) {
        tracing::debug!("registry: adding {}", repository.path.display());
        let snapshot = {
            let mut list = self.repositories.lock().unwrap();
            list.push(repository);
            list.clone()
        };
        self.updated.emit(&snapshot);
    }

    pub fn remove_repository(&self, id: u64) {
        let snapshot = {
            let mut list = self.repositories.lock().unwrap();
            list.retain(|repository| repository.id != id);
            list.clone()
        };
        self.updated.emit(&snapshot);
    }

    /// Snapshot of the current list.
    pub fn all_repositories(&self) -> Vec<LocalRepository> {
        self.repositories.lock().unwrap().clone()
    }

    /// Register for the full-list update fired on every mutation.
    pub fn on_did_update(
        &self,
        callback: impl Fn(&[LocalRepository]) + Send + Sync + 'static,
    ) -> Subscription {
        self.updated.subscribe(move |repositories| callback(repositories))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn repo(id: u64) -> LocalRepository {
        LocalRepository::new(id, format!("/tmp/repo-{id}"))
    }

    #[test]
    fn set_replaces_the_list_and_notifies_with_it() {
        let registry = RepositoryRegistry::new();
        registry.set_repositories(vec![repo(1), repo(2)]);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = registry.on_did_update(move |repositories| {
            sink.lock()
                .unwrap()
                .push(repositories.iter().map(|r| r.id).collect::<Vec<_>>());
        });

        registry.set_repositories(vec![repo(3)]);

        assert_eq!(registry.all_repositories().len(), 1);
        assert_eq!(*seen.lock().unwrap(), vec![vec![3]]);
    }

    #[test]
    fn add_and_remove_notify_with_the_full_list() {
        let registry = RepositoryRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = registry.on_did_update(move |repositories| {
            sink.lock()
                .unwrap()
                .push(repositories.iter().map(|r| r.id).collect::<Vec<_>>());
        });

        registry.add_repository(repo(1));
        registry.add_repository(repo(2));
        registry.remove_repository(1);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![vec![1], vec![1, 2], vec![2]]
        );
    }

    #[test]
    fn removing_an_unknown_id_still_notifies() {
        let registry = RepositoryRegistry::new();
        registry.set_repositories(vec![repo(1)]);

        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        let _sub = registry.on_did_update(move |_| *counter.lock().unwrap() += 1);

        registry.remove_repository(99);
        assert_eq!(registry.all_repositories().len(), 1);
        assert_eq!(*count.lock().unwrap(), 1);
    }
}
