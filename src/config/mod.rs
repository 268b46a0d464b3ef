pub mod loader;
pub mod types;

pub use loader::{expand_tilde, load_config};
pub use types::{AppConfig, Defaults, RepositoryEntry};
