use std::path::Path;

use gh_prwatch::config::loader::{expand_tilde, load_config};
use gh_prwatch::config::types::AppConfig;
use gh_prwatch::types::RepoRef;

#[test]
fn parse_minimal_config() {
    let toml = r#"
[[repositories]]
path = "/srv/checkouts/lib"
remote = "octo/lib"
"#;
    let config: AppConfig = toml::from_str(toml).unwrap();
    assert_eq!(config.repositories.len(), 1);
    assert_eq!(config.repositories[0].path, Path::new("/srv/checkouts/lib"));
    assert_eq!(config.repositories[0].remote, RepoRef::new("octo", "lib"));
    assert!(config.repositories[0].host.is_none());
}

#[test]
fn parse_defaults() {
    let toml = r#"
[defaults]
host = "github.example.com"
refresh_interval_minutes = 5
cache_ttl_minutes = 1
"#;
    let config: AppConfig = toml::from_str(toml).unwrap();
    assert_eq!(config.defaults.host, "github.example.com");
    assert_eq!(config.defaults.refresh_interval_minutes, 5);
    assert_eq!(config.defaults.cache_ttl_minutes, 1);
}

#[test]
fn default_config_has_sane_defaults() {
    let config = AppConfig::default();
    assert_eq!(config.defaults.host, "github.com");
    assert_eq!(config.defaults.refresh_interval_minutes, 10);
    assert_eq!(config.defaults.cache_ttl_minutes, 10);
    assert!(config.repositories.is_empty());
}

#[test]
fn parse_unknown_keys_ignored() {
    let toml = r#"
unknown_top_level = "should be ignored"

[[repositories]]
path = "/srv/checkouts/lib"
remote = "octo/lib"
"#;
    let config: AppConfig = toml::from_str(toml).unwrap();
    assert_eq!(config.repositories.len(), 1);
}

#[test]
fn invalid_slug_fails_to_parse() {
    let toml = r#"
[[repositories]]
path = "/srv/checkouts/lib"
remote = "not-a-slug"
"#;
    let result: Result<AppConfig, _> = toml::from_str(toml);
    let err = result.unwrap_err().to_string();
    assert!(err.contains("not-a-slug"), "error should name the slug: {err}");
}

#[test]
fn per_repository_host_override() {
    let toml = r#"
[[repositories]]
path = "/srv/checkouts/internal"
remote = "corp/internal"
host = "github.example.com"
"#;
    let config: AppConfig = toml::from_str(toml).unwrap();
    assert_eq!(
        config.repositories[0].host.as_deref(),
        Some("github.example.com")
    );
}

// ---------------------------------------------------------------------------
// Config loading integration tests
// ---------------------------------------------------------------------------

#[test]
fn load_watch_fixture() {
    let path = Path::new("tests/fixtures/watch_config.toml");
    let config = load_config(Some(path)).unwrap();
    assert_eq!(config.defaults.refresh_interval_minutes, 5);
    assert_eq!(config.repositories.len(), 2);
    assert_eq!(config.repositories[0].remote, RepoRef::new("octo", "lib"));
    assert_eq!(config.repositories[1].remote, RepoRef::new("dev", "lib"));
    assert_eq!(
        config.repositories[1].host.as_deref(),
        Some("github.example.com")
    );
}

#[test]
fn invalid_toml_produces_error() {
    let path = Path::new("tests/fixtures/invalid_toml.toml");
    let result = load_config(Some(path));
    assert!(result.is_err());
    let err_msg = result.unwrap_err().to_string();
    // Error should reference the file path.
    assert!(
        err_msg.contains("invalid_toml.toml"),
        "error should mention file: {err_msg}"
    );
}

#[test]
fn missing_config_file_produces_error() {
    let path = Path::new("tests/fixtures/nonexistent.toml");
    let result = load_config(Some(path));
    assert!(result.is_err());
}

#[test]
fn explicit_path_loads_from_anywhere() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[defaults]\nrefresh_interval_minutes = 3\n").unwrap();

    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.defaults.refresh_interval_minutes, 3);
}

#[test]
fn env_var_points_discovery_at_a_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[defaults]\nrefresh_interval_minutes = 7\n").unwrap();

    // Only this test touches the variable; restore it before asserting so a
    // failure cannot leak it into other tests.
    let previous = std::env::var("GH_PRWATCH_CONFIG").ok();
    unsafe { std::env::set_var("GH_PRWATCH_CONFIG", &path) };
    let loaded = load_config(None);
    unsafe {
        match previous {
            Some(value) => std::env::set_var("GH_PRWATCH_CONFIG", value),
            None => std::env::remove_var("GH_PRWATCH_CONFIG"),
        }
    }

    let config = loaded.unwrap();
    assert_eq!(config.defaults.refresh_interval_minutes, 7);
}

// ---------------------------------------------------------------------------
// Path expansion
// ---------------------------------------------------------------------------

#[test]
fn expand_tilde_leaves_plain_paths_alone() {
    assert_eq!(expand_tilde(Path::new("/srv/repo")), Path::new("/srv/repo"));
    assert_eq!(expand_tilde(Path::new("relative/repo")), Path::new("relative/repo"));
}

#[test]
fn expand_tilde_resolves_the_home_directory() {
    if let Ok(home) = std::env::var("HOME") {
        assert_eq!(
            expand_tilde(Path::new("~/src/lib")),
            Path::new(&home).join("src/lib")
        );
    }
}
