use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::types::AppConfig;

/// Discover and load the app config.
///
/// Priority:
/// 1. `--config` flag (explicit path)
/// 2. `$GH_PRWATCH_CONFIG` environment variable
/// 3. `$XDG_CONFIG_HOME/gh-prwatch/config.toml`
/// 4. `~/.config/gh-prwatch/config.toml`
///
/// No file at any of those locations is not an error; defaults apply and the
/// repository list starts empty.
pub fn load_config(explicit_path: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit_path {
        return read_config(path);
    }

    match find_config() {
        Some(path) => read_config(&path),
        None => Ok(AppConfig::default()),
    }
}

fn read_config(path: &Path) -> Result<AppConfig> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("parsing TOML from {}", path.display()))
}

fn find_config() -> Option<PathBuf> {
    // $GH_PRWATCH_CONFIG
    if let Ok(path) = std::env::var("GH_PRWATCH_CONFIG") {
        let p = PathBuf::from(&path);
        if p.is_file() {
            return Some(p);
        }
    }

    // $XDG_CONFIG_HOME/gh-prwatch/config.toml
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        let p = PathBuf::from(xdg).join("gh-prwatch/config.toml");
        if p.is_file() {
            return Some(p);
        }
    }

    // ~/.config/gh-prwatch/config.toml
    if let Some(home) = dirs_fallback() {
        let p = home.join(".config/gh-prwatch/config.toml");
        if p.is_file() {
            return Some(p);
        }
    }

    None
}

fn dirs_fallback() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = dirs_fallback()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}
