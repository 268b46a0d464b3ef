use std::process::Command;

use anyhow::{Result, bail};

/// Resolve a GitHub auth token for `host`.
///
/// Sources, in order: the `gh` CLI (`gh auth token --hostname <host>`), then
/// the `GH_TOKEN` and `GITHUB_TOKEN` environment variables. Failure to run
/// `gh` is not an error; it just falls through to the environment.
pub fn resolve_token(host: &str) -> Result<String> {
    if let Some(token) = gh_cli_token(host) {
        return Ok(token);
    }
    if let Some(token) = env_token() {
        return Ok(token);
    }
    bail!(
        "no GitHub token found for host \"{host}\"; \
         run `gh auth login` or set GH_TOKEN / GITHUB_TOKEN"
    )
}

fn gh_cli_token(host: &str) -> Option<String> {
    let output = Command::new("gh")
        .args(["auth", "token", "--hostname", host])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let token = String::from_utf8(output.stdout).ok()?.trim().to_owned();
    (!token.is_empty()).then_some(token)
}

fn env_token() -> Option<String> {
    ["GH_TOKEN", "GITHUB_TOKEN"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|token| !token.is_empty())
}
