//! Rate-limit detection for GitHub API errors.
//!
//! GitHub signals rate limits through:
//! - HTTP 403 with "API rate limit exceeded" in the body
//! - HTTP 429 (secondary rate limit)
//! - GraphQL errors containing "rate limit"

/// Check whether an error message indicates a GitHub rate limit.
pub fn is_rate_limited(error: &anyhow::Error) -> bool {
    let msg = format!("{error:#}").to_lowercase();
    msg.contains("rate limit")
        || msg.contains("api rate limit exceeded")
        || msg.contains("secondary rate limit")
        || msg.contains("status code: 429")
        || msg.contains("status code: 403")
}

/// Format an operator-friendly message for a rate-limit error.
pub fn format_rate_limit_message(error: &anyhow::Error) -> String {
    let msg = format!("{error:#}");
    if msg.to_lowercase().contains("secondary rate limit") {
        "secondary rate limit hit; polling continues and will recover on a later cycle".to_owned()
    } else {
        "API rate limit exceeded; polling continues and will recover once the window resets"
            .to_owned()
    }
}
