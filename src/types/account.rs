use std::fmt;

/// Authentication context for GitHub API calls.
#[derive(Clone)]
pub struct Account {
    pub login: String,
    pub host: String,
    pub token: String,
}

impl Account {
    pub fn new(login: impl Into<String>, host: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            host: host.into(),
            token: token.into(),
        }
    }
}

// Manual impl so the token never lands in logs.
impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("login", &self.login)
            .field("host", &self.host)
            .field("token", &"<redacted>")
            .finish()
    }
}
