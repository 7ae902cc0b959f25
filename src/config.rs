//! Minimal runtime configuration helpers.
//! Defaults target the public Neviweb service.

use std::fmt;
use std::time::Duration;

use crate::client::BASE_URL;
use crate::session::SessionBuilder;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Clone)]
pub struct Config {
    pub email: String,
    pub password: String,
    /// Per-request deadline for every API call.
    pub timeout: Duration,
    pub base_url: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let required = |key: &str| match lookup(key) {
            Some(v) if !v.trim().is_empty() => Ok(v),
            _ => Err(format!("Missing credentials: set {}", key)),
        };
        let email = required("NEVIWEB_EMAIL")?.trim().to_string();
        let password = required("NEVIWEB_PASSWORD")?;

        let timeout_secs = match lookup("NEVIWEB_TIMEOUT_SECS") {
            Some(s) if !s.trim().is_empty() => match s.trim().parse::<u64>() {
                Ok(n) if n > 0 => n,
                _ => return Err("NEVIWEB_TIMEOUT_SECS must be a positive integer".to_string()),
            },
            _ => DEFAULT_TIMEOUT_SECS,
        };

        let base_url = lookup("NEVIWEB_BASE_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| BASE_URL.to_string());

        Ok(Config {
            email,
            password,
            timeout: Duration::from_secs(timeout_secs),
            base_url,
        })
    }

    pub fn session_builder(&self) -> SessionBuilder {
        SessionBuilder::new(self.email.clone(), self.password.clone())
            .timeout(self.timeout)
            .base_url(self.base_url.clone())
    }
}
