//! Connection settings.
//!
//! Settings are read by name through [`HulyConfig::from_lookup`]. The binary
//! feeds it its command line, where each flag falls back to the variable of
//! the same name:
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `HULY_URL` | Platform base URL | `https://huly.app` |
//! | `HULY_WORKSPACE` | Workspace identifier | required |
//! | `HULY_TOKEN` | Pre-issued bearer token | |
//! | `HULY_EMAIL`, `HULY_PASSWORD` | Login credentials | |
//! | `HULY_CONNECT_TIMEOUT_SECS` | Handshake timeout | `30` |
//!
//! One credential form is required. A token wins when both are present.

use crate::error::{Error, Result};
use std::fmt;
use std::time::Duration;

/// Default platform URL.
pub const DEFAULT_URL: &str = "https://huly.app";

/// Default bound on connection establishment.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// How the server authenticates.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// A pre-issued bearer token.
    Token(String),
    /// Email and password, exchanged for a token at connect time.
    Password {
        /// Account email.
        email: String,
        /// Account password.
        password: String,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(_) => f.write_str("Token(***)"),
            Self::Password { email, .. } => f
                .debug_struct("Password")
                .field("email", email)
                .field("password", &"***")
                .finish(),
        }
    }
}

impl Credentials {
    /// Pick a credential form from optional inputs, preferring the token.
    ///
    /// Blank values count as absent.
    #[must_use]
    pub fn choose(
        token: Option<String>,
        email: Option<String>,
        password: Option<String>,
    ) -> Option<Self> {
        let present = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        if let Some(token) = present(token) {
            return Some(Self::Token(token));
        }
        match (present(email), present(password)) {
            (Some(email), Some(password)) => Some(Self::Password { email, password }),
            _ => None,
        }
    }
}

/// Everything needed to open a backend session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HulyConfig {
    /// Platform base URL, without a trailing slash.
    pub url: String,
    /// Workspace identifier.
    pub workspace: String,
    /// Authentication, if any was supplied.
    pub credentials: Option<Credentials>,
    /// Bound on a single connection attempt.
    pub connect_timeout: Duration,
}

impl HulyConfig {
    /// Build a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` when the workspace is blank or no
    /// credentials are given.
    pub fn new(
        url: impl Into<String>,
        workspace: impl Into<String>,
        credentials: Option<Credentials>,
    ) -> Result<Self> {
        let workspace = workspace.into();
        if workspace.trim().is_empty() {
            return Err(Error::Configuration(
                "HULY_WORKSPACE is required".to_string(),
            ));
        }
        if credentials.is_none() {
            return Err(Error::Configuration(
                "Either HULY_TOKEN or HULY_EMAIL and HULY_PASSWORD must be set".to_string(),
            ));
        }

        Ok(Self {
            url: url.into().trim_end_matches('/').to_string(),
            workspace,
            credentials,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        })
    }

    /// Replace the connection timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Load from a lookup of `HULY_*` setting names.
    ///
    /// Blank values count as absent, so a blank URL or timeout takes its
    /// default.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for a missing workspace, missing
    /// credentials, or a non-numeric timeout.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let setting = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let url = setting("HULY_URL").unwrap_or_else(|| DEFAULT_URL.to_string());
        let workspace = setting("HULY_WORKSPACE").unwrap_or_default();
        let credentials = Credentials::choose(
            setting("HULY_TOKEN"),
            setting("HULY_EMAIL"),
            setting("HULY_PASSWORD"),
        );

        let mut config = Self::new(url, workspace, credentials)?;
        if let Some(raw) = setting("HULY_CONNECT_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                Error::Configuration(format!(
                    "HULY_CONNECT_TIMEOUT_SECS must be a whole number of seconds, got '{raw}'"
                ))
            })?;
            config.connect_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}
