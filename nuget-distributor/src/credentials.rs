//! Credential resolution: explicit flag, then credential file, then nothing.
//!
//! Two files in the working directory act as defaults:
//! - [`API_KEY_FILE`] for the NuGet API key,
//! - [`PASSWORD_FILE`] for the GitHub secret used for basic auth.
//!
//! File contents are trimmed; an empty file counts as absent.

use std::fmt;
use std::fs;
use std::path::Path;

use nuget_distributor_core::error::ConfigurationError;
use tracing::{debug, warn};

pub const API_KEY_FILE: &str = "nuget.apikey";
pub const PASSWORD_FILE: &str = "github.password";

/// Values supplied on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExplicitCredentials {
    pub login: Option<String>,
    pub api_key: Option<String>,
    pub password: Option<String>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    pub api_key: String,
    /// GitHub secret; anonymous API access when absent.
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("api_key", &"***")
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Resolves credentials, reading default files from `dir`.
pub fn resolve(
    explicit: &ExplicitCredentials,
    dir: &Path,
) -> Result<Credentials, ConfigurationError> {
    let login = non_empty(explicit.login.as_deref()).ok_or(ConfigurationError::MissingLogin)?;
    let api_key = pick(explicit.api_key.as_deref(), &dir.join(API_KEY_FILE))
        .ok_or(ConfigurationError::MissingApiKey)?;
    let password = pick(explicit.password.as_deref(), &dir.join(PASSWORD_FILE));

    Ok(Credentials {
        login,
        api_key,
        password,
    })
}

fn pick(explicit: Option<&str>, file: &Path) -> Option<String> {
    if let Some(value) = non_empty(explicit) {
        return Some(value);
    }
    match fs::read_to_string(file) {
        Ok(content) => {
            debug!(path = %file.display(), "Read credential file");
            non_empty(Some(&content))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!(error = ?e, path = %file.display(), "Ignoring unreadable credential file");
            None
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
