use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Settings files probed in order when no explicit file is given
pub const SETTINGS_FILES: [&str; 2] = [".env.jira", ".env"];

/// Default size limit for uploaded or inline attachments (10 MiB)
pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

pub const ENV_HOST: &str = "JIRA_HOST";
pub const ENV_EMAIL: &str = "JIRA_EMAIL";
pub const ENV_API_TOKEN: &str = "JIRA_API_TOKEN";
pub const ENV_BEARER_TOKEN: &str = "JIRA_BEARER_TOKEN";
pub const ENV_MAX_ATTACHMENT_BYTES: &str = "JIRA_MAX_ATTACHMENT_BYTES";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("JIRA_HOST is not set")]
    MissingHost,

    #[error("No Jira credentials configured: set JIRA_BEARER_TOKEN, or both JIRA_EMAIL and JIRA_API_TOKEN")]
    MissingCredentials,

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },

    #[error("Failed to load settings file {path}: {reason}")]
    SettingsFile { path: PathBuf, reason: String },
}

/// How requests to Jira are authenticated
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// Jira Cloud style: account email plus API token
    Basic { email: String, api_token: String },
    /// Personal access token (Server/Data Center) or OAuth bearer
    Bearer { token: String },
}

impl AuthMode {
    pub fn name(&self) -> &'static str {
        match self {
            AuthMode::Basic { .. } => "basic",
            AuthMode::Bearer { .. } => "bearer",
        }
    }
}

impl fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::Basic { email, .. } => f
                .debug_struct("Basic")
                .field("email", email)
                .field("api_token", &"<redacted>")
                .finish(),
            AuthMode::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

/// Connection settings for a Jira instance
#[derive(Debug, Clone)]
pub struct JiraConfig {
    /// Base URL including scheme, without trailing slash
    pub base_url: String,
    pub auth: AuthMode,
    pub max_attachment_bytes: u64,
}

impl JiraConfig {
    /// Build a configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// Empty values are treated as absent. A bearer token takes precedence
    /// over email/API-token credentials when both are present.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let host = get(ENV_HOST).ok_or(ConfigError::MissingHost)?;
        let base_url = normalize_host(&host)?;

        let auth = match (get(ENV_BEARER_TOKEN), get(ENV_EMAIL), get(ENV_API_TOKEN)) {
            (Some(token), _, _) => AuthMode::Bearer { token },
            (None, Some(email), Some(api_token)) => AuthMode::Basic { email, api_token },
            _ => return Err(ConfigError::MissingCredentials),
        };

        let max_attachment_bytes = match get(ENV_MAX_ATTACHMENT_BYTES) {
            Some(raw) => raw.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                name: ENV_MAX_ATTACHMENT_BYTES,
                reason: e.to_string(),
            })?,
            None => DEFAULT_MAX_ATTACHMENT_BYTES,
        };

        debug!("Jira configuration resolved for {} using {} auth", base_url, auth.name());

        Ok(Self {
            base_url,
            auth,
            max_attachment_bytes,
        })
    }
}

/// Load a settings file into the process environment.
///
/// With an explicit path the file must exist. Otherwise the first of
/// [`SETTINGS_FILES`] found in `dir` is loaded, and having none is fine.
/// Variables already present in the environment are not overridden.
pub fn load_settings_file(explicit: Option<&Path>, dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = explicit {
        dotenv::from_path(path).map_err(|e| ConfigError::SettingsFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        info!("Loaded settings from {}", path.display());
        return Ok(Some(path.to_path_buf()));
    }

    for name in SETTINGS_FILES {
        let candidate = dir.join(name);
        if candidate.is_file() {
            dotenv::from_path(&candidate).map_err(|e| ConfigError::SettingsFile {
                path: candidate.clone(),
                reason: e.to_string(),
            })?;
            info!("Loaded settings from {}", candidate.display());
            return Ok(Some(candidate));
        }
    }

    debug!("No settings file found in {}", dir.display());
    Ok(None)
}

fn normalize_host(host: &str) -> Result<String, ConfigError> {
    let with_scheme = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    };
    let trimmed = with_scheme.trim_end_matches('/').to_string();

    let rest = trimmed.split_once("://").map(|(_, rest)| rest).unwrap_or_default();
    if rest.is_empty() || rest.contains(char::is_whitespace) {
        return Err(ConfigError::InvalidValue {
            name: ENV_HOST,
            reason: format!("'{}' is not a host name or URL", host),
        });
    }

    Ok(trimmed)
}
