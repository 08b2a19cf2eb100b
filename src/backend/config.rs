//! Backend configuration parsed from environment variables.

use super::error::BackendError;

pub const DEFAULT_SITE_URL: &str = "http://localhost:8080";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Project base URL; `/auth/v1`, `/rest/v1`, `/functions/v1` hang off it.
    pub base_url: String,
    /// Public anon key sent as `apikey` on every request.
    pub anon_key: String,
    /// Public URL of the dashboard, used to build email redirect links.
    pub site_url: String,
    pub timeouts: Timeouts,
}

impl BackendConfig {
    /// Build typed backend config from environment variables.
    ///
    /// Required:
    /// - `MEMBERDASH_BACKEND_URL`
    /// - `MEMBERDASH_ANON_KEY`
    ///
    /// Optional:
    /// - `MEMBERDASH_SITE_URL`: default `http://localhost:8080`
    /// - `MEMBERDASH_REQUEST_TIMEOUT_SECS`: default 30
    /// - `MEMBERDASH_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or the backend URL
    /// does not parse.
    pub fn from_env() -> Result<Self, BackendError> {
        let base_url = required("MEMBERDASH_BACKEND_URL")?;
        let anon_key = required("MEMBERDASH_ANON_KEY")?;
        let site_url = std::env::var("MEMBERDASH_SITE_URL").unwrap_or_else(|_| DEFAULT_SITE_URL.to_string());
        let timeouts = Timeouts {
            request_secs: env_parse_u64("MEMBERDASH_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64("MEMBERDASH_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        Self::new(&base_url, anon_key, &site_url, timeouts)
    }

    /// # Errors
    ///
    /// Returns [`BackendError::ConfigParse`] if `base_url` is not an absolute
    /// http(s) URL.
    pub fn new(base_url: &str, anon_key: String, site_url: &str, timeouts: Timeouts) -> Result<Self, BackendError> {
        let parsed = reqwest::Url::parse(base_url)
            .map_err(|e| BackendError::ConfigParse(format!("invalid MEMBERDASH_BACKEND_URL '{base_url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(BackendError::ConfigParse(format!("unsupported backend URL scheme: {}", parsed.scheme())));
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key,
            site_url: site_url.trim_end_matches('/').to_string(),
            timeouts,
        })
    }

    #[must_use]
    pub fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    #[must_use]
    pub fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    #[must_use]
    pub fn function_url(&self, name: &str) -> String {
        format!("{}/functions/v1/{}", self.base_url, name.trim_start_matches('/'))
    }

    /// Where password-reset emails send the user back to.
    #[must_use]
    pub fn reset_redirect_url(&self) -> String {
        format!("{}/reset-password", self.site_url)
    }
}

// The anon key is public but noisy; keep it out of logs anyway.
impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url)
            .field("site_url", &self.site_url)
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

fn required(key: &str) -> Result<String, BackendError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| BackendError::MissingEnv { var: key.into() })
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
