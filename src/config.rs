use std::time::Duration;

use url::Url;

use crate::error::Error;

const FALLBACK_API_URL: &str = "http://localhost:3333";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Backend base URL baked in at build time, if set.
const BUILD_API_URL: Option<&str> = option_env!("GUINCHOLINK_API_URL");

/// Client configuration for the GuinchoLink backend.
///
/// The base URL is the only required value; everything else has a default
/// that can be overridden with the `with_*` methods.
///
/// ```rust,ignore
/// use guincholink_auth::ClientConfig;
///
/// let config = ClientConfig::new("https://api.example.com/".parse()?)
///     .with_timeout(std::time::Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) base_url: Url,
    pub(crate) timeout: Duration,
    pub(crate) login_path: String,
}

impl ClientConfig {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url: with_trailing_slash(base_url),
            timeout: DEFAULT_TIMEOUT,
            login_path: "/login".into(),
        }
    }

    /// Create config from environment variables at runtime.
    ///
    /// # Optional env vars
    /// - `GUINCHOLINK_API_URL`: backend base URL (default: build-time value,
    ///   else `http://localhost:3333`)
    /// - `GUINCHOLINK_TIMEOUT_SECS`: request timeout in seconds (default: 30)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = match std::env::var("GUINCHOLINK_API_URL") {
            Ok(url_str) => {
                let url: Url = url_str
                    .parse()
                    .map_err(|e| Error::Config(format!("GUINCHOLINK_API_URL: {e}")))?;
                Self::new(url)
            }
            Err(_) => Self::default(),
        };

        if let Ok(secs) = std::env::var("GUINCHOLINK_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("GUINCHOLINK_TIMEOUT_SECS: {e}")))?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Override the per-request timeout. Expiry surfaces as [`Error::Network`].
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the login view path used for redirects (default: `/login`).
    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Resolve an API path against the base URL.
    ///
    /// The path is always taken relative to the base, so a base URL with a
    /// path prefix keeps it: `https://h/api/` + `/clientes` is
    /// `https://h/api/clientes`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the joined URL is invalid.
    pub fn endpoint(&self, path: &str) -> Result<Url, Error> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::Config(format!("invalid path {path:?}: {e}")))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        let url = BUILD_API_URL
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| FALLBACK_API_URL.parse().expect("valid default URL"));
        Self::new(url)
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let config = ClientConfig::new("https://api.example.com/guincho".parse().unwrap());
        assert_eq!(
            config.endpoint("/auth/login").unwrap().as_str(),
            "https://api.example.com/guincho/auth/login"
        );
        assert_eq!(
            config.endpoint("clientes/3").unwrap().as_str(),
            "https://api.example.com/guincho/clientes/3"
        );
    }

    #[test]
    fn endpoint_on_bare_host() {
        let config = ClientConfig::new("http://localhost:3333".parse().unwrap());
        assert_eq!(
            config.endpoint("/auth/refresh").unwrap().as_str(),
            "http://localhost:3333/auth/refresh"
        );
    }

    #[test]
    fn defaults() {
        let config = ClientConfig::new("http://localhost:3333".parse().unwrap());
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.login_path(), "/login");
    }

    #[test]
    fn from_env_parses_and_rejects_values() {
        // SAFETY: no other test in this binary reads or writes these variables.
        unsafe {
            std::env::set_var("GUINCHOLINK_API_URL", "not a url");
            std::env::remove_var("GUINCHOLINK_TIMEOUT_SECS");
        }
        assert!(matches!(ClientConfig::from_env(), Err(Error::Config(_))));

        unsafe {
            std::env::set_var("GUINCHOLINK_API_URL", "http://10.0.0.5:3333/api");
            std::env::set_var("GUINCHOLINK_TIMEOUT_SECS", "trinta");
        }
        assert!(matches!(ClientConfig::from_env(), Err(Error::Config(_))));

        unsafe {
            std::env::set_var("GUINCHOLINK_TIMEOUT_SECS", " 12 ");
        }
        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.base_url().as_str(), "http://10.0.0.5:3333/api/");
        assert_eq!(config.timeout(), Duration::from_secs(12));

        unsafe {
            std::env::remove_var("GUINCHOLINK_API_URL");
            std::env::remove_var("GUINCHOLINK_TIMEOUT_SECS");
        }
    }

    #[test]
    fn overrides() {
        let config = ClientConfig::default()
            .with_timeout(Duration::from_secs(5))
            .with_login_path("/entrar");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.login_path(), "/entrar");
    }
}
