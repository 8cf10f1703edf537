use crate::error::Result;
use std::env;
use url::Url;

/// Production origin of the Novita API.
pub const DEFAULT_BASE_URL: &str = "https://api.novita.ai";

/// Environment variable consulted for the API key.
pub const API_KEY_ENV: &str = "NOVITA_API_KEY";

/// Environment variable consulted for a base URL override.
pub const BASE_URL_ENV: &str = "NOVITA_BASE_URL";

/// Source identifier sent in `X-Novita-Source` unless overridden per request.
pub fn default_source() -> String {
    format!("rust-sdk-novita/{}", env!("CARGO_PKG_VERSION"))
}

/// Connection settings shared by every call a [`crate::NovitaClient`] makes.
///
/// A configuration without an API key is valid; requests are then sent
/// anonymously.
#[derive(Debug, Clone)]
pub struct NovitaConfig {
    base_url: Url,
    api_key: Option<String>,
    source: String,
}

impl Default for NovitaConfig {
    fn default() -> Self {
        Self {
            // The constant is a valid absolute URL.
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            api_key: None,
            source: default_source(),
        }
    }
}

impl NovitaConfig {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|key| !key.is_empty()),
            ..Self::default()
        }
    }

    /// Builds a configuration from `NOVITA_API_KEY` and `NOVITA_BASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns an error if `NOVITA_BASE_URL` is set but is not a valid URL.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new(env::var(API_KEY_ENV).ok());
        if let Ok(base_url) = env::var(BASE_URL_ENV) {
            config.set_base_url(&base_url)?;
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        self.set_base_url(base_url)?;
        Ok(self)
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn set_api_key(&mut self, api_key: impl Into<String>) {
        let key = api_key.into();
        self.api_key = if key.is_empty() { None } else { Some(key) };
    }

    pub fn clear_api_key(&mut self) {
        self.api_key = None;
    }

    /// Replaces the base URL. Paths are appended to it verbatim, so a base
    /// with a path prefix (e.g. a proxy) is supported.
    pub fn set_base_url(&mut self, base_url: &str) -> Result<()> {
        self.base_url = Url::parse(base_url.trim_end_matches('/'))?;
        Ok(())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Joins an absolute API path (e.g. `/v2/txt2img`) onto the base URL.
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{}{}", base, path))?)
    }
}
