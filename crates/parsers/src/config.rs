// ABOUTME: Per-source configuration: domain, scheme, user agent, page sizes, timeout and headers.
// ABOUTME: SourceConfigBuilder provides a fluent API for overriding an adapter's defaults.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// User agent sent when a source does not declare its own.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Linux; Android 13; Pixel 7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36";

/// Desktop Chrome user agent for sources that reject mobile clients.
pub const CHROME_DESKTOP_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Runtime configuration of one adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub domain: String,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_page_size")]
    pub search_page_size: usize,
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub timeout: Duration,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_page_size() -> usize {
    20
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

impl SourceConfig {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            scheme: default_scheme(),
            user_agent: None,
            page_size: default_page_size(),
            search_page_size: default_page_size(),
            timeout: default_timeout(),
            headers: HashMap::new(),
        }
    }

    /// `scheme://domain` without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.domain)
    }

    /// The user agent to send: the override if any, otherwise the library default.
    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }

    /// Apply caller overrides on top of an adapter's defaults.
    pub fn merge(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(ref domain) = overrides.domain {
            self.domain = domain.clone();
        }
        if let Some(ref scheme) = overrides.scheme {
            self.scheme = scheme.clone();
        }
        if let Some(ref ua) = overrides.user_agent {
            self.user_agent = Some(ua.clone());
        }
        if let Some(secs) = overrides.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        self.headers
            .extend(overrides.headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }
}

/// Optional settings a caller persists per source and applies with [`SourceConfig::merge`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigOverrides {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub scheme: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Builder for a [`SourceConfig`].
#[derive(Debug, Clone)]
pub struct SourceConfigBuilder {
    config: SourceConfig,
}

impl SourceConfigBuilder {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            config: SourceConfig::new(domain),
        }
    }

    /// Set the domain.
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.config.domain = domain.into();
        self
    }

    /// Set the URL scheme (tests point adapters at plain `http` mock servers).
    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.config.scheme = scheme.into();
        self
    }

    /// Set the User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.config.page_size = page_size;
        self
    }

    pub fn search_page_size(mut self, search_page_size: usize) -> Self {
        self.config.search_page_size = search_page_size;
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Add a header sent with every request.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.headers.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> SourceConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let config = SourceConfigBuilder::new("mangago.me")
            .page_size(48)
            .search_page_size(10)
            .user_agent("ua")
            .header("Referer", "https://mangago.me/")
            .build();
        assert_eq!(config.base_url(), "https://mangago.me");
        assert_eq!(config.page_size, 48);
        assert_eq!(config.search_page_size, 10);
        assert_eq!(config.user_agent(), "ua");
        assert_eq!(config.headers.len(), 1);
    }

    #[test]
    fn default_user_agent_applies() {
        let config = SourceConfig::new("example.org");
        assert_eq!(config.user_agent(), DEFAULT_USER_AGENT);
    }

    #[test]
    fn overrides_merge_from_json() {
        let overrides: ConfigOverrides =
            serde_json::from_str(r#"{"domain":"mirror.example","timeout_secs":5}"#).unwrap();
        let config = SourceConfig::new("example.org").merge(&overrides);
        assert_eq!(config.domain, "mirror.example");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.scheme, "https");
    }
}
