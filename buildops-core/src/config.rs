//! Configuration for the buildops API and CLI
//!
//! Precedence, lowest first:
//! 1. Built-in defaults
//! 2. `~/.buildops/config.toml` (or the file named by `BUILDOPS_CONFIG`)
//! 3. Environment variables (`.env` is loaded first)

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildopsConfig {
    pub server: ServerSection,
    pub database: DatabaseSection,
    pub redis: RedisSection,
    pub auth: AuthSection,
    pub rate_limit: RateLimitSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    /// Origin of the web client, used for CORS and links
    pub web_url: String,
    /// `development` or `production`
    pub environment: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            web_url: "http://localhost:3000".to_string(),
            environment: "development".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/buildops".to_string(),
            max_connections: 10,
        }
    }
}

/// Redis settings. Without a URL the server keeps short-lived state in memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisSection {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub session_ttl_days: i64,
    pub trial_days: i64,
    pub invitation_ttl_days: i64,
    pub mfa_issuer: String,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            session_ttl_days: 30,
            trial_days: 14,
            invitation_ttl_days: 7,
            mfa_issuer: "BuildOps".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSection {
    pub max_requests: u64,
    pub window_secs: u64,
    /// Reverse proxies whose `x-forwarded-for` is believed. Empty means the
    /// peer address is always the client.
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_secs: 60,
            trusted_proxies: Vec::new(),
        }
    }
}

impl BuildopsConfig {
    /// Load config from the config file (if any) and the environment.
    ///
    /// A missing config file is not an error; a malformed one is.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match Self::config_path() {
            Some(path) if path.exists() => {
                let raw = fs::read_to_string(&path)?;
                let config = toml::from_str(&raw).map_err(|e| CoreError::toml(&path, e))?;
                tracing::debug!(path = %path.display(), "loaded config file");
                config
            }
            _ => Self::default(),
        };

        config.apply_env(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML document, filling missing keys with defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| CoreError::toml("<inline>", e))
    }

    /// Path of the config file: `$BUILDOPS_CONFIG` or `~/.buildops/config.toml`.
    pub fn config_path() -> Option<PathBuf> {
        if let Ok(explicit) = env::var("BUILDOPS_CONFIG") {
            return Some(PathBuf::from(explicit));
        }
        dirs::home_dir().map(|home| home.join(".buildops").join("config.toml"))
    }

    /// Overlay environment variables read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(url) = lookup("REDIS_URL").filter(|u| !u.trim().is_empty()) {
            self.redis.url = Some(url);
        }
        if let Some(host) = lookup("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("API_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| CoreError::config(format!("API_PORT must be a port number, got '{port}'")))?;
        }
        if let Some(web_url) = lookup("WEB_URL") {
            self.server.web_url = web_url;
        }
        if let Some(environment) = lookup("BUILDOPS_ENV") {
            self.server.environment = environment;
        }
        if let Some(proxies) = lookup("TRUSTED_PROXIES") {
            self.rate_limit.trusted_proxies = proxies
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| {
                    p.parse().map_err(|_| {
                        CoreError::config(format!("TRUSTED_PROXIES entry '{p}' is not an IP address"))
                    })
                })
                .collect::<Result<_>>()?;
        }
        Ok(())
    }

    /// Socket address the API binds to.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|_| {
                CoreError::config(format!(
                    "invalid bind address {}:{}",
                    self.server.host, self.server.port
                ))
            })
    }

    pub fn is_production(&self) -> bool {
        self.server.environment.eq_ignore_ascii_case("production")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = BuildopsConfig::default();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.auth.session_ttl_days, 30);
        assert!(config.redis.url.is_none());
        assert!(!config.is_production());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = BuildopsConfig::from_toml_str(
            r#"
            [server]
            port = 8080

            [redis]
            url = "redis://cache:6379"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.redis.url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(config.database.max_connections, 10);
    }

    #[test]
    fn malformed_toml_is_error() {
        let err = BuildopsConfig::from_toml_str("[server\nport = 1").unwrap_err();
        assert!(matches!(err, CoreError::Toml { .. }));
    }

    #[test]
    fn env_overrides() {
        let mut config = BuildopsConfig::default();
        config
            .apply_env(lookup_from(&[
                ("DATABASE_URL", "postgres://db/app"),
                ("API_PORT", "4000"),
                ("BUILDOPS_ENV", "production"),
                ("REDIS_URL", ""),
            ]))
            .unwrap();
        assert_eq!(config.database.url, "postgres://db/app");
        assert_eq!(config.server.port, 4000);
        assert!(config.is_production());
        assert!(config.redis.url.is_none());
    }

    #[test]
    fn bad_port_rejected() {
        let mut config = BuildopsConfig::default();
        let err = config
            .apply_env(lookup_from(&[("API_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
    }

    #[test]
    fn trusted_proxies_from_env_and_toml() {
        assert!(BuildopsConfig::default().rate_limit.trusted_proxies.is_empty());

        let mut config = BuildopsConfig::from_toml_str(
            r#"
            [rate_limit]
            trusted_proxies = ["10.0.0.1"]
            "#,
        )
        .unwrap();
        assert_eq!(config.rate_limit.trusted_proxies, vec!["10.0.0.1".parse::<IpAddr>().unwrap()]);

        config
            .apply_env(lookup_from(&[("TRUSTED_PROXIES", "10.0.0.2, ::1")]))
            .unwrap();
        assert_eq!(config.rate_limit.trusted_proxies.len(), 2);

        let err = config
            .apply_env(lookup_from(&[("TRUSTED_PROXIES", "proxy.internal")]))
            .unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
    }

    #[test]
    fn bind_addr_parses() {
        let config = BuildopsConfig::default();
        assert_eq!(config.bind_addr().unwrap().port(), 3001);
    }
}
