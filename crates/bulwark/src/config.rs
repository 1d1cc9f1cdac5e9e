//! Configuration management for Bulwark.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use bulwark_common::RuntimePosture;
use bulwark_common::constants::DEFAULT_LISTEN_ADDR;

use crate::ratelimit::DistributedSettings;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Production fails closed without a counter store
    #[serde(default)]
    pub posture: RuntimePosture,

    /// Distributed counter store; absent means in-memory (development only)
    #[serde(default)]
    pub counter_store: Option<DistributedSettings>,

    /// Read client addresses and scheme from proxy headers
    #[serde(default)]
    pub trust_proxy: bool,

    /// CSRF cookie configuration
    #[serde(default)]
    pub csrf: CsrfConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CsrfConfig {
    /// Force the cookie's `Secure` attribute; unset follows the request scheme
    #[serde(default)]
    pub secure_cookie: Option<bool>,
}

/// Values from the command line / environment that win over the file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub listen: Option<String>,
    pub redis_url: Option<String>,
    pub redis_token: Option<String>,
    pub posture: Option<RuntimePosture>,
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

impl AppConfig {
    /// Load configuration from file, with CLI overrides
    pub fn load(config_path: &str, overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let settings = config::Config::builder()
                .add_source(config::File::with_name(config_path))
                .build()
                .context("Failed to load config file")?;

            settings
                .try_deserialize()
                .context("Failed to parse config")?
        } else {
            tracing::warn!(path = config_path, "Config file not found, using defaults");
            Self::default()
        };

        config.apply(overrides);
        Ok(config)
    }

    fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref listen) = overrides.listen {
            self.listen_addr = listen.clone();
        }
        if let Some(posture) = overrides.posture {
            self.posture = posture;
        }

        if let Some(ref endpoint) = overrides.redis_url {
            let credential = self
                .counter_store
                .take()
                .and_then(|store| store.credential);
            self.counter_store = Some(DistributedSettings {
                endpoint: endpoint.clone(),
                credential,
            });
        }

        if let Some(ref token) = overrides.redis_token {
            match self.counter_store.as_mut() {
                Some(store) => store.credential = Some(token.clone()),
                None => tracing::warn!("Redis token given without a Redis URL, ignoring"),
            }
        }
    }

    /// A production process with no counter store rejects every limited request
    pub fn fails_closed(&self) -> bool {
        self.posture.is_production() && self.counter_store.is_none()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            posture: RuntimePosture::default(),
            counter_store: None,
            trust_proxy: false,
            csrf: CsrfConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_production_without_store() {
        let config = AppConfig::default();
        assert_eq!(config.listen_addr, DEFAULT_LISTEN_ADDR);
        assert_eq!(config.posture, RuntimePosture::Production);
        assert!(config.fails_closed());
        assert!(!config.trust_proxy);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load("does/not/exist.toml", &ConfigOverrides::default()).unwrap();
        assert!(config.counter_store.is_none());
    }

    #[test]
    fn test_overrides_build_counter_store() {
        let mut config = AppConfig::default();
        config.apply(&ConfigOverrides {
            listen: Some("0.0.0.0:9000".into()),
            redis_url: Some("redis://cache:6379".into()),
            redis_token: Some("s3cret".into()),
            posture: Some(RuntimePosture::Development),
        });

        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.posture, RuntimePosture::Development);
        let store = config.counter_store.as_ref().unwrap();
        assert_eq!(store.endpoint, "redis://cache:6379");
        assert_eq!(store.credential.as_deref(), Some("s3cret"));
        assert!(!config.fails_closed());
    }

    #[test]
    fn test_url_override_keeps_file_credential() {
        let mut config = AppConfig {
            counter_store: Some(DistributedSettings {
                endpoint: "redis://old:6379".into(),
                credential: Some("from-file".into()),
            }),
            ..AppConfig::default()
        };
        config.apply(&ConfigOverrides {
            redis_url: Some("redis://new:6379".into()),
            ..ConfigOverrides::default()
        });

        let store = config.counter_store.unwrap();
        assert_eq!(store.endpoint, "redis://new:6379");
        assert_eq!(store.credential.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_token_without_url_is_ignored() {
        let mut config = AppConfig::default();
        config.apply(&ConfigOverrides {
            redis_token: Some("orphan".into()),
            ..ConfigOverrides::default()
        });
        assert!(config.counter_store.is_none());
    }

    #[test]
    fn test_parses_toml() {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                listen_addr = "127.0.0.1:7000"
                posture = "development"
                trust_proxy = true

                [counter_store]
                endpoint = "redis://127.0.0.1:6379"

                [csrf]
                secure_cookie = true
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let config: AppConfig = settings.try_deserialize().unwrap();

        assert_eq!(config.posture, RuntimePosture::Development);
        assert!(config.trust_proxy);
        assert_eq!(config.csrf.secure_cookie, Some(true));
        assert!(config.counter_store.unwrap().credential.is_none());
    }
}
