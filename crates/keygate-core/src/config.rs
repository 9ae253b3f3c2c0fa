//! Service configuration
//!
//! Loaded from TOML, then overlaid with `KEYGATE_*` environment variables,
//! then validated. Every section is optional and falls back to its defaults.

use crate::page::Page;
use crate::{KeygateError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Minimum HMAC secret length in bytes
pub const MIN_SECRET_BYTES: usize = 32;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeygateConfig {
    /// Token signing
    pub token: TokenConfig,
    /// Log output
    pub logging: LoggingConfig,
    /// List pagination bounds
    pub listing: ListingConfig,
}

/// Token signing settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Hex-encoded HMAC secret; a random one is generated when absent
    pub secret: Option<String>,
    /// Lifetime of issued tokens; tokens never expire when absent
    pub ttl_secs: Option<u64>,
}

impl TokenConfig {
    /// Decoded secret, if configured
    pub fn secret_bytes(&self) -> Result<Option<Vec<u8>>> {
        let Some(secret) = &self.secret else {
            return Ok(None);
        };
        let bytes = hex::decode(secret.trim())
            .map_err(|e| KeygateError::invalid_argument(format!("token secret is not hex: {e}")))?;
        if bytes.len() < MIN_SECRET_BYTES {
            return Err(KeygateError::invalid_argument(format!(
                "token secret must be at least {MIN_SECRET_BYTES} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Some(bytes))
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. `info` or `keygate=debug`
    pub level: String,
    /// Colored output
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}

/// List pagination bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Limit used when a request leaves it at 0
    pub default_limit: u64,
    /// Upper bound on any requested limit
    pub max_limit: u64,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 1000,
        }
    }
}

impl ListingConfig {
    /// Apply these bounds to a requested page
    pub fn bound(&self, page: Page) -> Page {
        page.bounded(self.default_limit, self.max_limit)
    }
}

impl KeygateConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            KeygateError::internal(format!(
                "failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Overlay `KEYGATE_*` variables from the process environment
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Overlay `KEYGATE_*` variables from an explicit set
    pub fn merge_with_vars<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            match key.as_ref() {
                "KEYGATE_TOKEN_SECRET" => self.token.secret = Some(value.into()),
                "KEYGATE_TOKEN_TTL_SECS" => {
                    let raw = value.into();
                    let ttl = raw.parse::<u64>().map_err(|e| {
                        KeygateError::invalid_argument(format!(
                            "KEYGATE_TOKEN_TTL_SECS={raw}: {e}"
                        ))
                    })?;
                    self.token.ttl_secs = Some(ttl);
                }
                "KEYGATE_LOG_LEVEL" => self.logging.level = value.into(),
                other if other.starts_with("KEYGATE_") => {
                    tracing::debug!(variable = other, "ignoring unknown keygate variable");
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.token.secret_bytes()?;
        if self.token.ttl_secs == Some(0) {
            return Err(KeygateError::invalid_argument(
                "token ttl_secs must be positive when set",
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(KeygateError::invalid_argument("logging level is empty"));
        }
        if self.listing.default_limit == 0 {
            return Err(KeygateError::invalid_argument(
                "listing default_limit must be positive",
            ));
        }
        if self.listing.default_limit > self.listing.max_limit {
            return Err(KeygateError::invalid_argument(format!(
                "listing default_limit {} exceeds max_limit {}",
                self.listing.default_limit, self.listing.max_limit
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    const SECRET: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn test_defaults_are_valid() {
        let config = KeygateConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.listing.default_limit, 20);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[token]\nsecret = \"{SECRET}\"\nttl_secs = 3600\n\n[listing]\ndefault_limit = 5"
        )
        .unwrap();

        let config = KeygateConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.token.ttl_secs, Some(3600));
        assert_eq!(config.listing.default_limit, 5);
        assert_eq!(config.listing.max_limit, 1000);
        assert_eq!(config.token.secret_bytes().unwrap().unwrap().len(), 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overlay() {
        let mut config = KeygateConfig::default();
        config
            .merge_with_vars([
                ("KEYGATE_LOG_LEVEL", "debug"),
                ("KEYGATE_TOKEN_TTL_SECS", "60"),
                ("HOME", "/root"),
            ])
            .unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.token.ttl_secs, Some(60));

        assert_matches!(
            config.merge_with_vars([("KEYGATE_TOKEN_TTL_SECS", "soon")]),
            Err(KeygateError::InvalidArgument { .. })
        );
    }

    #[test]
    fn test_validation_failures() {
        let short = KeygateConfig {
            token: TokenConfig {
                secret: Some("abcd".into()),
                ttl_secs: None,
            },
            ..KeygateConfig::default()
        };
        assert_matches!(short.validate(), Err(KeygateError::InvalidArgument { .. }));

        let mut inverted = KeygateConfig::default();
        inverted.listing.default_limit = 50;
        inverted.listing.max_limit = 10;
        assert!(inverted.validate().is_err());

        assert_matches!(
            KeygateConfig::from_toml_str("[listing]\ndefault_limit = \"many\""),
            Err(KeygateError::Serialization { .. })
        );
    }
}
