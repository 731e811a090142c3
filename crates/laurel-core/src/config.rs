//! Configuration parsing and validation.
//!
//! The core reads one TOML file (or embedded string) describing where
//! the database lives, how certificate numbers are formatted, and where
//! verification links point.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sequence::NumberFormat;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The parsed config is semantically invalid.
    #[error("invalid config: {0}")]
    Validation(String),
}

/// Top-level configuration of the graduation core.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CoreConfig {
    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Certificate number settings.
    #[serde(default)]
    pub certificate: CertificateConfig,

    /// Verification link settings.
    #[serde(default)]
    pub verification: VerificationConfig,
}

impl CoreConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or
    /// validated.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.certificate.number_prefix.trim().is_empty() {
            return Err(ConfigError::Validation(
                "certificate.number_prefix must not be empty".to_owned(),
            ));
        }
        if self.certificate.pad_width == 0 {
            return Err(ConfigError::Validation(
                "certificate.pad_width must be at least 1".to_owned(),
            ));
        }
        if self.verification.base_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "verification.base_url must not be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path of the `SQLite` database file.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("laurel.db"),
        }
    }
}

/// Certificate number settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateConfig {
    /// Leading prefix of every certificate number.
    pub number_prefix: String,

    /// Minimum digit count of the sequence component.
    pub pad_width: usize,
}

impl Default for CertificateConfig {
    fn default() -> Self {
        let format = NumberFormat::default();
        Self {
            number_prefix: format.prefix,
            pad_width: format.pad_width,
        }
    }
}

impl CertificateConfig {
    /// Returns the number layout described by this config.
    #[must_use]
    pub fn number_format(&self) -> NumberFormat {
        NumberFormat {
            prefix: self.number_prefix.clone(),
            pad_width: self.pad_width,
        }
    }
}

/// Verification link settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Base URL that verification hashes are appended to.
    pub base_url: String,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://verify.example.org/certificates".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = CoreConfig::default();
        config.validate().expect("default config validates");
        assert_eq!(config.certificate.number_prefix, "PFX");
        assert_eq!(config.certificate.pad_width, 4);
    }

    #[test]
    fn parses_full_toml() {
        let config = CoreConfig::from_toml(
            r#"
            [database]
            path = "/var/lib/laurel/core.db"

            [certificate]
            number_prefix = "GC"
            pad_width = 6

            [verification]
            base_url = "https://certs.school.example/verify"
            "#,
        )
        .expect("config parses");

        assert_eq!(config.database.path, PathBuf::from("/var/lib/laurel/core.db"));
        assert_eq!(config.certificate.number_format().prefix, "GC");
        assert_eq!(config.certificate.number_format().pad_width, 6);
        assert_eq!(
            config.verification.base_url,
            "https://certs.school.example/verify"
        );
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = CoreConfig::from_toml("").expect("empty config parses");
        assert_eq!(config.certificate.number_prefix, "PFX");
    }

    #[test]
    fn rejects_zero_pad_width() {
        let err = CoreConfig::from_toml(
            r#"
            [certificate]
            number_prefix = "PFX"
            pad_width = 0
            "#,
        )
        .expect_err("zero pad width rejected");
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn rejects_empty_base_url() {
        let err = CoreConfig::from_toml(
            r#"
            [verification]
            base_url = ""
            "#,
        )
        .expect_err("empty base url rejected");
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
