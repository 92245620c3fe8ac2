pub mod tracing;

use std::env;
use thiserror::Error;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable '{0}' is required but not set")]
    MissingEnvVar(String),

    #[error("Failed to parse environment variable '{key}': {details}")]
    ParseError { key: String, details: String },
}

/// Application run mode, read from `APP_ENV`.
///
/// Development and test modes favour fresh reads over caching; staging and
/// production behave identically apart from log format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Staging,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        Self::parse(&app_env)
    }

    /// Parse a run mode name. Unknown names fall back to development.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            "test" => Environment::Test,
            _ => Environment::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    pub fn is_test(&self) -> bool {
        matches!(self, Environment::Test)
    }

    /// Whether compiled artifacts (templates etc.) may be cached in memory.
    pub fn allows_caching(&self) -> bool {
        matches!(self, Environment::Staging | Environment::Production)
    }

    /// Whether logs should be emitted as JSON for aggregation.
    pub fn structured_logs(&self) -> bool {
        matches!(self, Environment::Staging | Environment::Production)
    }
}

/// Trait for configuration that can be loaded from environment variables
pub trait FromEnv: Sized {
    fn from_env() -> Result<Self, ConfigError>;
}

/// Helper to load and parse environment variable with a default value
pub fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Helper to load and parse environment variable or return error
pub fn env_required(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Optional, non-empty environment variable.
pub fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a boolean switch (`true/t/1/yes`, `false/f/0/no`, case-insensitive).
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" => Some(true),
        "false" | "f" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Boolean environment variable; unset yields `None`.
pub fn env_flag(key: &str) -> Result<Option<bool>, ConfigError> {
    match env_optional(key) {
        None => Ok(None),
        Some(raw) => parse_flag(&raw).map(Some).ok_or_else(|| ConfigError::ParseError {
            key: key.to_string(),
            details: format!("expected a boolean, got '{}'", raw),
        }),
    }
}

/// Comma separated environment variable; blank entries are dropped.
pub fn env_list(key: &str) -> Vec<String> {
    env_optional(key)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a numeric environment variable, falling back to `default` when unset.
pub fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env_optional(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::ParseError {
            key: key.to_string(),
            details: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_defaults_to_development() {
        temp_env::with_var_unset("APP_ENV", || {
            let env = Environment::from_env();
            assert_eq!(env, Environment::Development);
            assert!(env.is_development());
            assert!(!env.allows_caching());
        });
    }

    #[test]
    fn test_environment_test_mode() {
        temp_env::with_var("APP_ENV", Some("TEST"), || {
            let env = Environment::from_env();
            assert!(env.is_test());
            assert!(!env.allows_caching());
            assert!(!env.structured_logs());
        });
    }

    #[test]
    fn test_environment_production_like_modes_cache() {
        assert!(Environment::parse("Production").allows_caching());
        assert!(Environment::parse("staging").allows_caching());
        assert_eq!(Environment::parse("qa"), Environment::Development);
    }

    #[test]
    fn test_parse_flag() {
        for yes in ["true", "T", "1", "yes"] {
            assert_eq!(parse_flag(yes), Some(true), "{yes}");
        }
        for no in ["false", "f", "0", "NO"] {
            assert_eq!(parse_flag(no), Some(false), "{no}");
        }
        assert_eq!(parse_flag("default"), None);
    }

    #[test]
    fn test_env_flag_invalid_value() {
        temp_env::with_var("MAIL_FLAG_TEST", Some("maybe"), || {
            let err = env_flag("MAIL_FLAG_TEST").unwrap_err();
            assert!(err.to_string().contains("MAIL_FLAG_TEST"));
        });
    }

    #[test]
    fn test_env_list_splits_and_trims() {
        temp_env::with_var("MAIL_LIST_TEST", Some(" a@x.io, ,b@x.io "), || {
            assert_eq!(env_list("MAIL_LIST_TEST"), vec!["a@x.io", "b@x.io"]);
        });
        temp_env::with_var_unset("MAIL_LIST_TEST", || {
            assert!(env_list("MAIL_LIST_TEST").is_empty());
        });
    }

    #[test]
    fn test_env_parse_port() {
        temp_env::with_var("MAIL_PORT_TEST", Some("2525"), || {
            assert_eq!(env_parse::<u16>("MAIL_PORT_TEST", 25).unwrap(), 2525);
        });
        temp_env::with_var("MAIL_PORT_TEST", Some("nope"), || {
            assert!(env_parse::<u16>("MAIL_PORT_TEST", 25).is_err());
        });
    }

    #[test]
    fn test_env_or_default_without_value() {
        temp_env::with_var_unset("MISSING_VAR", || {
            let result = env_or_default("MISSING_VAR", "default_value");
            assert_eq!(result, "default_value");
        });
    }

    #[test]
    fn test_env_required_missing() {
        temp_env::with_var_unset("MISSING_REQUIRED", || {
            let err = env_required("MISSING_REQUIRED").unwrap_err();
            assert!(err.to_string().contains("MISSING_REQUIRED"));
        });
    }
}
