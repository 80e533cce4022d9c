use std::{sync::Arc, time::Duration};

use chrono::FixedOffset;
use jsonwebtoken::Algorithm;
use secrecy::SecretString;
use thiserror::Error;

use crate::clock::{Clock, parse_offset};

const DEFAULT_APP_NAME: &str = "Pricepally Operations Tracker";
const DEFAULT_TIMEZONE: &str = "Africa/Lagos";
const DEFAULT_UTC_OFFSET: &str = "+01:00";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
const MAX_EXPIRATION_HOURS: i64 = 24 * 366;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable `{0}` is not set")]
    MissingVar(&'static str),
    #[error("invalid value for `{key}`: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<SecretString>,
    pub algorithm: Algorithm,
    pub expiration_hours: i64,
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub app_name: String,
    pub app_version: String,
    pub debug: bool,
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt: JwtConfig,
    pub timezone: String,
    pub utc_offset: FixedOffset,
    pub frontend_url: String,
    pub rate_limit_per_minute: u32,
    pub session_cleanup_interval: Duration,
}

impl TrackerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::MissingVar("DATABASE_URL"))?;
        let secret = get("JWT_SECRET_KEY").ok_or(ConfigError::MissingVar("JWT_SECRET_KEY"))?;

        let algorithm = match get("JWT_ALGORITHM") {
            Some(value) => parse_algorithm(&value).ok_or(ConfigError::InvalidValue {
                key: "JWT_ALGORITHM",
                value,
            })?,
            None => Algorithm::HS256,
        };

        let utc_offset_raw = get("UTC_OFFSET").unwrap_or_else(|| DEFAULT_UTC_OFFSET.to_string());
        let utc_offset = parse_offset(&utc_offset_raw).ok_or(ConfigError::InvalidValue {
            key: "UTC_OFFSET",
            value: utc_offset_raw,
        })?;

        let expiration_hours = parse_or("JWT_EXPIRATION_HOURS", get("JWT_EXPIRATION_HOURS"), 24)?;
        if !(1..=MAX_EXPIRATION_HOURS).contains(&expiration_hours) {
            return Err(ConfigError::InvalidValue {
                key: "JWT_EXPIRATION_HOURS",
                value: expiration_hours.to_string(),
            });
        }

        let cleanup_secs: u64 = parse_or(
            "SESSION_CLEANUP_INTERVAL_SECS",
            get("SESSION_CLEANUP_INTERVAL_SECS"),
            15 * 60,
        )?;
        if cleanup_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "SESSION_CLEANUP_INTERVAL_SECS",
                value: cleanup_secs.to_string(),
            });
        }

        Ok(Self {
            app_name: get("APP_NAME").unwrap_or_else(|| DEFAULT_APP_NAME.to_string()),
            app_version: get("APP_VERSION")
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            debug: get("DEBUG").map(|v| parse_bool(&v)).unwrap_or(false),
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("PORT", get("PORT"), 8000)?,
            database_url,
            jwt: JwtConfig {
                secret: Arc::new(SecretString::from(secret)),
                algorithm,
                expiration_hours,
            },
            timezone: get("TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
            utc_offset,
            frontend_url: get("FRONTEND_URL").unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string()),
            rate_limit_per_minute: parse_or(
                "RATE_LIMIT_PER_MINUTE",
                get("RATE_LIMIT_PER_MINUTE"),
                60,
            )?,
            session_cleanup_interval: Duration::from_secs(cleanup_secs),
        })
    }

    /// Origins allowed by CORS. Debug mode adds the usual local dev servers.
    pub fn cors_origins(&self) -> Vec<String> {
        let mut origins = vec![self.frontend_url.clone()];
        if self.debug {
            for origin in [
                "http://localhost:3000",
                "http://127.0.0.1:3000",
                "http://localhost:8000",
            ] {
                if !origins.iter().any(|o| o == origin) {
                    origins.push(origin.to_string());
                }
            }
        }
        origins
    }

    pub fn clock(&self) -> Clock {
        Clock::new(self.timezone.clone(), self.utc_offset)
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_algorithm(value: &str) -> Option<Algorithm> {
    match value.trim().to_ascii_uppercase().as_str() {
        "HS256" => Some(Algorithm::HS256),
        "HS384" => Some(Algorithm::HS384),
        "HS512" => Some(Algorithm::HS512),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("DATABASE_URL", "postgres://localhost/tracker"),
        ("JWT_SECRET_KEY", "secret"),
    ];

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.app_name, "Pricepally Operations Tracker");
        assert_eq!(config.port, 8000);
        assert_eq!(config.host, "0.0.0.0");
        assert!(!config.debug);
        assert_eq!(config.jwt.algorithm, Algorithm::HS256);
        assert_eq!(config.jwt.expiration_hours, 24);
        assert_eq!(config.jwt.secret.expose_secret(), "secret");
        assert_eq!(config.utc_offset, FixedOffset::east_opt(3600).unwrap());
        assert_eq!(config.rate_limit_per_minute, 60);
        assert_eq!(config.session_cleanup_interval, Duration::from_secs(900));
        assert_eq!(config.cors_origins(), vec!["http://localhost:3000"]);
    }

    #[test]
    fn test_missing_required_values() {
        let err = TrackerConfig::from_lookup(lookup(&[("JWT_SECRET_KEY", "x")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("DATABASE_URL")));

        let err =
            TrackerConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://x")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("JWT_SECRET_KEY")));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PORT", "eighty"));
        let err = TrackerConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "PORT", .. }));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("JWT_ALGORITHM", "RS256"));
        let err = TrackerConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "JWT_ALGORITHM", .. }));
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        for (key, value) in [
            ("SESSION_CLEANUP_INTERVAL_SECS", "0"),
            ("JWT_EXPIRATION_HOURS", "0"),
            ("JWT_EXPIRATION_HOURS", "3000000000"),
        ] {
            let mut pairs = REQUIRED.to_vec();
            pairs.push((key, value));
            let err = TrackerConfig::from_lookup(lookup(&pairs)).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue { key: k, .. } if k == key),
                "{key}={value} should be rejected"
            );
        }

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("JWT_EXPIRATION_HOURS", "8784"));
        assert!(TrackerConfig::from_lookup(lookup(&pairs)).is_ok());
    }

    #[test]
    fn test_debug_adds_local_origins() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("DEBUG", "True"));
        pairs.push(("FRONTEND_URL", "https://ops.example.com"));
        let config = TrackerConfig::from_lookup(lookup(&pairs)).unwrap();
        assert!(config.debug);
        assert_eq!(
            config.cors_origins(),
            vec![
                "https://ops.example.com",
                "http://localhost:3000",
                "http://127.0.0.1:3000",
                "http://localhost:8000",
            ]
        );
    }
}
