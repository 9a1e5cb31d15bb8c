use std::path::PathBuf;
use std::time::Duration;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("HERALD_JWT_SECRET is unset or still a placeholder")]
    MissingSecret,

    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    /// `None` disables the list cache.
    pub cache_ttl: Option<Duration>,
    pub store_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = lookup("HERALD_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            return Err(ConfigError::MissingSecret);
        }

        let cache_ttl_secs: u64 = parse(&lookup, "HERALD_CACHE_TTL_SECS", 60)?;
        let store_timeout_ms: u64 = parse(&lookup, "HERALD_STORE_TIMEOUT_MS", 5000)?;
        if store_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "HERALD_STORE_TIMEOUT_MS",
                value: "0".into(),
            });
        }

        Ok(Self {
            host: lookup("HERALD_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse(&lookup, "HERALD_PORT", 1323)?,
            db_path: lookup("HERALD_DB_PATH")
                .unwrap_or_else(|| "herald.db".into())
                .into(),
            jwt_secret,
            cache_ttl: (cache_ttl_secs > 0).then(|| Duration::from_secs(cache_ttl_secs)),
            store_timeout: Duration::from_millis(store_timeout_ms),
        })
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[("HERALD_JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 1323);
        assert_eq!(cfg.db_path, PathBuf::from("herald.db"));
        assert_eq!(cfg.cache_ttl, Some(Duration::from_secs(60)));
        assert_eq!(cfg.store_timeout, Duration::from_secs(5));
    }

    #[test]
    fn secret_is_required() {
        assert!(matches!(config(&[]), Err(ConfigError::MissingSecret)));
        assert!(matches!(
            config(&[("HERALD_JWT_SECRET", "dev-secret-change-me")]),
            Err(ConfigError::MissingSecret)
        ));
    }

    #[test]
    fn zero_ttl_disables_cache() {
        let cfg = config(&[("HERALD_JWT_SECRET", "s"), ("HERALD_CACHE_TTL_SECS", "0")]).unwrap();
        assert!(cfg.cache_ttl.is_none());
    }

    #[test]
    fn bad_numbers_are_reported() {
        let err = config(&[("HERALD_JWT_SECRET", "s"), ("HERALD_PORT", "http")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "HERALD_PORT", .. }));
        assert!(config(&[("HERALD_JWT_SECRET", "s"), ("HERALD_STORE_TIMEOUT_MS", "0")]).is_err());
    }
}
