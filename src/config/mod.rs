//! Process configuration, read once at startup from the environment.
//!
//! | Variable          | Required | Default                           |
//! |-------------------|----------|-----------------------------------|
//! | `REDIS_ADDR`      | yes      |                                   |
//! | `REDIS_PASSWORD`  | no       | none (empty means none)           |
//! | `REDIS_DB`        | no       | `0`                               |
//! | `OMIE_APP_KEY`    | yes      |                                   |
//! | `OMIE_APP_SECRET` | yes      |                                   |
//! | `OMIE_BASE_URL`   | no       | `https://app.omie.com.br/api/v1/` |
//! | `LISTEN_ADDR`     | no       | `0.0.0.0:8080`                    |
//! | `CACHE_BACKEND`   | no       | `redis` (or `memory`)             |

use std::str::FromStr;

use thiserror::Error;

use crate::cache::RedisSettings;
use crate::upstream::{DEFAULT_BASE_URL, OmieCredentials, Secret};

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_REDIS_PORT: u16 = 6379;

/// Errors produced while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is not set")]
    Missing { name: &'static str },

    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Which [`CacheStore`](crate::cache::CacheStore) backs the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Redis,
    Memory,
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown cache backend `{other}`, expected `redis` or `memory`")),
        }
    }
}

/// Everything the proxy needs to start.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub listen_addr: String,
    pub cache_backend: CacheBackend,
    pub redis: RedisSettings,
    pub omie_base_url: String,
    pub omie_credentials: OmieCredentials,
}

impl ProxyConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required variable is missing or empty,
    /// or when a value cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value.
    ///
    /// # Errors
    ///
    /// Same as [`ProxyConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Unset and empty are the same thing here.
        let optional = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| optional(name).ok_or(ConfigError::Missing { name });

        let cache_backend = match optional("CACHE_BACKEND") {
            Some(value) => parse("CACHE_BACKEND", &value)?,
            None => CacheBackend::Redis,
        };

        let (host, port) = split_host_port(&required("REDIS_ADDR")?)?;
        let db = match optional("REDIS_DB") {
            Some(value) => parse("REDIS_DB", &value)?,
            None => 0,
        };
        let redis = RedisSettings {
            host,
            port,
            password: optional("REDIS_PASSWORD"),
            db,
        };

        let omie_credentials = OmieCredentials {
            app_key: Secret::new(required("OMIE_APP_KEY")?),
            app_secret: Secret::new(required("OMIE_APP_SECRET")?),
        };

        Ok(Self {
            listen_addr: optional("LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_owned()),
            cache_backend,
            redis,
            omie_base_url: optional("OMIE_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            omie_credentials,
        })
    }
}

fn parse<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        value: value.to_owned(),
        reason: e.to_string(),
    })
}

/// Splits `host[:port]`, defaulting the port to 6379.
fn split_host_port(addr: &str) -> Result<(String, u16), ConfigError> {
    let addr = addr.trim();
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => Ok((host.to_owned(), parse("REDIS_ADDR", port)?)),
        Some(_) => Err(ConfigError::Invalid {
            name: "REDIS_ADDR",
            value: addr.to_owned(),
            reason: "missing host".to_owned(),
        }),
        None => Ok((addr.to_owned(), DEFAULT_REDIS_PORT)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    const MINIMAL: &[(&str, &str)] = &[
        ("REDIS_ADDR", "localhost:6379"),
        ("OMIE_APP_KEY", "key"),
        ("OMIE_APP_SECRET", "secret"),
    ];

    #[test]
    fn minimal_environment_uses_defaults() {
        let cfg = ProxyConfig::from_lookup(lookup(MINIMAL)).unwrap();
        assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
        assert_eq!(cfg.cache_backend, CacheBackend::Redis);
        assert_eq!(cfg.omie_base_url, "https://app.omie.com.br/api/v1/");
        assert_eq!(cfg.redis.host, "localhost");
        assert_eq!(cfg.redis.port, 6379);
        assert_eq!(cfg.redis.db, 0);
        assert!(cfg.redis.password.is_none());
        assert_eq!(cfg.omie_credentials.app_key.expose(), "key");
        assert_eq!(cfg.omie_credentials.app_secret.expose(), "secret");
    }

    #[test]
    fn overrides_are_applied() {
        let mut vars = MINIMAL.to_vec();
        vars.extend([
            ("REDIS_PASSWORD", "pw"),
            ("REDIS_DB", "2"),
            ("LISTEN_ADDR", "127.0.0.1:9000"),
            ("OMIE_BASE_URL", "http://localhost:4000/api/v1/"),
            ("CACHE_BACKEND", "Memory"),
        ]);
        let cfg = ProxyConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(cfg.redis.password.as_deref(), Some("pw"));
        assert_eq!(cfg.redis.db, 2);
        assert_eq!(cfg.listen_addr, "127.0.0.1:9000");
        assert_eq!(cfg.omie_base_url, "http://localhost:4000/api/v1/");
        assert_eq!(cfg.cache_backend, CacheBackend::Memory);
    }

    #[test]
    fn missing_required_values_are_errors() {
        for name in ["REDIS_ADDR", "OMIE_APP_KEY", "OMIE_APP_SECRET"] {
            let vars: Vec<_> = MINIMAL.iter().copied().filter(|(k, _)| *k != name).collect();
            let err = ProxyConfig::from_lookup(lookup(&vars)).unwrap_err();
            assert!(matches!(err, ConfigError::Missing { name: n } if n == name));
        }
    }

    #[test]
    fn empty_values_count_as_missing() {
        let mut vars = MINIMAL.to_vec();
        vars.retain(|(k, _)| *k != "OMIE_APP_SECRET");
        vars.push(("OMIE_APP_SECRET", "  "));
        vars.push(("REDIS_PASSWORD", ""));
        let err = ProxyConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { name: "OMIE_APP_SECRET" }));
    }

    #[test]
    fn redis_addr_forms() {
        assert_eq!(split_host_port("cache").unwrap(), ("cache".to_owned(), 6379));
        assert_eq!(split_host_port("cache:6380").unwrap(), ("cache".to_owned(), 6380));
        assert!(split_host_port("cache:port").is_err());
        assert!(split_host_port(":6379").is_err());
    }

    #[test]
    fn invalid_values_are_errors() {
        let mut vars = MINIMAL.to_vec();
        vars.push(("CACHE_BACKEND", "memcached"));
        assert!(matches!(
            ProxyConfig::from_lookup(lookup(&vars)).unwrap_err(),
            ConfigError::Invalid { name: "CACHE_BACKEND", .. }
        ));

        let mut vars = MINIMAL.to_vec();
        vars.push(("REDIS_DB", "zero"));
        assert!(matches!(
            ProxyConfig::from_lookup(lookup(&vars)).unwrap_err(),
            ConfigError::Invalid { name: "REDIS_DB", .. }
        ));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let mut vars = MINIMAL.to_vec();
        vars.push(("REDIS_PASSWORD", "redis-pw"));
        let rendered = format!("{:?}", ProxyConfig::from_lookup(lookup(&vars)).unwrap());
        assert!(!rendered.contains("redis-pw"));
        assert!(!rendered.contains("\"secret\""));
    }
}
