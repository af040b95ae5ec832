use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::warn;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

const DEV_SECRET: &str = "dev-secret-change-me";

/// Longest accepted token lifetime: one year.
const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub token_ttl: chrono::Duration,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup, so tests need not touch the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = match lookup("PIGEON_JWT_SECRET") {
            Some(secret) if PLACEHOLDER_SECRETS.contains(&secret.as_str()) && !cfg!(debug_assertions) => {
                bail!("PIGEON_JWT_SECRET is a placeholder value; set a real secret")
            }
            Some(secret) if secret.is_empty() => bail!("PIGEON_JWT_SECRET must not be empty"),
            Some(secret) => secret,
            None if cfg!(debug_assertions) => {
                warn!("PIGEON_JWT_SECRET not set, using development secret");
                DEV_SECRET.to_string()
            }
            None => bail!("PIGEON_JWT_SECRET must be set"),
        };

        let db_path = lookup("PIGEON_DB_PATH").unwrap_or_else(|| "pigeon.db".into());
        let host = lookup("PIGEON_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("PIGEON_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("PIGEON_PORT must be a port number")?;
        let ttl_hours: i64 = lookup("PIGEON_TOKEN_TTL_HOURS")
            .unwrap_or_else(|| "24".into())
            .parse()
            .context("PIGEON_TOKEN_TTL_HOURS must be an integer")?;
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&ttl_hours) {
            bail!("PIGEON_TOKEN_TTL_HOURS must be between 1 and {}", MAX_TOKEN_TTL_HOURS);
        }
        let token_ttl = chrono::TimeDelta::try_hours(ttl_hours)
            .context("PIGEON_TOKEN_TTL_HOURS out of range")?;
        let timeout_secs: u64 = lookup("PIGEON_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|| "30".into())
            .parse()
            .context("PIGEON_REQUEST_TIMEOUT_SECS must be an integer")?;

        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .context("invalid PIGEON_HOST/PIGEON_PORT")?;

        Ok(Self {
            jwt_secret,
            db_path: PathBuf::from(db_path),
            addr,
            token_ttl,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[("PIGEON_JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(cfg.jwt_secret, "s3cret");
        assert_eq!(cfg.db_path, PathBuf::from("pigeon.db"));
        assert_eq!(cfg.addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(cfg.token_ttl, chrono::Duration::hours(24));
        assert_eq!(cfg.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn overrides() {
        let cfg = config(&[
            ("PIGEON_JWT_SECRET", "s3cret"),
            ("PIGEON_DB_PATH", "/tmp/p.db"),
            ("PIGEON_HOST", "127.0.0.1"),
            ("PIGEON_PORT", "8080"),
            ("PIGEON_TOKEN_TTL_HOURS", "2"),
            ("PIGEON_REQUEST_TIMEOUT_SECS", "5"),
        ])
        .unwrap();
        assert_eq!(cfg.addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/p.db"));
        assert_eq!(cfg.token_ttl, chrono::Duration::hours(2));
        assert_eq!(cfg.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn bad_values_rejected() {
        assert!(config(&[("PIGEON_JWT_SECRET", "s"), ("PIGEON_PORT", "http")]).is_err());
        assert!(config(&[("PIGEON_JWT_SECRET", "s"), ("PIGEON_TOKEN_TTL_HOURS", "0")]).is_err());
        assert!(config(&[("PIGEON_JWT_SECRET", "")]).is_err());
    }

    #[test]
    fn huge_token_ttl_is_an_error() {
        for hours in ["8761", "10000000000", "9000000000000000"] {
            let result = config(&[("PIGEON_JWT_SECRET", "s"), ("PIGEON_TOKEN_TTL_HOURS", hours)]);
            assert!(result.is_err(), "ttl {hours} accepted");
        }

        let cfg = config(&[("PIGEON_JWT_SECRET", "s"), ("PIGEON_TOKEN_TTL_HOURS", "8760")]).unwrap();
        assert_eq!(cfg.token_ttl, chrono::Duration::hours(8760));
    }
}
