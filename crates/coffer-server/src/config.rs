use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use coffer_core::KdfParams;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "changeme",
];

/// Highest accepted `COFFER_KDF_LOG_N`. At r = 8 this is 4 GiB per derivation.
const MAX_KDF_LOG_N: u8 = 22;

/// Runtime settings, read from `COFFER_*` environment variables.
#[derive(Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub storage_dir: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub max_upload_bytes: usize,
    pub prune_interval_secs: u64,
    /// scrypt cost for file encryption. Every server reading the same blobs
    /// must use the same value.
    pub kdf: KdfParams,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("COFFER_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("COFFER_JWT_SECRET is unset or still a placeholder; set it in .env");
        }

        let token_ttl_hours: i64 = parse(&lookup, "COFFER_TOKEN_TTL_HOURS", 24)?;
        if token_ttl_hours <= 0 {
            bail!("COFFER_TOKEN_TTL_HOURS must be positive");
        }

        let max_upload_mb: usize = parse(&lookup, "COFFER_MAX_UPLOAD_MB", 50)?;
        let max_upload_bytes = max_upload_mb
            .checked_mul(1024 * 1024)
            .filter(|&bytes| bytes > 0)
            .context("COFFER_MAX_UPLOAD_MB must be positive and fit in memory")?;

        let prune_interval_secs: u64 = parse(&lookup, "COFFER_PRUNE_INTERVAL_SECS", 3600)?;
        if prune_interval_secs == 0 {
            bail!("COFFER_PRUNE_INTERVAL_SECS must be positive");
        }

        let log_n: u8 = parse(&lookup, "COFFER_KDF_LOG_N", 15)?;
        if log_n > MAX_KDF_LOG_N {
            bail!("COFFER_KDF_LOG_N must be at most {MAX_KDF_LOG_N}");
        }
        let kdf = KdfParams::new(log_n, 8, 1).context("COFFER_KDF_LOG_N is out of range")?;

        Ok(Self {
            host: lookup("COFFER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse(&lookup, "COFFER_PORT", 8080)?,
            db_path: lookup("COFFER_DB_PATH")
                .unwrap_or_else(|| "coffer.db".into())
                .into(),
            storage_dir: lookup("COFFER_STORAGE_DIR")
                .unwrap_or_else(|| "./storage".into())
                .into(),
            jwt_secret,
            token_ttl_hours,
            max_upload_bytes,
            prune_interval_secs,
            kdf,
        })
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{key}={raw:?} is invalid: {e}")),
        None => Ok(default),
    }
}
