// src/config/relay.rs
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::ingest::providers::phivolcs::DEFAULT_PHIVOLCS_URL;
use crate::ingest::providers::usgs::{BoundingBox, DEFAULT_MIN_MAGNITUDE, DEFAULT_USGS_URL};

pub const ENV_PORT: &str = "PORT";
pub const ENV_ALLOWED_ORIGINS: &str = "ALLOWED_ORIGINS";
pub const ENV_STATIC_DIR: &str = "STATIC_DIR";
pub const ENV_PRIMARY_URL: &str = "PRIMARY_URL";
pub const ENV_FALLBACK_URL: &str = "FALLBACK_URL";
pub const ENV_FETCH_TIMEOUT_MS: &str = "FETCH_TIMEOUT_MS";
pub const ENV_INSECURE_TLS_HOSTS: &str = "INSECURE_TLS_HOSTS";

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_FETCH_TIMEOUT_MS: u64 = 7000;
const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "https://projectearthquake-seismologyph.netlify.app",
    "http://localhost:3000",
];
/// PHIVOLCS serves an incomplete certificate chain.
const DEFAULT_INSECURE_TLS_HOSTS: &[&str] = &["earthquake.phivolcs.dost.gov.ph"];

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub static_dir: PathBuf,
    pub primary_url: String,
    pub fallback_url: String,
    pub fetch_timeout: Duration,
    pub insecure_tls_hosts: Vec<String>,
    pub region: BoundingBox,
    pub min_magnitude: f64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            allowed_origins: to_owned_list(DEFAULT_ALLOWED_ORIGINS),
            static_dir: PathBuf::from("public"),
            primary_url: DEFAULT_PHIVOLCS_URL.to_string(),
            fallback_url: DEFAULT_USGS_URL.to_string(),
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            insecure_tls_hosts: to_owned_list(DEFAULT_INSECURE_TLS_HOSTS),
            region: BoundingBox::default(),
            min_magnitude: DEFAULT_MIN_MAGNITUDE,
        }
    }
}

impl RelayConfig {
    /// Read the process environment (call `dotenvy::dotenv()` first in dev).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup. Unset or blank keys keep their defaults;
    /// malformed numbers are an error.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut cfg = Self::default();

        if let Some(p) = var(ENV_PORT) {
            cfg.port = p
                .parse()
                .with_context(|| format!("{ENV_PORT} must be a port number, got {p:?}"))?;
        }
        if let Some(list) = var(ENV_ALLOWED_ORIGINS) {
            cfg.allowed_origins = split_list(&list);
        }
        if let Some(dir) = var(ENV_STATIC_DIR) {
            cfg.static_dir = PathBuf::from(dir);
        }
        if let Some(url) = var(ENV_PRIMARY_URL) {
            cfg.primary_url = url;
        }
        if let Some(url) = var(ENV_FALLBACK_URL) {
            cfg.fallback_url = url;
        }
        if let Some(ms) = var(ENV_FETCH_TIMEOUT_MS) {
            let ms: u64 = ms
                .parse()
                .with_context(|| format!("{ENV_FETCH_TIMEOUT_MS} must be milliseconds, got {ms:?}"))?;
            cfg.fetch_timeout = Duration::from_millis(ms);
        }
        if let Some(list) = var(ENV_INSECURE_TLS_HOSTS) {
            cfg.insecure_tls_hosts = split_list(&list);
        }
        Ok(cfg)
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|it| !it.is_empty())
        .map(str::to_string)
        .collect()
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn empty_env_gives_defaults() {
        let cfg = RelayConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.fetch_timeout, Duration::from_millis(7000));
        assert_eq!(cfg.allowed_origins.len(), 2);
        assert_eq!(cfg.insecure_tls_hosts, vec!["earthquake.phivolcs.dost.gov.ph"]);
        assert_eq!(cfg.region, BoundingBox::default());
    }

    #[test]
    fn overrides_are_trimmed_and_split() {
        let cfg = RelayConfig::from_lookup(lookup(&[
            (ENV_PORT, " 8080 "),
            (ENV_ALLOWED_ORIGINS, "https://a.example, ,https://b.example"),
            (ENV_FETCH_TIMEOUT_MS, "2500"),
            (ENV_STATIC_DIR, ""),
        ]))
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.allowed_origins, vec!["https://a.example", "https://b.example"]);
        assert_eq!(cfg.fetch_timeout, Duration::from_millis(2500));
        assert_eq!(cfg.static_dir, PathBuf::from("public"));
    }

    #[test]
    fn malformed_numbers_are_errors() {
        assert!(RelayConfig::from_lookup(lookup(&[(ENV_PORT, "http")])).is_err());
        assert!(RelayConfig::from_lookup(lookup(&[(ENV_FETCH_TIMEOUT_MS, "-1")])).is_err());
    }
}
