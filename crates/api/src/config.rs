//! Service configuration from environment variables.

use std::net::SocketAddr;

use anyhow::Context;
use tracing::warn;

use stockwatch_detection::DetectionConfig;
use stockwatch_infra::StockLedgerConfig;

pub const ADDR_ENV: &str = "STOCKWATCH_ADDR";
pub const DETECTION_CONFIG_ENV: &str = "STOCKWATCH_DETECTION_CONFIG";
pub const MAX_RETRIES_ENV: &str = "STOCKWATCH_MAX_RETRIES";
#[cfg(feature = "postgres")]
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

const DEFAULT_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub addr: SocketAddr,
    pub detection: DetectionConfig,
    pub ledger: StockLedgerConfig,
    /// Postgres event store; the in-memory store is used when unset.
    #[cfg(feature = "postgres")]
    pub database_url: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            detection: DetectionConfig::default(),
            ledger: StockLedgerConfig::default(),
            #[cfg(feature = "postgres")]
            database_url: None,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (the process environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let raw_addr = lookup(ADDR_ENV).unwrap_or_else(|| {
            warn!("{ADDR_ENV} not set; using {DEFAULT_ADDR}");
            DEFAULT_ADDR.to_string()
        });
        let addr = raw_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("{ADDR_ENV}={raw_addr} is not a socket address"))?;

        let detection = match lookup(DETECTION_CONFIG_ENV) {
            Some(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading detection config {path}"))?;
                DetectionConfig::from_json(&raw).with_context(|| format!("parsing detection config {path}"))?
            }
            None => {
                warn!("{DETECTION_CONFIG_ENV} not set; using built-in detection defaults");
                DetectionConfig::default()
            }
        };

        let mut ledger = StockLedgerConfig::default();
        if let Some(raw) = lookup(MAX_RETRIES_ENV) {
            ledger.max_retries = raw
                .trim()
                .parse()
                .with_context(|| format!("{MAX_RETRIES_ENV}={raw} is not a non-negative integer"))?;
        }

        Ok(Self {
            addr,
            detection,
            ledger,
            #[cfg(feature = "postgres")]
            database_url: lookup(DATABASE_URL_ENV),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = ServiceConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(cfg.addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(cfg.detection, DetectionConfig::default());
        assert_eq!(cfg.ledger.max_retries, 3);
    }

    #[test]
    fn reads_addr_and_retries() {
        let cfg = ServiceConfig::from_lookup(lookup_from(&[
            (ADDR_ENV, "127.0.0.1:9000"),
            (MAX_RETRIES_ENV, " 7 "),
        ]))
        .unwrap();
        assert_eq!(cfg.addr.port(), 9000);
        assert_eq!(cfg.ledger.max_retries, 7);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(ServiceConfig::from_lookup(lookup_from(&[(ADDR_ENV, "nowhere")])).is_err());
        assert!(ServiceConfig::from_lookup(lookup_from(&[(MAX_RETRIES_ENV, "-1")])).is_err());
        assert!(
            ServiceConfig::from_lookup(lookup_from(&[(DETECTION_CONFIG_ENV, "/definitely/missing.json")])).is_err()
        );
    }

    #[test]
    fn loads_detection_overrides_from_file() {
        let path = std::env::temp_dir().join(format!("stockwatch-detection-{}.json", uuid::Uuid::now_v7()));
        std::fs::write(&path, r#"{ "duplicate_window_secs": 60 }"#).unwrap();

        let cfg = ServiceConfig::from_lookup(lookup_from(&[(DETECTION_CONFIG_ENV, path.to_str().unwrap())])).unwrap();
        assert_eq!(cfg.detection.duplicate_window_secs, 60);
        assert_eq!(cfg.detection.price_tolerance, DetectionConfig::default().price_tolerance);

        let _ = std::fs::remove_file(path);
    }
}
