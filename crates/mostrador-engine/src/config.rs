//! # Engine Configuration
//!
//! Configuration management for the checkout engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MOSTRADOR_BACKEND_URL=http://192.168.1.10:8000                     │
//! │     MOSTRADOR_DEFAULT_BULK_PRODUCT=42                                  │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/mostrador/mostrador.toml (Linux)                         │
//! │     ~/Library/Application Support/com.mostrador.pos/mostrador.toml     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [backend]
//! base_url = "http://localhost:8000"
//!
//! [timers]
//! heartbeat_secs = 10
//! version_poll_secs = 5
//! purge_secs = 300
//! event_poll_ms = 1000
//!
//! [checkout]
//! default_bulk_product_id = 42
//! transfer_surcharge_bps = 500
//! bank_pos_surcharge_bps = 1000
//!
//! [issuer]
//! name = "Almacén Don Pepe"
//! tax_id = "20304050607"
//!
//! [print]
//! output_dir = "/var/lib/mostrador/documents"
//! printer_addr = "192.168.1.50:9100"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use mostrador_core::pricing::{Surcharge, SurchargeSettings};
use mostrador_core::validation::is_valid_tax_id;
use mostrador_core::Percent;

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Backend
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Base URL of the REST backend (http or https).
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

impl Default for BackendSettings {
    fn default() -> Self {
        BackendSettings {
            base_url: default_base_url(),
        }
    }
}

// =============================================================================
// Timers
// =============================================================================

/// Intervals of the background tasks mounted with a checkout session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerSettings {
    /// Unconditional catalog refresh.
    #[serde(default = "default_heartbeat")]
    pub heartbeat_secs: u64,

    /// Catalog version check.
    #[serde(default = "default_version_poll")]
    pub version_poll_secs: u64,

    /// Hard purge of the mirror and version counter.
    #[serde(default = "default_purge")]
    pub purge_secs: u64,

    /// Scale/scanner event queue poll.
    #[serde(default = "default_event_poll")]
    pub event_poll_ms: u64,
}

fn default_heartbeat() -> u64 {
    10
}
fn default_version_poll() -> u64 {
    5
}
fn default_purge() -> u64 {
    300
}
fn default_event_poll() -> u64 {
    1_000
}

impl Default for TimerSettings {
    fn default() -> Self {
        TimerSettings {
            heartbeat_secs: default_heartbeat(),
            version_poll_secs: default_version_poll(),
            purge_secs: default_purge(),
            event_poll_ms: default_event_poll(),
        }
    }
}

impl TimerSettings {
    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn version_poll(&self) -> Duration {
        Duration::from_secs(self.version_poll_secs)
    }

    pub fn purge(&self) -> Duration {
        Duration::from_secs(self.purge_secs)
    }

    pub fn event_poll(&self) -> Duration {
        Duration::from_millis(self.event_poll_ms)
    }
}

// =============================================================================
// Checkout
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutSettings {
    /// Product used for scale events that carry only a weight.
    #[serde(default)]
    pub default_bulk_product_id: Option<i64>,

    /// Transfer surcharge in basis points (toggled per sale).
    #[serde(default)]
    pub transfer_surcharge_bps: u32,

    /// Bank/POS surcharge in basis points (toggled per sale).
    #[serde(default)]
    pub bank_pos_surcharge_bps: u32,
}

impl CheckoutSettings {
    /// Surcharge rates with every toggle off, the state of a fresh sale.
    pub fn surcharges(&self) -> SurchargeSettings {
        SurchargeSettings {
            transfer: Surcharge::new(Percent::from_bps(self.transfer_surcharge_bps), false),
            bank_pos: Surcharge::new(Percent::from_bps(self.bank_pos_surcharge_bps), false),
        }
    }
}

// =============================================================================
// Issuer
// =============================================================================

/// The business printed as the document issuer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssuerSettings {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub tax_id: Option<String>,

    #[serde(default)]
    pub address: Option<String>,

    /// Tax condition printed on the header ("Responsable Inscripto", ...).
    #[serde(default)]
    pub tax_condition: Option<String>,
}

// =============================================================================
// Print
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintSettings {
    /// Where rendered documents are saved. `None` uses the platform data dir.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Raw TCP printer (`host:port`). `None` disables silent printing.
    #[serde(default)]
    pub printer_addr: Option<String>,

    #[serde(default = "default_printer_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub show_legal_footer: bool,

    #[serde(default = "default_true")]
    pub show_tax_breakdown: bool,
}

fn default_printer_timeout() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

impl Default for PrintSettings {
    fn default() -> Self {
        PrintSettings {
            output_dir: None,
            printer_addr: None,
            connect_timeout_secs: default_printer_timeout(),
            show_legal_footer: true,
            show_tax_breakdown: true,
        }
    }
}

impl PrintSettings {
    /// Resolved output directory.
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .or_else(|| {
                directories::ProjectDirs::from("com", "mostrador", "pos")
                    .map(|dirs| dirs.data_dir().join("documents"))
            })
            .unwrap_or_else(|| PathBuf::from("documents"))
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub backend: BackendSettings,

    #[serde(default)]
    pub timers: TimerSettings,

    #[serde(default)]
    pub checkout: CheckoutSettings,

    #[serde(default)]
    pub issuer: IssuerSettings,

    #[serde(default)]
    pub print: PrintSettings,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (mostrador.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> EngineResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| EngineError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> EngineResult<()> {
        let url = Url::parse(&self.backend.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(EngineError::InvalidUrl(format!(
                "Backend URL must use http:// or https://, got: {}",
                self.backend.base_url
            )));
        }

        let timers = &self.timers;
        if timers.heartbeat_secs == 0
            || timers.version_poll_secs == 0
            || timers.purge_secs == 0
            || timers.event_poll_ms == 0
        {
            return Err(EngineError::InvalidConfig(
                "timer intervals must be greater than 0".into(),
            ));
        }

        if self.checkout.transfer_surcharge_bps > 10_000
            || self.checkout.bank_pos_surcharge_bps > 10_000
        {
            return Err(EngineError::InvalidConfig(
                "surcharges must be between 0 and 10000 bps".into(),
            ));
        }

        if let Some(id) = self.checkout.default_bulk_product_id {
            if id <= 0 {
                return Err(EngineError::InvalidConfig(format!(
                    "default_bulk_product_id must be positive, got {}",
                    id
                )));
            }
        }

        if let Some(ref tax_id) = self.issuer.tax_id {
            if !is_valid_tax_id(tax_id) {
                return Err(EngineError::InvalidConfig(format!(
                    "issuer tax_id must have 11 digits, got: {}",
                    tax_id
                )));
            }
        }

        Ok(())
    }

    /// Applies `MOSTRADOR_*` overrides read through `lookup`.
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("MOSTRADOR_BACKEND_URL") {
            debug!(url = %url, "Overriding backend URL from environment");
            self.backend.base_url = url;
        }

        if let Some(id) = lookup("MOSTRADOR_DEFAULT_BULK_PRODUCT") {
            match id.parse::<i64>() {
                Ok(id) => self.checkout.default_bulk_product_id = Some(id),
                Err(_) => warn!(value = %id, "Ignoring non-numeric default bulk product"),
            }
        }

        if let Some(addr) = lookup("MOSTRADOR_PRINTER_ADDR") {
            debug!(addr = %addr, "Overriding printer address from environment");
            self.print.printer_addr = Some(addr).filter(|a| !a.trim().is_empty());
        }

        if let Some(dir) = lookup("MOSTRADOR_OUTPUT_DIR") {
            self.print.output_dir = Some(PathBuf::from(dir));
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "mostrador", "pos")
            .map(|dirs| dirs.config_dir().join("mostrador.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.timers.heartbeat(), Duration::from_secs(10));
        assert_eq!(config.timers.version_poll(), Duration::from_secs(5));
        assert_eq!(config.timers.purge(), Duration::from_secs(300));
        assert_eq!(config.timers.event_poll(), Duration::from_millis(1000));
        assert_eq!(config.checkout.transfer_surcharge_bps, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();

        config.backend.base_url = "ws://localhost:8000".into();
        assert!(matches!(config.validate(), Err(EngineError::InvalidUrl(_))));

        config.backend.base_url = "not a url".into();
        assert!(config.validate().is_err());

        config.backend.base_url = "https://api.example.com".into();
        assert!(config.validate().is_ok());

        config.timers.event_poll_ms = 0;
        assert!(config.validate().is_err());
        config.timers.event_poll_ms = 1000;

        config.issuer.tax_id = Some("123".into());
        assert!(config.validate().is_err());
        config.issuer.tax_id = Some("30-71234567-8".into());
        assert!(config.validate().is_ok());

        config.checkout.bank_pos_surcharge_bps = 20_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("MOSTRADOR_BACKEND_URL", "http://10.0.0.5:8000"),
            ("MOSTRADOR_DEFAULT_BULK_PRODUCT", "42"),
            ("MOSTRADOR_PRINTER_ADDR", "10.0.0.9:9100"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.backend.base_url, "http://10.0.0.5:8000");
        assert_eq!(config.checkout.default_bulk_product_id, Some(42));
        assert_eq!(config.print.printer_addr.as_deref(), Some("10.0.0.9:9100"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [checkout]
            transfer_surcharge_bps = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.checkout.transfer_surcharge_bps, 500);
        assert_eq!(config.timers.heartbeat_secs, 10);

        let surcharges = config.checkout.surcharges();
        assert_eq!(surcharges.transfer.rate.bps(), 500);
        assert!(!surcharges.transfer.enabled);
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&EngineConfig::default()).unwrap();
        assert!(toml_str.contains("[backend]"));
        assert!(toml_str.contains("[timers]"));
    }
}
