// =============================================================================
// Configuration — JSON settings file + credentials from the environment
// =============================================================================
//
// Settings live in a JSON file whose fields all carry `#[serde(default)]`, so
// adding a field never breaks loading an older file.  Persistence uses an
// atomic tmp + rename.
//
// Credentials never go into the settings file.  They are read from the
// environment (after `.env` has been loaded) into `Credentials` and handed to
// whichever component performs the I/O.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::AccountMode;
use crate::upbit::client::check_candle_count;

pub const ENV_ACCESS_KEY: &str = "UPBIT_ACCESS_KEY";
pub const ENV_SECRET_KEY: &str = "UPBIT_SECRET_KEY";
pub const ENV_OPENAI_KEY: &str = "OPENAI_API_KEY";
pub const ENV_MARKET: &str = "UPBIT_PILOT_MARKET";
pub const ENV_MODE: &str = "UPBIT_PILOT_MODE";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_fiat() -> String {
    "KRW".to_string()
}

fn default_market() -> String {
    "KRW-BTC".to_string()
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_min_order_krw() -> f64 {
    5000.0
}

fn default_fee_buffer() -> f64 {
    0.9995
}

fn default_daily_candles() -> u32 {
    30
}

fn default_hourly_candles() -> u32 {
    24
}

fn default_journal_path() -> String {
    "trade_journal.jsonl".to_string()
}

fn default_log_file() -> Option<String> {
    Some("error.log".to_string())
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_advisor_model() -> String {
    "gpt-4o".to_string()
}

fn default_advisor_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_advisor_temperature() -> f64 {
    0.2
}

fn default_advisor_timeout_secs() -> u64 {
    60
}

// =============================================================================
// AdvisorSettings
// =============================================================================

/// Settings for the language-model advisory call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorSettings {
    #[serde(default = "default_advisor_model")]
    pub model: String,

    /// Base URL of an OpenAI-compatible API (no trailing slash).
    #[serde(default = "default_advisor_base_url")]
    pub base_url: String,

    #[serde(default = "default_advisor_temperature")]
    pub temperature: f64,

    #[serde(default = "default_advisor_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AdvisorSettings {
    fn default() -> Self {
        Self {
            model: default_advisor_model(),
            base_url: default_advisor_base_url(),
            temperature: default_advisor_temperature(),
            timeout_secs: default_advisor_timeout_secs(),
        }
    }
}

// =============================================================================
// AppConfig
// =============================================================================

/// Top-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Quote currency whose markets are listed and scanned.
    #[serde(default = "default_fiat")]
    pub fiat: String,

    /// Market traded by the autotrade loop.
    #[serde(default = "default_market")]
    pub market: String,

    /// Demo simulates orders, Live sends them.
    #[serde(default)]
    pub account_mode: AccountMode,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Exchange minimum order value in KRW.
    #[serde(default = "default_min_order_krw")]
    pub min_order_krw: f64,

    /// Fraction of the KRW balance spent on a buy, leaving room for fees.
    #[serde(default = "default_fee_buffer")]
    pub fee_buffer: f64,

    /// Day candles included in the advisor snapshot.
    #[serde(default = "default_daily_candles")]
    pub daily_candles: u32,

    /// 60-minute candles included in the advisor snapshot.
    #[serde(default = "default_hourly_candles")]
    pub hourly_candles: u32,

    #[serde(default)]
    pub advisor: AdvisorSettings,

    #[serde(default = "default_journal_path")]
    pub journal_path: String,

    /// Log destination; `None` logs to stderr.
    #[serde(default = "default_log_file")]
    pub log_file: Option<String>,

    /// Default `tracing` filter when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fiat: default_fiat(),
            market: default_market(),
            account_mode: AccountMode::Demo,
            poll_interval_secs: default_poll_interval_secs(),
            min_order_krw: default_min_order_krw(),
            fee_buffer: default_fee_buffer(),
            daily_candles: default_daily_candles(),
            hourly_candles: default_hourly_candles(),
            advisor: AdvisorSettings::default(),
            journal_path: default_journal_path(),
            log_file: default_log_file(),
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        Ok(config)
    }

    /// Persist the configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "config saved (atomic)");
        Ok(())
    }

    /// Apply `UPBIT_PILOT_MARKET` / `UPBIT_PILOT_MODE` overrides.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(
            std::env::var(ENV_MARKET).ok().as_deref(),
            std::env::var(ENV_MODE).ok().as_deref(),
        )
    }

    fn apply_overrides(&mut self, market: Option<&str>, mode: Option<&str>) -> Result<()> {
        if let Some(m) = market.map(str::trim).filter(|m| !m.is_empty()) {
            self.market = m.to_uppercase();
        }
        if let Some(mode) = mode.filter(|m| !m.trim().is_empty()) {
            self.account_mode = mode
                .parse()
                .with_context(|| format!("invalid {ENV_MODE}"))?;
        }
        Ok(())
    }

    /// Validate values that would otherwise make the trading loop misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.fee_buffer) || self.fee_buffer == 0.0 {
            anyhow::bail!("fee_buffer must be in (0, 1], got {}", self.fee_buffer);
        }
        if !self.min_order_krw.is_finite() || self.min_order_krw < 0.0 {
            anyhow::bail!("min_order_krw must be a non-negative number");
        }
        if !self.market.contains('-') {
            anyhow::bail!("market must look like KRW-BTC, got '{}'", self.market);
        }
        check_candle_count(self.daily_candles).context("daily_candles")?;
        check_candle_count(self.hourly_candles).context("hourly_candles")?;
        Ok(())
    }
}

// =============================================================================
// Credentials
// =============================================================================

/// Upbit API key pair.
#[derive(Clone)]
pub struct ExchangeKeys {
    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for ExchangeKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeKeys")
            .field("access_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Secrets read from the environment.  Each is optional here; the component
/// that needs one reports which variable is missing.
#[derive(Clone, Default)]
pub struct Credentials {
    pub exchange: Option<ExchangeKeys>,
    pub openai_api_key: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let exchange = match (non_empty(ENV_ACCESS_KEY), non_empty(ENV_SECRET_KEY)) {
            (Some(access_key), Some(secret_key)) => Some(ExchangeKeys {
                access_key,
                secret_key,
            }),
            _ => None,
        };

        Self {
            exchange,
            openai_api_key: non_empty(ENV_OPENAI_KEY),
        }
    }

    pub fn require_exchange(&self) -> Result<&ExchangeKeys> {
        self.exchange.as_ref().with_context(|| {
            format!("API keys are not set: define {ENV_ACCESS_KEY} and {ENV_SECRET_KEY} in .env")
        })
    }

    pub fn require_openai(&self) -> Result<&str> {
        self.openai_api_key
            .as_deref()
            .with_context(|| format!("{ENV_OPENAI_KEY} is not set"))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("exchange", &self.exchange)
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.fiat, "KRW");
        assert_eq!(cfg.market, "KRW-BTC");
        assert_eq!(cfg.account_mode, AccountMode::Demo);
        assert_eq!(cfg.poll_interval_secs, 10);
        assert!((cfg.min_order_krw - 5000.0).abs() < f64::EPSILON);
        assert!((cfg.fee_buffer - 0.9995).abs() < f64::EPSILON);
        assert_eq!(cfg.daily_candles, 30);
        assert_eq!(cfg.hourly_candles, 24);
        assert_eq!(cfg.log_file.as_deref(), Some("error.log"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.market, "KRW-BTC");
        assert_eq!(cfg.advisor.model, "gpt-4o");
        assert_eq!(cfg.advisor.timeout_secs, 60);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "account_mode": "Live", "advisor": { "model": "gpt-4" } }"#;
        let cfg: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.account_mode, AccountMode::Live);
        assert_eq!(cfg.advisor.model, "gpt-4");
        assert_eq!(cfg.advisor.base_url, "https://api.openai.com/v1");
        assert_eq!(cfg.poll_interval_secs, 10);
    }

    #[test]
    fn null_log_file_means_stderr() {
        let cfg: AppConfig = serde_json::from_str(r#"{ "log_file": null }"#).unwrap();
        assert!(cfg.log_file.is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pilot.json");

        let mut cfg = AppConfig::default();
        cfg.market = "KRW-ETH".into();
        cfg.poll_interval_secs = 30;
        cfg.save(&path).unwrap();

        assert!(!path.with_extension("json.tmp").exists());
        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.market, "KRW-ETH");
        assert_eq!(loaded.poll_interval_secs, 30);
    }

    #[test]
    fn load_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load(dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn overrides_apply() {
        let mut cfg = AppConfig::default();
        cfg.apply_overrides(Some(" krw-xrp "), Some("live")).unwrap();
        assert_eq!(cfg.market, "KRW-XRP");
        assert_eq!(cfg.account_mode, AccountMode::Live);

        assert!(cfg.apply_overrides(None, Some("paper")).is_err());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = AppConfig::default();
        cfg.poll_interval_secs = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.fee_buffer = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.market = "BTC".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn lowercase_account_mode_in_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upbit_pilot.json");
        std::fs::write(&path, r#"{"account_mode": "live", "market": "KRW-ETH"}"#).unwrap();

        let cfg = AppConfig::load(&path).unwrap();
        assert_eq!(cfg.account_mode, AccountMode::Live);
        assert_eq!(cfg.market, "KRW-ETH");
    }

    #[test]
    fn validation_rejects_candle_counts_beyond_one_request() {
        let mut cfg = AppConfig::default();
        cfg.daily_candles = 500;
        let err = cfg.validate().unwrap_err();
        assert!(format!("{err:#}").starts_with("daily_candles"));

        let mut cfg = AppConfig::default();
        cfg.hourly_candles = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn credentials_from_lookup() {
        let env: HashMap<&str, &str> = [
            (ENV_ACCESS_KEY, "access"),
            (ENV_SECRET_KEY, "s3cr3t-value"),
            (ENV_OPENAI_KEY, "  "),
        ]
        .into_iter()
        .collect();
        let creds = Credentials::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        let keys = creds.require_exchange().unwrap();
        assert_eq!(keys.access_key, "access");
        assert!(creds.require_openai().is_err());
        assert!(!format!("{creds:?}").contains("s3cr3t-value"));
    }

    #[test]
    fn credentials_need_both_keys() {
        let creds = Credentials::from_lookup(|k| (k == ENV_ACCESS_KEY).then(|| "a".to_string()));
        assert!(creds.exchange.is_none());
        assert!(creds.require_exchange().is_err());
    }
}
