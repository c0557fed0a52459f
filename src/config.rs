use crate::error::ConfigError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

const ENV_PREFIX: &str = "AUTOTRADER";
const DEFAULT_CONFIG_FILE: &str = "autotrader";

pub const API_KEY_ENV: &str = "BITBANK_API_KEY";
pub const API_SECRET_ENV: &str = "BITBANK_API_SECRET";
pub const LINE_TOKEN_ENV: &str = "LINE_NOTIFY_TOKEN";

/// All tunables, layered: built-in defaults → `autotrader.toml` → `AUTOTRADER__*` env vars
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub trading: TradingConfig,
    pub watch: WatchConfig,
    pub api: ApiConfig,
}

/// Order lifecycle parameters, fixed for the lifetime of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub pair: String,
    pub amount: Decimal,
    pub cycles: u32,
    pub buy_order_range: Decimal,
    pub sell_order_range: Decimal,
    pub reprice_threshold: Decimal,
    pub stop_loss_multiplier: Decimal,
    pub rsi_period: usize,
    pub rsi_interval: String,
    pub rsi_buy_threshold: f64,
    pub signal_poll_ms: u64,
    pub buy_poll_ms: u64,
    pub sell_poll_ms: u64,
    pub cycle_interval_secs: u64,
    /// Upper bound on polls per wait loop; unbounded when unset
    pub max_polls: Option<u32>,
    pub report_assets: Vec<String>,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            pair: "xrp_jpy".to_string(),
            amount: Decimal::ONE,
            cycles: 10,
            buy_order_range: Decimal::ZERO,
            sell_order_range: Decimal::new(1, 1),  // 0.1
            reprice_threshold: Decimal::new(5, 1), // 0.5
            stop_loss_multiplier: Decimal::TEN,
            rsi_period: 14,
            rsi_interval: "1min".to_string(),
            rsi_buy_threshold: 40.0,
            signal_poll_ms: 100,
            buy_poll_ms: 100,
            sell_poll_ms: 100,
            cycle_interval_secs: 15,
            max_polls: None,
            report_assets: vec!["jpy".to_string(), "xrp".to_string()],
        }
    }
}

impl TradingConfig {
    pub fn signal_poll(&self) -> PollSettings {
        PollSettings::new(Duration::from_millis(self.signal_poll_ms), self.max_polls)
    }

    pub fn buy_poll(&self) -> PollSettings {
        PollSettings::new(Duration::from_millis(self.buy_poll_ms), self.max_polls)
    }

    pub fn sell_poll(&self) -> PollSettings {
        PollSettings::new(Duration::from_millis(self.sell_poll_ms), self.max_polls)
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pair.is_empty() {
            return Err(invalid("trading.pair", "must not be empty"));
        }
        if self.amount <= Decimal::ZERO {
            return Err(invalid("trading.amount", "must be positive"));
        }
        if self.cycles == 0 {
            return Err(invalid("trading.cycles", "must be at least 1"));
        }
        if self.buy_order_range.is_sign_negative()
            || self.sell_order_range.is_sign_negative()
            || self.reprice_threshold.is_sign_negative()
            || self.stop_loss_multiplier.is_sign_negative()
        {
            return Err(invalid(
                "trading",
                "price offsets, thresholds and multipliers must not be negative",
            ));
        }
        if self.rsi_period == 0 {
            return Err(invalid("trading.rsi_period", "must be at least 1"));
        }
        if self.max_polls == Some(0) {
            return Err(invalid("trading.max_polls", "must be at least 1 when set"));
        }
        Ok(())
    }
}

/// Indicator alert loop parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub pairs: Vec<String>,
    pub intervals: Vec<String>,
    pub rsi_period: usize,
    pub rci_period: usize,
    pub rsi_alert_threshold: f64,
    pub check_delay_ms: u64,
    /// Number of passes over every (pair, interval); forever when unset
    pub rounds: Option<u32>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            pairs: vec!["btc_jpy".to_string(), "xrp_jpy".to_string()],
            intervals: vec![
                "5min".to_string(),
                "15min".to_string(),
                "30min".to_string(),
                "1hour".to_string(),
            ],
            rsi_period: 14,
            rci_period: 9,
            rsi_alert_threshold: 20.0,
            check_delay_ms: 1000,
            rounds: None,
        }
    }
}

impl WatchConfig {
    pub fn check_delay(&self) -> Duration {
        Duration::from_millis(self.check_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pairs.is_empty() || self.intervals.is_empty() {
            return Err(invalid("watch", "needs at least one pair and one interval"));
        }
        if self.rsi_period == 0 || self.rci_period < 2 {
            return Err(invalid(
                "watch",
                "rsi_period must be at least 1 and rci_period at least 2",
            ));
        }
        Ok(())
    }
}

/// Endpoints and HTTP limits for the bitbank client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub public_base_url: String,
    pub private_base_url: String,
    pub line_notify_url: String,
    pub request_timeout_secs: u64,
    pub private_requests_per_sec: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            public_base_url: "https://public.bitbank.cc".to_string(),
            private_base_url: "https://api.bitbank.cc".to_string(),
            line_notify_url: "https://notify-api.line.me/api/notify".to_string(),
            request_timeout_secs: 10,
            private_requests_per_sec: 6,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Settings {
    /// Load settings from defaults, an optional file and the environment
    ///
    /// With `path == None`, `./autotrader.toml` is read if it exists.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings: Settings = config::Config::builder()
            .add_source(config::Config::try_from(&Settings::default())?)
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("trading.report_assets")
                    .with_list_parse_key("watch.pairs")
                    .with_list_parse_key("watch.intervals"),
            )
            .build()?
            .try_deserialize()?;

        settings.trading.validate()?;
        settings.watch.validate()?;
        Ok(settings)
    }
}

/// Poll loop cadence: fixed sleep before every check, optional cap on checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_polls: Option<u32>,
}

impl PollSettings {
    pub fn new(interval: Duration, max_polls: Option<u32>) -> Self {
        Self {
            interval,
            max_polls,
        }
    }
}

/// Exchange and LINE secrets, read from the raw environment
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    pub line_notify_token: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve credentials through `lookup`; empty values count as missing
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::MissingEnv { name })
        };

        Ok(Self {
            api_key: require(API_KEY_ENV)?,
            api_secret: require(API_SECRET_ENV)?,
            line_notify_token: require(LINE_TOKEN_ENV)?,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .field("line_notify_token", &"<redacted>")
            .finish()
    }
}

fn invalid(key: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.to_string(),
    }
}
