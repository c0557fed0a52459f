use thiserror::Error;

/// Startup problems: missing credentials or unusable settings.
///
/// Raised before any client is built, so a misconfigured process never
/// touches the network.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is not set; export it in the environment or .env (e.g. `export {name}=...`)")]
    MissingEnv { name: &'static str },

    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
}

/// Failures talking to the exchange REST API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("exchange rejected request (error code {code})")]
    Exchange { code: u64 },

    #[error("field `{field}` has unexpected value {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("could not sign request: {0}")]
    Signing(String),
}

/// Order lifecycle failures that are not exchange errors.
#[derive(Debug, Error)]
pub enum TradeError {
    #[error("gave up waiting for {what} after {polls} polls")]
    PollLimitExceeded { what: &'static str, polls: u32 },

    #[error("order {order_id} has no limit price")]
    MissingPrice { order_id: u64 },

    #[error("not enough candles for {pair} {interval}: have {have}, need {need}")]
    InsufficientCandles {
        pair: String,
        interval: String,
        have: usize,
        need: usize,
    },
}
