use crate::api::{CandleSource, Exchange, MarketData};
use crate::config::{ApiConfig, Credentials};
use crate::error::ApiError;
use crate::models::{Candle, Order, OrderRequest, OrderSide, OrderStatus, OrderType, Quote};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use governor::{Quota, RateLimiter};
use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// Docs: https://github.com/bitbankinc/bitbank-api-docs
const ASSETS_PATH: &str = "/v1/user/assets";
const ORDER_PATH: &str = "/v1/user/spot/order";
const CANCEL_ORDER_PATH: &str = "/v1/user/spot/cancel_order";
const ACTIVE_ORDERS_PATH: &str = "/v1/user/spot/active_orders";

// Candle pages for these intervals are keyed by year (YYYY) instead of by day
const YEARLY_INTERVALS: &[&str] = &["4hour", "8hour", "12hour", "1day", "1week", "1month"];

type HmacSha256 = Hmac<Sha256>;

type PrivateRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// bitbank REST client (public market data + signed private endpoints)
///
/// Cloning is cheap; clones share the HTTP pool, nonce counter and rate limiter.
#[derive(Clone)]
pub struct BitbankClient {
    client: Client,
    public_base: String,
    private_base: String,
    api_key: String,
    api_secret: String,
    last_nonce: Arc<AtomicU64>,
    rate_limiter: Arc<PrivateRateLimiter>,
}

// ============== Response Types ==============

#[derive(Debug, Deserialize)]
struct Envelope {
    success: u8,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct TickerRaw {
    sell: Option<String>, // lowest ask
    buy: Option<String>,  // highest bid
    last: String,
}

#[derive(Debug, Deserialize)]
struct CandlestickData {
    candlestick: Vec<CandlestickSeries>,
}

#[derive(Debug, Deserialize)]
struct CandlestickSeries {
    ohlcv: Vec<OhlcvRaw>,
}

// [open, high, low, close, volume, unix_ms]
type OhlcvRaw = (String, String, String, String, String, i64);

#[derive(Debug, Deserialize)]
struct AssetsData {
    assets: Vec<AssetRaw>,
}

#[derive(Debug, Deserialize)]
struct AssetRaw {
    asset: String,
    onhand_amount: String,
}

#[derive(Debug, Deserialize)]
struct ActiveOrdersData {
    orders: Vec<OrderRaw>,
}

#[derive(Debug, Deserialize)]
struct OrderRaw {
    order_id: u64,
    pair: String,
    side: String,
    #[serde(rename = "type")]
    order_type: String,
    start_amount: Option<String>,
    remaining_amount: Option<String>,
    executed_amount: String,
    price: Option<String>,
    average_price: Option<String>,
    status: String,
}

impl TryFrom<OrderRaw> for Order {
    type Error = ApiError;

    fn try_from(raw: OrderRaw) -> std::result::Result<Self, Self::Error> {
        let executed_amount = parse_decimal("executed_amount", &raw.executed_amount)?;
        let remaining_amount =
            parse_optional_decimal("remaining_amount", raw.remaining_amount)?.unwrap_or_default();
        let start_amount = parse_optional_decimal("start_amount", raw.start_amount)?
            .unwrap_or(executed_amount + remaining_amount);

        Ok(Order {
            order_id: raw.order_id,
            side: parse_side(&raw.side)?,
            order_type: OrderType::from(raw.order_type.as_str()),
            status: OrderStatus::from(raw.status.as_str()),
            price: parse_optional_decimal("price", raw.price)?,
            average_price: parse_optional_decimal("average_price", raw.average_price)?,
            start_amount,
            remaining_amount,
            executed_amount,
            pair: raw.pair,
        })
    }
}

// ============== Implementation ==============

impl BitbankClient {
    pub fn new(credentials: &Credentials, api: &ApiConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(api.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        let per_second =
            NonZeroU32::new(api.private_requests_per_sec).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(per_second)));

        Ok(Self {
            client,
            public_base: api.public_base_url.trim_end_matches('/').to_string(),
            private_base: api.private_base_url.trim_end_matches('/').to_string(),
            api_key: credentials.api_key.clone(),
            api_secret: credentials.api_secret.clone(),
            last_nonce: Arc::new(AtomicU64::new(0)),
            rate_limiter,
        })
    }

    /// Current ticker
    /// Endpoint: GET /{pair}/ticker
    pub async fn ticker(&self, pair: &str) -> anyhow::Result<Quote> {
        let raw: TickerRaw = self
            .public_get(&format!("/{}/ticker", pair))
            .await
            .with_context(|| format!("Failed to fetch ticker for {}", pair))?;

        let best_ask = raw.sell.ok_or(ApiError::InvalidField {
            field: "sell",
            value: "null".to_string(),
        })?;
        let best_bid = raw.buy.ok_or(ApiError::InvalidField {
            field: "buy",
            value: "null".to_string(),
        })?;

        Ok(Quote {
            last: parse_decimal("last", &raw.last)?,
            best_bid: parse_decimal("buy", &best_bid)?,
            best_ask: parse_decimal("sell", &best_ask)?,
        })
    }

    /// One page of candles
    /// Endpoint: GET /{pair}/candlestick/{interval}/{YYYYMMDD | YYYY}
    pub async fn candlesticks(
        &self,
        pair: &str,
        interval: &str,
        date: NaiveDate,
    ) -> anyhow::Result<Vec<Candle>> {
        let path = format!(
            "/{}/candlestick/{}/{}",
            pair,
            interval,
            candle_page_key(interval, date)
        );
        let data: CandlestickData = self
            .public_get(&path)
            .await
            .with_context(|| format!("Failed to fetch {} candles for {}", interval, pair))?;

        let candles = data
            .candlestick
            .into_iter()
            .flat_map(|series| series.ohlcv)
            .map(candle_from_raw)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        tracing::debug!(%pair, %interval, %date, count = candles.len(), "Fetched candles");
        Ok(candles)
    }

    /// On-hand amount per asset
    /// Endpoint: GET /v1/user/assets
    pub async fn assets(&self) -> anyhow::Result<BTreeMap<String, Decimal>> {
        let data: AssetsData = self
            .private_get(ASSETS_PATH, &[])
            .await
            .context("Failed to fetch assets")?;

        let mut balances = BTreeMap::new();
        for asset in data.assets {
            let amount = parse_decimal("onhand_amount", &asset.onhand_amount)?;
            balances.insert(asset.asset, amount);
        }
        Ok(balances)
    }

    /// Endpoint: POST /v1/user/spot/order
    pub async fn create_order(&self, request: &OrderRequest) -> anyhow::Result<Order> {
        let raw: OrderRaw = self
            .private_post(ORDER_PATH, order_body(request))
            .await
            .with_context(|| {
                format!(
                    "Failed to place {} {} order on {}",
                    request.order_type.as_str(),
                    request.side,
                    request.pair
                )
            })?;
        Ok(Order::try_from(raw)?)
    }

    /// Endpoint: GET /v1/user/spot/order?pair=&order_id=
    pub async fn order(&self, pair: &str, order_id: u64) -> anyhow::Result<Order> {
        let raw: OrderRaw = self
            .private_get(
                ORDER_PATH,
                &[("pair", pair.to_string()), ("order_id", order_id.to_string())],
            )
            .await
            .with_context(|| format!("Failed to fetch order {}", order_id))?;
        Ok(Order::try_from(raw)?)
    }

    /// Endpoint: POST /v1/user/spot/cancel_order
    pub async fn cancel(&self, pair: &str, order_id: u64) -> anyhow::Result<Order> {
        let raw: OrderRaw = self
            .private_post(
                CANCEL_ORDER_PATH,
                json!({ "pair": pair, "order_id": order_id }),
            )
            .await
            .with_context(|| format!("Failed to cancel order {}", order_id))?;
        Ok(Order::try_from(raw)?)
    }

    /// Endpoint: GET /v1/user/spot/active_orders?pair=
    pub async fn open_orders(&self, pair: &str) -> anyhow::Result<Vec<Order>> {
        let data: ActiveOrdersData = self
            .private_get(ACTIVE_ORDERS_PATH, &[("pair", pair.to_string())])
            .await
            .with_context(|| format!("Failed to fetch active orders for {}", pair))?;

        let orders = data
            .orders
            .into_iter()
            .map(Order::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(orders)
    }

    async fn public_get<T: DeserializeOwned>(&self, path: &str) -> std::result::Result<T, ApiError> {
        let url = format!("{}{}", self.public_base, path);
        tracing::trace!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        decode(response).await
    }

    async fn private_get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<T, ApiError> {
        let path_and_query = with_query(path, query);
        self.rate_limiter.until_ready().await;

        // GET signs nonce + path (with query string)
        let nonce = self.next_nonce();
        let signature = sign_message(&self.api_secret, &format!("{}{}", nonce, path_and_query))?;
        tracing::trace!("GET {}", path_and_query);

        let response = self
            .client
            .get(format!("{}{}", self.private_base, path_and_query))
            .header("ACCESS-KEY", &self.api_key)
            .header("ACCESS-NONCE", nonce.to_string())
            .header("ACCESS-SIGNATURE", signature)
            .send()
            .await?;
        decode(response).await
    }

    async fn private_post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> std::result::Result<T, ApiError> {
        let body = body.to_string();
        self.rate_limiter.until_ready().await;

        // POST signs nonce + JSON body
        let nonce = self.next_nonce();
        let signature = sign_message(&self.api_secret, &format!("{}{}", nonce, body))?;
        tracing::trace!("POST {} {}", path, body);

        let response = self
            .client
            .post(format!("{}{}", self.private_base, path))
            .header("ACCESS-KEY", &self.api_key)
            .header("ACCESS-NONCE", nonce.to_string())
            .header("ACCESS-SIGNATURE", signature)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        decode(response).await
    }

    /// Millisecond timestamp, bumped so it strictly increases across calls
    fn next_nonce(&self) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let previous = self
            .last_nonce
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        now.max(previous + 1)
    }
}

#[async_trait]
impl MarketData for BitbankClient {
    async fn quote(&self, pair: &str) -> anyhow::Result<Quote> {
        self.ticker(pair).await
    }
}

#[async_trait]
impl CandleSource for BitbankClient {
    async fn candles(
        &self,
        pair: &str,
        interval: &str,
        date: NaiveDate,
    ) -> anyhow::Result<Vec<Candle>> {
        self.candlesticks(pair, interval, date).await
    }
}

#[async_trait]
impl Exchange for BitbankClient {
    async fn place_order(&self, request: &OrderRequest) -> anyhow::Result<Order> {
        self.create_order(request).await
    }

    async fn get_order(&self, pair: &str, order_id: u64) -> anyhow::Result<Order> {
        self.order(pair, order_id).await
    }

    async fn cancel_order(&self, pair: &str, order_id: u64) -> anyhow::Result<Order> {
        self.cancel(pair, order_id).await
    }

    async fn balances(&self) -> anyhow::Result<BTreeMap<String, Decimal>> {
        self.assets().await
    }

    async fn active_orders(&self, pair: &str) -> anyhow::Result<Vec<Order>> {
        self.open_orders(pair).await
    }
}

// ============== Helpers ==============

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> std::result::Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await?;

    let envelope: Envelope = match serde_json::from_str(&body) {
        Ok(envelope) => envelope,
        Err(_) if !status.is_success() => {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            })
        }
        Err(e) => return Err(e.into()),
    };

    if envelope.success != 1 {
        let code = envelope
            .data
            .get("code")
            .and_then(|code| code.as_u64())
            .unwrap_or_default();
        return Err(ApiError::Exchange { code });
    }

    Ok(serde_json::from_value(envelope.data)?)
}

/// Hex-encoded HMAC-SHA256 of `message` keyed by the API secret
pub fn sign_message(secret: &str, message: &str) -> std::result::Result<String, ApiError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ApiError::Signing(e.to_string()))?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Whether candles for `interval` are paged by year rather than by day
pub fn is_yearly_page(interval: &str) -> bool {
    YEARLY_INTERVALS.contains(&interval)
}

pub fn candle_page_key(interval: &str, date: NaiveDate) -> String {
    if is_yearly_page(interval) {
        format!("{:04}", date.year())
    } else {
        date.format("%Y%m%d").to_string()
    }
}

fn order_body(request: &OrderRequest) -> serde_json::Value {
    let mut body = json!({
        "pair": request.pair,
        "amount": request.amount.to_string(),
        "side": request.side.as_str(),
        "type": request.order_type.as_str(),
    });
    if let Some(price) = request.price {
        body["price"] = json!(price.to_string());
    }
    body
}

fn with_query(path: &str, query: &[(&str, String)]) -> String {
    if query.is_empty() {
        return path.to_string();
    }
    let query = query
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", path, query)
}

fn candle_from_raw(raw: OhlcvRaw) -> std::result::Result<Candle, ApiError> {
    let (open, high, low, close, volume, unix_ms) = raw;
    let timestamp = DateTime::<Utc>::from_timestamp_millis(unix_ms).ok_or(
        ApiError::InvalidField {
            field: "timestamp",
            value: unix_ms.to_string(),
        },
    )?;

    Ok(Candle {
        timestamp,
        open: parse_f64("open", &open)?,
        high: parse_f64("high", &high)?,
        low: parse_f64("low", &low)?,
        close: parse_f64("close", &close)?,
        volume: parse_f64("volume", &volume)?,
    })
}

fn parse_decimal(field: &'static str, value: &str) -> std::result::Result<Decimal, ApiError> {
    Decimal::from_str(value).map_err(|_| ApiError::InvalidField {
        field,
        value: value.to_string(),
    })
}

fn parse_optional_decimal(
    field: &'static str,
    value: Option<String>,
) -> std::result::Result<Option<Decimal>, ApiError> {
    value
        .filter(|v| !v.is_empty())
        .map(|v| parse_decimal(field, &v))
        .transpose()
}

fn parse_f64(field: &'static str, value: &str) -> std::result::Result<f64, ApiError> {
    value.parse().map_err(|_| ApiError::InvalidField {
        field,
        value: value.to_string(),
    })
}

fn parse_side(value: &str) -> std::result::Result<OrderSide, ApiError> {
    match value {
        "buy" => Ok(OrderSide::Buy),
        "sell" => Ok(OrderSide::Sell),
        other => Err(ApiError::InvalidField {
            field: "side",
            value: other.to_string(),
        }),
    }
}
