use autotrader::api::{BitbankClient, Exchange, MarketData};
use autotrader::config::{ApiConfig, Credentials};
use autotrader::error::ApiError;
use autotrader::models::{OrderRequest, OrderSide, OrderStatus, OrderType};
use chrono::NaiveDate;
use mockito::{Matcher, Server};
use rust_decimal::Decimal;
use serde_json::json;
use std::str::FromStr;

fn d(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

fn client_for(server: &Server) -> BitbankClient {
    let credentials = Credentials {
        api_key: "test-key".to_string(),
        api_secret: "test-secret".to_string(),
        line_notify_token: "unused".to_string(),
    };
    let api = ApiConfig {
        public_base_url: server.url(),
        private_base_url: server.url(),
        private_requests_per_sec: 100,
        ..Default::default()
    };
    BitbankClient::new(&credentials, &api).unwrap()
}

fn ok_body(data: serde_json::Value) -> String {
    json!({ "success": 1, "data": data }).to_string()
}

fn order_json(order_id: u64, side: &str, order_type: &str, price: Option<&str>, status: &str) -> serde_json::Value {
    json!({
        "order_id": order_id,
        "pair": "xrp_jpy",
        "side": side,
        "type": order_type,
        "start_amount": "1",
        "remaining_amount": "0",
        "executed_amount": "1",
        "price": price,
        "average_price": "99.95",
        "ordered_at": 1704412800000i64,
        "status": status
    })
}

#[tokio::test]
async fn test_ticker_maps_bid_and_ask() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/xrp_jpy/ticker")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(ok_body(json!({
            "sell": "101.7",
            "buy": "101.0",
            "high": "105",
            "low": "95",
            "last": "101.6",
            "vol": "123456.7",
            "timestamp": 1704412800000i64
        })))
        .create_async()
        .await;

    let quote = client_for(&server).quote("xrp_jpy").await.unwrap();

    mock.assert_async().await;
    assert_eq!(quote.last, d("101.6"));
    assert_eq!(quote.best_bid, d("101.0"));
    assert_eq!(quote.best_ask, d("101.7"));
}

#[tokio::test]
async fn test_candles_use_day_page() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/xrp_jpy/candlestick/1min/20240105")
        .with_status(200)
        .with_body(ok_body(json!({
            "candlestick": [{
                "type": "1min",
                "ohlcv": [
                    ["100", "102", "99", "101", "10.5", 1704412800000i64],
                    ["101", "103", "100", "102.5", "3", 1704412860000i64]
                ]
            }],
            "timestamp": 1704412900000i64
        })))
        .create_async()
        .await;

    let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
    let candles = client_for(&server)
        .candlesticks("xrp_jpy", "1min", date)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(candles.len(), 2);
    assert_eq!(candles[1].close, 102.5);
    assert_eq!(candles[0].volume, 10.5);
    assert!(candles[0].timestamp < candles[1].timestamp);
}

#[tokio::test]
async fn test_get_order_is_signed() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/user/spot/order")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("pair".into(), "xrp_jpy".into()),
            Matcher::UrlEncoded("order_id".into(), "42".into()),
        ]))
        .match_header("ACCESS-KEY", "test-key")
        .match_header("ACCESS-NONCE", Matcher::Regex(r"^\d+$".to_string()))
        .match_header("ACCESS-SIGNATURE", Matcher::Regex("^[0-9a-f]{64}$".to_string()))
        .with_status(200)
        .with_body(ok_body(order_json(42, "buy", "limit", Some("101.7"), "FULLY_FILLED")))
        .create_async()
        .await;

    let order = client_for(&server).get_order("xrp_jpy", 42).await.unwrap();

    mock.assert_async().await;
    assert_eq!(order.order_id, 42);
    assert_eq!(order.side, OrderSide::Buy);
    assert_eq!(order.status, OrderStatus::FullyFilled);
    assert_eq!(order.price, Some(d("101.7")));
    assert_eq!(order.executed_amount, d("1"));
}

#[tokio::test]
async fn test_place_limit_order_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/user/spot/order")
        .match_header("ACCESS-KEY", "test-key")
        .match_header("content-type", "application/json")
        .match_body(Matcher::PartialJson(json!({
            "pair": "xrp_jpy",
            "side": "sell",
            "type": "limit",
            "price": "99.1",
            "amount": "1"
        })))
        .with_status(200)
        .with_body(ok_body(order_json(7, "sell", "limit", Some("99.1"), "UNFILLED")))
        .create_async()
        .await;

    let request = OrderRequest::limit("xrp_jpy", OrderSide::Sell, d("99.1"), d("1"));
    let order = client_for(&server).place_order(&request).await.unwrap();

    mock.assert_async().await;
    assert_eq!(order.order_id, 7);
    assert_eq!(order.order_type, OrderType::Limit);
    assert_eq!(order.status, OrderStatus::Unfilled);
}

#[tokio::test]
async fn test_market_order_without_price() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/user/spot/order")
        .match_body(Matcher::Json(json!({
            "pair": "xrp_jpy",
            "side": "sell",
            "type": "market",
            "amount": "1"
        })))
        .with_status(200)
        .with_body(ok_body(order_json(8, "sell", "market", None, "FULLY_FILLED")))
        .create_async()
        .await;

    let request = OrderRequest::market("xrp_jpy", OrderSide::Sell, d("1"));
    let order = client_for(&server).place_order(&request).await.unwrap();

    mock.assert_async().await;
    assert_eq!(order.price, None);
    assert_eq!(order.fill_price(), Some(d("99.95")));
}

#[tokio::test]
async fn test_cancel_order() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/user/spot/cancel_order")
        .match_body(Matcher::Json(json!({ "pair": "xrp_jpy", "order_id": 42 })))
        .with_status(200)
        .with_body(ok_body(json!({
            "order_id": 42,
            "pair": "xrp_jpy",
            "side": "buy",
            "type": "limit",
            "start_amount": "1",
            "remaining_amount": "1",
            "executed_amount": "0",
            "price": "101",
            "average_price": "0",
            "status": "CANCELED_UNFILLED"
        })))
        .create_async()
        .await;

    let order = client_for(&server).cancel_order("xrp_jpy", 42).await.unwrap();

    mock.assert_async().await;
    assert_eq!(order.status, OrderStatus::CanceledUnfilled);
    assert_eq!(order.remaining_amount, d("1"));
}

#[tokio::test]
async fn test_balances_and_active_orders() {
    let mut server = Server::new_async().await;
    let assets = server
        .mock("GET", "/v1/user/assets")
        .with_status(200)
        .with_body(ok_body(json!({
            "assets": [
                { "asset": "jpy", "onhand_amount": "10000.5", "free_amount": "10000.5" },
                { "asset": "xrp", "onhand_amount": "3", "free_amount": "2" }
            ]
        })))
        .create_async()
        .await;
    let active = server
        .mock("GET", "/v1/user/spot/active_orders")
        .match_query(Matcher::UrlEncoded("pair".into(), "xrp_jpy".into()))
        .with_status(200)
        .with_body(ok_body(json!({ "orders": [] })))
        .create_async()
        .await;

    let client = client_for(&server);
    let balances = client.balances().await.unwrap();
    let orders = client.active_orders("xrp_jpy").await.unwrap();

    assets.assert_async().await;
    active.assert_async().await;
    assert_eq!(balances.get("jpy"), Some(&d("10000.5")));
    assert_eq!(balances.get("xrp"), Some(&d("3")));
    assert!(orders.is_empty());
}

#[tokio::test]
async fn test_error_envelope_maps_to_exchange_code() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/v1/user/assets")
        .with_status(200)
        .with_body(json!({ "success": 0, "data": { "code": 20001 } }).to_string())
        .create_async()
        .await;

    let err = client_for(&server).balances().await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ApiError>(),
        Some(ApiError::Exchange { code: 20001 })
    ));
}

#[tokio::test]
async fn test_http_error_without_envelope() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/xrp_jpy/ticker")
        .with_status(503)
        .with_body("Service Unavailable")
        .create_async()
        .await;

    let err = client_for(&server).quote("xrp_jpy").await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ApiError>(),
        Some(ApiError::Status { status: 503, .. })
    ));
}

#[tokio::test]
async fn test_active_orders_keep_unknown_order_types() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/user/spot/active_orders")
        .match_query(Matcher::UrlEncoded("pair".into(), "xrp_jpy".into()))
        .with_status(200)
        .with_body(ok_body(json!({
            "orders": [order_json(55, "sell", "take_profit", Some("120"), "UNFILLED")]
        })))
        .create_async()
        .await;

    let orders = client_for(&server).active_orders("xrp_jpy").await.unwrap();

    mock.assert_async().await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order_type, OrderType::Other("take_profit".to_string()));
    assert_eq!(orders[0].order_type.as_str(), "take_profit");
}
