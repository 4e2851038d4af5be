// =============================================================================
// Upbit REST API Client — JWT-signed private requests, public market data
// =============================================================================
//
// SECURITY: The secret key is never logged or serialized.  Public endpoints
// work without keys; private endpoints fail with a clear error when the
// client was built without them.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::auth;
use super::interval::CandleInterval;
use super::rate_limit::RateLimitTracker;
use crate::config::ExchangeKeys;
use crate::market_data::{parse_candles, parse_orderbook, Candle, OrderBook};
use crate::types::{balance_currency, Balance};

const BASE_URL: &str = "https://api.upbit.com";

/// Upbit serves at most this many candles per request.
pub const MAX_CANDLES: u32 = 200;

/// Reject candle counts a single request cannot serve.
pub fn check_candle_count(count: u32) -> Result<u32> {
    if count == 0 || count > MAX_CANDLES {
        anyhow::bail!("candle count must be between 1 and {MAX_CANDLES}, got {count}");
    }
    Ok(count)
}

/// A tradable market as listed by `/v1/market/all`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketInfo {
    pub market: String,
    #[serde(default)]
    pub korean_name: String,
    #[serde(default)]
    pub english_name: String,
}

#[derive(Debug, Deserialize)]
struct TickerEntry {
    market: String,
    trade_price: f64,
}

/// Upbit REST API client with JWT request signing.
#[derive(Clone)]
pub struct UpbitClient {
    keys: Option<ExchangeKeys>,
    base_url: String,
    client: reqwest::Client,
    rate_limit: Arc<RateLimitTracker>,
}

impl UpbitClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create a new `UpbitClient`.
    ///
    /// # Arguments
    /// * `keys` — API key pair; `None` restricts the client to public
    ///   market-data endpoints.
    pub fn new(keys: Option<ExchangeKeys>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build HTTP client")?;

        debug!(base_url = BASE_URL, authenticated = keys.is_some(), "UpbitClient initialised");

        Ok(Self {
            keys,
            base_url: BASE_URL.to_string(),
            client,
            rate_limit: Arc::new(RateLimitTracker::new()),
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.keys.is_some()
    }

    pub fn rate_limit(&self) -> &RateLimitTracker {
        &self.rate_limit
    }

    // -------------------------------------------------------------------------
    // Account / balance
    // -------------------------------------------------------------------------

    /// GET /v1/accounts (signed).
    #[instrument(skip(self), name = "upbit::get_balances")]
    pub async fn get_balances(&self) -> Result<Vec<Balance>> {
        let body = self.get_private("/v1/accounts", &[], "default").await?;
        let balances: Vec<Balance> =
            serde_json::from_value(body).context("failed to parse accounts response")?;
        debug!(count = balances.len(), "balances retrieved");
        Ok(balances)
    }

    /// Free balance for `ticker`, which is either a currency (`"KRW"`) or a
    /// market (`"KRW-BTC"`, meaning the BTC balance).
    #[instrument(skip(self), name = "upbit::get_balance")]
    pub async fn get_balance(&self, ticker: &str) -> Result<f64> {
        let currency = balance_currency(ticker);
        let balances = self.get_balances().await?;
        Ok(find_balance(&balances, currency))
    }

    // -------------------------------------------------------------------------
    // Orders
    // -------------------------------------------------------------------------

    /// POST /v1/orders (signed) — market buy spending `krw_amount`.
    #[instrument(skip(self), name = "upbit::buy_market_order")]
    pub async fn buy_market_order(&self, market: &str, krw_amount: f64) -> Result<serde_json::Value> {
        if !krw_amount.is_finite() || krw_amount <= 0.0 {
            anyhow::bail!("buy amount must be a positive number, got {krw_amount}");
        }
        let params = [
            ("market", market.to_string()),
            ("side", "bid".to_string()),
            ("price", format_krw(krw_amount)),
            ("ord_type", "price".to_string()),
        ];
        debug!(market, krw_amount, "placing market buy");
        self.post_private("/v1/orders", &params, "order").await
    }

    /// POST /v1/orders (signed) — market sell of `volume` units.
    #[instrument(skip(self), name = "upbit::sell_market_order")]
    pub async fn sell_market_order(&self, market: &str, volume: f64) -> Result<serde_json::Value> {
        if !volume.is_finite() || volume <= 0.0 {
            anyhow::bail!("sell volume must be a positive number, got {volume}");
        }
        let params = [
            ("market", market.to_string()),
            ("side", "ask".to_string()),
            ("volume", format_volume(volume)),
            ("ord_type", "market".to_string()),
        ];
        debug!(market, volume, "placing market sell");
        self.post_private("/v1/orders", &params, "order").await
    }

    // -------------------------------------------------------------------------
    // Public market data
    // -------------------------------------------------------------------------

    /// GET /v1/market/all, filtered to markets quoted in `fiat`.
    #[instrument(skip(self), name = "upbit::get_markets")]
    pub async fn get_markets(&self, fiat: &str) -> Result<Vec<MarketInfo>> {
        let params = [("isDetails", "false".to_string())];
        let body = self.get_public("/v1/market/all", &params, "market").await?;
        let all: Vec<MarketInfo> =
            serde_json::from_value(body).context("failed to parse market list")?;

        let prefix = format!("{}-", fiat.to_uppercase());
        let markets: Vec<MarketInfo> = all
            .into_iter()
            .filter(|m| m.market.starts_with(&prefix))
            .collect();

        debug!(fiat, count = markets.len(), "markets listed");
        Ok(markets)
    }

    /// GET /v1/ticker — last trade price per market, in request order.
    #[instrument(skip(self), name = "upbit::get_current_prices")]
    pub async fn get_current_prices(&self, markets: &[String]) -> Result<Vec<(String, f64)>> {
        if markets.is_empty() {
            return Ok(Vec::new());
        }
        let params = [("markets", markets.join(","))];
        let body = self.get_public("/v1/ticker", &params, "ticker").await?;
        let entries: Vec<TickerEntry> =
            serde_json::from_value(body).context("failed to parse ticker response")?;

        let prices = markets
            .iter()
            .filter_map(|m| {
                entries
                    .iter()
                    .find(|e| &e.market == m)
                    .map(|e| (e.market.clone(), e.trade_price))
            })
            .collect();
        Ok(prices)
    }

    /// Last trade price of a single market.
    pub async fn get_current_price(&self, market: &str) -> Result<f64> {
        let prices = self.get_current_prices(&[market.to_string()]).await?;
        prices
            .first()
            .map(|(_, p)| *p)
            .with_context(|| format!("no price returned for {market}"))
    }

    /// GET /v1/orderbook for a single market.
    #[instrument(skip(self), name = "upbit::get_orderbook")]
    pub async fn get_orderbook(&self, market: &str) -> Result<OrderBook> {
        let params = [("markets", market.to_string())];
        let body = self.get_public("/v1/orderbook", &params, "orderbook").await?;
        parse_orderbook(market, &body)
    }

    /// GET /v1/candles/{interval} — up to `count` candles, oldest first.
    ///
    /// `count` must be in `1..=MAX_CANDLES`; larger requests are refused
    /// rather than silently truncated.
    #[instrument(skip(self), name = "upbit::get_candles")]
    pub async fn get_candles(
        &self,
        market: &str,
        interval: CandleInterval,
        count: u32,
    ) -> Result<Vec<Candle>> {
        let count = check_candle_count(count)?;
        let path = format!("/v1/candles/{}", interval.path());
        let params = [("market", market.to_string()), ("count", count.to_string())];

        let body = self.get_public(&path, &params, "candles").await?;
        let candles = parse_candles(&body)
            .with_context(|| format!("failed to parse {interval} candles for {market}"))?;

        debug!(market, %interval, count = candles.len(), "candles fetched");
        Ok(candles)
    }

    // -------------------------------------------------------------------------
    // Request plumbing
    // -------------------------------------------------------------------------

    async fn get_public(
        &self,
        path: &str,
        params: &[(&str, String)],
        group: &str,
    ) -> Result<serde_json::Value> {
        let url = self.url(path, params);
        self.send(self.client.get(&url), "GET", path, group).await
    }

    async fn get_private(
        &self,
        path: &str,
        params: &[(&str, String)],
        group: &str,
    ) -> Result<serde_json::Value> {
        let token = self.bearer(params)?;
        let url = self.url(path, params);
        let req = self.client.get(&url).header(AUTHORIZATION, token);
        self.send(req, "GET", path, group).await
    }

    async fn post_private(
        &self,
        path: &str,
        params: &[(&str, String)],
        group: &str,
    ) -> Result<serde_json::Value> {
        let token = self.bearer(params)?;
        let body: serde_json::Map<String, serde_json::Value> = params
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.clone())))
            .collect();
        let url = format!("{}{}", self.base_url, path);
        let req = self.client.post(&url).header(AUTHORIZATION, token).json(&body);
        self.send(req, "POST", path, group).await
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> String {
        if params.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, auth::encode_query(params))
        }
    }

    fn bearer(&self, params: &[(&str, String)]) -> Result<HeaderValue> {
        let keys = self
            .keys
            .as_ref()
            .context("this request needs UPBIT_ACCESS_KEY and UPBIT_SECRET_KEY")?;
        let token = auth::sign_token(keys, &auth::raw_query(params));
        HeaderValue::from_str(&format!("Bearer {token}")).context("invalid authorization header")
    }

    async fn send(
        &self,
        req: RequestBuilder,
        method: &str,
        path: &str,
        group: &str,
    ) -> Result<serde_json::Value> {
        let wait = self.rate_limit.wait_time(group);
        if !wait.is_zero() {
            debug!(group, wait_ms = wait.as_millis() as u64, "waiting for rate-limit window");
            tokio::time::sleep(wait).await;
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("{method} {path} request failed"))?;

        self.rate_limit.update_from_headers(resp.headers());

        let status = resp.status();
        let text = resp
            .text()
            .await
            .with_context(|| format!("failed to read {method} {path} response"))?;

        if !status.is_success() {
            let detail = error_detail(&text);
            warn!(method, path, %status, detail = %detail, "Upbit request rejected");
            anyhow::bail!("Upbit {method} {path} returned {status}: {detail}");
        }

        serde_json::from_str(&text).with_context(|| format!("failed to parse {method} {path} response"))
    }
}

impl std::fmt::Debug for UpbitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpbitClient")
            .field("keys", &self.keys)
            .field("base_url", &self.base_url)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Internal helpers
// -----------------------------------------------------------------------------

/// Free balance of `currency`, `0.0` when the account holds none.
fn find_balance(balances: &[Balance], currency: &str) -> f64 {
    match balances.iter().find(|b| b.currency.eq_ignore_ascii_case(currency)) {
        Some(b) => b.balance,
        None => {
            debug!(currency, "currency not found in balances, returning 0.0");
            0.0
        }
    }
}

/// KRW amounts are sent as whole won, rounded down.
fn format_krw(amount: f64) -> String {
    format!("{:.0}", amount.floor())
}

/// Volumes are rounded down to Upbit's 8 decimal places, trailing zeros
/// trimmed.
fn format_volume(volume: f64) -> String {
    let floored = (volume * 1e8).floor() / 1e8;
    let s = format!("{floored:.8}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() {
        "0".to_string()
    } else {
        s.to_string()
    }
}

/// Pull `error.name: error.message` out of an Upbit error body, falling back
/// to the raw text.
fn error_detail(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let err = parsed.as_ref().and_then(|v| v.get("error"));
    match err {
        Some(e) => {
            let name = e.get("name").and_then(|v| v.as_str()).unwrap_or("error");
            let message = e.get("message").and_then(|v| v.as_str()).unwrap_or("");
            format!("{name}: {message}")
        }
        None => body.chars().take(200).collect(),
    }
}
