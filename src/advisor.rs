// =============================================================================
// Trading Advisor — asks an OpenAI-compatible chat model for BUY/SELL/HOLD
// =============================================================================
//
// The advisor never places orders.  It receives a `MarketSnapshot` (balances,
// order book, daily and hourly candles), sends it as JSON to the chat
// completions endpoint and parses the reply into an `Advice`.
//
// Transport and HTTP failures are returned as errors.  A reply that cannot be
// parsed degrades to HOLD so that a misbehaving model never triggers a trade.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::AdvisorSettings;
use crate::market_data::{Candle, OrderBook};
use crate::types::{Balance, Decision};
use crate::upbit::{CandleInterval, UpbitClient};

const SYSTEM_PROMPT: &str = "You are an expert in cryptocurrency trading. \
Based on the provided data, decide whether to BUY, SELL, or HOLD the given market. \
Respond with a JSON object of the form {\"decision\": \"buy|sell|hold\", \"reason\": \"...\"} and nothing else.";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a model reply could not be turned into an `Advice`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdvisorError {
    #[error("advisor returned an empty reply")]
    EmptyReply,

    #[error("advisor reply is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("advisor reply has no \"decision\" field")]
    MissingDecision,

    #[error("advisor returned an unknown decision: {0}")]
    UnknownDecision(String),
}

// ---------------------------------------------------------------------------
// Advice
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advice {
    pub decision: Decision,
    pub reason: String,
}

impl Advice {
    /// HOLD with an explanation of why no usable advice was received.
    pub fn hold_fallback(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Hold,
            reason: reason.into(),
        }
    }
}

/// Parse the model's message content.
///
/// Accepts a bare JSON object or one wrapped in a Markdown code fence.  The
/// decision is case-insensitive; a missing reason becomes
/// `"No reason provided"`.
pub fn parse_advice(content: &str) -> Result<Advice, AdvisorError> {
    let body = strip_code_fence(content.trim());
    if body.is_empty() {
        return Err(AdvisorError::EmptyReply);
    }

    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| AdvisorError::InvalidJson(e.to_string()))?;

    let raw = value
        .get("decision")
        .and_then(|v| v.as_str())
        .ok_or(AdvisorError::MissingDecision)?;
    let decision = raw
        .parse::<Decision>()
        .map_err(|_| AdvisorError::UnknownDecision(raw.to_string()))?;

    let reason = value
        .get("reason")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("No reason provided")
        .to_string();

    Ok(Advice { decision, reason })
}

fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    // Drop an optional language tag on the opening fence line.
    let rest = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

// ---------------------------------------------------------------------------
// Market snapshot
// ---------------------------------------------------------------------------

/// Everything the advisor sees for one decision.
#[derive(Debug, Clone, Serialize)]
pub struct MarketSnapshot {
    pub market: String,
    pub balances: Vec<Balance>,
    pub orderbook: OrderBook,
    pub daily: Vec<Candle>,
    pub hourly: Vec<Candle>,
}

impl MarketSnapshot {
    /// Fetch balances, the order book and both candle series concurrently.
    #[instrument(skip(client), name = "advisor::collect_snapshot")]
    pub async fn collect(
        client: &UpbitClient,
        market: &str,
        daily_count: u32,
        hourly_count: u32,
    ) -> Result<Self> {
        let (balances, orderbook, daily, hourly) = tokio::try_join!(
            client.get_balances(),
            client.get_orderbook(market),
            client.get_candles(market, CandleInterval::Day, daily_count),
            client.get_candles(market, CandleInterval::Minute60, hourly_count),
        )?;

        debug!(
            market,
            balances = balances.len(),
            daily = daily.len(),
            hourly = hourly.len(),
            "market snapshot collected"
        );

        Ok(Self {
            market: market.to_string(),
            balances,
            orderbook,
            daily,
            hourly,
        })
    }

    /// Free balance of `currency` in this snapshot, `0.0` when absent.
    pub fn balance_of(&self, currency: &str) -> f64 {
        self.balances
            .iter()
            .find(|b| b.currency.eq_ignore_ascii_case(currency))
            .map_or(0.0, |b| b.balance)
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct AdvisorClient {
    api_key: String,
    settings: AdvisorSettings,
    http: reqwest::Client,
}

impl AdvisorClient {
    pub fn new(api_key: impl Into<String>, settings: AdvisorSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("failed to build advisor HTTP client")?;

        Ok(Self {
            api_key: api_key.into(),
            settings,
            http,
        })
    }

    /// Ask the model for a decision on `snapshot`.
    #[instrument(skip(self, snapshot), fields(market = %snapshot.market), name = "advisor::advise")]
    pub async fn advise(&self, snapshot: &MarketSnapshot) -> Result<Advice> {
        let user_content =
            serde_json::to_string(snapshot).context("failed to serialise market snapshot")?;
        let body = self.request_body(&user_content);
        let url = format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'));

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("advisor request failed")?;

        let status = resp.status();
        let text = resp.text().await.context("failed to read advisor response")?;
        if !status.is_success() {
            anyhow::bail!(
                "advisor returned {status}: {}",
                text.chars().take(200).collect::<String>()
            );
        }

        let json: serde_json::Value =
            serde_json::from_str(&text).context("failed to parse advisor response")?;
        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default();

        match parse_advice(content) {
            Ok(advice) => {
                debug!(decision = %advice.decision, "advice received");
                Ok(advice)
            }
            Err(e) => {
                warn!(error = %e, "unusable advisor reply, holding");
                Ok(Advice::hold_fallback(format!("advisor reply rejected: {e}")))
            }
        }
    }

    fn request_body(&self, user_content: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.settings.model,
            "temperature": self.settings.temperature,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_content }
            ]
        })
    }
}

impl std::fmt::Debug for AdvisorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvisorClient")
            .field("api_key", &"<redacted>")
            .field("settings", &self.settings)
            .finish()
    }
}
