// =============================================================================
// Trader — turns an advisor decision into a market order, or simulates it
// =============================================================================
//
// Sizing is deliberately simple: a BUY spends the whole KRW balance (less a
// fee buffer), a SELL liquidates the whole coin balance.  Both are skipped
// when the order value would fall under the exchange minimum.
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::types::{AccountMode, Decision};
use crate::upbit::UpbitClient;

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Balances and prices the sizing rules look at.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeContext {
    pub market: String,
    pub krw_balance: f64,
    pub coin_balance: f64,
    pub price: f64,
    pub min_order_krw: f64,
    pub fee_buffer: f64,
}

/// What the trader intends to do for one decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TradePlan {
    Buy { market: String, krw_amount: f64 },
    Sell { market: String, volume: f64 },
    Hold,
    Skip { reason: String },
}

impl std::fmt::Display for TradePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy { market, krw_amount } => write!(f, "BUY {market} for {krw_amount:.0} KRW"),
            Self::Sell { market, volume } => write!(f, "SELL {volume} {market}"),
            Self::Hold => write!(f, "HOLD"),
            Self::Skip { reason } => write!(f, "SKIP ({reason})"),
        }
    }
}

/// Apply the sizing rules to `decision`.
pub fn plan_trade(decision: Decision, ctx: &TradeContext) -> TradePlan {
    match decision {
        Decision::Buy => {
            let spend = ctx.krw_balance * ctx.fee_buffer;
            if spend > ctx.min_order_krw {
                TradePlan::Buy {
                    market: ctx.market.clone(),
                    krw_amount: spend,
                }
            } else {
                TradePlan::Skip {
                    reason: "insufficient KRW".to_string(),
                }
            }
        }
        Decision::Sell => {
            if ctx.coin_balance * ctx.price > ctx.min_order_krw {
                TradePlan::Sell {
                    market: ctx.market.clone(),
                    volume: ctx.coin_balance,
                }
            } else {
                TradePlan::Skip {
                    reason: "insufficient coin".to_string(),
                }
            }
        }
        Decision::Hold => TradePlan::Hold,
    }
}

// ---------------------------------------------------------------------------
// Execution result
// ---------------------------------------------------------------------------

/// Outcome of an execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ExecutionResult {
    /// Order was placed on the exchange (live mode).
    Placed(serde_json::Value),
    /// Order was simulated locally (demo mode).
    Simulated(String),
    /// Nothing to send (hold or skip).
    NoAction(String),
    /// An error occurred during execution.
    Error(String),
}

impl std::fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Placed(v) => write!(f, "Placed({v})"),
            Self::Simulated(msg) => write!(f, "Simulated({msg})"),
            Self::NoAction(msg) => write!(f, "NoAction({msg})"),
            Self::Error(err) => write!(f, "Error({err})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Trader
// ---------------------------------------------------------------------------

pub struct Trader {
    client: UpbitClient,
    mode: AccountMode,
}

impl Trader {
    pub fn new(client: UpbitClient, mode: AccountMode) -> Self {
        Self { client, mode }
    }

    pub fn mode(&self) -> AccountMode {
        self.mode
    }

    /// Execute `plan`.  Never fails: exchange errors come back as
    /// `ExecutionResult::Error` so the caller's loop keeps running.
    pub async fn execute(&self, plan: &TradePlan) -> ExecutionResult {
        match plan {
            TradePlan::Hold => ExecutionResult::NoAction("holding position".to_string()),
            TradePlan::Skip { reason } => {
                info!(reason = %reason, "trade skipped");
                ExecutionResult::NoAction(reason.clone())
            }
            _ if self.mode == AccountMode::Demo => {
                info!(plan = %plan, "demo mode, order simulated");
                ExecutionResult::Simulated(plan.to_string())
            }
            TradePlan::Buy { market, krw_amount } => {
                self.finish(plan, self.client.buy_market_order(market, *krw_amount).await)
            }
            TradePlan::Sell { market, volume } => {
                self.finish(plan, self.client.sell_market_order(market, *volume).await)
            }
        }
    }

    fn finish(&self, plan: &TradePlan, result: anyhow::Result<serde_json::Value>) -> ExecutionResult {
        match result {
            Ok(order) => {
                let uuid = order.get("uuid").and_then(|v| v.as_str()).unwrap_or("?");
                info!(plan = %plan, order_uuid = uuid, "live order placed");
                ExecutionResult::Placed(order)
            }
            Err(e) => {
                error!(plan = %plan, error = %e, "live order failed");
                ExecutionResult::Error(format!("{e:#}"))
            }
        }
    }
}

impl std::fmt::Debug for Trader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trader").field("mode", &self.mode).finish()
    }
}

/// Warn once at start-up when live trading is armed.
pub fn announce_mode(mode: AccountMode) {
    match mode {
        AccountMode::Live => warn!("LIVE mode: orders will be sent to Upbit"),
        AccountMode::Demo => info!("demo mode: orders are simulated"),
    }
}
