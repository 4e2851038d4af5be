// =============================================================================
// Autotrade Loop — snapshot → advisor → plan → execute → journal
// =============================================================================
//
// One tick per `poll_interval_secs`.  A failing tick is logged and the loop
// carries on; only Ctrl+C stops it.
// =============================================================================

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info};

use crate::advisor::{AdvisorClient, MarketSnapshot};
use crate::config::AppConfig;
use crate::journal::{TradeJournal, TradeRecord};
use crate::trader::{plan_trade, TradeContext, Trader};
use crate::types::balance_currency;
use crate::upbit::UpbitClient;

pub struct Autotrader {
    client: UpbitClient,
    advisor: AdvisorClient,
    trader: Trader,
    journal: TradeJournal,
    market: String,
    config: AppConfig,
}

impl Autotrader {
    pub fn new(client: UpbitClient, advisor: AdvisorClient, config: AppConfig) -> Self {
        let trader = Trader::new(client.clone(), config.account_mode);
        let journal = TradeJournal::new(&config.journal_path);
        Self {
            client,
            advisor,
            trader,
            journal,
            market: config.market.clone(),
            config,
        }
    }

    /// Run ticks until Ctrl+C, or a single tick when `once` is set.
    pub async fn run(&self, once: bool) -> Result<()> {
        info!(
            market = %self.market,
            mode = %self.trader.mode(),
            poll_secs = self.config.poll_interval_secs,
            journal = %self.journal.path().display(),
            "autotrade starting"
        );

        if once {
            return self.tick().await;
        }

        let period = Duration::from_secs(self.config.poll_interval_secs);
        run_ticks(period, || self.tick(), tokio::signal::ctrl_c()).await;
        info!("Ctrl+C received, stopping autotrade");
        Ok(())
    }

    async fn tick(&self) -> Result<()> {
        let snapshot = MarketSnapshot::collect(
            &self.client,
            &self.market,
            self.config.daily_candles,
            self.config.hourly_candles,
        )
        .await?;

        let book = &snapshot.orderbook;
        println!(
            "### Book: bid {} / ask {}, spread {:.1} bps, imbalance {:+.2} ###",
            book.best_bid().unwrap_or_default(),
            book.best_ask().unwrap_or_default(),
            book.spread_bps().unwrap_or_default(),
            book.imbalance()
        );

        let advice = self.advisor.advise(&snapshot).await?;
        println!("### AI Decision: {} ###", advice.decision);
        println!("### Reason: {} ###", advice.reason);

        let ctx = TradeContext {
            market: self.market.clone(),
            krw_balance: snapshot.balance_of("KRW"),
            coin_balance: snapshot.balance_of(balance_currency(&self.market)),
            price: self.client.get_current_price(&self.market).await?,
            min_order_krw: self.config.min_order_krw,
            fee_buffer: self.config.fee_buffer,
        };
        let plan = plan_trade(advice.decision, &ctx);
        println!("### Plan: {plan} ###");

        let outcome = self.trader.execute(&plan).await;
        println!("### Outcome: {outcome} ###");

        let record = TradeRecord::new(&self.market, advice.decision, advice.reason, plan, outcome);
        self.journal.append(&record)?;
        Ok(())
    }
}

/// Call `tick` every `period` until `shutdown` resolves.  `shutdown` is
/// polled for the whole run, including while a tick is in flight, so a
/// signal arriving mid-tick cancels that tick and ends the loop.
async fn run_ticks<F, Fut, S>(period: Duration, mut tick: F, shutdown: S)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
    S: Future,
{
    tokio::pin!(shutdown);
    let mut interval = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                tokio::select! {
                    result = tick() => {
                        if let Err(e) = result {
                            error!(error = %format!("{e:#}"), "autotrade tick failed");
                            println!("### Tick failed: {e:#} ###");
                        }
                    }
                    _ = &mut shutdown => break,
                }
            }
            _ = &mut shutdown => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn shutdown_during_tick_stops_the_loop() {
        let started = AtomicUsize::new(0);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let mut tx = Some(tx);

        let tick = || {
            started.fetch_add(1, Ordering::SeqCst);
            // Signal shutdown while this tick is still running.
            if let Some(tx) = tx.take() {
                let _ = tx.send(());
            }
            async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            }
        };

        let finished = tokio::time::timeout(
            Duration::from_secs(2),
            run_ticks(Duration::from_millis(10), tick, rx),
        )
        .await;

        assert!(finished.is_ok(), "loop kept running after shutdown");
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_ticks_do_not_stop_the_loop() {
        let calls = AtomicUsize::new(0);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let mut tx = Some(tx);

        let tick = || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n == 3 {
                if let Some(tx) = tx.take() {
                    let _ = tx.send(());
                }
            }
            async { Err(anyhow::anyhow!("exchange unavailable")) }
        };

        tokio::time::timeout(
            Duration::from_secs(2),
            run_ticks(Duration::from_millis(5), tick, rx),
        )
        .await
        .unwrap();

        assert!(calls.load(Ordering::SeqCst) >= 3);
    }
}
