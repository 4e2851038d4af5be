// =============================================================================
// Interactive Shell — numbered menu over balances, orders and indicators
// =============================================================================
//
// Reads stdin line by line.  A blank answer takes the bracketed default,
// tickers are upper-cased.  Bad numbers print "invalid input" and return to
// the menu; any other failure prints a short diagnostic and is logged.
// Orders go through the `Trader`, so Demo mode only simulates them.
// =============================================================================

use std::str::FromStr;

use anyhow::Result;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::{error, info};

use crate::config::AppConfig;
use crate::indicators::atr::{atr_pct, DEFAULT_ATR_PERIOD};
use crate::indicators::levels::DEFAULT_ATR_MULTIPLIER;
use crate::indicators::macd::macd_default;
use crate::indicators::rsi::DEFAULT_RSI_PERIOD;
use crate::indicators::{atr, ema, rsi, sma, stop_loss_and_target, IndicatorError, RsiZone};
use crate::market_data::{closes, Candle};
use crate::trader::{TradePlan, Trader};
use crate::types::balance_currency;
use crate::upbit::client::MAX_CANDLES;
use crate::upbit::{CandleInterval, UpbitClient};

/// Raised for answers that cannot be parsed.
#[derive(Debug, Error)]
#[error("invalid input: {0}")]
pub struct InvalidInput(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Balance,
    Buy,
    Sell,
    ListMarkets,
    MovingAverages,
    Macd,
    Rsi,
    AtrLevels,
    Exit,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Option<Self> {
        let choice = match input.trim() {
            "1" => Self::Balance,
            "2" => Self::Buy,
            "3" => Self::Sell,
            "4" => Self::ListMarkets,
            "5" => Self::MovingAverages,
            "6" => Self::Macd,
            "7" => Self::Rsi,
            "8" => Self::AtrLevels,
            "9" => Self::Exit,
            _ => return None,
        };
        Some(choice)
    }
}

const MENU: &str = "
=== Upbit Pilot ===
1. Balance
2. Market buy
3. Market sell
4. List markets
5. Moving averages (SMA / EMA)
6. MACD
7. RSI
8. ATR stop-loss / target
9. Exit
===================";

// ---------------------------------------------------------------------------
// Input parsing
// ---------------------------------------------------------------------------

/// Parse `input`, or return `default` when it is blank.
pub fn parse_or_default<T: FromStr>(input: &str, default: T) -> Result<T, InvalidInput> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(default);
    }
    trimmed
        .parse::<T>()
        .map_err(|_| InvalidInput(trimmed.to_string()))
}

/// Parse a required positive amount.
pub fn parse_amount(input: &str) -> Result<f64, InvalidInput> {
    let trimmed = input.trim();
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(InvalidInput(trimmed.to_string())),
    }
}

/// Upper-case a ticker; blank falls back to `default`.
pub fn normalize_ticker(input: &str, default: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_uppercase()
    }
}

/// Candle count in `1..=MAX_CANDLES`; blank falls back to `default`.
pub fn parse_candle_count(input: &str, default: u32) -> Result<u32, InvalidInput> {
    let count = parse_or_default(input, default)?;
    if count == 0 || count > MAX_CANDLES {
        return Err(InvalidInput(format!("candle count {count} (allowed 1..={MAX_CANDLES})")));
    }
    Ok(count)
}

fn parse_interval(input: &str) -> Result<CandleInterval, InvalidInput> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(CandleInterval::Day);
    }
    trimmed
        .parse::<CandleInterval>()
        .map_err(|_| InvalidInput(trimmed.to_string()))
}

// ---------------------------------------------------------------------------
// Table formatting
// ---------------------------------------------------------------------------

fn cell(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.4}"),
        None => "-".to_string(),
    }
}

/// Render `candles` with one extra column per `(name, values)` pair; every
/// column must be aligned with `candles`.  Undefined entries print as `-`.
pub fn format_table(candles: &[Candle], columns: &[(&str, Vec<Option<f64>>)]) -> String {
    let mut out = format!("{:<17} {:>16}", "TIME (UTC)", "CLOSE");
    for (name, _) in columns {
        out.push_str(&format!(" {name:>14}"));
    }
    out.push('\n');

    for (i, c) in candles.iter().enumerate() {
        let time = c
            .datetime()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| c.timestamp.to_string());
        out.push_str(&format!("{time:<17} {:>16.4}", c.close));
        for (_, values) in columns {
            out.push_str(&format!(" {:>14}", cell(values.get(i).copied().flatten())));
        }
        out.push('\n');
    }
    out
}

fn defined(values: Vec<f64>) -> Vec<Option<f64>> {
    values.into_iter().map(Some).collect()
}

// ---------------------------------------------------------------------------
// Shell
// ---------------------------------------------------------------------------

pub struct Shell {
    client: UpbitClient,
    trader: Trader,
    config: AppConfig,
    lines: Lines<BufReader<Stdin>>,
}

impl Shell {
    pub fn new(client: UpbitClient, config: AppConfig) -> Self {
        let trader = Trader::new(client.clone(), config.account_mode);
        Self {
            client,
            trader,
            config,
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Menu loop; returns on "9" or end of input.
    pub async fn run(&mut self) -> Result<()> {
        info!(mode = %self.trader.mode(), "interactive shell started");
        loop {
            println!("{MENU}");
            let Some(answer) = self.ask("Select an option: ").await? else {
                break;
            };
            let Some(choice) = MenuChoice::parse(&answer) else {
                println!("Unknown option, try again.");
                continue;
            };
            if choice == MenuChoice::Exit {
                println!("Bye.");
                break;
            }

            match self.handle(choice).await {
                Ok(()) => {}
                Err(e) if is_invalid_input(&e) => {
                    println!("invalid input");
                    error!(error = %e, "invalid input");
                }
                Err(e) => {
                    println!("Operation failed: {e}");
                    error!(?choice, error = %format!("{e:#}"), "shell operation failed");
                }
            }
        }
        Ok(())
    }

    /// Print `label` and read one line; `None` on end of input.
    async fn ask(&mut self, label: &str) -> Result<Option<String>> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(label.as_bytes()).await?;
        stdout.flush().await?;
        Ok(self.lines.next_line().await?)
    }

    /// Like `ask`, but end of input becomes an empty answer.
    async fn answer(&mut self, label: &str) -> Result<String> {
        Ok(self.ask(label).await?.unwrap_or_default())
    }

    async fn ask_market(&mut self) -> Result<String> {
        let default = self.config.market.clone();
        let raw = self.answer(&format!("Market [{default}]: ")).await?;
        Ok(normalize_ticker(&raw, &default))
    }

    async fn ask_interval(&mut self) -> Result<CandleInterval> {
        let raw = self.answer("Interval [day]: ").await?;
        Ok(parse_interval(&raw)?)
    }

    async fn ask_number<T: FromStr + std::fmt::Display + Copy>(&mut self, label: &str, default: T) -> Result<T> {
        let raw = self.answer(&format!("{label} [{default}]: ")).await?;
        Ok(parse_or_default(&raw, default)?)
    }

    async fn ask_candle_count(&mut self, default: u32) -> Result<u32> {
        let raw = self.answer(&format!("Candle count [{default}]: ")).await?;
        Ok(parse_candle_count(&raw, default)?)
    }

    async fn fetch(&self, market: &str, interval: CandleInterval, count: u32) -> Result<Vec<Candle>> {
        let candles = self.client.get_candles(market, interval, count).await?;
        if candles.is_empty() {
            anyhow::bail!("no candles returned for {market}");
        }
        Ok(candles)
    }

    async fn handle(&mut self, choice: MenuChoice) -> Result<()> {
        match choice {
            MenuChoice::Balance => {
                let raw = self.answer("Ticker (e.g. KRW, KRW-BTC) [KRW]: ").await?;
                let ticker = normalize_ticker(&raw, "KRW");
                let balance = self.client.get_balance(&ticker).await?;
                println!("{} balance: {balance}", balance_currency(&ticker));
            }
            MenuChoice::Buy => {
                let market = self.ask_market().await?;
                let raw = self.answer("Amount to spend (KRW): ").await?;
                let krw_amount = parse_amount(&raw)?;
                let plan = TradePlan::Buy { market, krw_amount };
                println!("Result: {}", self.trader.execute(&plan).await);
            }
            MenuChoice::Sell => {
                let market = self.ask_market().await?;
                let raw = self.answer("Volume to sell: ").await?;
                let volume = parse_amount(&raw)?;
                let plan = TradePlan::Sell { market, volume };
                println!("Result: {}", self.trader.execute(&plan).await);
            }
            MenuChoice::ListMarkets => {
                let markets = self.client.get_markets(&self.config.fiat).await?;
                for m in &markets {
                    println!("{:<14} {}", m.market, m.english_name);
                }
                println!("{} markets", markets.len());
            }
            MenuChoice::MovingAverages => {
                let interval = self.ask_interval().await?;
                let count = self.ask_candle_count(10).await?;
                let sma_period: usize = self.ask_number("SMA period", 3).await?;
                let ema_period: usize = self.ask_number("EMA period", 3).await?;
                let market = self.ask_market().await?;

                let candles = self.fetch(&market, interval, count).await?;
                let series = closes(&candles);
                let columns = [
                    ("SMA", sma(&series, sma_period)?),
                    ("EMA", defined(ema(&series, ema_period)?)),
                ];
                print!("{}", format_table(&candles, &columns));
            }
            MenuChoice::Macd => {
                let interval = self.ask_interval().await?;
                let count = self.ask_candle_count(26).await?;
                let market = self.ask_market().await?;

                let candles = self.fetch(&market, interval, count).await?;
                let m = macd_default(&closes(&candles))?;
                let columns = [
                    ("MACD", defined(m.line)),
                    ("SIGNAL", defined(m.signal)),
                    ("HISTOGRAM", defined(m.histogram)),
                ];
                print!("{}", format_table(&candles, &columns));
            }
            MenuChoice::Rsi => {
                let interval = self.ask_interval().await?;
                let count = self.ask_candle_count(30).await?;
                let period: usize = self.ask_number("RSI period", DEFAULT_RSI_PERIOD).await?;
                let market = self.ask_market().await?;

                let candles = self.fetch(&market, interval, count).await?;
                let values = rsi(&closes(&candles), period)?;
                let latest = values.last().copied().flatten();
                print!("{}", format_table(&candles, &[("RSI", values)]));
                if let Some(v) = latest {
                    println!("Latest RSI {v:.2}: {}", RsiZone::classify(v));
                }
            }
            MenuChoice::AtrLevels => {
                let interval = self.ask_interval().await?;
                let count = self.ask_candle_count(30).await?;
                let period: usize = self.ask_number("ATR period", DEFAULT_ATR_PERIOD).await?;
                let multiplier: f64 = self.ask_number("ATR multiplier", DEFAULT_ATR_MULTIPLIER).await?;
                let market = self.ask_market().await?;

                let candles = self.fetch(&market, interval, count).await?;
                let values = atr(&candles, period)?;
                let (Some(last), Some(&last_atr)) = (candles.last(), values.last()) else {
                    anyhow::bail!("no ATR value for {market}");
                };
                let levels = stop_loss_and_target(last.close, last_atr, multiplier)?;
                print!("{}", format_table(&candles, &[("ATR", defined(values))]));
                println!(
                    "Price {:.4}  ATR {:.4}  stop-loss {:.4}  target {:.4}",
                    last.close, last_atr, levels.stop_loss, levels.target
                );
                if let Some(pct) = atr_pct(&candles, period)? {
                    println!("ATR is {pct:.2}% of price");
                }
            }
            // `run` leaves the loop before dispatching.
            MenuChoice::Exit => {}
        }
        Ok(())
    }
}

fn is_invalid_input(e: &anyhow::Error) -> bool {
    e.downcast_ref::<InvalidInput>().is_some() || e.downcast_ref::<IndicatorError>().is_some()
}
