// =============================================================================
// Market Scanner — RSI and moving-average cross screen over a whole fiat market
// =============================================================================
//
// For every market quoted in the fiat currency, fetch `count` candles and
// report the latest RSI reading with its zone, plus the most recent
// golden/death cross of SMA(20) over SMA(50) when enough history exists.
// Markets with fewer than `count` candles (recent listings) are skipped.
// =============================================================================

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::indicators::rsi::latest_rsi;
use crate::indicators::{crossover_signals, sma, CrossSignal, IndicatorResult, RsiZone};
use crate::market_data::{closes, Candle};
use crate::upbit::client::check_candle_count;
use crate::upbit::{CandleInterval, UpbitClient};

pub const CROSS_SHORT_PERIOD: usize = 20;
pub const CROSS_LONG_PERIOD: usize = 50;

/// Most recent crossover and how many bars ago it happened (0 = last bar).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LastCross {
    pub signal: CrossSignal,
    pub bars_ago: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub market: String,
    pub close: f64,
    pub rsi: f64,
    pub zone: RsiZone,
    pub last_cross: Option<LastCross>,
}

/// Screen one market's candles.  Returns `Ok(None)` when there are fewer
/// than `count` candles or no RSI value could be formed.
pub fn classify_market(
    market: &str,
    candles: &[Candle],
    count: usize,
    period: usize,
) -> IndicatorResult<Option<ScanResult>> {
    if candles.len() < count {
        return Ok(None);
    }

    let series = closes(candles);
    let Some(rsi) = latest_rsi(&series, period)? else {
        return Ok(None);
    };
    let Some(&close) = series.last() else {
        return Ok(None);
    };

    Ok(Some(ScanResult {
        market: market.to_string(),
        close,
        rsi,
        zone: RsiZone::classify(rsi),
        last_cross: last_cross(&series)?,
    }))
}

fn last_cross(series: &[f64]) -> IndicatorResult<Option<LastCross>> {
    if series.len() < CROSS_LONG_PERIOD {
        return Ok(None);
    }
    let fast = sma(series, CROSS_SHORT_PERIOD)?;
    let slow = sma(series, CROSS_LONG_PERIOD)?;
    let signals = crossover_signals(&fast, &slow)?;

    Ok(signals
        .iter()
        .rev()
        .enumerate()
        .find_map(|(bars_ago, s)| s.map(|signal| LastCross { signal, bars_ago })))
}

/// Scan every `fiat` market.  Fetch failures are logged and the market is
/// skipped; results come back sorted by RSI, lowest first.  A `count` above
/// what one candle request can return is an error, since no market could
/// ever satisfy it.
pub async fn scan_markets(
    client: &UpbitClient,
    fiat: &str,
    interval: CandleInterval,
    count: u32,
    period: usize,
) -> anyhow::Result<Vec<ScanResult>> {
    let count = check_candle_count(count)?;
    let markets = client.get_markets(fiat).await?;
    info!(fiat, markets = markets.len(), %interval, count, period, "market scan started");

    let mut results = Vec::new();
    for info in &markets {
        let candles = match client.get_candles(&info.market, interval, count).await {
            Ok(c) => c,
            Err(e) => {
                warn!(market = %info.market, error = %e, "candle fetch failed, skipping");
                continue;
            }
        };

        match classify_market(&info.market, &candles, count as usize, period) {
            Ok(Some(result)) => results.push(result),
            Ok(None) => debug!(market = %info.market, candles = candles.len(), "not enough history, skipping"),
            Err(e) => warn!(market = %info.market, error = %e, "indicator failed, skipping"),
        }
    }

    results.sort_by(|a, b| a.rsi.total_cmp(&b.rsi));
    info!(scanned = results.len(), "market scan finished");
    debug!(budget = ?client.rate_limit().snapshot(), "rate-limit budget after scan");
    Ok(results)
}

/// Render results as a fixed-width table.
pub fn format_scan_table(results: &[ScanResult]) -> String {
    let mut out = format!(
        "{:<14} {:>16} {:>8}  {:<10}  {}\n",
        "MARKET", "CLOSE", "RSI", "ZONE", "LAST CROSS"
    );
    for r in results {
        let cross = match r.last_cross {
            Some(LastCross { signal: CrossSignal::Golden, bars_ago }) => format!("golden ({bars_ago} bars ago)"),
            Some(LastCross { signal: CrossSignal::Death, bars_ago }) => format!("death ({bars_ago} bars ago)"),
            None => "-".to_string(),
        };
        out.push_str(&format!(
            "{:<14} {:>16.4} {:>8.2}  {:<10}  {}\n",
            r.market,
            r.close,
            r.rsi,
            r.zone.to_string(),
            cross
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candles_from(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle::new(i as i64 * 86_400_000, c, c + 1.0, c - 1.0, c, 1.0))
            .collect()
    }

    #[test]
    fn short_history_is_skipped() {
        let candles = candles_from(&[1.0, 2.0, 3.0]);
        assert_eq!(classify_market("KRW-NEW", &candles, 10, 14).unwrap(), None);
    }

    #[test]
    fn rising_market_is_overbought() {
        let closes: Vec<f64> = (1..=30).map(|i| 100.0 + i as f64).collect();
        let r = classify_market("KRW-UP", &candles_from(&closes), 30, 14)
            .unwrap()
            .unwrap();
        assert_eq!(r.rsi, 100.0);
        assert_eq!(r.zone, RsiZone::Overbought);
        assert_eq!(r.close, 130.0);
        assert_eq!(r.last_cross, None);
    }

    #[test]
    fn falling_market_is_oversold() {
        let closes: Vec<f64> = (1..=30).map(|i| 200.0 - i as f64).collect();
        let r = classify_market("KRW-DOWN", &candles_from(&closes), 30, 14)
            .unwrap()
            .unwrap();
        assert_eq!(r.rsi, 0.0);
        assert_eq!(r.zone, RsiZone::Oversold);
    }

    #[test]
    fn golden_cross_is_reported() {
        // 50 flat bars then a steady rise: SMA20 overtakes SMA50 once.
        let mut closes = vec![100.0; 50];
        closes.extend((1..=10).map(|i| 100.0 + i as f64));
        let r = classify_market("KRW-X", &candles_from(&closes), 60, 14)
            .unwrap()
            .unwrap();
        let cross = r.last_cross.unwrap();
        assert_eq!(cross.signal, CrossSignal::Golden);
        assert_eq!(cross.bars_ago, 9);
    }

    #[tokio::test]
    async fn count_beyond_one_request_is_rejected_up_front() {
        let client = UpbitClient::new(None).unwrap();
        let err = scan_markets(&client, "KRW", CandleInterval::Day, 300, 14)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("candle count"));
    }

    #[test]
    fn full_request_of_history_is_classified() {
        let closes: Vec<f64> = (0..200).map(|i| 100.0 + (i % 7) as f64).collect();
        let r = classify_market("KRW-OLD", &candles_from(&closes), 200, 14).unwrap();
        assert!(r.is_some());
    }

    #[test]
    fn table_has_header_and_rows() {
        let rows = vec![ScanResult {
            market: "KRW-BTC".into(),
            close: 1.0,
            rsi: 25.0,
            zone: RsiZone::Oversold,
            last_cross: None,
        }];
        let table = format_scan_table(&rows);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("MARKET"));
        assert!(lines[1].contains("OVERSOLD"));
    }
}
