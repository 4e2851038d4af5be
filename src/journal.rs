// =============================================================================
// Trade Journal — append-only JSON Lines record of every autotrade decision
// =============================================================================
//
// One line per tick, whether or not an order was sent, so the advisor's
// reasoning can be audited after the fact.
// =============================================================================

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::trader::{ExecutionResult, TradePlan};
use crate::types::Decision;

/// A single journal line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// UUID v4.
    pub id: String,
    /// RFC 3339 timestamp.
    pub created_at: String,
    pub market: String,
    pub decision: Decision,
    pub reason: String,
    pub plan: TradePlan,
    pub outcome: ExecutionResult,
}

impl TradeRecord {
    pub fn new(
        market: impl Into<String>,
        decision: Decision,
        reason: impl Into<String>,
        plan: TradePlan,
        outcome: ExecutionResult,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            market: market.into(),
            decision,
            reason: reason.into(),
            plan,
            outcome,
        }
    }
}

pub struct TradeJournal {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TradeJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `record` as one JSON line, creating the file if needed.
    pub fn append(&self, record: &TradeRecord) -> Result<()> {
        let mut line = serde_json::to_string(record).context("failed to serialise trade record")?;
        line.push('\n');

        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open journal {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("failed to write journal {}", self.path.display()))?;

        debug!(id = %record.id, path = %self.path.display(), "trade record appended");
        Ok(())
    }

    /// The last `n` records, oldest first.  A missing file is an empty
    /// journal; malformed lines are reported as errors.
    pub fn tail(&self, n: usize) -> Result<Vec<TradeRecord>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read journal {}", self.path.display()))
            }
        };

        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        let start = lines.len().saturating_sub(n);
        lines[start..]
            .iter()
            .enumerate()
            .map(|(i, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("malformed journal line {}", start + i + 1))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(decision: Decision) -> TradeRecord {
        TradeRecord::new(
            "KRW-BTC",
            decision,
            "test",
            TradePlan::Hold,
            ExecutionResult::NoAction("holding position".into()),
        )
    }

    #[test]
    fn record_has_uuid_and_timestamp() {
        let r = record(Decision::Hold);
        assert!(uuid::Uuid::parse_str(&r.id).is_ok());
        assert!(chrono::DateTime::parse_from_rfc3339(&r.created_at).is_ok());
    }

    #[test]
    fn append_writes_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let journal = TradeJournal::new(dir.path().join("journal.jsonl"));

        journal.append(&record(Decision::Buy)).unwrap();
        journal.append(&record(Decision::Sell)).unwrap();

        let content = std::fs::read_to_string(journal.path()).unwrap();
        assert_eq!(content.lines().count(), 2);

        let first: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(first["decision"], "buy");
        assert_eq!(first["plan"]["action"], "hold");
        assert_eq!(first["outcome"]["status"], "no_action");
    }

    #[test]
    fn tail_returns_latest_records() {
        let dir = tempfile::tempdir().unwrap();
        let journal = TradeJournal::new(dir.path().join("journal.jsonl"));
        for d in [Decision::Buy, Decision::Hold, Decision::Sell] {
            journal.append(&record(d)).unwrap();
        }

        let last_two = journal.tail(2).unwrap();
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].decision, Decision::Hold);
        assert_eq!(last_two[1].decision, Decision::Sell);
    }

    #[test]
    fn tail_of_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let journal = TradeJournal::new(dir.path().join("none.jsonl"));
        assert!(journal.tail(10).unwrap().is_empty());
    }
}
