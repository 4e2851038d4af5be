// =============================================================================
// Candle intervals supported by the Upbit candle endpoints
// =============================================================================

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandleInterval {
    Minute1,
    Minute3,
    Minute5,
    Minute10,
    Minute15,
    Minute30,
    Minute60,
    Minute240,
    Day,
    Week,
    Month,
}

impl CandleInterval {
    pub const ALL: [CandleInterval; 11] = [
        Self::Minute1,
        Self::Minute3,
        Self::Minute5,
        Self::Minute10,
        Self::Minute15,
        Self::Minute30,
        Self::Minute60,
        Self::Minute240,
        Self::Day,
        Self::Week,
        Self::Month,
    ];

    /// Path segment under `/v1/candles/`.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Minute1 => "minutes/1",
            Self::Minute3 => "minutes/3",
            Self::Minute5 => "minutes/5",
            Self::Minute10 => "minutes/10",
            Self::Minute15 => "minutes/15",
            Self::Minute30 => "minutes/30",
            Self::Minute60 => "minutes/60",
            Self::Minute240 => "minutes/240",
            Self::Day => "days",
            Self::Week => "weeks",
            Self::Month => "months",
        }
    }

    /// Operator-facing name, accepted back by `FromStr`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Minute1 => "minute1",
            Self::Minute3 => "minute3",
            Self::Minute5 => "minute5",
            Self::Minute10 => "minute10",
            Self::Minute15 => "minute15",
            Self::Minute30 => "minute30",
            Self::Minute60 => "minute60",
            Self::Minute240 => "minute240",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

impl fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CandleInterval {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // "1M" (month) must be checked before lower-casing collides it with "1m".
        if trimmed == "1M" {
            return Ok(Self::Month);
        }

        let interval = match trimmed.to_ascii_lowercase().as_str() {
            "minute1" | "1m" | "minutes" | "minute" => Self::Minute1,
            "minute3" | "3m" => Self::Minute3,
            "minute5" | "5m" => Self::Minute5,
            "minute10" | "10m" => Self::Minute10,
            "minute15" | "15m" => Self::Minute15,
            "minute30" | "30m" => Self::Minute30,
            "minute60" | "60m" | "1h" => Self::Minute60,
            "minute240" | "240m" | "4h" => Self::Minute240,
            "day" | "days" | "1d" => Self::Day,
            "week" | "weeks" | "1w" => Self::Week,
            "month" | "months" => Self::Month,
            other => anyhow::bail!(
                "unknown candle interval '{other}' (expected one of: {})",
                Self::ALL.map(|i| i.name()).join(", ")
            ),
        };
        Ok(interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_roundtrip() {
        for interval in CandleInterval::ALL {
            assert_eq!(interval.name().parse::<CandleInterval>().unwrap(), interval);
        }
    }

    #[test]
    fn aliases() {
        assert_eq!("1h".parse::<CandleInterval>().unwrap(), CandleInterval::Minute60);
        assert_eq!("4H".parse::<CandleInterval>().unwrap(), CandleInterval::Minute240);
        assert_eq!("1m".parse::<CandleInterval>().unwrap(), CandleInterval::Minute1);
        assert_eq!("1M".parse::<CandleInterval>().unwrap(), CandleInterval::Month);
        assert_eq!(" DAY ".parse::<CandleInterval>().unwrap(), CandleInterval::Day);
    }

    #[test]
    fn paths() {
        assert_eq!(CandleInterval::Minute240.path(), "minutes/240");
        assert_eq!(CandleInterval::Week.path(), "weeks");
    }

    #[test]
    fn unknown_interval() {
        let err = "minute2".parse::<CandleInterval>().unwrap_err();
        assert!(err.to_string().contains("minute240"));
    }
}
