// =============================================================================
// Shared types used across upbit-pilot
// =============================================================================

use serde::{Deserialize, Serialize};

/// Balance snapshot for a single currency from `/v1/accounts`.
///
/// Upbit sends every numeric field as a JSON string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub currency: String,
    #[serde(default, with = "string_f64")]
    pub balance: f64,
    #[serde(default, with = "string_f64")]
    pub locked: f64,
    #[serde(default, with = "string_f64")]
    pub avg_buy_price: f64,
    #[serde(default)]
    pub unit_currency: String,
}

/// Whether orders reach the exchange or are only simulated.  Config files
/// may spell it in lowercase, like the env override and the CLI do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountMode {
    #[default]
    #[serde(alias = "demo", alias = "DEMO")]
    Demo,
    #[serde(alias = "live", alias = "LIVE")]
    Live,
}

impl std::fmt::Display for AccountMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Demo => write!(f, "Demo"),
            Self::Live => write!(f, "Live"),
        }
    }
}

impl std::str::FromStr for AccountMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "demo" => Ok(Self::Demo),
            "live" => Ok(Self::Live),
            other => anyhow::bail!("unknown account mode '{other}' (expected demo or live)"),
        }
    }
}

/// Advisor verdict for a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Buy,
    Sell,
    Hold,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Hold => write!(f, "HOLD"),
        }
    }
}

impl std::str::FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            "hold" => Ok(Self::Hold),
            other => Err(format!("unknown decision '{other}'")),
        }
    }
}

/// Split a ticker such as `"KRW-BTC"` into the currency whose balance is
/// meant; a bare currency (`"KRW"`) is returned unchanged.
pub fn balance_currency(ticker: &str) -> &str {
    ticker.rsplit_once('-').map_or(ticker, |(_, coin)| coin)
}

/// Serde helper for numbers that arrive as strings (`"0.0012"`) but may also
/// be plain JSON numbers.
mod string_f64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Str(String),
            Num(f64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Str(s) => s.parse::<f64>().map_err(serde::de::Error::custom),
            Raw::Num(n) => Ok(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_parses_string_numbers() {
        let json = r#"{
            "currency": "BTC",
            "balance": "0.00123",
            "locked": "0.0",
            "avg_buy_price": "95000000",
            "avg_buy_price_modified": false,
            "unit_currency": "KRW"
        }"#;
        let b: Balance = serde_json::from_str(json).unwrap();
        assert_eq!(b.currency, "BTC");
        assert!((b.balance - 0.00123).abs() < 1e-15);
        assert_eq!(b.avg_buy_price, 95_000_000.0);
    }

    #[test]
    fn balance_accepts_plain_numbers() {
        let b: Balance = serde_json::from_str(r#"{"currency":"KRW","balance":5000}"#).unwrap();
        assert_eq!(b.balance, 5000.0);
        assert_eq!(b.locked, 0.0);
    }

    #[test]
    fn decision_parsing_is_case_insensitive() {
        assert_eq!("BUY".parse::<Decision>(), Ok(Decision::Buy));
        assert_eq!(" sell ".parse::<Decision>(), Ok(Decision::Sell));
        assert_eq!("Hold".parse::<Decision>(), Ok(Decision::Hold));
        assert!("moon".parse::<Decision>().is_err());
    }

    #[test]
    fn account_mode_from_str() {
        assert_eq!("LIVE".parse::<AccountMode>().unwrap(), AccountMode::Live);
        assert_eq!("demo".parse::<AccountMode>().unwrap(), AccountMode::Demo);
        assert!("paper".parse::<AccountMode>().is_err());
    }

    #[test]
    fn account_mode_deserializes_lowercase() {
        assert_eq!(serde_json::from_str::<AccountMode>(r#""live""#).unwrap(), AccountMode::Live);
        assert_eq!(serde_json::from_str::<AccountMode>(r#""demo""#).unwrap(), AccountMode::Demo);
        assert_eq!(serde_json::from_str::<AccountMode>(r#""Live""#).unwrap(), AccountMode::Live);
        assert!(serde_json::from_str::<AccountMode>(r#""paper""#).is_err());
        // Written back in the canonical spelling.
        assert_eq!(serde_json::to_string(&AccountMode::Live).unwrap(), r#""Live""#);
        assert_eq!(AccountMode::default(), AccountMode::Demo);
    }

    #[test]
    fn balance_currency_splits_market() {
        assert_eq!(balance_currency("KRW-BTC"), "BTC");
        assert_eq!(balance_currency("KRW"), "KRW");
    }
}
