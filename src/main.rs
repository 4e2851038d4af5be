// =============================================================================
// Upbit Pilot — Main Entry Point
// =============================================================================
//
// Starts in Demo mode unless the config, UPBIT_PILOT_MODE or `--live` says
// otherwise.  Logs go to `error.log` by default so they never interleave with
// the interactive menu.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod advisor;
mod autotrade;
mod config;
mod indicators;
mod journal;
mod market_data;
mod scanner;
mod shell;
mod trader;
mod types;
mod upbit;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::advisor::AdvisorClient;
use crate::autotrade::Autotrader;
use crate::config::{AppConfig, Credentials};
use crate::indicators::rsi::DEFAULT_RSI_PERIOD;
use crate::journal::TradeJournal;
use crate::types::AccountMode;
use crate::upbit::client::MAX_CANDLES;
use crate::upbit::{CandleInterval, UpbitClient};

const DEFAULT_CONFIG_PATH: &str = "upbit_pilot.json";

#[derive(Parser)]
#[command(author, version, about = "Upbit trading helper: indicators, market scan and AI-advised autotrade")]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive menu (default)
    Menu,

    /// Ask the advisor on a fixed interval and trade on its decision
    Autotrade {
        /// Market to trade (e.g. KRW-BTC); overrides the config
        #[arg(long)]
        market: Option<String>,

        /// Send real orders instead of simulating them
        #[arg(long)]
        live: bool,

        /// Run a single tick and exit
        #[arg(long)]
        once: bool,
    },

    /// RSI / moving-average cross screen over every market of a fiat
    Scan {
        /// Quote currency; defaults to the configured fiat
        #[arg(long)]
        fiat: Option<String>,

        /// Candle interval: minute1..minute240, day, week, month (or 1h, 4h, 1d ...)
        #[arg(long, default_value = "day")]
        interval: String,

        /// Candles per market (1-200); markets with less history are skipped
        #[arg(long, default_value = "60", value_parser = clap::value_parser!(u32).range(1..=MAX_CANDLES as i64))]
        count: u32,

        /// RSI period
        #[arg(long, default_value_t = DEFAULT_RSI_PERIOD)]
        period: usize,
    },

    /// Write the effective configuration to the config path
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the latest autotrade journal records
    Journal {
        /// Number of records to show
        #[arg(long, default_value = "10")]
        tail: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();
    let cli = Cli::parse();

    let (mut config, load_error) = match AppConfig::load(&cli.config) {
        Ok(c) => (c, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    init_logging(&config)?;

    if let Some(e) = load_error {
        warn!(path = %cli.config.display(), error = %format!("{e:#}"), "config not loaded, using defaults");
        if cli.config.exists() {
            println!("{}", config_fallback_notice(&cli.config, &e));
        }
    }
    config.apply_env_overrides()?;

    // ── 2. Dispatch ──────────────────────────────────────────────────────
    match cli.command.unwrap_or(Commands::Menu) {
        Commands::Menu => {
            config.validate()?;
            let client = UpbitClient::new(Credentials::from_env().exchange)?;
            if !client.is_authenticated() {
                println!("No Upbit keys found; balance and order options will fail.");
            }
            trader::announce_mode(config.account_mode);
            shell::Shell::new(client, config).run().await?;
        }

        Commands::Autotrade { market, live, once } => {
            if let Some(m) = market {
                config.market = m.trim().to_uppercase();
            }
            if live {
                config.account_mode = AccountMode::Live;
            }
            config.validate()?;

            let credentials = Credentials::from_env();
            let keys = credentials.require_exchange()?.clone();
            let advisor = AdvisorClient::new(credentials.require_openai()?, config.advisor.clone())?;
            let client = UpbitClient::new(Some(keys))?;

            trader::announce_mode(config.account_mode);
            println!("Autotrading {} in {} mode. Press Ctrl+C to stop.", config.market, config.account_mode);
            Autotrader::new(client, advisor, config).run(once).await?;
        }

        Commands::Scan { fiat, interval, count, period } => {
            let interval: CandleInterval = interval.parse()?;
            let fiat = fiat.unwrap_or_else(|| config.fiat.clone()).to_uppercase();
            let client = UpbitClient::new(None)?;

            println!("Scanning {fiat} markets ({count} x {interval}, RSI {period})...");
            let results = scanner::scan_markets(&client, &fiat, interval, count, period).await?;
            print!("{}", scanner::format_scan_table(&results));
            println!("{} markets", results.len());
        }

        Commands::InitConfig { force } => {
            write_config(&config, &cli.config, force)?;
            println!("Config written to {}", cli.config.display());
        }

        Commands::Journal { tail } => {
            let journal = TradeJournal::new(&config.journal_path);
            for record in journal.tail(tail)? {
                println!(
                    "{}  {:<10} {:<4}  {}  -> {}\n    {}",
                    record.created_at, record.market, record.decision, record.plan, record.outcome, record.reason
                );
            }
        }
    }

    info!("upbit-pilot finished");
    Ok(())
}

/// Log to `config.log_file` when set, otherwise stderr.  `RUST_LOG` wins over
/// `config.log_level`.
fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {path}"))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

/// Terminal line shown when the config file could not be used.
fn config_fallback_notice(path: &Path, error: &anyhow::Error) -> String {
    format!("Warning: could not load {} ({error:#}); using defaults.", path.display())
}

fn write_config(config: &AppConfig, path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    config.validate()?;
    config.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_to_menu() {
        let cli = Cli::try_parse_from(["upbit-pilot"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn cli_parses_autotrade_flags() {
        let cli = Cli::try_parse_from(["upbit-pilot", "autotrade", "--market", "krw-eth", "--once"]).unwrap();
        match cli.command {
            Some(Commands::Autotrade { market, live, once }) => {
                assert_eq!(market.as_deref(), Some("krw-eth"));
                assert!(!live);
                assert!(once);
            }
            _ => panic!("expected autotrade"),
        }
    }

    #[test]
    fn cli_scan_defaults() {
        let cli = Cli::try_parse_from(["upbit-pilot", "-c", "x.json", "scan"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("x.json"));
        match cli.command {
            Some(Commands::Scan { fiat, interval, count, period }) => {
                assert!(fiat.is_none());
                assert_eq!(interval, "day");
                assert_eq!(count, 60);
                assert_eq!(period, DEFAULT_RSI_PERIOD);
            }
            _ => panic!("expected scan"),
        }
    }

    #[test]
    fn cli_scan_count_is_limited_to_one_request() {
        assert!(Cli::try_parse_from(["upbit-pilot", "scan", "--count", "300"]).is_err());
        assert!(Cli::try_parse_from(["upbit-pilot", "scan", "--count", "0"]).is_err());
        let cli = Cli::try_parse_from(["upbit-pilot", "scan", "--count", "200"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Scan { count: 200, .. })));
    }

    #[test]
    fn unreadable_config_is_reported_on_the_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upbit_pilot.json");
        std::fs::write(&path, r#"{"account_mode": "paper"}"#).unwrap();

        let err = AppConfig::load(&path).unwrap_err();
        let notice = config_fallback_notice(&path, &err);
        assert!(notice.starts_with("Warning: could not load"));
        assert!(notice.contains("upbit_pilot.json"));
        assert!(notice.ends_with("using defaults."));
    }

    #[test]
    fn write_config_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upbit_pilot.json");

        write_config(&AppConfig::default(), &path, false).unwrap();
        assert!(write_config(&AppConfig::default(), &path, false).is_err());
        write_config(&AppConfig::default(), &path, true).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.market, "KRW-BTC");
    }
}
