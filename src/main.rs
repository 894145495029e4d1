use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use optionpipe::config::Config;
use optionpipe::domain::greeks::Greeks;
use optionpipe::domain::{ChainRequest, OptionType};
use optionpipe::service::OptionService;
use optionpipe::upstream::HttpChainSource;

/// Fetch option-chain parameters and Greeks through the serving pipeline.
#[derive(Parser, Debug)]
#[command(name = "optionpipe", version, about)]
struct Cli {
    /// Path to the TOML config file. Defaults are used if the file is absent.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// "call" or "put".
    #[arg(long, default_value = "call", value_parser = parse_option_type)]
    option_type: OptionType,

    /// Expiration date (YYYY-MM-DD); nearest listed expiry when omitted.
    #[arg(long)]
    expiry: Option<chrono::NaiveDate>,

    /// Strike price; at-the-money when omitted.
    #[arg(long)]
    strike: Option<f64>,

    /// Risk-free rate override.
    #[arg(long)]
    rate: Option<f64>,

    /// Volatility override.
    #[arg(long)]
    volatility: Option<f64>,

    /// Ticker symbols to fetch, e.g. AAPL MSFT.
    #[arg(required = true)]
    symbols: Vec<String>,
}

fn parse_option_type(s: &str) -> Result<OptionType, String> {
    s.parse().map_err(|e| format!("{e}"))
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config: {e}");
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    config.init_logging();
    info!("optionpipe starting");

    tokio::select! {
        result = run(&cli, &config) => {
            if let Err(e) = result {
                error!(error = %e, "Fatal error");
                std::process::exit(1);
            }
        }
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    info!("optionpipe stopped");
}

async fn run(cli: &Cli, config: &Config) -> optionpipe::error::Result<()> {
    let source = Arc::new(HttpChainSource::new(&config.upstream)?);
    let service = Arc::new(OptionService::new(config, source)?);

    let mut handles = Vec::new();
    for symbol in &cli.symbols {
        let mut request = ChainRequest::new(symbol.clone(), cli.option_type);
        request.expiry = cli.expiry;
        request.strike = cli.strike;
        request.rate = cli.rate;
        request.volatility = cli.volatility;

        let service = Arc::clone(&service);
        let symbol = symbol.clone();
        handles.push(tokio::spawn(async move {
            (symbol, service.get_option_data(request).await)
        }));
    }

    let mut failed = false;
    for handle in handles {
        let (symbol, result) = handle.await.map_err(|e| std::io::Error::other(e.to_string()))?;
        match result {
            Ok(quote) => {
                let greeks = Greeks::for_quote(&quote)?;
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "symbol": symbol,
                        "quote": quote,
                        "greeks": greeks,
                    }))?
                );
            }
            Err(e) => {
                error!(symbol = %symbol, error = %e, "request failed");
                failed = true;
            }
        }
    }

    if failed {
        std::process::exit(2);
    }
    Ok(())
}
