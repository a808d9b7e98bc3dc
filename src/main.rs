use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use kalshi_markets::config::{AppConfig, SourceKind};
use kalshi_markets::market::models::{MarketResult, MarketStatus};
use kalshi_markets::monitoring::logger;
use kalshi_markets::pipeline::MarketService;

#[derive(Debug, Parser)]
#[command(name = "kalshi-markets", version, about = "Extract Kalshi market listings and outcome prices as JSON")]
struct Cli {
    /// Where to read market data from. Defaults to the config file's `source`.
    #[arg(long, value_enum, global = true)]
    source: Option<SourceKind>,

    /// Config file (defaults to config/default.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show the browser window instead of running headless.
    #[arg(long, global = true)]
    no_headless: bool,

    /// Chrome/Chromium executable.
    #[arg(long, global = true)]
    chrome_binary: Option<PathBuf>,

    /// chromedriver executable.
    #[arg(long, global = true)]
    chromedriver: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List markets on a browse or category page.
    Browse {
        /// kalshi.com browse/category URL. Defaults to all open markets.
        #[arg(long)]
        url: Option<String>,

        /// Maximum number of markets to return.
        #[arg(long)]
        max: Option<usize>,
    },
    /// Extract outcomes and prices for one market.
    Market {
        /// kalshi.com market URL or event ticker.
        url: String,
    },
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let browsing = matches!(cli.command, Command::Browse { .. });

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => return fail(browsing, &format!("Failed to start async runtime: {e}")),
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => fail(browsing, &format!("{e:#}")),
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    apply_cli_overrides(&mut config, &cli);

    // A second subscriber (tests, embedding) is not fatal.
    if let Err(e) = logger::init_logging(&config.monitoring) {
        eprintln!("{e}");
    }

    let kind = cli.source.unwrap_or(config.source);
    let service = MarketService::from_config(&config, kind)?;
    tracing::info!(provider = service.provider_name(), "kalshi-markets starting");

    match cli.command {
        Command::Browse { url, max } => {
            let max = max.unwrap_or(config.browse.default_max_markets);
            match service.browse(url.as_deref().unwrap_or_default(), max).await {
                Ok(listings) => {
                    print_json(&listings)?;
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Browse failed");
                    write_browse_failure(&mut io::stdout(), &mut io::stderr(), &e.to_string())?;
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Market { url } => {
            let result = service.market(&url).await;
            let status = write_market(&mut io::stdout(), &mut io::stderr(), &result)?;
            Ok(ExitCode::from(status))
        }
    }
}

fn apply_cli_overrides(config: &mut AppConfig, cli: &Cli) {
    if cli.no_headless {
        config.browser.headless = false;
    }
    if let Some(path) = &cli.chrome_binary {
        config.browser.browser_binary_path = Some(path.clone());
    }
    if let Some(path) = &cli.chromedriver {
        config.browser.driver_binary_path = Some(path.clone());
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    write_json(&mut io::stdout(), value)
}

fn write_json<T: Serialize>(out: &mut impl Write, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    writeln!(out, "{json}").context("Failed to write output")?;
    Ok(())
}

fn write_error(err: &mut impl Write, message: &str) -> io::Result<()> {
    match serde_json::to_string(&ErrorBody { error: message }) {
        Ok(json) => writeln!(err, "{json}"),
        Err(_) => writeln!(err, "{message}"),
    }
}

fn eprint_error(message: &str) {
    let _ = write_error(&mut io::stderr(), message);
}

/// `{"error": ...}` on stderr, an empty list on stdout.
fn write_browse_failure(out: &mut impl Write, err: &mut impl Write, message: &str) -> Result<()> {
    write_error(err, message).context("Failed to write error")?;
    writeln!(out, "[]").context("Failed to write output")?;
    Ok(())
}

/// Envelope on stdout, plus the error object on stderr when the fetch failed.
/// Returns the process exit status.
fn write_market(out: &mut impl Write, err: &mut impl Write, result: &MarketResult) -> Result<u8> {
    write_json(out, result)?;
    if result.status() == MarketStatus::Error {
        write_error(err, result.error().unwrap_or_default()).context("Failed to write error")?;
    }
    Ok(exit_status(result))
}

/// 0 for `ok` and `no_outcomes_found`, 1 for `error`.
fn exit_status(result: &MarketResult) -> u8 {
    if result.is_success() {
        0
    } else {
        1
    }
}

/// Startup failures still leave parseable JSON on stdout for the chosen command.
fn fail(browsing: bool, message: &str) -> ExitCode {
    let written = if browsing {
        write_browse_failure(&mut io::stdout(), &mut io::stderr(), message)
    } else {
        write_market(&mut io::stdout(), &mut io::stderr(), &MarketResult::build_error(message)).map(|_| ())
    };
    if written.is_err() {
        eprint_error(message);
    }
    ExitCode::FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;
    use kalshi_markets::market::models::Outcome;

    fn output(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_exit_status() {
        let ok = MarketResult::build(
            Some("Fed decision in March".to_string()),
            vec![Outcome::new("Hold rate", Some(91), "91%")],
        );
        let empty = MarketResult::build(Some("Fed decision in March".to_string()), Vec::new());
        let failed = MarketResult::build_error("HTTP 503 for /events/KXFED-26MAR");

        assert_eq!(exit_status(&ok), 0);
        assert_eq!(exit_status(&empty), 0);
        assert_eq!(exit_status(&failed), 1);
    }

    #[test]
    fn test_market_error_writes_both_streams() {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let result = MarketResult::build_error("Timed out after 20s waiting for market page to render");

        let status = write_market(&mut out, &mut err, &result).unwrap();

        assert_eq!(status, 1);
        let envelope: serde_json::Value = serde_json::from_str(&output(out)).unwrap();
        assert_eq!(envelope["status"], "error");
        let error: serde_json::Value = serde_json::from_str(output(err).trim()).unwrap();
        assert_eq!(
            error,
            serde_json::json!({"error": "Timed out after 20s waiting for market page to render"})
        );
    }

    #[test]
    fn test_market_success_keeps_stderr_clean() {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let result = MarketResult::build(Some("Empty event".to_string()), Vec::new());

        assert_eq!(write_market(&mut out, &mut err, &result).unwrap(), 0);
        assert!(err.is_empty());
        let envelope: serde_json::Value = serde_json::from_str(&output(out)).unwrap();
        assert_eq!(envelope["status"], "no_outcomes_found");
    }

    #[test]
    fn test_browse_failure_output() {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        write_browse_failure(&mut out, &mut err, "HTTP 500 for /events").unwrap();

        assert_eq!(output(out).trim(), "[]");
        assert_eq!(output(err).trim(), r#"{"error":"HTTP 500 for /events"}"#);
    }
}
