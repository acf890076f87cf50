//! `shortwatch` - trigger ingestion runs and inspect their results.

mod display;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shortwatch_browser::{BrowserEngine, BrowserLauncher, EngineSettings, FingerprintConfig};
use shortwatch_core::{AppConfig, Capability, CapabilityRegistry, JurisdictionCode};
use shortwatch_db::Database;
use shortwatch_ingest::{IngestionCoordinator, IngestionSettings};
use shortwatch_sources::{HttpClient, SourceContext, SourceRegistry};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "shortwatch", version, about = "Short position disclosure ingestion")]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, env = "SHORTWATCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ingest every configured jurisdiction, or only the given ones
    Run {
        /// Jurisdiction codes, e.g. `-j GB -j FR` or `-j GB,FR`
        #[arg(short, long = "jurisdiction", value_delimiter = ',')]
        jurisdictions: Vec<String>,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show whether a run is in progress, recent runs and stored totals
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List supported jurisdictions
    List,
}

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,shortwatch=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => {
            let mut config = AppConfig::load_from(&path)
                .with_context(|| format!("loading {}", path.display()))?;
            config.apply_env_overrides();
            config.validate()?;
            config
        }
        None => AppConfig::load_with_env()?,
    };
    Ok(config)
}

async fn open_database(config: &AppConfig) -> Result<Database> {
    let path = config.database_path()?;
    info!("Using database {}", path.display());
    Database::open(&path, &config.database)
        .await
        .with_context(|| format!("opening {}", path.display()))
}

async fn launch_browser(config: &AppConfig) -> Option<Arc<BrowserEngine>> {
    if !config.browser.enabled {
        return None;
    }
    let fingerprint = FingerprintConfig::new(
        config.http.user_agent.clone(),
        config.browser.window_width,
        config.browser.window_height,
    );
    match BrowserEngine::launch(EngineSettings::from_config(&config.browser), fingerprint).await {
        Ok(engine) => Some(Arc::new(engine)),
        Err(e) => {
            tracing::warn!("Browser unavailable, browser-driven sources will fail: {}", e);
            None
        }
    }
}

fn parse_codes(codes: &[String]) -> Result<Vec<JurisdictionCode>> {
    codes
        .iter()
        .map(|code| JurisdictionCode::new(code).with_context(|| format!("jurisdiction '{code}'")))
        .collect()
}

async fn run(config: &AppConfig, jurisdictions: &[String], json: bool) -> Result<ExitCode> {
    let codes = parse_codes(jurisdictions)?;
    let db = open_database(config).await?;
    let browser = launch_browser(config).await;

    let mut ctx = SourceContext::new(HttpClient::new(&config.http)?);
    if let Some(engine) = &browser {
        ctx = ctx.with_browser(Arc::clone(engine) as Arc<dyn BrowserLauncher>);
    }

    let coordinator = IngestionCoordinator::new(SourceRegistry::with_default_sources(), Arc::new(db), ctx)
        .with_settings(IngestionSettings::from_config(config));

    let cancel = coordinator.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after the current step");
            cancel.cancel();
        }
    });

    let summary = if !codes.is_empty() {
        coordinator.run_for(&codes).await?
    } else if browser.is_none() && config.ingestion.jurisdictions.is_empty() {
        let mut capabilities = CapabilityRegistry::from_config(config);
        capabilities.disable(Capability::BrowserAutomation);
        let available = SourceRegistry::with_default_sources().available(&capabilities);
        info!("Browser unavailable, running {} jurisdictions", available.len());
        coordinator.run_for(&available).await?
    } else {
        coordinator.run_all().await?
    };
    drop(coordinator);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", display::summary(&summary));
    }

    if let Some(engine) = browser.and_then(|engine| Arc::try_unwrap(engine).ok()) {
        if let Err(e) = engine.close().await {
            tracing::warn!("Failed to close browser: {}", e);
        }
    }

    Ok(if summary.error_count() > 0 {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}

async fn status(config: &AppConfig, json: bool) -> Result<()> {
    let db = open_database(config).await?;
    let ctx = SourceContext::new(HttpClient::new(&config.http)?);
    let coordinator = IngestionCoordinator::new(SourceRegistry::with_default_sources(), Arc::new(db), ctx);
    let status = coordinator.status().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print!("{}", display::status(&status));
    }
    Ok(())
}

fn list(config: &AppConfig) {
    let capabilities = CapabilityRegistry::from_config(config);
    print!(
        "{}",
        display::sources(&SourceRegistry::with_default_sources(), &capabilities)
    );
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    info!("shortwatch v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli.config)?;

    match cli.command {
        Command::Run {
            jurisdictions,
            json,
        } => run(&config, &jurisdictions, json).await,
        Command::Status { json } => {
            status(&config, json).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::List => {
            list(&config);
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_arguments() {
        let cli = Cli::try_parse_from(["shortwatch", "run", "-j", "gb,fr", "--json"]).unwrap();
        let Command::Run { jurisdictions, json } = cli.command else {
            panic!("expected run");
        };
        assert!(json);
        let codes = parse_codes(&jurisdictions).unwrap();
        assert_eq!(codes, vec![JurisdictionCode::new("GB").unwrap(), JurisdictionCode::new("FR").unwrap()]);
    }

    #[test]
    fn test_invalid_code_rejected() {
        assert!(parse_codes(&["France".to_string()]).is_err());
    }

    #[test]
    fn test_list_marks_browser_sources() {
        let mut config = AppConfig::default();
        config.browser.enabled = false;
        let capabilities = CapabilityRegistry::from_config(&config);
        let listing = display::sources(&SourceRegistry::with_default_sources(), &capabilities);
        assert_eq!(listing.lines().count(), 12);
        assert_eq!(listing.matches("(unavailable)").count(), 4);
    }
}
