//! Fibre-Scout main entry point
//!
//! This is the command-line interface for the Fibre-Scout deal scraper.
//! Results are printed to stdout as JSON; logs go to stderr.

use anyhow::{bail, Context};
use clap::Parser;
use fibre_scout::config::{load_config_with_hash, Config};
use fibre_scout::scrape::{
    PlannedTarget, ProviderRegistry, ScrapeResult, Scraper, MAX_BATCH_PROVIDERS,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Fibre-Scout: SSRF-safe broadband deal scraper
///
/// Renders provider pages in a headless browser and extracts residential
/// broadband deals. Destinations on private networks are never contacted.
#[derive(Parser, Debug)]
#[command(name = "fibre-scout")]
#[command(version)]
#[command(about = "SSRF-safe broadband deal scraper", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Provider names to scrape (at most 5 are processed)
    #[arg(value_name = "PROVIDER")]
    providers: Vec<String>,

    /// Page to scrape instead of the provider's canonical URL (single provider only)
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be scraped without launching a browser
    #[arg(long, conflicts_with = "list_providers")]
    dry_run: bool,

    /// List known providers and exit
    #[arg(long)]
    list_providers: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.list_providers {
        return handle_list_providers(&config);
    }

    if cli.providers.is_empty() {
        bail!("no provider names given");
    }
    if cli.url.is_some() && cli.providers.len() > 1 {
        bail!("--url can only be used with a single provider");
    }

    if cli.dry_run {
        return handle_dry_run(&config, &cli.providers, cli.url.as_deref());
    }

    handle_scrape(&config, &cli.providers, cli.url.as_deref()).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("fibre_scout=info,warn"),
            1 => EnvFilter::new("fibre_scout=debug,info"),
            2 => EnvFilter::new("fibre_scout=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles --list-providers: prints the allowlist
fn handle_list_providers(config: &Config) -> anyhow::Result<()> {
    let registry = ProviderRegistry::with_overrides(&config.providers)?;
    for (name, url) in registry.iter() {
        println!("{:<18} {}", name, url);
    }
    Ok(())
}

/// Handles --dry-run: shows the resolved plan without any network activity
fn handle_dry_run(config: &Config, providers: &[String], url: Option<&str>) -> anyhow::Result<()> {
    let scraper = Scraper::from_config(config).context("failed to set up scraper")?;

    println!("=== Fibre-Scout Dry Run ===\n");
    println!("Production mode: {}", config.service.production);
    println!("Batch concurrency: {}", config.service.batch_concurrency);
    println!(
        "AI extraction: {}",
        if scraper.pipeline().is_ai_enabled() {
            format!("enabled ({})", config.ai.model)
        } else {
            "disabled (pattern fallback only)".to_string()
        }
    );
    println!(
        "Navigation timeout: {}s, settle delay: {}ms",
        config.browser.navigation_timeout_secs, config.browser.settle_delay_ms
    );

    println!("\nProviders:");
    for provider in providers.iter().take(MAX_BATCH_PROVIDERS) {
        let target = match scraper.plan_target(provider, url) {
            Ok(PlannedTarget::Caller(url)) => format!("{} (caller URL, checked before use)", url),
            Ok(PlannedTarget::Canonical(url)) => url,
            Ok(PlannedTarget::Fallback(url)) => format!("{} (fallback guess)", url),
            Err(message) => format!("rejected: {}", message),
        };
        println!("  - {}: {}", provider, target);
    }
    if providers.len() > MAX_BATCH_PROVIDERS {
        println!("  ({} more ignored)", providers.len() - MAX_BATCH_PROVIDERS);
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the scrape itself and prints JSON results
async fn handle_scrape(config: &Config, providers: &[String], url: Option<&str>) -> anyhow::Result<()> {
    let scraper = Scraper::from_config(config).context("failed to set up scraper")?;

    let output = if let [provider] = providers {
        let result = scraper.scrape(provider, url).await;
        log_outcome(&result);
        serde_json::to_string_pretty(&result)?
    } else {
        let results: BTreeMap<String, ScrapeResult> =
            scraper.scrape_batch(providers).await.into_iter().collect();
        results.values().for_each(log_outcome);
        serde_json::to_string_pretty(&results)?
    };

    if let Err(e) = scraper.shutdown().await {
        tracing::warn!("Browser shutdown failed: {}", e);
    }

    println!("{}", output);
    Ok(())
}

fn log_outcome(result: &ScrapeResult) {
    match &result.error {
        None => tracing::info!("{}: {} deals", result.provider, result.deals.len()),
        Some(error) => tracing::warn!("{}: {}", result.provider, error),
    }
}
