//! Shopper configuration

use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};
use rusty_money::iso::Currency;

use crate::{
    catalog::DEFAULT_PAGE_SIZE,
    money::{MoneyConversionError, parse_currency},
    optimiser::DEFAULT_MAX_CANDIDATES,
    store::HttpStoreConfig,
    task::TaskSettings,
};

/// Log output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Logging settings.
#[derive(Debug, Args)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "info", global = true)]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(
        long,
        env = "LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Compact,
        global = true
    )]
    pub log_format: LogFormat,
}

/// Store selection settings.
#[derive(Debug, Args)]
pub struct StoreArgs {
    /// Base URL of a remote store; the fixture store is used when unset
    #[arg(long, env = "STORE_URL")]
    pub store_url: Option<String>,

    /// Store fixture name, loaded from `<fixture-dir>/stores/<name>.yml`
    #[arg(long, env = "STORE_FIXTURE", default_value = "soda")]
    pub fixture: String,

    /// Fixture directory
    #[arg(long, env = "FIXTURE_DIR", default_value = "fixtures")]
    pub fixture_dir: PathBuf,

    /// Currency of a remote store
    #[arg(long, env = "STORE_CURRENCY", default_value = "USD")]
    pub currency: String,

    /// Remote request timeout in seconds
    #[arg(long, env = "STORE_TIMEOUT_SECONDS", default_value_t = 30u64)]
    pub timeout_secs: u64,
}

impl StoreArgs {
    /// HTTP store settings, when a store URL is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the currency code is unknown.
    pub fn http_config(&self) -> Result<Option<HttpStoreConfig>, MoneyConversionError> {
        let Some(base_url) = &self.store_url else {
            return Ok(None);
        };

        Ok(Some(HttpStoreConfig {
            base_url: base_url.clone(),
            currency: self.currency()?,
            timeout: Duration::from_secs(self.timeout_secs),
        }))
    }

    fn currency(&self) -> Result<&'static Currency, MoneyConversionError> {
        parse_currency(&self.currency)
    }
}

/// Optimiser settings.
#[derive(Debug, Args)]
pub struct OptimiserArgs {
    /// Page size requested when listing products
    #[arg(long, env = "PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: u32,

    /// Most compositions tested per task
    #[arg(long, env = "MAX_CANDIDATES", default_value_t = DEFAULT_MAX_CANDIDATES)]
    pub max_candidates: usize,
}

impl OptimiserArgs {
    /// Task settings for these arguments.
    pub fn settings(&self) -> TaskSettings {
        TaskSettings {
            page_size: self.page_size,
            max_candidates: self.max_candidates,
        }
    }
}

/// Arguments for `run`.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Task file to run
    #[arg(long)]
    pub task: PathBuf,

    /// Store settings
    #[command(flatten)]
    pub store: StoreArgs,

    /// Optimiser settings
    #[command(flatten)]
    pub optimiser: OptimiserArgs,
}

/// Arguments for `catalog`.
#[derive(Debug, Args)]
pub struct CatalogArgs {
    /// Store settings
    #[command(flatten)]
    pub store: StoreArgs,

    /// Page size requested when listing products
    #[arg(long, env = "PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: u32,
}

/// Shopper commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Optimise and purchase a single task
    Run(RunArgs),

    /// Print the store's product listing
    Catalog(CatalogArgs),
}

/// Shopper configuration
#[derive(Debug, Parser)]
#[command(name = "shopper", about = "Cheapest-basket shopper", long_about = None)]
pub struct ShopperConfig {
    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

impl ShopperConfig {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        _ = dotenvy::dotenv();

        Self::try_parse()
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn run_defaults_to_the_soda_fixture() -> TestResult {
        let config = ShopperConfig::try_parse_from(["shopper", "run", "--task", "task.yml"])?;

        let Command::Run(args) = config.command else {
            return Err("expected the run command".into());
        };

        assert_eq!(args.task, PathBuf::from("task.yml"));
        assert_eq!(args.store.fixture, "soda");
        assert_eq!(args.optimiser.settings(), TaskSettings::default());
        assert_eq!(config.logging.log_format, LogFormat::Compact);

        Ok(())
    }

    #[test]
    fn store_url_selects_the_http_store() -> TestResult {
        let config = ShopperConfig::try_parse_from([
            "shopper",
            "catalog",
            "--store-url",
            "http://localhost:8080",
            "--currency",
            "GBP",
            "--timeout-secs",
            "5",
        ])?;

        let Command::Catalog(args) = config.command else {
            return Err("expected the catalog command".into());
        };

        let Some(http) = args.store.http_config()? else {
            return Err("expected an http store".into());
        };

        assert_eq!(http.base_url, "http://localhost:8080");
        assert_eq!(http.currency.iso_alpha_code, "GBP");
        assert_eq!(http.timeout, Duration::from_secs(5));

        Ok(())
    }

    #[test]
    fn unknown_currency_is_rejected() -> TestResult {
        let config = ShopperConfig::try_parse_from([
            "shopper",
            "catalog",
            "--store-url",
            "http://localhost:8080",
            "--currency",
            "XYZ",
        ])?;

        let Command::Catalog(args) = config.command else {
            return Err("expected the catalog command".into());
        };

        assert!(args.store.http_config().is_err());

        Ok(())
    }
}
