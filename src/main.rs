//! Lattice Shopper CLI

use std::{io, process::ExitCode};

use thiserror::Error;
use tracing::{error, info};

use lattice_shopper::{
    catalog::fetch_all_products,
    config::{CatalogArgs, Command, RunArgs, ShopperConfig, StoreArgs},
    fixtures::{Fixture, FixtureError},
    money::MoneyConversionError,
    observability,
    receipt::{self, ReceiptError},
    store::{HttpStore, StoreClient, StoreError},
    task::{TaskContext, TaskError, TaskOutcome, run_task},
    usage::UsageLedger,
};

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Fixture(#[from] FixtureError),

    #[error(transparent)]
    Currency(#[from] MoneyConversionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Receipt(#[from] ReceiptError),
}

/// Lattice Shopper entry point
#[tokio::main]
async fn main() -> ExitCode {
    let config = match ShopperConfig::load() {
        Ok(config) => config,
        Err(err) => {
            #[expect(
                clippy::print_stderr,
                reason = "logging not initialized yet, must use eprintln for config errors"
            )]
            {
                eprintln!("Configuration error: {err}");
            }

            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = observability::init(&config.logging) {
        #[expect(
            clippy::print_stderr,
            reason = "logging failed to initialise, must use eprintln"
        )]
        {
            eprintln!("Observability error: {err}");
        }

        return ExitCode::FAILURE;
    }

    let result = match &config.command {
        Command::Run(args) => run(args).await,
        Command::Catalog(args) => catalog(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "shopper failed");

            ExitCode::FAILURE
        }
    }
}

fn open_store(args: &StoreArgs) -> Result<Box<dyn StoreClient>, CliError> {
    if let Some(http) = args.http_config()? {
        info!(base_url = %http.base_url, "using remote store");

        return Ok(Box::new(HttpStore::new(http)?));
    }

    info!(fixture = %args.fixture, "using fixture store");

    let store = Fixture::with_base_path(&args.fixture_dir).load_store(&args.fixture)?;

    Ok(Box::new(store))
}

async fn run(args: &RunArgs) -> Result<(), CliError> {
    let target = Fixture::load_task_file(&args.task)?;
    let store = open_store(&args.store)?;
    let mut ledger = UsageLedger::new();

    let mut ctx = TaskContext {
        store: store.as_ref(),
        ledger: &mut ledger,
        settings: args.optimiser.settings(),
    };

    let outcome = run_task(&mut ctx, &target).await?;

    let mut out = io::stdout().lock();

    match &outcome {
        TaskOutcome::Purchased { selection, commit } => {
            receipt::write_candidates(
                &mut out,
                &selection.candidates,
                Some(&selection.composition),
            )?;
            receipt::write_commit(&mut out, commit)?;
        }
        TaskOutcome::Abandoned { reason, candidates } => {
            receipt::write_candidates(&mut out, candidates, None)?;

            info!(%reason, "nothing purchased");
        }
    }

    info!(
        elapsed_ms = ledger.elapsed().as_millis(),
        actions = ledger.actions(),
        "task finished"
    );

    Ok(())
}

async fn catalog(args: &CatalogArgs) -> Result<(), CliError> {
    let store = open_store(&args.store)?;
    let catalog = fetch_all_products(store.as_ref(), args.page_size).await;

    receipt::write_catalog(io::stdout().lock(), &catalog)?;

    Ok(())
}
