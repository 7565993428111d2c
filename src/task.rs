//! Tasks
//!
//! A task runs the whole protocol against one store: fetch the catalog, optimise the target,
//! then either commit the winning basket or leave the basket empty.

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::{
    basket::{self, CommitResult},
    catalog::{DEFAULT_PAGE_SIZE, fetch_all_products},
    checkout::{CheckoutError, checkout},
    optimiser::{
        CandidateResult, DEFAULT_MAX_CANDIDATES, Infeasibility, Optimisation, Optimiser,
        OptimiserError, Selection, Target,
    },
    store::{StoreClient, StoreError},
    usage::UsageLedger,
};

/// Tunables for a task run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSettings {
    /// Page size requested when listing products
    pub page_size: u32,

    /// Most compositions tested per target
    pub max_candidates: usize,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }
}

/// Everything a task needs to run.
#[derive(Debug)]
pub struct TaskContext<'a, S: ?Sized> {
    /// Store scoped to this task
    pub store: &'a S,

    /// Usage and transcript side channel
    pub ledger: &'a mut UsageLedger,

    /// Tunables
    pub settings: TaskSettings,
}

/// How a task ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// The winning basket was committed
    Purchased {
        /// The selection that was committed
        selection: Box<Selection>,

        /// What the store recorded
        commit: CommitResult,
    },

    /// Nothing was bought; the basket was left empty
    Abandoned {
        /// Why
        reason: Infeasibility,

        /// Candidates tested before giving up
        candidates: Vec<CandidateResult>,
    },
}

impl TaskOutcome {
    /// Check if the task ended with a purchase.
    pub fn is_purchased(&self) -> bool {
        matches!(self, Self::Purchased { .. })
    }

    /// Candidates tested during optimisation.
    pub fn candidates(&self) -> &[CandidateResult] {
        match self {
            Self::Purchased { selection, .. } => &selection.candidates,
            Self::Abandoned { candidates, .. } => candidates,
        }
    }
}

/// Errors that end a task without an outcome.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Optimisation failed.
    #[error(transparent)]
    Optimiser(#[from] OptimiserError),

    /// The winning basket could not be committed.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// A store call failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Run a task end to end.
///
/// # Errors
///
/// Returns a [`TaskError`] if the store fails outside of the recoverable cases, or if the winning
/// basket cannot be committed.
#[instrument(skip_all)]
pub async fn run_task<S: StoreClient + ?Sized>(
    ctx: &mut TaskContext<'_, S>,
    target: &Target,
) -> Result<TaskOutcome, TaskError> {
    let catalog = fetch_all_products(ctx.store, ctx.settings.page_size).await;

    ctx.ledger.note(format!("fetched {} products", catalog.len()));

    if let Some(error) = catalog.incomplete_reason() {
        warn!(%error, "continuing with incomplete catalog");
        ctx.ledger.note(format!("catalog incomplete: {error}"));
    }

    let optimisation = Optimiser::new(ctx.store)
        .with_max_candidates(ctx.settings.max_candidates)
        .optimise(target, &catalog)
        .await?;

    for candidate in optimisation.candidates() {
        ctx.ledger
            .note(format!("{}: {:?}", candidate.composition, candidate.outcome));
    }

    match optimisation {
        Optimisation::Optimised(selection) => {
            ctx.ledger.note(format!(
                "selected {} at {}",
                selection.composition,
                selection.basket.total()
            ));

            let commit = checkout(ctx.store).await?;

            info!(total = %commit.total, "task purchased");

            Ok(TaskOutcome::Purchased {
                selection: Box::new(selection),
                commit,
            })
        }
        Optimisation::Infeasible { reason, candidates } => {
            basket::clear(ctx.store).await?;

            ctx.ledger.note(format!("abandoned: {reason}"));
            info!(%reason, "task abandoned");

            Ok(TaskOutcome::Abandoned { reason, candidates })
        }
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso::USD};
    use testresult::TestResult;

    use crate::{
        compositions::PackOption,
        optimiser::{CouponPolicy, Requirement},
        store::{StoreCall, soda_store},
    };

    use super::*;

    fn target(coupons: CouponPolicy) -> Target {
        Target {
            requirement: Requirement::Quantity {
                options: vec![
                    PackOption::new("soda-6pk", 6),
                    PackOption::new("soda-12pk", 12),
                    PackOption::new("soda-24pk", 24),
                ],
                units: 24,
            },
            coupons,
            budget: None,
        }
    }

    #[tokio::test]
    async fn purchases_the_cheapest_basket() -> TestResult {
        let store = soda_store();
        let mut ledger = UsageLedger::new();
        let mut ctx = TaskContext {
            store: &store,
            ledger: &mut ledger,
            settings: TaskSettings::default(),
        };

        let outcome = run_task(
            &mut ctx,
            &target(CouponPolicy::BestOf(vec![
                "SALEX".to_string(),
                "BULK24".to_string(),
                "COMBO".to_string(),
            ])),
        )
        .await?;

        let TaskOutcome::Purchased { commit, .. } = outcome else {
            return Err("expected a purchase".into());
        };

        assert_eq!(commit.total, Money::from_minor(3000, USD));
        assert_eq!(commit.coupon.as_deref(), Some("SALEX"));
        assert_eq!(store.commits().await.len(), 1);
        assert!(!ledger.transcript().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn infeasible_task_never_checks_out() -> TestResult {
        let store = soda_store();
        let mut ledger = UsageLedger::new();
        let mut ctx = TaskContext {
            store: &store,
            ledger: &mut ledger,
            settings: TaskSettings::default(),
        };

        let outcome = run_task(&mut ctx, &target(CouponPolicy::Mandatory("X".to_string()))).await?;

        assert!(!outcome.is_purchased());
        assert!(!store.calls().await.contains(&StoreCall::Checkout));
        assert!(store.view_basket().await?.is_empty());

        Ok(())
    }
}
