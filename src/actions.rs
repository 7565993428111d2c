//! Actions
//!
//! The capabilities a shopping agent can invoke against the store, and a driver loop that feeds
//! a [`Driver`]'s chosen actions through a single dispatch point. Store rejections are returned to
//! the driver as [`ActionOutcome::Error`] so it can react; transport failures end the run.

use std::{collections::VecDeque, fmt};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    basket::{Basket, CommitResult},
    checkout::{CheckoutError, checkout},
    coupons::{self, CouponEvaluation},
    products::Sku,
    store::{StoreClient, StoreError},
    usage::UsageLedger,
};

/// Default number of actions a driver may take per task.
pub const DEFAULT_MAX_STEPS: usize = 50;

fn one() -> u32 {
    1
}

/// An action a driver can take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum Action {
    /// Read the basket
    ViewBasket,

    /// Add a product to the basket
    AddProduct {
        /// Product SKU
        sku: Sku,

        /// Quantity to add
        #[serde(default = "one")]
        quantity: u32,
    },

    /// Remove a product from the basket
    RemoveProduct {
        /// Product SKU
        sku: Sku,

        /// Quantity to remove
        #[serde(default = "one")]
        quantity: u32,
    },

    /// Apply a coupon code
    ApplyCoupon {
        /// Coupon code
        coupon: String,
    },

    /// Remove the applied coupon
    RemoveCoupon,

    /// Commit the basket
    Checkout,

    /// Try each code on the current basket and apply the cheapest
    FindBestCoupon {
        /// Codes to try
        coupons: Vec<String>,
    },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ViewBasket => f.write_str("view_basket"),
            Self::AddProduct { sku, quantity } => write!(f, "add_product({sku}, {quantity})"),
            Self::RemoveProduct { sku, quantity } => {
                write!(f, "remove_product({sku}, {quantity})")
            }
            Self::ApplyCoupon { coupon } => write!(f, "apply_coupon({coupon})"),
            Self::RemoveCoupon => f.write_str("remove_coupon"),
            Self::Checkout => f.write_str("checkout"),
            Self::FindBestCoupon { coupons } => {
                write!(f, "find_best_coupon({})", coupons.join(", "))
            }
        }
    }
}

/// Result of dispatching an action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// The basket after the action
    Basket(Basket),

    /// The checkout was committed
    Committed(CommitResult),

    /// Coupon evaluation results
    Coupons(Box<CouponEvaluation>),

    /// Informational message
    Message(String),

    /// The store rejected the action
    Error(String),
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basket(basket) => {
                write!(
                    f,
                    "basket: {} lines, subtotal {}, coupon {}, discount {}, total {}",
                    basket.lines().len(),
                    basket.subtotal(),
                    basket.coupon().unwrap_or("none"),
                    basket.discount(),
                    basket.total()
                )
            }
            Self::Committed(commit) => write!(f, "checked out: total {}", commit.total),
            Self::Coupons(evaluation) => f.write_str(&evaluation.summary()),
            Self::Message(message) => f.write_str(message),
            Self::Error(detail) => write!(f, "Error: {detail}"),
        }
    }
}

/// Run a single action against the store.
///
/// # Errors
///
/// Returns a [`StoreError`] for failures other than the store rejecting the action.
pub async fn dispatch<S: StoreClient + ?Sized>(
    store: &S,
    action: &Action,
) -> Result<ActionOutcome, StoreError> {
    debug!(%action, "dispatching action");

    let result = match action {
        Action::ViewBasket => store.view_basket().await.map(ActionOutcome::Basket),
        Action::AddProduct { sku, quantity } => store
            .add_product(sku, *quantity)
            .await
            .map(ActionOutcome::Basket),
        Action::RemoveProduct { sku, quantity } => store
            .remove_product(sku, *quantity)
            .await
            .map(ActionOutcome::Basket),
        Action::ApplyCoupon { coupon } => store
            .apply_coupon(coupon)
            .await
            .map(ActionOutcome::Basket),
        Action::RemoveCoupon => store.remove_coupon().await.map(ActionOutcome::Basket),
        Action::Checkout => return checkout_outcome(checkout(store).await),
        Action::FindBestCoupon { coupons } if coupons.is_empty() => {
            Ok(ActionOutcome::Message("No coupons provided.".to_string()))
        }
        Action::FindBestCoupon { coupons } => coupons::evaluate(store, coupons)
            .await
            .map(|evaluation| ActionOutcome::Coupons(Box::new(evaluation))),
    };

    match result {
        Ok(outcome) => Ok(outcome),
        Err(error) if error.is_api() => Ok(ActionOutcome::Error(
            error.detail().unwrap_or_default().to_string(),
        )),
        Err(error) => Err(error),
    }
}

fn checkout_outcome(
    result: Result<CommitResult, CheckoutError>,
) -> Result<ActionOutcome, StoreError> {
    match result {
        Ok(commit) => Ok(ActionOutcome::Committed(commit)),
        Err(CheckoutError::Store(error) | CheckoutError::Adjustment { source: error, .. })
            if !error.is_api() =>
        {
            Err(error)
        }
        Err(error) => Ok(ActionOutcome::Error(error.to_string())),
    }
}

/// Chooses the next action to take.
#[async_trait]
pub trait Driver: Send {
    /// Decide on the next action given the outcome of the previous one. `None` ends the run.
    async fn next_action(
        &mut self,
        last: Option<&ActionOutcome>,
        ledger: &mut UsageLedger,
    ) -> Option<Action>;
}

/// A driver that replays a fixed list of actions.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDriver {
    actions: VecDeque<Action>,
}

impl ScriptedDriver {
    /// Create a driver that will take `actions` in order.
    pub fn new(actions: impl IntoIterator<Item = Action>) -> Self {
        Self {
            actions: actions.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    async fn next_action(
        &mut self,
        _last: Option<&ActionOutcome>,
        _ledger: &mut UsageLedger,
    ) -> Option<Action> {
        self.actions.pop_front()
    }
}

/// Why a drive ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The driver had no further actions
    Finished,

    /// The step limit was reached
    StepLimit,
}

/// Summary of a driver run.
#[derive(Debug, Clone, PartialEq)]
pub struct DriveSummary {
    /// Actions dispatched
    pub steps: usize,

    /// The last commit made, if any
    pub committed: Option<CommitResult>,

    /// Why the run ended
    pub stopped: StopReason,
}

/// Feed a driver's actions to the store until it stops or `max_steps` actions have run.
///
/// # Errors
///
/// Returns a [`StoreError`] if an action fails for reasons other than a store rejection.
pub async fn drive<S, D>(
    store: &S,
    driver: &mut D,
    ledger: &mut UsageLedger,
    max_steps: usize,
) -> Result<DriveSummary, StoreError>
where
    S: StoreClient + ?Sized,
    D: Driver + ?Sized,
{
    let mut last: Option<ActionOutcome> = None;
    let mut committed = None;
    let mut steps = 0;

    while steps < max_steps {
        let Some(action) = driver.next_action(last.as_ref(), ledger).await else {
            info!(steps, "driver finished");

            return Ok(DriveSummary {
                steps,
                committed,
                stopped: StopReason::Finished,
            });
        };

        let outcome = dispatch(store, &action).await?;

        ledger.record_action(action.to_string(), outcome.to_string());

        if let ActionOutcome::Committed(commit) = &outcome {
            committed = Some(commit.clone());
        }

        steps += 1;
        last = Some(outcome);
    }

    warn!(max_steps, "step limit reached");

    Ok(DriveSummary {
        steps,
        committed,
        stopped: StopReason::StepLimit,
    })
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso::USD};
    use testresult::TestResult;

    use crate::store::{MockStoreClient, StoreCall, soda_store};

    use super::*;

    fn add(sku: &str, quantity: u32) -> Action {
        Action::AddProduct {
            sku: Sku::from(sku),
            quantity,
        }
    }

    #[test]
    fn actions_deserialize_from_tool_calls() -> TestResult {
        let action: Action = serde_json::from_str(r#"{"tool": "add_product", "sku": "soda-6pk"}"#)?;

        assert_eq!(action, add("soda-6pk", 1));

        let action: Action = serde_json::from_str(
            r#"{"tool": "find_best_coupon", "coupons": ["SALEX", "COMBO"]}"#,
        )?;

        assert_eq!(
            action,
            Action::FindBestCoupon {
                coupons: vec!["SALEX".to_string(), "COMBO".to_string()],
            }
        );

        Ok(())
    }

    #[tokio::test]
    async fn store_rejections_become_error_outcomes() -> TestResult {
        let store = soda_store();

        let outcome = dispatch(&store, &add("cola-1l", 1)).await?;

        assert_eq!(
            outcome,
            ActionOutcome::Error("product cola-1l not found".to_string())
        );
        assert_eq!(outcome.to_string(), "Error: product cola-1l not found");

        Ok(())
    }

    #[tokio::test]
    async fn empty_coupon_list_is_reported() -> TestResult {
        let store = soda_store();

        let outcome = dispatch(&store, &Action::FindBestCoupon { coupons: vec![] }).await?;

        assert_eq!(outcome.to_string(), "No coupons provided.");
        assert!(store.calls().await.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn transport_failures_propagate() {
        let mut store = MockStoreClient::new();

        store
            .expect_view_basket()
            .returning(|| Err(StoreError::UnexpectedResponse("truncated body".to_string())));

        let result = dispatch(&store, &Action::ViewBasket).await;

        assert!(result.is_err(), "expected transport failure to propagate");
    }

    #[tokio::test]
    async fn scripted_run_checks_out_cheapest_basket() -> TestResult {
        let store = soda_store();
        let mut ledger = UsageLedger::new();
        let mut driver = ScriptedDriver::new([
            add("soda-6pk", 2),
            add("soda-12pk", 1),
            Action::FindBestCoupon {
                coupons: vec!["SALEX".to_string(), "COMBO".to_string()],
            },
            Action::ViewBasket,
            Action::Checkout,
        ]);

        let summary = drive(&store, &mut driver, &mut ledger, DEFAULT_MAX_STEPS).await?;

        assert_eq!(summary.steps, 5);
        assert_eq!(summary.stopped, StopReason::Finished);
        assert_eq!(
            summary.committed.map(|commit| commit.total),
            Some(Money::from_minor(3000, USD))
        );
        assert_eq!(ledger.actions(), 5);

        Ok(())
    }

    #[tokio::test]
    async fn step_limit_stops_the_driver() -> TestResult {
        let store = soda_store();
        let mut ledger = UsageLedger::new();
        let mut driver = ScriptedDriver::new(std::iter::repeat_n(Action::ViewBasket, 10));

        let summary = drive(&store, &mut driver, &mut ledger, 3).await?;

        assert_eq!(summary.steps, 3);
        assert_eq!(summary.stopped, StopReason::StepLimit);
        assert_eq!(store.calls().await, vec![StoreCall::ViewBasket; 3]);

        Ok(())
    }
}
