//! Checkout
//!
//! Commits the basket. Stock can drop between the last basket read and the checkout call; when
//! the store reports a short line, the excess units are removed and the checkout re-issued. Each
//! adjustment removes at least one unit, and the total removed is bounded by the basket's
//! quantity at entry, so the sequence always terminates.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    basket::{Basket, CommitResult},
    products::Sku,
    retry::RetryBudget,
    store::{InventoryShortfall, StoreClient, StoreError},
};

/// Checkout sequencing states.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutState {
    /// Ready to issue a checkout
    Ready,

    /// A line must be reduced before checkout can be retried
    Adjust(InventoryShortfall),

    /// The store accepted the checkout
    Committed(CommitResult),
}

/// Errors that end a checkout without a commit.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The store refused the checkout for a reason other than stock.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The short line could not be identified in the basket.
    #[error("cannot resolve inventory shortfall: {0}")]
    Unresolvable(String),

    /// More units would have to be removed than the basket held at entry.
    #[error("adjustment budget exhausted after removing {removed} units")]
    BudgetExhausted {
        /// Units removed before giving up
        removed: u32,
    },

    /// Removing the excess units failed.
    #[error("failed to remove {quantity} of {sku}: {source}")]
    Adjustment {
        /// Line being reduced
        sku: Sku,

        /// Units being removed
        quantity: u32,

        /// Underlying store error
        #[source]
        source: StoreError,
    },
}

/// Commit the current basket, trimming lines the store can no longer supply.
///
/// # Errors
///
/// Returns a [`CheckoutError`] if the store rejects the checkout for any reason other than an
/// inventory shortfall, or if a shortfall cannot be resolved within the adjustment budget.
pub async fn checkout<S: StoreClient + ?Sized>(store: &S) -> Result<CommitResult, CheckoutError> {
    let basket = store.view_basket().await?;
    let mut budget = RetryBudget::new(basket.total_quantity());
    let mut state = CheckoutState::Ready;

    info!(
        lines = basket.lines().len(),
        total = %basket.total(),
        "checking out"
    );

    loop {
        state = match state {
            CheckoutState::Ready => match store.checkout().await {
                Ok(commit) => CheckoutState::Committed(commit),
                Err(error) => match error.insufficient_inventory() {
                    Some(shortfall) => CheckoutState::Adjust(shortfall),
                    None => return Err(error.into()),
                },
            },
            CheckoutState::Adjust(shortfall) => {
                adjust(store, &shortfall, &mut budget).await?;

                CheckoutState::Ready
            }
            CheckoutState::Committed(commit) => {
                info!(
                    total = %commit.total,
                    coupon = commit.coupon.as_deref().unwrap_or("none"),
                    adjusted_units = budget.used(),
                    "checkout committed"
                );

                return Ok(commit);
            }
        };
    }
}

async fn adjust<S: StoreClient + ?Sized>(
    store: &S,
    shortfall: &InventoryShortfall,
    budget: &mut RetryBudget,
) -> Result<(), CheckoutError> {
    let excess = shortfall.excess();

    if excess == 0 {
        return Err(CheckoutError::Unresolvable(format!(
            "available {} is not below requested {}",
            shortfall.available, shortfall.requested
        )));
    }

    if !budget.try_consume_n(excess) {
        return Err(CheckoutError::BudgetExhausted {
            removed: budget.used(),
        });
    }

    let basket = store.view_basket().await?;
    let sku = short_line(&basket, shortfall)?;

    warn!(
        %sku,
        available = shortfall.available,
        requested = shortfall.requested,
        removing = excess,
        "insufficient inventory, reducing line"
    );

    store
        .remove_product(&sku, excess)
        .await
        .map_err(|source| CheckoutError::Adjustment {
            sku: sku.clone(),
            quantity: excess,
            source,
        })?;

    debug!(%sku, remaining_budget = budget.remaining(), "line reduced");

    Ok(())
}

/// Find the basket line a shortfall refers to.
fn short_line(basket: &Basket, shortfall: &InventoryShortfall) -> Result<Sku, CheckoutError> {
    if let Some(sku) = &shortfall.sku {
        if basket.quantity_of(sku) < shortfall.excess() {
            return Err(CheckoutError::Unresolvable(format!(
                "basket holds {} of {sku}, cannot remove {}",
                basket.quantity_of(sku),
                shortfall.excess()
            )));
        }

        return Ok(sku.clone());
    }

    let mut matching = basket
        .lines()
        .iter()
        .filter(|line| line.quantity == shortfall.requested);

    match (matching.next(), matching.next()) {
        (Some(line), None) => Ok(line.sku.clone()),
        (None, _) => Err(CheckoutError::Unresolvable(format!(
            "no basket line holds {} units",
            shortfall.requested
        ))),
        (Some(_), Some(_)) => Err(CheckoutError::Unresolvable(format!(
            "several basket lines hold {} units",
            shortfall.requested
        ))),
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso::USD};
    use testresult::TestResult;

    use crate::{
        basket::BasketLine,
        store::{MockStoreClient, StoreCall, soda_store},
    };

    use super::*;

    fn basket(lines: Vec<BasketLine>) -> Basket {
        Basket::new(
            lines,
            Money::from_minor(0, USD),
            None,
            Money::from_minor(0, USD),
            Money::from_minor(0, USD),
        )
    }

    #[tokio::test]
    async fn shortfall_removes_exactly_the_excess() -> TestResult {
        let store = soda_store();
        let sku = Sku::from("soda-6pk");

        store.add_product(&sku, 6).await?;
        store.set_stock_before_checkout(&sku, 4).await;

        let commit = checkout(&store).await?;

        assert_eq!(
            commit.lines,
            vec![BasketLine {
                sku: sku.clone(),
                quantity: 4,
                unit_price: Some(Money::from_minor(1200, USD)),
            }]
        );

        let calls = store.calls().await;
        let tail: Vec<&StoreCall> = calls.iter().rev().take(3).collect();

        assert_eq!(
            tail,
            [
                &StoreCall::Checkout,
                &StoreCall::RemoveProduct {
                    sku: sku.clone(),
                    quantity: 2,
                },
                &StoreCall::ViewBasket,
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn unnamed_line_is_matched_by_quantity() -> TestResult {
        let mut store = MockStoreClient::new();
        let mut attempts = 0;

        store.expect_view_basket().returning(|| {
            Ok(basket(vec![
                BasketLine::new("soda-6pk", 6),
                BasketLine::new("soda-12pk", 1),
            ]))
        });

        store.expect_checkout().times(2).returning(move || {
            attempts += 1;

            if attempts == 1 {
                return Err(StoreError::api("insufficient inventory: available 4, requested 6"));
            }

            Ok(CommitResult {
                lines: Vec::new(),
                subtotal: Money::from_minor(0, USD),
                coupon: None,
                discount: Money::from_minor(0, USD),
                total: Money::from_minor(0, USD),
            })
        });

        store
            .expect_remove_product()
            .withf(|sku, quantity| sku.as_str() == "soda-6pk" && *quantity == 2)
            .times(1)
            .returning(|_, _| Ok(basket(Vec::new())));

        checkout(&store).await?;

        Ok(())
    }

    #[tokio::test]
    async fn ambiguous_shortfall_is_terminal() {
        let mut store = MockStoreClient::new();

        store.expect_view_basket().returning(|| {
            Ok(basket(vec![
                BasketLine::new("soda-6pk", 3),
                BasketLine::new("soda-12pk", 3),
            ]))
        });

        store
            .expect_checkout()
            .times(1)
            .returning(|| Err(StoreError::api("insufficient inventory: available 1, requested 3")));

        store.expect_remove_product().never();

        let result = checkout(&store).await;

        assert!(
            matches!(result, Err(CheckoutError::Unresolvable(_))),
            "expected unresolvable shortfall, got {result:?}"
        );
    }

    #[tokio::test]
    async fn other_failures_are_terminal() {
        let mut store = MockStoreClient::new();

        store
            .expect_view_basket()
            .returning(|| Ok(basket(vec![BasketLine::new("soda-6pk", 2)])));

        store
            .expect_checkout()
            .times(1)
            .returning(|| Err(StoreError::api("payment declined")));

        let result = checkout(&store).await;

        assert!(
            matches!(result, Err(CheckoutError::Store(_))),
            "expected store error, got {result:?}"
        );
    }

    #[tokio::test]
    async fn adjustments_are_bounded_by_basket_quantity() {
        let mut store = MockStoreClient::new();

        store
            .expect_view_basket()
            .returning(|| Ok(basket(vec![BasketLine::new("soda-6pk", 3)])));

        store.expect_checkout().returning(|| {
            Err(StoreError::api(
                "insufficient inventory for soda-6pk: available 1, in basket 3",
            ))
        });

        store
            .expect_remove_product()
            .returning(|_, _| Ok(basket(Vec::new())));

        let result = checkout(&store).await;

        assert!(
            matches!(result, Err(CheckoutError::BudgetExhausted { removed: 2 })),
            "expected exhausted budget, got {result:?}"
        );
    }
}
