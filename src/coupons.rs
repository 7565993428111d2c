//! Coupons
//!
//! Coupon evaluation works on whatever basket is currently materialised and only ever changes its
//! coupon state. Each code is applied in turn and the basket re-read, so every total comes from
//! the store rather than from local arithmetic.

use smallvec::SmallVec;
use tracing::{debug, info, warn};

use crate::{
    basket::Basket,
    money::Amount,
    store::{StoreClient, StoreError},
};

/// Outcome of applying a single coupon.
#[derive(Debug, Clone, PartialEq)]
pub enum TrialOutcome {
    /// The coupon applied and the store reported this total
    Total(Amount),

    /// The store rejected the coupon
    Invalid(String),
}

/// A coupon code and what happened when it was applied.
#[derive(Debug, Clone, PartialEq)]
pub struct CouponTrialResult {
    /// Coupon code
    pub code: String,

    /// Resulting total, or why the code was rejected
    pub outcome: TrialOutcome,
}

impl CouponTrialResult {
    /// Total reported with this coupon applied, if it was accepted.
    pub fn total(&self) -> Option<Amount> {
        match &self.outcome {
            TrialOutcome::Total(total) => Some(*total),
            TrialOutcome::Invalid(_) => None,
        }
    }

    /// Check if the store rejected the code.
    pub fn is_invalid(&self) -> bool {
        matches!(self.outcome, TrialOutcome::Invalid(_))
    }
}

/// The cheapest coupon for the current basket.
#[derive(Debug, Clone, PartialEq)]
pub struct CouponEvaluation {
    /// Cheapest code, or `None` if no code beat the basket without a coupon
    pub best_code: Option<String>,

    /// Total with the best code applied (or the baseline)
    pub best_total: Amount,

    /// Total with no coupon applied
    pub baseline_total: Amount,

    /// Basket subtotal before any discount
    pub subtotal: Amount,

    /// Every code tried, in order
    pub trials: Vec<CouponTrialResult>,

    /// Basket as re-read after the best code was settled
    pub basket: Basket,
}

impl CouponEvaluation {
    /// Human readable lines describing each trial and the winner.
    pub fn report(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.trials.len() + 2);

        lines.push(format!("No coupon: {}", self.baseline_total));

        for trial in &self.trials {
            lines.push(match &trial.outcome {
                TrialOutcome::Total(total) => format!("{}: {total}", trial.code),
                TrialOutcome::Invalid(detail) => format!("{}: invalid ({detail})", trial.code),
            });
        }

        lines.push(match &self.best_code {
            Some(code) => format!("Best: {code} ({})", self.best_total),
            None => format!("Best: no coupon ({})", self.best_total),
        });

        lines
    }

    /// Codes the store rejected.
    pub fn invalid_codes(&self) -> SmallVec<[&str; 4]> {
        self.trials
            .iter()
            .filter(|trial| trial.is_invalid())
            .map(|trial| trial.code.as_str())
            .collect()
    }

    /// One-line summary of the trials and the coupon left applied.
    pub fn summary(&self) -> String {
        let tested = self
            .report()
            .into_iter()
            .take(self.trials.len() + 1)
            .collect::<Vec<_>>()
            .join("; ");

        match &self.best_code {
            Some(code) => format!(
                "Tested: {tested}. Applied best: {code} (Total: {})",
                self.best_total
            ),
            None => format!(
                "Tested: {tested}. No coupon applied (Base price {} was best).",
                self.baseline_total
            ),
        }
    }
}

/// Find the cheapest of `codes` for the basket as it stands.
///
/// The basket is left with the winning code applied, or with no coupon if none of the codes
/// beats the baseline. Ties keep the first code that reached the minimum.
///
/// # Errors
///
/// Returns a [`StoreError`] if a store call fails for any reason other than the store rejecting
/// a coupon code, or if the existing coupon cannot be removed.
pub async fn evaluate<S: StoreClient + ?Sized>(
    store: &S,
    codes: &[String],
) -> Result<CouponEvaluation, StoreError> {
    let baseline = remove_coupon(store).await?;

    let baseline_total = baseline.total();
    let subtotal = baseline.subtotal();

    let mut best: Option<usize> = None;
    let mut best_total = baseline_total;
    let mut trials = Vec::with_capacity(codes.len());

    for code in codes {
        let trial = try_code(store, code).await?;

        if let Some(total) = trial
            .total()
            .filter(|total| total.to_minor_units() < best_total.to_minor_units())
        {
            best = Some(trials.len());
            best_total = total;
        }

        trials.push(trial);
    }

    let best_code = best
        .and_then(|idx| trials.get(idx))
        .map(|trial: &CouponTrialResult| trial.code.clone());

    let basket = match &best_code {
        Some(code) => {
            store.apply_coupon(code).await?;

            let basket = store.view_basket().await?;

            if basket.total() != best_total {
                warn!(
                    %code,
                    expected = %best_total,
                    actual = %basket.total(),
                    "total changed when re-applying coupon"
                );
            }

            basket
        }
        None => remove_coupon(store).await?,
    };

    let evaluation = CouponEvaluation {
        best_code,
        best_total: basket.total(),
        baseline_total,
        subtotal,
        trials,
        basket,
    };

    info!(
        best = evaluation.best_code.as_deref().unwrap_or("none"),
        total = %evaluation.best_total,
        baseline = %baseline_total,
        tried = evaluation.trials.len(),
        invalid = ?evaluation.invalid_codes(),
        "coupons evaluated"
    );

    Ok(evaluation)
}

/// Apply a single mandatory coupon to the current basket.
///
/// # Errors
///
/// Returns a [`StoreError`] if a store call fails for any reason other than the store rejecting
/// the code.
pub async fn require<S: StoreClient + ?Sized>(
    store: &S,
    code: &str,
) -> Result<CouponTrialResult, StoreError> {
    let trial = try_code(store, code).await?;

    info!(%code, accepted = !trial.is_invalid(), "mandatory coupon applied");

    Ok(trial)
}

async fn try_code<S: StoreClient + ?Sized>(
    store: &S,
    code: &str,
) -> Result<CouponTrialResult, StoreError> {
    let outcome = match store.apply_coupon(code).await {
        Ok(_) => TrialOutcome::Total(store.view_basket().await?.total()),
        Err(error) if error.is_api() => {
            TrialOutcome::Invalid(error.detail().unwrap_or_default().to_string())
        }
        Err(error) => return Err(error),
    };

    debug!(%code, ?outcome, "coupon trial");

    Ok(CouponTrialResult {
        code: code.to_string(),
        outcome,
    })
}

/// Remove any applied coupon and return the re-read basket.
async fn remove_coupon<S: StoreClient + ?Sized>(store: &S) -> Result<Basket, StoreError> {
    let basket = store.view_basket().await?;

    if basket.coupon().is_none() {
        return Ok(basket);
    }

    if let Err(error) = store.remove_coupon().await {
        if !error.is_api() {
            return Err(error);
        }

        debug!(%error, "coupon removal rejected");
    }

    let basket = store.view_basket().await?;

    if let Some(code) = basket.coupon() {
        return Err(StoreError::UnexpectedResponse(format!(
            "coupon {code} is still applied after removal"
        )));
    }

    Ok(basket)
}
