//! Optimiser
//!
//! Finds the cheapest basket composition and coupon that satisfies a target. Every candidate is
//! tested in isolation against the live store: the basket is emptied, the candidate's lines are
//! added, coupons are evaluated and the reported total recorded, then the basket is emptied
//! again. The winner is then rebuilt and re-read before it is handed back.

use std::fmt;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    basket::{self, Basket},
    catalog::Catalog,
    compositions::{Composition, CompositionLine, PackOption, enumerate},
    coupons::{self, TrialOutcome},
    money::Amount,
    products::Sku,
    store::{StoreClient, StoreError},
};

/// Default bound on the number of compositions tested per target.
pub const DEFAULT_MAX_CANDIDATES: usize = 1000;

/// What a task needs to buy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Buy exactly `units` units made up from any mix of the pack options
    Quantity {
        /// Products that count towards the requirement
        options: Vec<PackOption>,

        /// Units required
        units: u32,
    },

    /// Buy exactly these lines
    Items(Vec<CompositionLine>),
}

/// How coupons are chosen for each candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouponPolicy {
    /// Use the cheapest of these codes, or none if none helps
    BestOf(Vec<String>),

    /// This code must be applied
    Mandatory(String),
}

impl Default for CouponPolicy {
    fn default() -> Self {
        Self::BestOf(Vec::new())
    }
}

/// A purchasing target.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    /// What to buy
    pub requirement: Requirement,

    /// Coupon handling
    pub coupons: CouponPolicy,

    /// Highest acceptable total
    pub budget: Option<Amount>,
}

/// What happened when a candidate was tested.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateOutcome {
    /// The candidate was priced by the store
    Priced {
        /// Coupon left applied, if any
        coupon: Option<String>,

        /// Total before discount
        subtotal: Amount,

        /// Total payable
        total: Amount,

        /// Coupon trial report
        report: Vec<String>,
    },

    /// The store refused one of the candidate's lines
    Rejected {
        /// Store error detail
        detail: String,
    },

    /// The mandatory coupon was refused for this candidate
    CouponRejected {
        /// Coupon code
        code: String,

        /// Store error detail
        detail: String,
    },

    /// The candidate priced above the budget
    OverBudget {
        /// Total payable
        total: Amount,

        /// Budget ceiling
        budget: Amount,
    },
}

/// A tested candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateResult {
    /// Candidate composition
    pub composition: Composition,

    /// Test outcome
    pub outcome: CandidateOutcome,
}

impl CandidateResult {
    fn priced_total(&self) -> Option<Amount> {
        match &self.outcome {
            CandidateOutcome::Priced { total, .. } => Some(*total),
            _ => None,
        }
    }
}

/// The chosen composition, materialised in the basket.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Winning composition
    pub composition: Composition,

    /// Coupon applied to the basket
    pub coupon: Option<String>,

    /// Basket as re-read after the winner was rebuilt
    pub basket: Basket,

    /// Every candidate tested, in enumeration order
    pub candidates: Vec<CandidateResult>,
}

/// Why no composition could be selected.
#[derive(Debug, Clone, PartialEq)]
pub enum Infeasibility {
    /// The target asks for nothing
    NothingRequested,

    /// A requested product is not sold by the store
    UnknownProduct(Sku),

    /// No composition satisfies the requirement within known stock
    NoComposition,

    /// The mandatory coupon was refused for every candidate
    MandatoryCouponRejected(String),

    /// Every priced candidate exceeded the budget
    OverBudget {
        /// Cheapest total found
        cheapest: Amount,

        /// Budget ceiling
        budget: Amount,
    },

    /// The store refused every candidate
    NoCandidateAccepted,

    /// The winner could not be rebuilt as tested
    WinnerChanged(String),
}

impl fmt::Display for Infeasibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NothingRequested => f.write_str("nothing was requested"),
            Self::UnknownProduct(sku) => write!(f, "product {sku} is not sold by the store"),
            Self::NoComposition => f.write_str("no composition satisfies the requirement"),
            Self::MandatoryCouponRejected(code) => {
                write!(f, "coupon {code} was rejected for every candidate")
            }
            Self::OverBudget { cheapest, budget } => {
                write!(f, "cheapest total {cheapest} exceeds budget {budget}")
            }
            Self::NoCandidateAccepted => f.write_str("the store rejected every candidate"),
            Self::WinnerChanged(detail) => write!(f, "winning basket changed: {detail}"),
        }
    }
}

/// Result of optimising a target.
#[derive(Debug, Clone, PartialEq)]
pub enum Optimisation {
    /// A composition was selected and is in the basket
    Optimised(Selection),

    /// No composition can be bought; the basket is empty
    Infeasible {
        /// Why
        reason: Infeasibility,

        /// Every candidate tested
        candidates: Vec<CandidateResult>,
    },
}

impl Optimisation {
    /// Candidates tested, whichever way the optimisation went.
    pub fn candidates(&self) -> &[CandidateResult] {
        match self {
            Self::Optimised(selection) => &selection.candidates,
            Self::Infeasible { candidates, .. } => candidates,
        }
    }

    fn infeasible(reason: Infeasibility, candidates: Vec<CandidateResult>) -> Self {
        info!(%reason, tested = candidates.len(), "target infeasible");

        Self::Infeasible { reason, candidates }
    }
}

/// Errors that abort optimisation.
#[derive(Debug, Error)]
pub enum OptimiserError {
    /// A store call failed outside of candidate-local rejections.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The budget is in a different currency from the store (budget currency, store currency).
    #[error("budget is in {0}, but the store prices in {1}")]
    CurrencyMismatch(&'static str, &'static str),
}

/// Combination optimiser bound to a store.
#[derive(Debug)]
pub struct Optimiser<'a, S: ?Sized> {
    store: &'a S,
    max_candidates: usize,
}

impl<'a, S: StoreClient + ?Sized> Optimiser<'a, S> {
    /// Create an optimiser with the default candidate limit.
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }

    /// Limit the number of compositions tested.
    #[must_use]
    pub fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = max_candidates.max(1);

        self
    }

    /// Find and materialise the cheapest composition for `target`.
    ///
    /// # Errors
    ///
    /// Returns an [`OptimiserError`] if a store call fails in a way that is not local to a
    /// single candidate.
    pub async fn optimise(
        &self,
        target: &Target,
        catalog: &Catalog,
    ) -> Result<Optimisation, OptimiserError> {
        if let (Some(budget), Some(product)) = (target.budget, catalog.products().first()) {
            ensure_same_currency(product.price, budget)?;
        }

        let compositions = match self.compositions(&target.requirement, catalog) {
            Ok(compositions) => compositions,
            Err(reason) => {
                basket::clear(self.store).await?;

                return Ok(Optimisation::infeasible(reason, Vec::new()));
            }
        };

        info!(candidates = compositions.len(), "testing compositions");

        basket::clear(self.store).await?;

        let mut candidates = Vec::with_capacity(compositions.len());
        let mut best: Option<(usize, Amount)> = None;

        for composition in compositions {
            let outcome = self.test_candidate(&composition, target).await?;

            basket::clear(self.store).await?;

            let result = CandidateResult {
                composition,
                outcome,
            };

            debug!(
                composition = %result.composition,
                outcome = ?result.outcome,
                "candidate tested"
            );

            if let Some(total) = result.priced_total() {
                let better = best.is_none_or(|(_, best_total)| {
                    total.to_minor_units() < best_total.to_minor_units()
                });

                if better {
                    best = Some((candidates.len(), total));
                }
            }

            candidates.push(result);
        }

        let Some(winner) = best.and_then(|(idx, _)| candidates.get(idx)).cloned() else {
            let reason = no_winner_reason(&candidates, &target.coupons);

            return Ok(Optimisation::infeasible(reason, candidates));
        };

        self.materialise_winner(winner, target, candidates).await
    }

    fn compositions(
        &self,
        requirement: &Requirement,
        catalog: &Catalog,
    ) -> Result<Vec<Composition>, Infeasibility> {
        let skus: Vec<&Sku> = match requirement {
            Requirement::Quantity { options, .. } => {
                options.iter().map(|option| &option.sku).collect()
            }
            Requirement::Items(lines) => lines.iter().map(|line| &line.sku).collect(),
        };

        let unknown = catalog
            .is_complete()
            .then(|| skus.into_iter().find(|sku| catalog.get(sku).is_none()))
            .flatten();

        if let Some(sku) = unknown {
            return Err(Infeasibility::UnknownProduct(sku.clone()));
        }

        let stock = |sku: &Sku| catalog.get(sku).map(|product| product.available);

        let compositions = match requirement {
            Requirement::Quantity { options, units } => {
                if *units == 0 || options.is_empty() {
                    return Err(Infeasibility::NothingRequested);
                }

                let enumeration = enumerate(options, *units, stock, self.max_candidates);

                if enumeration.truncated {
                    warn!(
                        max_candidates = self.max_candidates,
                        "composition enumeration truncated"
                    );
                }

                enumeration.compositions
            }
            Requirement::Items(lines) => {
                let composition = Composition::from_lines(
                    lines.iter().map(|line| (line.sku.clone(), line.quantity)),
                );

                if composition.is_empty() {
                    return Err(Infeasibility::NothingRequested);
                }

                let in_stock = composition.lines().iter().all(|line| {
                    stock(&line.sku).is_none_or(|available| line.quantity <= available)
                });

                if in_stock {
                    vec![composition]
                } else {
                    Vec::new()
                }
            }
        };

        if compositions.is_empty() {
            return Err(Infeasibility::NoComposition);
        }

        Ok(compositions)
    }

    async fn test_candidate(
        &self,
        composition: &Composition,
        target: &Target,
    ) -> Result<CandidateOutcome, OptimiserError> {
        for line in composition.lines() {
            match self.store.add_product(&line.sku, line.quantity).await {
                Ok(_) => {}
                Err(error) if error.is_api() => {
                    return Ok(CandidateOutcome::Rejected {
                        detail: error.detail().unwrap_or_default().to_string(),
                    });
                }
                Err(error) => return Err(error.into()),
            }
        }

        let priced = match &target.coupons {
            CouponPolicy::BestOf(codes) => {
                let evaluation = coupons::evaluate(self.store, codes).await?;

                CandidateOutcome::Priced {
                    report: evaluation.report(),
                    coupon: evaluation.best_code,
                    subtotal: evaluation.subtotal,
                    total: evaluation.best_total,
                }
            }
            CouponPolicy::Mandatory(code) => {
                let trial = coupons::require(self.store, code).await?;

                match trial.outcome {
                    TrialOutcome::Invalid(detail) => {
                        return Ok(CandidateOutcome::CouponRejected {
                            code: code.clone(),
                            detail,
                        });
                    }
                    TrialOutcome::Total(total) => {
                        let basket = self.store.view_basket().await?;

                        CandidateOutcome::Priced {
                            report: vec![format!("{code}: {total}")],
                            coupon: Some(code.clone()),
                            subtotal: basket.subtotal(),
                            total,
                        }
                    }
                }
            }
        };

        Ok(match (&priced, target.budget) {
            (CandidateOutcome::Priced { total, .. }, Some(budget)) if exceeds(*total, budget)? => {
                CandidateOutcome::OverBudget {
                    total: *total,
                    budget,
                }
            }
            _ => priced,
        })
    }

    async fn materialise_winner(
        &self,
        winner: CandidateResult,
        target: &Target,
        candidates: Vec<CandidateResult>,
    ) -> Result<Optimisation, OptimiserError> {
        let CandidateOutcome::Priced { coupon, total, .. } = winner.outcome else {
            return Ok(Optimisation::infeasible(
                Infeasibility::NoCandidateAccepted,
                candidates,
            ));
        };

        info!(composition = %winner.composition, coupon = ?coupon, %total, "rebuilding winner");

        if let Err(detail) = self.rebuild(&winner.composition, coupon.as_deref()).await? {
            basket::clear(self.store).await?;

            return Ok(Optimisation::infeasible(
                Infeasibility::WinnerChanged(detail),
                candidates,
            ));
        }

        let basket = self.store.view_basket().await?;

        if !basket.matches(&winner.composition) || basket.coupon() != coupon.as_deref() {
            basket::clear(self.store).await?;

            return Ok(Optimisation::infeasible(
                Infeasibility::WinnerChanged(
                    "basket does not hold the winning composition".to_string(),
                ),
                candidates,
            ));
        }

        if basket.total() != total {
            warn!(expected = %total, actual = %basket.total(), "winning total changed");

            match target.budget {
                Some(budget) if exceeds(basket.total(), budget)? => {
                    basket::clear(self.store).await?;

                    return Ok(Optimisation::infeasible(
                        Infeasibility::OverBudget {
                            cheapest: basket.total(),
                            budget,
                        },
                        candidates,
                    ));
                }
                _ => {}
            }
        }

        info!(composition = %winner.composition, total = %basket.total(), "composition selected");

        Ok(Optimisation::Optimised(Selection {
            composition: winner.composition,
            coupon,
            basket,
            candidates,
        }))
    }

    /// Add the composition's lines and coupon, reporting store rejections as `Err(detail)`.
    async fn rebuild(
        &self,
        composition: &Composition,
        coupon: Option<&str>,
    ) -> Result<Result<(), String>, StoreError> {
        for line in composition.lines() {
            match self.store.add_product(&line.sku, line.quantity).await {
                Ok(_) => {}
                Err(error) if error.is_api() => return Ok(Err(error.to_string())),
                Err(error) => return Err(error),
            }
        }

        let Some(code) = coupon else {
            return Ok(Ok(()));
        };

        match self.store.apply_coupon(code).await {
            Ok(_) => Ok(Ok(())),
            Err(error) if error.is_api() => Ok(Err(error.to_string())),
            Err(error) => Err(error),
        }
    }
}

fn ensure_same_currency(amount: Amount, budget: Amount) -> Result<(), OptimiserError> {
    if amount.currency() == budget.currency() {
        Ok(())
    } else {
        Err(OptimiserError::CurrencyMismatch(
            budget.currency().iso_alpha_code,
            amount.currency().iso_alpha_code,
        ))
    }
}

fn exceeds(total: Amount, budget: Amount) -> Result<bool, OptimiserError> {
    ensure_same_currency(total, budget)?;

    Ok(total.to_minor_units() > budget.to_minor_units())
}

fn no_winner_reason(candidates: &[CandidateResult], policy: &CouponPolicy) -> Infeasibility {
    let cheapest_over_budget = candidates
        .iter()
        .filter_map(|candidate| match candidate.outcome {
            CandidateOutcome::OverBudget { total, budget } => Some((total, budget)),
            _ => None,
        })
        .min_by_key(|(total, _)| total.to_minor_units());

    if let Some((cheapest, budget)) = cheapest_over_budget {
        return Infeasibility::OverBudget { cheapest, budget };
    }

    let coupon_rejected = candidates
        .iter()
        .any(|candidate| matches!(candidate.outcome, CandidateOutcome::CouponRejected { .. }));

    match policy {
        CouponPolicy::Mandatory(code) if coupon_rejected => {
            Infeasibility::MandatoryCouponRejected(code.clone())
        }
        _ => Infeasibility::NoCandidateAccepted,
    }
}
