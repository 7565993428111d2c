//! Lattice Shopper prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    actions::{Action, ActionOutcome, Driver, ScriptedDriver, dispatch, drive},
    basket::{Basket, BasketLine, CommitResult},
    catalog::{Catalog, fetch_all_products},
    checkout::{CheckoutError, checkout},
    compositions::{Composition, CompositionLine, PackOption},
    coupons::{CouponEvaluation, evaluate},
    fixtures::{Fixture, FixtureError},
    money::Amount,
    optimiser::{
        CouponPolicy, Infeasibility, Optimisation, Optimiser, OptimiserError, Requirement,
        Selection, Target,
    },
    products::{Product, Sku},
    receipt::ReceiptError,
    session::{BenchmarkClient, TaskExecutor, run_session},
    store::{HttpStore, SimulatedStore, StoreClient, StoreError},
    task::{TaskContext, TaskError, TaskOutcome, TaskSettings, run_task},
    usage::UsageLedger,
};
