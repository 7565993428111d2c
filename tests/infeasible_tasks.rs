//! Tasks that end without a purchase must leave the basket empty and never check out.

use rusty_money::{Money, iso::USD};
use testresult::TestResult;

use lattice_shopper::{
    compositions::CompositionLine,
    fixtures::Fixture,
    optimiser::{CouponPolicy, Infeasibility, Requirement, Target},
    products::Sku,
    store::{SimulatedStore, StoreCall, StoreClient},
    task::{TaskContext, TaskOutcome, TaskSettings, run_task},
    usage::UsageLedger,
};

async fn run(store: &SimulatedStore, target: &Target) -> TestResult<TaskOutcome> {
    let mut ledger = UsageLedger::new();
    let mut ctx = TaskContext {
        store,
        ledger: &mut ledger,
        settings: TaskSettings::default(),
    };

    Ok(run_task(&mut ctx, target).await?)
}

async fn assert_nothing_bought(store: &SimulatedStore) -> TestResult {
    assert!(store.view_basket().await?.is_empty(), "basket left with lines");
    assert!(store.commits().await.is_empty(), "unexpected commit");
    assert!(
        !store.calls().await.contains(&StoreCall::Checkout),
        "checkout was attempted"
    );

    Ok(())
}

#[tokio::test]
async fn rejected_mandatory_coupon_abandons_the_task() -> TestResult {
    let fixture = Fixture::new();
    let store = fixture.load_store("soda")?;
    let target = fixture.load_task("soda-24-mandatory")?;

    let outcome = run(&store, &target).await?;

    let TaskOutcome::Abandoned { reason, candidates } = outcome else {
        return Err("expected the task to be abandoned".into());
    };

    assert_eq!(reason, Infeasibility::MandatoryCouponRejected("X".to_string()));
    assert_eq!(candidates.len(), 4);

    assert_nothing_bought(&store).await
}

#[tokio::test]
async fn budget_below_every_candidate_abandons_the_task() -> TestResult {
    let fixture = Fixture::new();
    let store = fixture.load_store("soda")?;
    let target = fixture.load_task("soda-24-budget")?;

    let outcome = run(&store, &target).await?;

    let TaskOutcome::Abandoned { reason, .. } = outcome else {
        return Err("expected the task to be abandoned".into());
    };

    assert!(
        matches!(
            reason,
            Infeasibility::OverBudget { cheapest, budget }
                if cheapest == Money::from_minor(3000, USD)
                    && budget == Money::from_minor(2500, USD)
        ),
        "unexpected reason {reason:?}"
    );

    assert_nothing_bought(&store).await
}

#[tokio::test]
async fn unknown_product_abandons_the_task() -> TestResult {
    let store = Fixture::new().load_store("soda")?;
    let target = Target {
        requirement: Requirement::Items(vec![CompositionLine {
            sku: Sku::from("lemonade"),
            quantity: 1,
        }]),
        coupons: CouponPolicy::default(),
        budget: None,
    };

    let outcome = run(&store, &target).await?;

    assert!(
        matches!(
            &outcome,
            TaskOutcome::Abandoned {
                reason: Infeasibility::UnknownProduct(sku),
                ..
            } if sku.as_str() == "lemonade"
        ),
        "unexpected outcome {outcome:?}"
    );

    assert_nothing_bought(&store).await
}
