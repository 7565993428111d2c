//! Fixtures
//!
//! YAML descriptions of simulated stores and purchasing tasks.

use std::{
    fs,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::{
    fixtures::{stores::StoreFixture, tasks::TaskFixture},
    money::MoneyConversionError,
    optimiser::Target,
    store::SimulatedStore,
};

pub mod stores;
pub mod tasks;

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Malformed price, percentage or currency
    #[error(transparent)]
    Money(#[from] MoneyConversionError),

    /// Currency mismatch between the store and a price
    #[error("Currency mismatch: expected {0}, found {1}")]
    CurrencyMismatch(String, String),

    /// Invalid coupon definition
    #[error("Invalid coupon: {0}")]
    InvalidCoupon(String),

    /// Invalid task definition
    #[error("Invalid task: {0}")]
    InvalidTask(String),
}

/// Fixture
#[derive(Debug, Clone)]
pub struct Fixture {
    /// Base path for fixture files
    base_path: PathBuf,
}

impl Fixture {
    /// Create a fixture loader with the default base path
    pub fn new() -> Self {
        Self::with_base_path("./fixtures")
    }

    /// Create a fixture loader with a custom base path
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Load a simulated store from `stores/{name}.yml`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the store definition is
    /// invalid.
    pub fn load_store(&self, name: &str) -> Result<SimulatedStore, FixtureError> {
        let file_path = self.base_path.join("stores").join(format!("{name}.yml"));
        let contents = fs::read_to_string(&file_path)?;
        let fixture: StoreFixture = serde_norway::from_str(&contents)?;

        fixture.into_store()
    }

    /// Load a task from `tasks/{name}.yml`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the task definition is
    /// invalid.
    pub fn load_task(&self, name: &str) -> Result<Target, FixtureError> {
        Self::load_task_file(self.base_path.join("tasks").join(format!("{name}.yml")))
    }

    /// Load a task from any YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the task definition is
    /// invalid.
    pub fn load_task_file(path: impl AsRef<Path>) -> Result<Target, FixtureError> {
        let contents = fs::read_to_string(path)?;
        let fixture: TaskFixture = serde_norway::from_str(&contents)?;

        Target::try_from(fixture)
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rusty_money::{Money, iso::USD};
    use tempfile::tempdir;
    use testresult::TestResult;

    use crate::{
        optimiser::{CouponPolicy, Requirement},
        products::Sku,
        store::StoreClient,
    };

    use super::*;

    fn write_fixture(base: &Path, category: &str, name: &str, contents: &str) -> TestResult {
        let dir = base.join(category);

        fs::create_dir_all(&dir)?;
        fs::write(dir.join(format!("{name}.yml")), contents)?;

        Ok(())
    }

    #[tokio::test]
    async fn soda_store_fixture_loads() -> TestResult {
        let store = Fixture::new().load_store("soda")?;

        assert_eq!(store.stock_of(&Sku::from("soda-24pk")).await, Some(3));

        store.add_product(&Sku::from("soda-6pk"), 2).await?;
        store.add_product(&Sku::from("soda-12pk"), 1).await?;

        let basket = store.apply_coupon("SALEX").await?;

        assert_eq!(basket.total(), Money::from_minor(3000, USD));

        Ok(())
    }

    #[test]
    fn soda_task_fixture_loads() -> TestResult {
        let target = Fixture::new().load_task("soda-24")?;

        assert!(matches!(
            &target.requirement,
            Requirement::Quantity { options, units: 24 } if options.len() == 3
        ));
        assert!(matches!(&target.coupons, CouponPolicy::BestOf(codes) if codes.len() == 3));
        assert_eq!(target.budget, None);

        Ok(())
    }

    #[test]
    fn mandatory_coupon_and_budget_are_parsed() -> TestResult {
        let dir = tempdir()?;

        write_fixture(
            dir.path(),
            "tasks",
            "strict",
            "name: strict\nitems:\n  - sku: soda-6pk\n    quantity: 2\nmandatory_coupon: SALEX\nbudget: 20.00 USD\n",
        )?;

        let target = Fixture::with_base_path(dir.path()).load_task("strict")?;

        assert_eq!(target.coupons, CouponPolicy::Mandatory("SALEX".to_string()));
        assert_eq!(target.budget, Some(Money::from_minor(2000, USD)));

        Ok(())
    }

    #[test]
    fn task_with_both_requirements_is_rejected() -> TestResult {
        let dir = tempdir()?;

        write_fixture(
            dir.path(),
            "tasks",
            "both",
            "name: both\nquantity:\n  units: 6\n  options:\n    - sku: a\n      units: 6\nitems:\n  - sku: a\n",
        )?;

        let result = Fixture::with_base_path(dir.path()).load_task("both");

        assert!(
            matches!(result, Err(FixtureError::InvalidTask(_))),
            "expected invalid task, got {result:?}"
        );

        Ok(())
    }

    #[test]
    fn mandatory_coupon_with_coupon_list_is_rejected() -> TestResult {
        let dir = tempdir()?;

        write_fixture(
            dir.path(),
            "tasks",
            "conflict",
            "name: conflict\nitems:\n  - sku: soda-6pk\nmandatory_coupon: SALEX\ncoupons: [BULK24]\n",
        )?;

        let result = Fixture::with_base_path(dir.path()).load_task("conflict");

        assert!(
            matches!(&result, Err(FixtureError::InvalidTask(detail)) if detail.contains("conflict")),
            "expected invalid task, got {result:?}"
        );

        Ok(())
    }

    #[test]
    fn coupon_in_other_currency_is_rejected() -> TestResult {
        let dir = tempdir()?;

        write_fixture(
            dir.path(),
            "stores",
            "mixed",
            "currency: USD\nproducts: []\ncoupons:\n  - code: X\n    amount_off: 5.00 GBP\n",
        )?;

        let result = Fixture::with_base_path(dir.path()).load_store("mixed");

        assert!(
            matches!(result, Err(FixtureError::CurrencyMismatch(_, _))),
            "expected currency mismatch, got {result:?}"
        );

        Ok(())
    }

    #[test]
    fn missing_fixture_is_an_io_error() {
        let result = Fixture::with_base_path("/nonexistent").load_store("soda");

        assert!(matches!(result, Err(FixtureError::Io(_))));
    }
}
