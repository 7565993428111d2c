//! Task Fixtures

use serde::Deserialize;

use crate::{
    compositions::{CompositionLine, PackOption},
    fixtures::FixtureError,
    money::parse_price,
    optimiser::{CouponPolicy, Requirement, Target},
    products::Sku,
};

/// Task from YAML
#[derive(Debug, Deserialize)]
pub struct TaskFixture {
    /// Task name
    pub name: String,

    /// Free text description, for display only
    #[serde(default)]
    pub description: Option<String>,

    /// Buy a number of units from interchangeable packs
    #[serde(default)]
    pub quantity: Option<QuantityFixture>,

    /// Buy exactly these lines
    #[serde(default)]
    pub items: Option<Vec<ItemFixture>>,

    /// Codes to try on each candidate
    #[serde(default)]
    pub coupons: Vec<String>,

    /// Code that must be applied
    #[serde(default)]
    pub mandatory_coupon: Option<String>,

    /// Highest acceptable total, e.g. `"35.00 USD"`
    #[serde(default)]
    pub budget: Option<String>,
}

/// Quantity requirement from YAML
#[derive(Debug, Deserialize)]
pub struct QuantityFixture {
    /// Units required
    pub units: u32,

    /// Packs that count towards the units
    pub options: Vec<PackFixture>,
}

/// Pack option from YAML
#[derive(Debug, Deserialize)]
pub struct PackFixture {
    /// Product SKU
    pub sku: String,

    /// Units per pack
    pub units: u32,
}

/// Item line from YAML
#[derive(Debug, Deserialize)]
pub struct ItemFixture {
    /// Product SKU
    pub sku: String,

    /// Quantity to buy
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

impl TryFrom<TaskFixture> for Target {
    type Error = FixtureError;

    fn try_from(fixture: TaskFixture) -> Result<Self, Self::Error> {
        let requirement = match (fixture.quantity, fixture.items) {
            (Some(quantity), None) => Requirement::Quantity {
                options: quantity
                    .options
                    .into_iter()
                    .map(|pack| PackOption::new(pack.sku, pack.units))
                    .collect(),
                units: quantity.units,
            },
            (None, Some(items)) => Requirement::Items(
                items
                    .into_iter()
                    .map(|item| CompositionLine {
                        sku: Sku::new(item.sku),
                        quantity: item.quantity,
                    })
                    .collect(),
            ),
            _ => {
                return Err(FixtureError::InvalidTask(format!(
                    "{} must define exactly one of quantity or items",
                    fixture.name
                )));
            }
        };

        let coupons = match (fixture.mandatory_coupon, fixture.coupons.is_empty()) {
            (Some(code), true) => CouponPolicy::Mandatory(code),
            (Some(_), false) => {
                return Err(FixtureError::InvalidTask(format!(
                    "{} cannot set both mandatory_coupon and coupons",
                    fixture.name
                )));
            }
            (None, _) => CouponPolicy::BestOf(fixture.coupons),
        };

        let budget = fixture
            .budget
            .as_deref()
            .map(parse_price)
            .transpose()?;

        Ok(Target {
            requirement,
            coupons,
            budget,
        })
    }
}
