//! Store Fixtures

use rusty_money::iso::Currency;
use serde::Deserialize;

use crate::{
    fixtures::FixtureError,
    money::{parse_currency, parse_percentage, parse_price},
    products::Sku,
    store::{CouponDiscount, CouponRule, SimulatedStore, StockedProduct},
};

/// Simulated store from YAML
#[derive(Debug, Deserialize)]
pub struct StoreFixture {
    /// ISO currency code every price is quoted in
    pub currency: String,

    /// Largest listing page the store accepts
    #[serde(default)]
    pub page_limit: Option<u32>,

    /// Products in listing order
    pub products: Vec<ProductFixture>,

    /// Coupons the store honours
    #[serde(default)]
    pub coupons: Vec<CouponFixture>,
}

/// Product fixture from YAML
#[derive(Debug, Deserialize)]
pub struct ProductFixture {
    /// Product SKU
    pub sku: String,

    /// Display name
    pub name: String,

    /// Unit price, e.g. `"12.00 USD"`
    pub price: String,

    /// Units in stock
    pub stock: u32,
}

/// Coupon fixture from YAML
#[derive(Debug, Deserialize)]
pub struct CouponFixture {
    /// Coupon code
    pub code: String,

    /// Minimum quantity per SKU for the coupon to apply
    #[serde(default)]
    pub requires: Vec<RequirementFixture>,

    /// Fixed amount off, e.g. `"14.00 USD"`
    #[serde(default)]
    pub amount_off: Option<String>,

    /// Percentage off, e.g. `"10%"`
    #[serde(default)]
    pub percentage_off: Option<String>,
}

/// Minimum quantity of a SKU
#[derive(Debug, Deserialize)]
pub struct RequirementFixture {
    /// Product SKU
    pub sku: String,

    /// Minimum quantity
    pub quantity: u32,
}

impl StoreFixture {
    /// Build a simulated store from the fixture.
    ///
    /// # Errors
    ///
    /// Returns an error if a price, percentage or currency is malformed, if a price is quoted in
    /// another currency, or if a coupon does not define exactly one discount.
    pub fn into_store(self) -> Result<SimulatedStore, FixtureError> {
        let currency = parse_currency(&self.currency)?;
        let mut builder = SimulatedStore::builder(currency);

        for product in self.products {
            let price = parse_price(&product.price)?;

            ensure_currency(currency, price.currency())?;

            builder = builder.stocked_product(StockedProduct {
                sku: Sku::new(product.sku),
                name: product.name,
                price,
                stock: product.stock,
            });
        }

        for coupon in self.coupons {
            builder = builder.coupon(coupon.into_rule(currency)?);
        }

        if let Some(limit) = self.page_limit {
            builder = builder.page_limit(limit);
        }

        Ok(builder.build())
    }
}

impl CouponFixture {
    fn into_rule(self, currency: &'static Currency) -> Result<CouponRule, FixtureError> {
        let discount = match (self.amount_off, self.percentage_off) {
            (Some(amount), None) => {
                let amount = parse_price(&amount)?;

                ensure_currency(currency, amount.currency())?;

                CouponDiscount::AmountOff(amount)
            }
            (None, Some(percentage)) => {
                CouponDiscount::PercentageOff(parse_percentage(&percentage)?)
            }
            _ => {
                return Err(FixtureError::InvalidCoupon(format!(
                    "{} must define exactly one of amount_off or percentage_off",
                    self.code
                )));
            }
        };

        Ok(CouponRule {
            code: self.code,
            requires: self
                .requires
                .into_iter()
                .map(|requirement| (Sku::new(requirement.sku), requirement.quantity))
                .collect(),
            discount,
        })
    }
}

fn ensure_currency(expected: &'static Currency, found: &Currency) -> Result<(), FixtureError> {
    if expected == found {
        return Ok(());
    }

    Err(FixtureError::CurrencyMismatch(
        expected.iso_alpha_code.to_string(),
        found.iso_alpha_code.to_string(),
    ))
}
