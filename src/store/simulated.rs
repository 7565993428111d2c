//! In-memory store
//!
//! Behaves like the remote basket service: it owns pricing, stock, coupons and totals, enforces
//! a page limit on listings and rejects checkouts that exceed stock. Every call is recorded so
//! tests can assert on the exact sequence the protocol issued.

use async_trait::async_trait;
use decimal_percentage::Percentage;
use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use tokio::sync::Mutex;

use crate::{
    basket::{Basket, BasketLine, CommitResult},
    money::{Amount, MoneyConversionError, line_total, percent_of_minor},
    products::{Product, Sku},
    store::{END_OF_LISTING, ProductPage, StoreClient, StoreError},
};

/// A product and its stock level.
#[derive(Debug, Clone)]
pub struct StockedProduct {
    /// Product SKU
    pub sku: Sku,

    /// Display name
    pub name: String,

    /// Unit price
    pub price: Amount,

    /// Units in stock
    pub stock: u32,
}

/// Discount granted by a coupon.
#[derive(Debug, Copy, Clone)]
pub enum CouponDiscount {
    /// Subtract a fixed amount from the subtotal (e.g., "$14 off")
    AmountOff(Amount),

    /// Apply a percentage discount to the subtotal (e.g., "10% off")
    PercentageOff(Percentage),
}

/// A coupon and the basket contents it requires.
#[derive(Debug, Clone)]
pub struct CouponRule {
    /// Coupon code
    pub code: String,

    /// Minimum quantity of each SKU the basket must contain
    pub requires: Vec<(Sku, u32)>,

    /// Discount applied when the requirements are met
    pub discount: CouponDiscount,
}

impl CouponRule {
    fn is_satisfied_by(&self, lines: &[(Sku, u32)]) -> bool {
        self.requires.iter().all(|(sku, min_quantity)| {
            quantity_in(lines, sku) >= *min_quantity
        })
    }
}

/// A recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    /// `list_products`
    ListProducts {
        /// Requested offset
        offset: u32,
        /// Requested page size
        limit: u32,
    },
    /// `view_basket`
    ViewBasket,
    /// `add_product`
    AddProduct {
        /// Product SKU
        sku: Sku,
        /// Quantity added
        quantity: u32,
    },
    /// `remove_product`
    RemoveProduct {
        /// Product SKU
        sku: Sku,
        /// Quantity removed
        quantity: u32,
    },
    /// `apply_coupon`
    ApplyCoupon(String),
    /// `remove_coupon`
    RemoveCoupon,
    /// `checkout`
    Checkout,
}

#[derive(Debug)]
struct StoreState {
    products: Vec<StockedProduct>,
    coupons: Vec<CouponRule>,
    page_limit: Option<u32>,
    lines: Vec<(Sku, u32)>,
    coupon: Option<String>,
    calls: Vec<StoreCall>,
    commits: Vec<CommitResult>,
    pending_stock_changes: FxHashMap<Sku, u32>,
}

/// Builder for a [`SimulatedStore`].
#[derive(Debug)]
pub struct SimulatedStoreBuilder {
    currency: &'static Currency,
    products: Vec<StockedProduct>,
    coupons: Vec<CouponRule>,
    page_limit: Option<u32>,
}

impl SimulatedStoreBuilder {
    /// Add a product to the catalog.
    #[must_use]
    pub fn product(mut self, sku: &str, name: &str, price_minor: i64, stock: u32) -> Self {
        self.products.push(StockedProduct {
            sku: Sku::from(sku),
            name: name.to_string(),
            price: Money::from_minor(price_minor, self.currency),
            stock,
        });

        self
    }

    /// Add a stocked product to the catalog.
    #[must_use]
    pub fn stocked_product(mut self, product: StockedProduct) -> Self {
        self.products.push(product);

        self
    }

    /// Add a coupon.
    #[must_use]
    pub fn coupon(mut self, rule: CouponRule) -> Self {
        self.coupons.push(rule);

        self
    }

    /// Reject listing requests with a page size above `limit`.
    #[must_use]
    pub fn page_limit(mut self, limit: u32) -> Self {
        self.page_limit = Some(limit);

        self
    }

    /// Build the store.
    pub fn build(self) -> SimulatedStore {
        SimulatedStore {
            currency: self.currency,
            state: Mutex::new(StoreState {
                products: self.products,
                coupons: self.coupons,
                page_limit: self.page_limit,
                lines: Vec::new(),
                coupon: None,
                calls: Vec::new(),
                commits: Vec::new(),
                pending_stock_changes: FxHashMap::default(),
            }),
        }
    }
}

/// In-memory stand-in for the remote basket service.
#[derive(Debug)]
pub struct SimulatedStore {
    currency: &'static Currency,
    state: Mutex<StoreState>,
}

impl SimulatedStore {
    /// Start building a store that prices in `currency`.
    pub fn builder(currency: &'static Currency) -> SimulatedStoreBuilder {
        SimulatedStoreBuilder {
            currency,
            products: Vec::new(),
            coupons: Vec::new(),
            page_limit: None,
        }
    }

    /// Currency the store prices in.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Every call made against the store, in order.
    pub async fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().await.calls.clone()
    }

    /// Committed checkouts, in order.
    pub async fn commits(&self) -> Vec<CommitResult> {
        self.state.lock().await.commits.clone()
    }

    /// Current stock of a product.
    pub async fn stock_of(&self, sku: &Sku) -> Option<u32> {
        let state = self.state.lock().await;

        state
            .products
            .iter()
            .find(|product| &product.sku == sku)
            .map(|product| product.stock)
    }

    /// Overwrite the stock of a product just before the next checkout is processed.
    pub async fn set_stock_before_checkout(&self, sku: &Sku, stock: u32) {
        self.state
            .lock()
            .await
            .pending_stock_changes
            .insert(sku.clone(), stock);
    }

    fn basket(&self, state: &StoreState) -> Result<Basket, StoreError> {
        let (lines, subtotal) = priced_lines(state)?;

        let discount = match state.coupon.as_deref() {
            Some(code) => discount_for(state, code, subtotal)?,
            None => 0,
        };

        let total = subtotal
            .checked_sub(discount)
            .ok_or(MoneyConversionError::Overflow)?;

        Ok(Basket::new(
            lines,
            Money::from_minor(subtotal, self.currency),
            state.coupon.clone(),
            Money::from_minor(discount, self.currency),
            Money::from_minor(total, self.currency),
        ))
    }

    async fn mutate<F>(&self, call: StoreCall, apply: F) -> Result<Basket, StoreError>
    where
        F: FnOnce(&mut StoreState) -> Result<(), StoreError> + Send,
    {
        let mut state = self.state.lock().await;

        state.calls.push(call);
        apply(&mut *state)?;

        self.basket(&state)
    }
}

fn priced_lines(state: &StoreState) -> Result<(Vec<BasketLine>, i64), StoreError> {
    let mut subtotal = 0_i64;
    let mut lines = Vec::with_capacity(state.lines.len());

    for (sku, quantity) in &state.lines {
        let product = find_product(&state.products, sku)?;
        let amount = line_total(&product.price, *quantity)?;

        subtotal = subtotal
            .checked_add(amount.to_minor_units())
            .ok_or(MoneyConversionError::Overflow)?;

        lines.push(BasketLine {
            sku: sku.clone(),
            quantity: *quantity,
            unit_price: Some(product.price),
        });
    }

    Ok((lines, subtotal))
}

fn discount_for(state: &StoreState, code: &str, subtotal: i64) -> Result<i64, StoreError> {
    let Some(rule) = state.coupons.iter().find(|rule| rule.code == code) else {
        return Ok(0);
    };

    if !rule.is_satisfied_by(&state.lines) {
        return Ok(0);
    }

    let discount = match rule.discount {
        CouponDiscount::AmountOff(amount) => amount.to_minor_units(),
        CouponDiscount::PercentageOff(percent) => percent_of_minor(&percent, subtotal)?,
    };

    Ok(discount.clamp(0, subtotal.max(0)))
}

fn find_product<'a>(
    products: &'a [StockedProduct],
    sku: &Sku,
) -> Result<&'a StockedProduct, StoreError> {
    products
        .iter()
        .find(|product| &product.sku == sku)
        .ok_or_else(|| StoreError::api(format!("product {sku} not found")))
}

fn quantity_in(lines: &[(Sku, u32)], sku: &Sku) -> u32 {
    lines
        .iter()
        .filter(|(line_sku, _)| line_sku == sku)
        .map(|(_, quantity)| *quantity)
        .sum()
}

#[async_trait]
impl StoreClient for SimulatedStore {
    async fn list_products(&self, offset: u32, limit: u32) -> Result<ProductPage, StoreError> {
        let mut state = self.state.lock().await;

        state.calls.push(StoreCall::ListProducts { offset, limit });

        if limit == 0 {
            return Err(StoreError::api("limit must be positive"));
        }

        if let Some(max) = state.page_limit.filter(|max| limit > *max) {
            return Err(StoreError::api(format!("page limit exceeded: {limit} > {max}")));
        }

        let products = state
            .products
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|product| Product {
                sku: product.sku.clone(),
                name: product.name.clone(),
                price: product.price,
                available: product.stock,
            })
            .collect();

        let next = u64::from(offset) + u64::from(limit);

        let next_offset = if next < state.products.len() as u64 {
            i64::try_from(next).unwrap_or(END_OF_LISTING)
        } else {
            END_OF_LISTING
        };

        Ok(ProductPage {
            products,
            next_offset,
        })
    }

    async fn view_basket(&self) -> Result<Basket, StoreError> {
        let mut state = self.state.lock().await;

        state.calls.push(StoreCall::ViewBasket);

        self.basket(&state)
    }

    async fn add_product(&self, sku: &Sku, quantity: u32) -> Result<Basket, StoreError> {
        let call = StoreCall::AddProduct {
            sku: sku.clone(),
            quantity,
        };

        self.mutate(call, |state| {
            if quantity == 0 {
                return Err(StoreError::api("quantity must be positive"));
            }

            let product = find_product(&state.products, sku)?;
            let in_basket = quantity_in(&state.lines, sku);
            let requested = in_basket.saturating_add(quantity);

            if requested > product.stock {
                return Err(StoreError::api(format!(
                    "insufficient stock for {sku}: available {}, requested {requested}",
                    product.stock
                )));
            }

            match state.lines.iter_mut().find(|(line_sku, _)| line_sku == sku) {
                Some((_, line_quantity)) => *line_quantity = requested,
                None => state.lines.push((sku.clone(), quantity)),
            }

            Ok(())
        })
        .await
    }

    async fn remove_product(&self, sku: &Sku, quantity: u32) -> Result<Basket, StoreError> {
        let call = StoreCall::RemoveProduct {
            sku: sku.clone(),
            quantity,
        };

        self.mutate(call, |state| {
            let Some(position) = state.lines.iter().position(|(line_sku, _)| line_sku == sku)
            else {
                return Err(StoreError::api(format!("product {sku} is not in the basket")));
            };

            let remaining = quantity_in(&state.lines, sku).saturating_sub(quantity);

            if remaining == 0 {
                state.lines.remove(position);
            } else if let Some((_, line_quantity)) = state.lines.get_mut(position) {
                *line_quantity = remaining;
            }

            Ok(())
        })
        .await
    }

    async fn apply_coupon(&self, code: &str) -> Result<Basket, StoreError> {
        self.mutate(StoreCall::ApplyCoupon(code.to_string()), |state| {
            let Some(rule) = state.coupons.iter().find(|rule| rule.code == code) else {
                return Err(StoreError::api(format!("coupon {code} not found")));
            };

            if !rule.is_satisfied_by(&state.lines) {
                return Err(StoreError::api(format!(
                    "coupon {code} is not applicable to this basket"
                )));
            }

            state.coupon = Some(code.to_string());

            Ok(())
        })
        .await
    }

    async fn remove_coupon(&self) -> Result<Basket, StoreError> {
        self.mutate(StoreCall::RemoveCoupon, |state| {
            state.coupon = None;

            Ok(())
        })
        .await
    }

    async fn checkout(&self) -> Result<CommitResult, StoreError> {
        let mut state = self.state.lock().await;

        state.calls.push(StoreCall::Checkout);

        let pending: Vec<(Sku, u32)> = state.pending_stock_changes.drain().collect();

        for (sku, stock) in pending {
            if let Some(product) = state.products.iter_mut().find(|product| product.sku == sku) {
                product.stock = stock;
            }
        }

        if state.lines.is_empty() {
            return Err(StoreError::api("basket is empty"));
        }

        for (sku, quantity) in &state.lines {
            let product = find_product(&state.products, sku)?;

            if *quantity > product.stock {
                return Err(StoreError::api(format!(
                    "insufficient inventory for {sku}: available {}, in basket {quantity}",
                    product.stock
                )));
            }
        }

        let basket = self.basket(&state)?;

        let StoreState {
            products, lines, ..
        } = &mut *state;

        for (sku, quantity) in lines.iter() {
            if let Some(product) = products.iter_mut().find(|product| &product.sku == sku) {
                product.stock = product.stock.saturating_sub(*quantity);
            }
        }

        let commit = CommitResult {
            lines: basket.lines().to_vec(),
            subtotal: basket.subtotal(),
            coupon: basket.coupon().map(str::to_string),
            discount: basket.discount(),
            total: basket.total(),
        };

        state.lines.clear();
        state.coupon = None;
        state.commits.push(commit.clone());

        Ok(commit)
    }
}

/// The soda store used throughout the unit tests: 6, 12 and 24 packs with three coupons.
#[cfg(test)]
pub(crate) fn soda_store() -> SimulatedStore {
    use rusty_money::iso::USD;

    let rule = |code: &str, requires: &[(&str, u32)], off: i64| CouponRule {
        code: code.to_string(),
        requires: requires
            .iter()
            .map(|(sku, quantity)| (Sku::from(*sku), *quantity))
            .collect(),
        discount: CouponDiscount::AmountOff(Money::from_minor(off, USD)),
    };

    SimulatedStore::builder(USD)
        .product("soda-6pk", "Soda 6-pack", 1200, 10)
        .product("soda-12pk", "Soda 12-pack", 2000, 5)
        .product("soda-24pk", "Soda 24-pack", 3800, 3)
        .coupon(rule("SALEX", &[("soda-6pk", 2)], 1400))
        .coupon(rule("BULK24", &[("soda-24pk", 1)], 500))
        .coupon(rule("COMBO", &[("soda-6pk", 1), ("soda-12pk", 1)], 600))
        .page_limit(2)
        .build()
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::USD;
    use testresult::TestResult;

    use super::*;

    fn store() -> SimulatedStore {
        SimulatedStore::builder(USD)
            .product("soda-6pk", "Soda 6-pack", 1200, 10)
            .product("soda-12pk", "Soda 12-pack", 2000, 5)
            .coupon(CouponRule {
                code: "SALEX".to_string(),
                requires: vec![(Sku::from("soda-6pk"), 2)],
                discount: CouponDiscount::AmountOff(Money::from_minor(1400, USD)),
            })
            .page_limit(1)
            .build()
    }

    #[tokio::test]
    async fn listing_enforces_page_limit() -> TestResult {
        let store = store();

        let error = store.list_products(0, 5).await;

        assert!(
            matches!(&error, Err(err) if err.page_limit().is_some()),
            "expected page limit error, got {error:?}"
        );

        let page = store.list_products(1, 1).await?;

        assert!(page.is_last());
        assert_eq!(page.products.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn coupon_discount_follows_basket_contents() -> TestResult {
        let store = store();
        let six = Sku::from("soda-6pk");
        let twelve = Sku::from("soda-12pk");

        store.add_product(&six, 2).await?;
        store.add_product(&twelve, 1).await?;

        let basket = store.apply_coupon("SALEX").await?;

        assert_eq!(basket.subtotal(), Money::from_minor(4400, USD));
        assert_eq!(basket.discount(), Money::from_minor(1400, USD));
        assert_eq!(basket.total(), Money::from_minor(3000, USD));

        let basket = store.remove_product(&six, 1).await?;

        assert_eq!(basket.coupon(), Some("SALEX"));
        assert_eq!(basket.discount(), Money::from_minor(0, USD));

        Ok(())
    }

    #[tokio::test]
    async fn inapplicable_coupon_is_rejected() -> TestResult {
        let store = store();

        store.add_product(&Sku::from("soda-12pk"), 1).await?;

        let result = store.apply_coupon("SALEX").await;

        assert!(result.is_err(), "expected coupon to be rejected");
        assert_eq!(store.view_basket().await?.coupon(), None);

        Ok(())
    }

    #[tokio::test]
    async fn checkout_reports_inventory_shortfall() -> TestResult {
        let store = store();
        let six = Sku::from("soda-6pk");

        store.add_product(&six, 6).await?;
        store.set_stock_before_checkout(&six, 4).await;

        let result = store.checkout().await;

        let shortfall = match &result {
            Err(error) => error.insufficient_inventory(),
            Ok(_) => None,
        };

        assert_eq!(shortfall.map(|shortfall| shortfall.excess()), Some(2));
        assert_eq!(store.stock_of(&six).await, Some(4));

        Ok(())
    }

    #[tokio::test]
    async fn checkout_consumes_stock_and_empties_basket() -> TestResult {
        let store = store();
        let six = Sku::from("soda-6pk");

        store.add_product(&six, 2).await?;
        store.apply_coupon("SALEX").await?;

        let commit = store.checkout().await?;

        assert_eq!(commit.total, Money::from_minor(1000, USD));
        assert_eq!(store.stock_of(&six).await, Some(8));
        assert!(store.view_basket().await?.is_empty());
        assert_eq!(store.commits().await.len(), 1);

        Ok(())
    }
}
