//! Basket

use rusty_money::{Money, iso::Currency};
use smallvec::SmallVec;
use tracing::debug;

use crate::{
    compositions::Composition,
    money::Amount,
    products::Sku,
    store::{StoreClient, StoreError},
};

/// A single basket line.
#[derive(Debug, Clone, PartialEq)]
pub struct BasketLine {
    /// Product SKU
    pub sku: Sku,

    /// Quantity in the basket
    pub quantity: u32,

    /// Unit price, when the store reports it
    pub unit_price: Option<Amount>,
}

impl BasketLine {
    /// Create a new basket line without a unit price.
    pub fn new(sku: impl Into<Sku>, quantity: u32) -> Self {
        Self {
            sku: sku.into(),
            quantity,
            unit_price: None,
        }
    }
}

/// Basket
///
/// Server-owned view of the basket. All totals are as reported by the store and are never
/// recomputed locally; a basket value is stale as soon as any mutating call has been issued.
#[derive(Debug, Clone, PartialEq)]
pub struct Basket {
    lines: Vec<BasketLine>,
    subtotal: Amount,
    coupon: Option<String>,
    discount: Amount,
    total: Amount,
}

impl Basket {
    /// Create a basket view from store-reported values.
    pub fn new(
        lines: Vec<BasketLine>,
        subtotal: Amount,
        coupon: Option<String>,
        discount: Amount,
        total: Amount,
    ) -> Self {
        Self {
            lines,
            subtotal,
            coupon,
            discount,
            total,
        }
    }

    /// An empty basket in the given currency.
    pub fn empty(currency: &'static Currency) -> Self {
        Self::new(
            Vec::new(),
            Money::from_minor(0, currency),
            None,
            Money::from_minor(0, currency),
            Money::from_minor(0, currency),
        )
    }

    /// Basket lines in store order.
    pub fn lines(&self) -> &[BasketLine] {
        &self.lines
    }

    /// Total before any coupon discount.
    pub fn subtotal(&self) -> Amount {
        self.subtotal
    }

    /// The applied coupon, if any.
    pub fn coupon(&self) -> Option<&str> {
        self.coupon.as_deref()
    }

    /// Discount granted by the applied coupon.
    pub fn discount(&self) -> Amount {
        self.discount
    }

    /// Amount payable.
    pub fn total(&self) -> Amount {
        self.total
    }

    /// Check if the basket has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|line| line.quantity == 0)
    }

    /// Quantity of the given SKU in the basket.
    pub fn quantity_of(&self, sku: &Sku) -> u32 {
        self.lines
            .iter()
            .filter(|line| &line.sku == sku)
            .map(|line| line.quantity)
            .sum()
    }

    /// Total number of units across all lines.
    pub fn total_quantity(&self) -> u32 {
        self.lines
            .iter()
            .fold(0_u32, |acc, line| acc.saturating_add(line.quantity))
    }

    /// Check the basket holds exactly the given composition and nothing else.
    pub fn matches(&self, composition: &Composition) -> bool {
        let composition_matches = composition
            .lines()
            .iter()
            .all(|line| self.quantity_of(&line.sku) == line.quantity);

        let nothing_extra = self
            .lines
            .iter()
            .filter(|line| line.quantity > 0)
            .all(|line| composition.quantity_of(&line.sku) > 0);

        composition_matches && nothing_extra
    }
}

/// Result of a committed checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitResult {
    /// Lines that were purchased
    pub lines: Vec<BasketLine>,

    /// Total before discount
    pub subtotal: Amount,

    /// Coupon that was applied at checkout
    pub coupon: Option<String>,

    /// Discount granted
    pub discount: Amount,

    /// Amount paid
    pub total: Amount,
}

/// Remove every line and any coupon from the basket, then re-read it.
///
/// # Errors
///
/// Returns a [`StoreError`] if a store call fails, or if the store still reports a non-empty
/// basket after clearing.
pub async fn clear<S: StoreClient + ?Sized>(store: &S) -> Result<Basket, StoreError> {
    let basket = store.view_basket().await?;

    if basket.coupon().is_some() {
        store.remove_coupon().await?;
    }

    let lines: SmallVec<[(Sku, u32); 8]> = basket
        .lines()
        .iter()
        .filter(|line| line.quantity > 0)
        .map(|line| (line.sku.clone(), line.quantity))
        .collect();

    for (sku, quantity) in &lines {
        debug!(%sku, quantity, "removing basket line");
        store.remove_product(sku, *quantity).await?;
    }

    let basket = store.view_basket().await?;

    if !basket.is_empty() || basket.coupon().is_some() {
        return Err(StoreError::UnexpectedResponse(
            "basket is not empty after clearing".to_string(),
        ));
    }

    Ok(basket)
}
