//! Store client
//!
//! The remote basket service is authoritative for prices, stock, coupons and totals. Every
//! operation is a single request/response call; callers must re-read the basket after any
//! mutation rather than trusting a previously returned value.

use async_trait::async_trait;
use mockall::automock;

use crate::{
    basket::{Basket, CommitResult},
    products::{Product, Sku},
};

pub use self::{
    errors::{InventoryShortfall, PageLimit, StoreError},
    http::{HttpStore, HttpStoreConfig},
    simulated::{
        CouponDiscount, CouponRule, SimulatedStore, SimulatedStoreBuilder, StockedProduct,
        StoreCall,
    },
};

#[cfg(test)]
pub(crate) use self::simulated::soda_store;

mod errors;
mod http;
mod simulated;
mod wire;

/// Marker for the final page of a product listing.
pub const END_OF_LISTING: i64 = -1;

/// A single page of the product listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductPage {
    /// Products on this page
    pub products: Vec<Product>,

    /// Offset of the next page, or [`END_OF_LISTING`]
    pub next_offset: i64,
}

impl ProductPage {
    /// Whether this is the last page of the listing.
    pub fn is_last(&self) -> bool {
        self.next_offset == END_OF_LISTING
    }
}

/// Remote basket service.
#[automock]
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// List a page of products.
    async fn list_products(&self, offset: u32, limit: u32) -> Result<ProductPage, StoreError>;

    /// Read the current basket.
    async fn view_basket(&self) -> Result<Basket, StoreError>;

    /// Add a quantity of a product to the basket.
    async fn add_product(&self, sku: &Sku, quantity: u32) -> Result<Basket, StoreError>;

    /// Remove a quantity of a product from the basket.
    async fn remove_product(&self, sku: &Sku, quantity: u32) -> Result<Basket, StoreError>;

    /// Apply a coupon, replacing any coupon already applied.
    async fn apply_coupon(&self, code: &str) -> Result<Basket, StoreError>;

    /// Remove the applied coupon.
    async fn remove_coupon(&self) -> Result<Basket, StoreError>;

    /// Commit the basket.
    async fn checkout(&self) -> Result<CommitResult, StoreError>;
}
