//! Products

use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize};

use crate::money::Amount;

/// Stock keeping unit, the store's unique product identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    /// Create a new SKU.
    pub fn new(sku: impl Into<String>) -> Self {
        Self(sku.into())
    }

    /// The SKU as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Sku {
    fn from(sku: &str) -> Self {
        Self::new(sku)
    }
}

impl From<String> for Sku {
    fn from(sku: String) -> Self {
        Self(sku)
    }
}

impl Borrow<str> for Sku {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Product
///
/// A snapshot of the store's listing at the time it was fetched; the store may change price or
/// stock at any point afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    /// Product SKU
    pub sku: Sku,

    /// Product display name
    pub name: String,

    /// Unit price
    pub price: Amount,

    /// Units available when the listing was read
    pub available: u32,
}
