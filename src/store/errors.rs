//! Store errors

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::{money::MoneyConversionError, products::Sku};

static PAGE_LIMIT_EXCEEDED: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)page\s*limit\s*exceeded\D*?(\d+)\s*>\s*(\d+)").ok()
});

static PAGE_LIMIT_ALLOWED: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)limit\D*?(\d+)\D*?(?:max(?:imum)?|allowed)\D*?(\d+)").ok()
});

static INSUFFICIENT_INVENTORY: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)insufficient\s+(?:inventory|stock)(?:\s+for\s+(?P<sku>[\w.\-]+))?\D*?available\D*?(?P<available>\d+)\D*?(?:in\s+basket|requested)\D*?(?P<requested>\d+)",
    )
    .ok()
});

/// Errors returned by a [`StoreClient`](super::StoreClient).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store rejected the request. The detail is diagnostic text.
    #[error("store rejected request: {detail}")]
    Api {
        /// HTTP status, when the request went over HTTP
        status: Option<u16>,

        /// Human readable detail from the store
        detail: String,
    },

    /// An HTTP transport or serialization error occurred.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store returned something that could not be understood.
    #[error("unexpected response from store: {0}")]
    UnexpectedResponse(String),

    /// A reported amount could not be converted.
    #[error(transparent)]
    Money(#[from] MoneyConversionError),
}

impl StoreError {
    /// Create an API error with no HTTP status.
    pub fn api(detail: impl Into<String>) -> Self {
        Self::Api {
            status: None,
            detail: detail.into(),
        }
    }

    /// Whether the store itself rejected the request, as opposed to a transport failure.
    pub fn is_api(&self) -> bool {
        matches!(self, Self::Api { .. })
    }

    /// HTTP status of an API error, when the request went over HTTP.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => *status,
            _ => None,
        }
    }

    /// The store's detail message for API errors.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Api { detail, .. } => Some(detail),
            _ => None,
        }
    }

    /// Parse a page-limit rejection from the error detail.
    pub fn page_limit(&self) -> Option<PageLimit> {
        PageLimit::parse(self.detail()?)
    }

    /// Parse an insufficient-inventory rejection from the error detail.
    pub fn insufficient_inventory(&self) -> Option<InventoryShortfall> {
        InventoryShortfall::parse(self.detail()?)
    }
}

/// The store refused a listing page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimit {
    /// Page size that was requested
    pub requested: u32,

    /// Largest page size the store accepts
    pub max_allowed: u32,
}

impl PageLimit {
    /// Parse a page-limit error detail such as `page limit exceeded: 5 > 3`.
    pub fn parse(detail: &str) -> Option<Self> {
        [&PAGE_LIMIT_EXCEEDED, &PAGE_LIMIT_ALLOWED]
            .into_iter()
            .filter_map(|pattern| LazyLock::force(pattern).as_ref())
            .find_map(|pattern| {
                let captures = pattern.captures(detail)?;

                Some(Self {
                    requested: captures.get(1)?.as_str().parse().ok()?,
                    max_allowed: captures.get(2)?.as_str().parse().ok()?,
                })
            })
    }
}

/// The store could not fulfil a basket line at checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryShortfall {
    /// SKU of the short line, when the store names it
    pub sku: Option<Sku>,

    /// Units the store can still supply
    pub available: u32,

    /// Units in the basket
    pub requested: u32,
}

impl InventoryShortfall {
    /// Parse an inventory error such as
    /// `insufficient inventory for soda-6pk: available 4, in basket 6`.
    pub fn parse(detail: &str) -> Option<Self> {
        let captures = LazyLock::force(&INSUFFICIENT_INVENTORY).as_ref()?.captures(detail)?;

        Some(Self {
            sku: captures.name("sku").map(|sku| Sku::new(sku.as_str())),
            available: captures.name("available")?.as_str().parse().ok()?,
            requested: captures.name("requested")?.as_str().parse().ok()?,
        })
    }

    /// Units that must be removed for the line to be fulfilled.
    pub fn excess(&self) -> u32 {
        self.requested.saturating_sub(self.available)
    }
}
