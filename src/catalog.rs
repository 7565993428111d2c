//! Catalog
//!
//! Fetches the full product listing page by page. When the store rejects the requested page
//! size it reports the largest size it accepts; the scan restarts from the beginning with that
//! size, at most once per fetch. Any other failure ends the fetch with whatever was collected.

use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::{
    products::{Product, Sku},
    retry::RetryBudget,
    store::{StoreClient, StoreError},
};

/// Default page size requested from the store.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Page size corrections allowed per fetch.
const PAGE_SIZE_CORRECTIONS: u32 = 1;

/// Products fetched from the store.
#[derive(Debug)]
pub struct Catalog {
    products: Vec<Product>,
    index: FxHashMap<Sku, usize>,
    page_size: u32,
    restarts: u32,
    incomplete: Option<StoreError>,
}

impl Catalog {
    fn empty(page_size: u32) -> Self {
        Self {
            products: Vec::new(),
            index: FxHashMap::default(),
            page_size,
            restarts: 0,
            incomplete: None,
        }
    }

    fn insert(&mut self, product: Product) -> bool {
        if self.index.contains_key(&product.sku) {
            return false;
        }

        self.index.insert(product.sku.clone(), self.products.len());
        self.products.push(product);

        true
    }

    fn reset(&mut self, page_size: u32) {
        self.products.clear();
        self.index.clear();
        self.page_size = page_size;
        self.restarts += 1;
    }

    /// Products in listing order.
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Look up a product by SKU.
    pub fn get(&self, sku: &Sku) -> Option<&Product> {
        self.index
            .get(sku)
            .and_then(|&position| self.products.get(position))
    }

    /// Number of products fetched.
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Check if no products were fetched.
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Page size that was in effect when the fetch finished.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Number of times the scan restarted from offset zero.
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// Check the whole listing was read.
    pub fn is_complete(&self) -> bool {
        self.incomplete.is_none()
    }

    /// The error that cut the fetch short, if any.
    pub fn incomplete_reason(&self) -> Option<&StoreError> {
        self.incomplete.as_ref()
    }
}

/// Fetch every product from the store.
///
/// The result is never an error: a failed fetch returns the products collected so far, with
/// [`Catalog::is_complete`] returning `false`.
pub async fn fetch_all_products<S: StoreClient + ?Sized>(store: &S, page_size: u32) -> Catalog {
    let mut catalog = Catalog::empty(page_size.max(1));
    let mut corrections = RetryBudget::new(PAGE_SIZE_CORRECTIONS);
    let mut offset = 0_u32;

    loop {
        let limit = catalog.page_size;

        let page = match store.list_products(offset, limit).await {
            Ok(page) => page,
            Err(error) => {
                let correction = error
                    .page_limit()
                    .filter(|page_limit| {
                        page_limit.max_allowed > 0 && page_limit.max_allowed < limit
                    });

                match correction {
                    Some(page_limit) if corrections.try_consume() => {
                        warn!(
                            requested = limit,
                            max_allowed = page_limit.max_allowed,
                            "page size rejected, restarting catalog scan"
                        );

                        catalog.reset(page_limit.max_allowed);
                        offset = 0;

                        continue;
                    }
                    _ => {}
                }

                warn!(
                    %error,
                    status = ?error.status(),
                    fetched = catalog.len(),
                    "catalog fetch aborted"
                );
                catalog.incomplete = Some(error);

                break;
            }
        };

        debug!(offset, limit, count = page.products.len(), "fetched product page");

        let last = page.is_last();

        for product in page.products {
            let sku = product.sku.clone();

            if !catalog.insert(product) {
                warn!(%sku, "duplicate product in listing ignored");
            }
        }

        if last {
            break;
        }

        match u32::try_from(page.next_offset) {
            Ok(next) if next > offset => offset = next,
            _ => {
                warn!(offset, next_offset = page.next_offset, "listing did not advance");
                catalog.incomplete = Some(StoreError::UnexpectedResponse(format!(
                    "listing did not advance past offset {offset} (next offset {})",
                    page.next_offset
                )));

                break;
            }
        }
    }

    info!(
        products = catalog.len(),
        restarts = catalog.restarts,
        complete = catalog.is_complete(),
        "catalog fetched"
    );

    catalog
}
