//! JSON wire format of the remote store.

use rust_decimal::Decimal;
use rusty_money::iso::Currency;
use serde::{Deserialize, Serialize};

use crate::{
    basket::{Basket, BasketLine, CommitResult},
    money::{MoneyConversionError, from_decimal},
    products::{Product, Sku},
    store::ProductPage,
};

#[derive(Debug, Serialize)]
pub(super) struct ListProductsRequest {
    pub offset: u32,
    pub limit: u32,
}

#[derive(Debug, Serialize)]
pub(super) struct ProductQuantityRequest<'a> {
    pub sku: &'a Sku,
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub(super) struct ApplyCouponRequest<'a> {
    pub coupon: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct EmptyRequest {}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ProductResponse {
    sku: Sku,
    #[serde(default)]
    name: String,
    price: Decimal,
    #[serde(default)]
    available: u32,
}

#[derive(Debug, Deserialize)]
pub(super) struct ProductPageResponse {
    #[serde(default)]
    products: Vec<ProductResponse>,
    next_offset: i64,
}

impl ProductPageResponse {
    pub fn into_page(
        self,
        currency: &'static Currency,
    ) -> Result<ProductPage, MoneyConversionError> {
        let products = self
            .products
            .into_iter()
            .map(|product| {
                Ok(Product {
                    name: product.name,
                    price: from_decimal(product.price, currency)?,
                    available: product.available,
                    sku: product.sku,
                })
            })
            .collect::<Result<Vec<_>, MoneyConversionError>>()?;

        Ok(ProductPage {
            products,
            next_offset: self.next_offset,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct LineResponse {
    sku: Sku,
    quantity: u32,
    #[serde(default)]
    price: Option<Decimal>,
}

impl LineResponse {
    fn into_line(self, currency: &'static Currency) -> Result<BasketLine, MoneyConversionError> {
        Ok(BasketLine {
            unit_price: self
                .price
                .map(|price| from_decimal(price, currency))
                .transpose()?,
            sku: self.sku,
            quantity: self.quantity,
        })
    }
}

/// Basket and checkout responses share a shape.
#[derive(Debug, Deserialize)]
pub(super) struct BasketResponse {
    #[serde(default)]
    items: Vec<LineResponse>,
    #[serde(default)]
    subtotal: Decimal,
    #[serde(default)]
    coupon: Option<String>,
    #[serde(default)]
    discount: Decimal,
    #[serde(default)]
    total: Decimal,
}

impl BasketResponse {
    fn into_parts(
        self,
        currency: &'static Currency,
    ) -> Result<CommitResult, MoneyConversionError> {
        let lines = self
            .items
            .into_iter()
            .map(|line| line.into_line(currency))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CommitResult {
            lines,
            subtotal: from_decimal(self.subtotal, currency)?,
            coupon: self.coupon.filter(|coupon| !coupon.is_empty()),
            discount: from_decimal(self.discount, currency)?,
            total: from_decimal(self.total, currency)?,
        })
    }

    pub fn into_basket(self, currency: &'static Currency) -> Result<Basket, MoneyConversionError> {
        let parts = self.into_parts(currency)?;

        Ok(Basket::new(
            parts.lines,
            parts.subtotal,
            parts.coupon,
            parts.discount,
            parts.total,
        ))
    }

    pub fn into_commit(
        self,
        currency: &'static Currency,
    ) -> Result<CommitResult, MoneyConversionError> {
        self.into_parts(currency)
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso::USD};
    use testresult::TestResult;

    use super::*;

    #[test]
    fn basket_response_parses_numeric_amounts() -> TestResult {
        let json = r#"{
            "items": [
                {"sku": "soda-6pk", "quantity": 2, "price": 12},
                {"sku": "soda-12pk", "quantity": 1, "price": 20.0}
            ],
            "subtotal": 44,
            "coupon": "SALEX",
            "discount": 14,
            "total": 30
        }"#;

        let basket = serde_json::from_str::<BasketResponse>(json)?.into_basket(USD)?;

        assert_eq!(basket.lines().len(), 2);
        assert_eq!(basket.subtotal(), Money::from_minor(4400, USD));
        assert_eq!(basket.coupon(), Some("SALEX"));
        assert_eq!(basket.total(), Money::from_minor(3000, USD));

        Ok(())
    }

    #[test]
    fn empty_basket_response_defaults_to_zero() -> TestResult {
        let basket = serde_json::from_str::<BasketResponse>("{}")?.into_basket(USD)?;

        assert!(basket.is_empty());
        assert_eq!(basket.coupon(), None);
        assert_eq!(basket.total(), Money::from_minor(0, USD));

        Ok(())
    }

    #[test]
    fn product_page_keeps_end_marker() -> TestResult {
        let json = r#"{"products": [{"sku": "soda-6pk", "name": "Soda", "price": 12, "available": 3}], "next_offset": -1}"#;

        let page = serde_json::from_str::<ProductPageResponse>(json)?.into_page(USD)?;

        assert!(page.is_last());
        assert_eq!(page.products.len(), 1);

        Ok(())
    }
}
