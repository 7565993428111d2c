//! HTTP client for the remote store.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rusty_money::iso::Currency;
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::{
    basket::{Basket, CommitResult},
    products::Sku,
    store::{
        ProductPage, StoreClient, StoreError,
        wire::{
            ApplyCouponRequest, BasketResponse, EmptyRequest, ErrorResponse, ListProductsRequest,
            ProductPageResponse, ProductQuantityRequest,
        },
    },
};

/// Configuration for connecting to a store.
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    /// Store base URL, scoped to the task, e.g. `"http://localhost:8000/store/task-1"`.
    pub base_url: String,

    /// Currency the store reports amounts in.
    pub currency: &'static Currency,

    /// Per-request timeout.
    pub timeout: Duration,
}

/// JSON over HTTP store client.
#[derive(Debug, Clone)]
pub struct HttpStore {
    config: HttpStoreConfig,
    http: Client,
}

impl HttpStore {
    /// Create a new client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: HttpStoreConfig) -> Result<Self, StoreError> {
        let http = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { config, http })
    }

    async fn post<B, R>(&self, endpoint: &str, body: &B) -> Result<R, StoreError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!(
            "{}/{endpoint}",
            self.config.base_url.trim_end_matches('/')
        );

        debug!(%url, "store request");

        let response = self.http.post(&url).json(body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            let detail = serde_json::from_str::<ErrorResponse>(&text)
                .map(|body| body.error)
                .unwrap_or(text);

            return Err(StoreError::Api {
                status: Some(status.as_u16()),
                detail,
            });
        }

        Ok(response.json().await?)
    }

    async fn basket_call<B: Serialize + Sync>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<Basket, StoreError> {
        let response: BasketResponse = self.post(endpoint, body).await?;

        Ok(response.into_basket(self.config.currency)?)
    }
}

#[async_trait]
impl StoreClient for HttpStore {
    async fn list_products(&self, offset: u32, limit: u32) -> Result<ProductPage, StoreError> {
        let response: ProductPageResponse = self
            .post("products/list", &ListProductsRequest { offset, limit })
            .await?;

        Ok(response.into_page(self.config.currency)?)
    }

    async fn view_basket(&self) -> Result<Basket, StoreError> {
        self.basket_call("basket/view", &EmptyRequest {}).await
    }

    async fn add_product(&self, sku: &Sku, quantity: u32) -> Result<Basket, StoreError> {
        self.basket_call("basket/add", &ProductQuantityRequest { sku, quantity })
            .await
    }

    async fn remove_product(&self, sku: &Sku, quantity: u32) -> Result<Basket, StoreError> {
        self.basket_call("basket/remove", &ProductQuantityRequest { sku, quantity })
            .await
    }

    async fn apply_coupon(&self, code: &str) -> Result<Basket, StoreError> {
        self.basket_call("basket/coupon/apply", &ApplyCouponRequest { coupon: code })
            .await
    }

    async fn remove_coupon(&self) -> Result<Basket, StoreError> {
        self.basket_call("basket/coupon/remove", &EmptyRequest {})
            .await
    }

    async fn checkout(&self) -> Result<CommitResult, StoreError> {
        let response: BasketResponse = self.post("basket/checkout", &EmptyRequest {}).await?;

        Ok(response.into_commit(self.config.currency)?)
    }
}
