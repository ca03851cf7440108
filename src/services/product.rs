//! Product catalogue.

use serde::{Deserialize, Serialize};

use crate::config::{ServiceConfig, ValidationConfig};
use crate::context::CorrelationContext;
use crate::error::ServiceError;
use crate::services::{generate_id, now_rfc3339, require_id, require_text, simulate_latency, DataAccess, DataError};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: u32,
    pub name: String,
    pub category: String,
    pub price: f64,
    pub description: String,
    pub in_stock: bool,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewProduct {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub quantity: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StockUpdate {
    pub quantity: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductList {
    pub products: Vec<Product>,
    pub total: usize,
    pub timestamp: i64,
}

fn catalogue() -> Vec<Product> {
    vec![Product {
        id: 1,
        name: "Widget".to_string(),
        category: "Hardware".to_string(),
        price: 9.99,
        description: String::new(),
        in_stock: true,
        quantity: 100,
        created_at: None,
        updated_at: None,
    }]
}

fn find_product(id: &str) -> Result<Product, DataError> {
    catalogue()
        .into_iter()
        .find(|p| p.id.to_string() == id)
        .ok_or(DataError::NotFound("Product"))
}

fn non_negative_quantity(quantity: Option<i64>) -> Result<u32, ServiceError> {
    match quantity {
        None => Err(ServiceError::bad_request("Quantity is required")),
        Some(q) if q < 0 => Err(ServiceError::bad_request("Quantity cannot be negative")),
        Some(q) => u32::try_from(q).map_err(|_| ServiceError::bad_request("Quantity is too large")),
    }
}

/// Product catalogue behind the `database` breaker.
#[derive(Debug, Clone)]
pub struct ProductService {
    data: DataAccess,
    config: ServiceConfig,
    limits: ValidationConfig,
}

impl ProductService {
    pub fn new(data: DataAccess, config: ServiceConfig, limits: ValidationConfig) -> Self {
        Self { data, config, limits }
    }

    pub async fn list(&self, ctx: &CorrelationContext) -> Result<ProductList, ServiceError> {
        let delay = self.config.list;
        self.data
            .run("getAllProducts", ctx, move |interrupt| {
                simulate_latency(interrupt, delay)?;
                let products = catalogue();
                Ok(ProductList {
                    total: products.len(),
                    products,
                    timestamp: chrono::Utc::now().timestamp_millis(),
                })
            })
            .await
    }

    pub async fn get(&self, id: &str, ctx: &CorrelationContext) -> Result<Product, ServiceError> {
        let id = require_id(id, "Product")?;
        let delay = self.config.fetch;
        self.data
            .run("getProductById", ctx, move |interrupt| {
                simulate_latency(interrupt, delay)?;
                find_product(&id)
            })
            .await
    }

    pub async fn create(&self, input: NewProduct, ctx: &CorrelationContext) -> Result<Product, ServiceError> {
        let max = self.limits.max_name_length;
        let name = require_text(input.name.as_deref(), "Product name is required", "Product name", max)?;
        let category = require_text(
            input.category.as_deref(),
            "Product category is required",
            "Product category",
            max,
        )?;
        let price = input
            .price
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(|| ServiceError::bad_request("Product price must be greater than 0"))?;
        let quantity = match input.quantity {
            Some(q) => non_negative_quantity(Some(q))?,
            None => 0,
        };
        let description = input.description.unwrap_or_default();

        tracing::info!(product_name = %name, "Creating product");
        let (delay, min_id, max_id) = (self.config.create_product, self.config.min_id, self.config.max_id);
        self.data
            .run("createProduct", ctx, move |interrupt| {
                simulate_latency(interrupt, delay)?;
                Ok(Product {
                    id: generate_id(min_id, max_id),
                    name,
                    category,
                    price,
                    description,
                    in_stock: true,
                    quantity,
                    created_at: Some(now_rfc3339()),
                    updated_at: None,
                })
            })
            .await
    }

    pub async fn update_stock(
        &self,
        id: &str,
        update: StockUpdate,
        ctx: &CorrelationContext,
    ) -> Result<Product, ServiceError> {
        let id = require_id(id, "Product")?;
        let quantity = non_negative_quantity(update.quantity)?;

        tracing::info!(product_id = %id, quantity, "Updating product stock");
        let (fetch, update) = (self.config.fetch, self.config.update);
        self.data
            .run("updateProductStock", ctx, move |interrupt| {
                simulate_latency(interrupt, fetch)?;
                let mut product = find_product(&id)?;
                simulate_latency(interrupt, update)?;
                product.quantity = quantity;
                product.in_stock = quantity > 0;
                product.updated_at = Some(now_rfc3339());
                Ok(product)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DelayConfig, WorkerConfig};
    use crate::error::ErrorKind;
    use crate::execution::{BlockingExecutionBridge, WorkerPool};
    use crate::resilience::{CircuitBreaker, CircuitBreakerConfig};
    use std::sync::Arc;

    fn service() -> ProductService {
        let instant = DelayConfig::new(0, 0);
        let config = ServiceConfig {
            list: instant,
            fetch: instant,
            create_product: instant,
            update: instant,
            ..ServiceConfig::default()
        };
        let breaker = Arc::new(CircuitBreaker::new("database", CircuitBreakerConfig::default()));
        let bridge = BlockingExecutionBridge::new(WorkerPool::new(&WorkerConfig::default()));
        ProductService::new(DataAccess::new(breaker, bridge), config, ValidationConfig::default())
    }

    #[tokio::test]
    async fn test_get_and_list() {
        let svc = service();
        let ctx = CorrelationContext::create();
        assert_eq!(svc.get("1", &ctx).await.unwrap().name, "Widget");
        assert_eq!(svc.get("2", &ctx).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(svc.list(&ctx).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let svc = service();
        let ctx = CorrelationContext::create();

        let missing_price = NewProduct {
            name: Some("Lamp".into()),
            category: Some("Home".into()),
            ..Default::default()
        };
        assert_eq!(
            svc.create(missing_price.clone(), &ctx).await.unwrap_err().message(),
            "Product price must be greater than 0"
        );

        let created = svc
            .create(NewProduct { price: Some(19.5), quantity: Some(3), ..missing_price }, &ctx)
            .await
            .unwrap();
        assert_eq!(created.category, "Home");
        assert_eq!(created.quantity, 3);
    }

    #[tokio::test]
    async fn test_update_stock() {
        let svc = service();
        let ctx = CorrelationContext::create();

        let out = svc
            .update_stock("1", StockUpdate { quantity: Some(0) }, &ctx)
            .await
            .unwrap();
        assert!(!out.in_stock);

        let err = svc
            .update_stock("1", StockUpdate { quantity: Some(-1) }, &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Quantity cannot be negative");
        assert_eq!(
            svc.update_stock("1", StockUpdate::default(), &ctx).await.unwrap_err().status(),
            400
        );
    }
}
