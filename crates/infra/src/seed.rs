//! Demo catalog for local runs.

use rust_decimal::Decimal;

use storefront_catalog::Product;
use storefront_core::{CategoryId, Money, ProductId};

use crate::store::{CatalogStore, StoreError};

/// Insert the two demo products (Smartphone and Headphones) unless they
/// already exist. Existing rows are never overwritten, so restarting with
/// seeding enabled keeps the stock that orders have consumed.
///
/// Returns the products inserted by this call.
pub async fn seed_demo_catalog<C: CatalogStore + ?Sized>(catalog: &C) -> Result<Vec<Product>, StoreError> {
    let electronics = CategoryId::from_raw(1);
    let demo = [
        (1, "Smartphone", "Latest model smartphone", Decimal::new(69999, 2), 50),
        (2, "Headphones", "Noise-cancelling headphones", Decimal::new(19999, 2), 20),
    ];

    let mut seeded = Vec::with_capacity(demo.len());
    for (id, name, description, price, stock) in demo {
        let product_id = ProductId::from_raw(id);
        if catalog.get_product(product_id).await?.is_some() {
            tracing::debug!(product_id = %product_id, "demo product already present");
            continue;
        }

        let price = Money::new(price).map_err(|e| StoreError::Backend(e.to_string()))?;
        let product = Product::new(product_id, name, price, stock, electronics)
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .with_description(description);
        seeded.push(catalog.put_product(&product).await?);
    }

    if seeded.is_empty() {
        tracing::info!("demo catalog already seeded");
    } else {
        tracing::info!(products = seeded.len(), "demo catalog seeded");
    }
    Ok(seeded)
}
