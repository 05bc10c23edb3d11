use serde::{Deserialize, Serialize};

use storefront_core::{
    CategoryId, DomainError, DomainResult, Entity, Money, ProductId, RowVersion, Versioned,
};

/// Stock level at or below which a product counts as running low.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 5;

/// Storage shape of a product row.
///
/// Stores hydrate `Product` from this through [`Product::from_record`] so the
/// stock invariants are checked on every load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub stock_quantity: i32,
    pub category_id: CategoryId,
    pub low_stock_threshold: i32,
    pub row_version: RowVersion,
}

/// Entity: Product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    name: String,
    description: Option<String>,
    price: Money,
    stock_quantity: i32,
    category_id: CategoryId,
    low_stock_threshold: i32,
    row_version: RowVersion,
}

impl Product {
    /// Create a new, never-persisted product.
    pub fn new(
        id: ProductId,
        name: impl Into<String>,
        price: Money,
        stock_quantity: i32,
        category_id: CategoryId,
    ) -> DomainResult<Self> {
        Self::from_record(ProductRecord {
            id,
            name: name.into(),
            description: None,
            price,
            stock_quantity,
            category_id,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            row_version: RowVersion::INITIAL,
        })
    }

    /// Rehydrate a product from its stored row, enforcing invariants.
    pub fn from_record(record: ProductRecord) -> DomainResult<Self> {
        if record.name.trim().is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        if record.stock_quantity < 0 {
            return Err(DomainError::invariant(format!(
                "product {} has negative stock {}",
                record.id, record.stock_quantity
            )));
        }
        if record.low_stock_threshold < 0 {
            return Err(DomainError::validation("low stock threshold cannot be negative"));
        }

        Ok(Self {
            id: record.id,
            name: record.name,
            description: record.description,
            price: record.price,
            stock_quantity: record.stock_quantity,
            category_id: record.category_id,
            low_stock_threshold: record.low_stock_threshold,
            row_version: record.row_version,
        })
    }

    pub fn to_record(&self) -> ProductRecord {
        ProductRecord {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
            stock_quantity: self.stock_quantity,
            category_id: self.category_id,
            low_stock_threshold: self.low_stock_threshold,
            row_version: self.row_version,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_low_stock_threshold(mut self, threshold: i32) -> DomainResult<Self> {
        if threshold < 0 {
            return Err(DomainError::validation("low stock threshold cannot be negative"));
        }
        self.low_stock_threshold = threshold;
        Ok(self)
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn stock_quantity(&self) -> i32 {
        self.stock_quantity
    }

    pub fn category_id(&self) -> CategoryId {
        self.category_id
    }

    pub fn low_stock_threshold(&self) -> i32 {
        self.low_stock_threshold
    }

    pub fn has_stock_for(&self, quantity: i32) -> bool {
        quantity <= self.stock_quantity
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.low_stock_threshold
    }

    /// Remove `quantity` units from stock.
    ///
    /// Stock never goes negative: a decrement larger than the current stock is
    /// rejected and leaves the product untouched. The row version is not
    /// changed here; the store bumps it when the write is persisted.
    pub fn decrement_stock(&mut self, quantity: i32) -> DomainResult<()> {
        if quantity <= 0 {
            return Err(DomainError::validation(format!(
                "decrement quantity must be positive, got {quantity}"
            )));
        }
        if !self.has_stock_for(quantity) {
            return Err(DomainError::invariant(format!(
                "stock cannot go negative (product {}, stock {}, requested {})",
                self.id, self.stock_quantity, quantity
            )));
        }

        self.stock_quantity -= quantity;
        Ok(())
    }

    /// Whether stock moved from above the low-stock threshold to at or below
    /// it since it stood at `previous_stock`. Staying low is not a crossing.
    pub fn crossed_low_stock_since(&self, previous_stock: i32) -> bool {
        previous_stock > self.low_stock_threshold && self.is_low_stock()
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Versioned for Product {
    fn row_version(&self) -> RowVersion {
        self.row_version
    }
}
