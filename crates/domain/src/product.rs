//! Catalog product as seen by the cart.

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

/// A product offered by the store.
///
/// Products are owned by the catalog collaborator. The core reads them to
/// price cart lines; `inventory_count` is display data and is never
/// enforced when adding to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,

    /// Current unit price.
    pub price: Money,

    pub image_url: Option<String>,
    pub category: Option<String>,

    /// Units on hand; `None` means stock is not tracked.
    pub inventory_count: Option<u32>,
}

impl Product {
    /// Creates a product with a name and price and no optional attributes.
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Money) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            price,
            image_url: None,
            category: None,
            inventory_count: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_inventory(mut self, count: u32) -> Self {
        self.inventory_count = Some(count);
        self
    }

    /// Returns true when stock is tracked and has run out.
    pub fn is_out_of_stock(&self) -> bool {
        self.inventory_count == Some(0)
    }
}
