//! A single cart line.

use common::{Money, ProductId};
use domain::Product;
use serde::{Deserialize, Serialize};

/// One product in the cart with its quantity.
///
/// The line carries the last known product so the live cart always quotes
/// the current price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product: Product,

    /// Always at least 1; a line that would drop below 1 is removed.
    pub quantity: u32,
}

impl CartLine {
    pub fn product_id(&self) -> &ProductId {
        &self.product.id
    }

    pub fn unit_price(&self) -> Money {
        self.product.price
    }

    /// Returns price × quantity at the current price.
    pub fn line_total(&self) -> Money {
        self.product.price.multiply(self.quantity)
    }
}
