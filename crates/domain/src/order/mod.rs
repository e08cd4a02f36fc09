//! Orders and their lines.

mod records;
mod status;

pub use records::{IdempotencyKey, NewOrder, NewOrderLine, Order, OrderLine};
pub use status::OrderStatus;
