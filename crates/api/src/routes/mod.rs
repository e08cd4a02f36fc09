pub mod cart;
pub mod checkout;
pub mod customers;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;
