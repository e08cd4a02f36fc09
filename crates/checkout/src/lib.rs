//! Order commit pipeline.
//!
//! Turns an immutable [`cart::CartSnapshot`] into persisted order records
//! through a fixed sequence of store writes:
//!
//! 1. order (status `pending`, total frozen from the snapshot)
//! 2. order lines (one write for all lines)
//! 3. payment (`pending`, credit card, amount = order total)
//! 4. shipment (`processing`, fresh tracking number)
//!
//! Plain [`OrderPipeline::commit`] stops at the first failing step and
//! reports which order, if any, was left behind. [`OrderPipeline::commit_idempotent`]
//! resumes such an order on retry and [`OrderPipeline::commit_atomic`]
//! writes everything in one store transaction.

pub mod admin;
pub mod customers;
pub mod error;
pub mod pipeline;
pub mod session;

pub use admin::OrderAdmin;
pub use customers::CustomerService;
pub use error::{AdminError, CommitError, CommitStep, CustomerError, ValidationError};
pub use pipeline::{CommitRecord, OrderPipeline};
pub use session::{CommitMode, checkout_session};
