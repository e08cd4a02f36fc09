//! Checkout of a live session cart.

use cart::{CartStore, SessionStorage};
use common::{CustomerId, OrderId};
use store::{CustomerStore, TransactionalOrderStore};
use tokio::sync::Mutex;

use crate::error::CommitError;
use crate::pipeline::OrderPipeline;

/// How a session checkout writes its records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommitMode {
    /// Independent writes in order; a failure can leave an orphaned order.
    #[default]
    Sequential,
    /// Sequential writes keyed by the cart snapshot, so a retry resumes
    /// the previous attempt.
    Idempotent,
    /// One store transaction.
    Atomic,
}

impl CommitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitMode::Sequential => "sequential",
            CommitMode::Idempotent => "idempotent",
            CommitMode::Atomic => "atomic",
        }
    }
}

impl std::fmt::Display for CommitMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CommitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(CommitMode::Sequential),
            "idempotent" => Ok(CommitMode::Idempotent),
            "atomic" => Ok(CommitMode::Atomic),
            other => Err(format!("unknown commit mode: {other:?}")),
        }
    }
}

/// Checks out the cart behind `cart`.
///
/// The cart lock is held only to take the snapshot and, after a successful
/// commit, to remove what was ordered. Edits made while the commit runs are
/// kept. Any failure leaves the cart untouched so the caller can retry.
pub async fn checkout_session<S, C>(
    pipeline: &OrderPipeline<S>,
    cart: &Mutex<CartStore<C>>,
    customer_id: CustomerId,
    shipping_address: &str,
    mode: CommitMode,
) -> Result<OrderId, CommitError>
where
    S: TransactionalOrderStore + CustomerStore,
    C: SessionStorage,
{
    let snapshot = cart.lock().await.snapshot();

    let order_id = match mode {
        CommitMode::Sequential => {
            pipeline
                .commit(customer_id, &snapshot, shipping_address)
                .await?
        }
        CommitMode::Idempotent => {
            let key = snapshot.idempotency_key();
            pipeline
                .commit_idempotent(&key, customer_id, &snapshot, shipping_address)
                .await?
        }
        CommitMode::Atomic => {
            pipeline
                .commit_atomic(customer_id, &snapshot, shipping_address)
                .await?
        }
    };

    // The lock was released during the commit; keep anything changed since.
    let mut cart = cart.lock().await;
    cart.remove_ordered(&snapshot);
    tracing::debug!(%order_id, remaining = cart.len(), "ordered lines removed from session cart");
    Ok(order_id)
}
