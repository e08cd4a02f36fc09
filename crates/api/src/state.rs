//! Shared application state.

use checkout::{CommitMode, CustomerService, OrderAdmin, OrderPipeline};
use store::{CustomerStore, ProductCatalog, TransactionalOrderStore};

use crate::sessions::SessionRegistry;

/// Everything a store backend must provide to serve the API.
pub trait Backend:
    ProductCatalog + CustomerStore + TransactionalOrderStore + Clone + Send + Sync + 'static
{
}

impl<T> Backend for T where
    T: ProductCatalog + CustomerStore + TransactionalOrderStore + Clone + Send + Sync + 'static
{
}

/// Shared application state accessible from all handlers.
pub struct AppState<S: Backend> {
    pub store: S,
    pub pipeline: OrderPipeline<S>,
    pub customers: CustomerService<S>,
    pub admin: OrderAdmin<S>,
    pub sessions: SessionRegistry,
    pub commit_mode: CommitMode,
}

impl<S: Backend> AppState<S> {
    pub fn new(store: S, sessions: SessionRegistry, commit_mode: CommitMode) -> Self {
        Self {
            pipeline: OrderPipeline::new(store.clone()),
            customers: CustomerService::new(store.clone()),
            admin: OrderAdmin::new(store.clone()),
            store,
            sessions,
            commit_mode,
        }
    }
}
