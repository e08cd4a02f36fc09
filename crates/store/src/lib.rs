pub mod error;
pub mod memory;
pub mod postgres;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use traits::{BundleLine, CustomerStore, OrderBundle, OrderStore, ProductCatalog, TransactionalOrderStore};
