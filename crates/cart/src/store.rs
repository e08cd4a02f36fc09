//! The session cart.

use std::collections::HashMap;

use common::{Money, ProductId};
use domain::Product;
use uuid::Uuid;

use crate::error::CartError;
use crate::line::CartLine;
use crate::persist::{
    CART_NONCE_STORAGE_KEY, CART_STORAGE_KEY, PersistedLine, decode_lines, decode_nonce,
    encode_lines,
};
use crate::snapshot::{CartSnapshot, SnapshotLine};
use crate::storage::SessionStorage;

/// Authoritative cart of one client session.
///
/// Invariants maintained by every operation:
/// - at most one line per product id
/// - every line has quantity ≥ 1
///
/// `subtotal` and `total_items` are derived from the lines on each call and
/// never cached. Every mutation rewrites the persisted state synchronously;
/// persistence failures are logged and retried on the next write.
#[derive(Debug)]
pub struct CartStore<S: SessionStorage> {
    lines: Vec<CartLine>,
    checkout_nonce: Uuid,
    storage: S,
    needs_persist: bool,
}

impl<S: SessionStorage> CartStore<S> {
    /// Creates an empty cart backed by `storage`.
    pub fn new(storage: S) -> Self {
        Self {
            lines: Vec::new(),
            checkout_nonce: Uuid::new_v4(),
            storage,
            needs_persist: false,
        }
    }

    /// Reads the persisted entries without resolving products.
    ///
    /// Callers use this to find out which products to fetch before calling
    /// [`CartStore::restore`]. Missing or malformed data yields no entries.
    pub fn load_entries(storage: &S) -> Vec<PersistedLine> {
        read_entries(storage).unwrap_or_default()
    }

    /// Restores the cart persisted in `storage`.
    ///
    /// `products` supplies the current catalog entry for each persisted id.
    /// Entries for unknown products or with zero quantity are dropped and
    /// repeated ids are merged. If anything had to be repaired the cleaned
    /// state is written back.
    pub fn restore(storage: S, products: &[Product]) -> Self {
        // Storage that failed to read is never written back here.
        let entries = read_entries(&storage);
        let readable = entries.is_some();
        let entries = entries.unwrap_or_default();
        let known: HashMap<&ProductId, &Product> = products.iter().map(|p| (&p.id, p)).collect();

        let checkout_nonce = match storage.get(CART_NONCE_STORAGE_KEY) {
            Ok(Some(raw)) => decode_nonce(&raw),
            _ => None,
        };

        let mut cart = Self {
            lines: Vec::with_capacity(entries.len()),
            checkout_nonce: checkout_nonce.unwrap_or_else(Uuid::new_v4),
            storage,
            needs_persist: readable && checkout_nonce.is_none(),
        };

        let mut repaired = false;
        for entry in &entries {
            let Some(product) = known.get(&entry.product_id) else {
                tracing::debug!(product_id = %entry.product_id, "dropping cart entry for unknown product");
                repaired = true;
                continue;
            };
            if entry.quantity == 0 {
                repaired = true;
                continue;
            }
            match cart.position(&entry.product_id) {
                Some(idx) => {
                    repaired = true;
                    cart.lines[idx].quantity = cart.lines[idx].quantity.saturating_add(entry.quantity);
                }
                None => cart.lines.push(CartLine {
                    product: (*product).clone(),
                    quantity: entry.quantity,
                }),
            }
        }

        tracing::debug!(lines = cart.lines.len(), repaired, "cart restored");
        if repaired || cart.needs_persist {
            cart.persist();
        }
        cart
    }

    // Queries

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.product.id == product_id)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of price × quantity over the current lines at current prices.
    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Sum of quantities, used for the cart badge.
    pub fn total_items(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    pub fn checkout_nonce(&self) -> Uuid {
        self.checkout_nonce
    }

    /// Returns true while the persisted state lags behind memory.
    pub fn needs_persist(&self) -> bool {
        self.needs_persist
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Copies the current lines into an immutable snapshot.
    pub fn snapshot(&self) -> CartSnapshot {
        let lines = self
            .lines
            .iter()
            .map(|l| SnapshotLine {
                product_id: l.product.id.clone(),
                product_name: l.product.name.clone(),
                unit_price: l.product.price,
                quantity: l.quantity,
            })
            .collect();
        CartSnapshot::new(lines, self.checkout_nonce)
    }

    // Mutations

    /// Adds `quantity` units of `product`.
    ///
    /// An existing line is incremented and picks up the supplied product
    /// details; otherwise a new line is appended. Inventory is not checked.
    pub fn add_item(&mut self, product: Product, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity });
        }

        match self.position(&product.id) {
            Some(idx) => {
                let line = &mut self.lines[idx];
                line.quantity = line.quantity.saturating_add(quantity);
                line.product = product;
            }
            None => self.lines.push(CartLine { product, quantity }),
        }

        self.persist();
        Ok(())
    }

    /// Sets the quantity of a line. Values ≤ 0 remove the line; unknown ids
    /// are ignored.
    pub fn update_quantity(&mut self, product_id: &ProductId, new_quantity: i64) {
        let Some(idx) = self.position(product_id) else {
            return;
        };

        if new_quantity <= 0 {
            self.lines.remove(idx);
        } else {
            self.lines[idx].quantity = u32::try_from(new_quantity).unwrap_or(u32::MAX);
        }
        self.persist();
    }

    /// Removes a line if present.
    pub fn remove_item(&mut self, product_id: &ProductId) {
        if let Some(idx) = self.position(product_id) {
            self.lines.remove(idx);
            self.persist();
        }
    }

    /// Empties the cart and starts a new checkout cycle.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.checkout_nonce = Uuid::new_v4();
        self.persist();
    }

    /// Removes what `snapshot` ordered and starts a new checkout cycle.
    ///
    /// Each snapshot line's quantity is subtracted from the matching cart
    /// line; lines that reach zero are dropped. Products added or quantities
    /// raised after the snapshot was taken stay in the cart.
    pub fn remove_ordered(&mut self, snapshot: &CartSnapshot) {
        for ordered in snapshot.lines() {
            let Some(idx) = self.position(&ordered.product_id) else {
                continue;
            };
            let remaining = self.lines[idx].quantity.saturating_sub(ordered.quantity);
            if remaining == 0 {
                self.lines.remove(idx);
            } else {
                self.lines[idx].quantity = remaining;
            }
        }
        self.checkout_nonce = Uuid::new_v4();
        self.persist();
    }

    /// Refreshes product details of lines whose product appears in
    /// `products`. Returns how many lines changed price.
    pub fn reprice(&mut self, products: &[Product]) -> usize {
        let mut changed = 0;
        for line in &mut self.lines {
            if let Some(current) = products.iter().find(|p| p.id == line.product.id) {
                if current.price != line.product.price {
                    changed += 1;
                }
                line.product = current.clone();
            }
        }
        changed
    }

    /// Retries persistence. Returns true if storage now matches memory.
    pub fn flush(&mut self) -> bool {
        if self.needs_persist {
            self.persist();
        }
        !self.needs_persist
    }

    fn position(&self, product_id: &ProductId) -> Option<usize> {
        self.lines.iter().position(|l| &l.product.id == product_id)
    }

    fn persist(&mut self) {
        let entries: Vec<PersistedLine> = self
            .lines
            .iter()
            .map(|l| PersistedLine {
                product_id: l.product.id.clone(),
                quantity: l.quantity,
            })
            .collect();

        let result = encode_lines(&entries)
            .map_err(|e| e.to_string())
            .and_then(|raw| {
                self.storage
                    .set(CART_STORAGE_KEY, &raw)
                    .map_err(|e| e.to_string())
            })
            .and_then(|()| {
                self.storage
                    .set(CART_NONCE_STORAGE_KEY, &self.checkout_nonce.to_string())
                    .map_err(|e| e.to_string())
            });

        match result {
            Ok(()) => {
                if self.needs_persist {
                    tracing::info!(lines = entries.len(), "cart persistence recovered");
                }
                self.needs_persist = false;
            }
            Err(error) => {
                metrics::counter!("cart_persist_failures_total").increment(1);
                tracing::warn!(%error, lines = entries.len(), "failed to persist cart, keeping in-memory state");
                self.needs_persist = true;
            }
        }
    }
}

/// Returns `None` only when storage itself failed; malformed data reads as
/// an empty cart.
fn read_entries<S: SessionStorage>(storage: &S) -> Option<Vec<PersistedLine>> {
    match storage.get(CART_STORAGE_KEY) {
        Ok(Some(raw)) => Some(decode_lines(&raw).unwrap_or_else(|| {
            tracing::warn!(key = CART_STORAGE_KEY, "persisted cart is malformed, starting empty");
            Vec::new()
        })),
        Ok(None) => Some(Vec::new()),
        Err(e) => {
            tracing::warn!(error = %e, "could not read persisted cart, starting empty");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemorySessionStorage;

    fn product(id: &str, cents: i64) -> Product {
        Product::new(id, format!("Product {id}"), Money::from_cents(cents))
    }

    fn cart() -> CartStore<InMemorySessionStorage> {
        CartStore::new(InMemorySessionStorage::new())
    }

    #[test]
    fn test_add_new_and_existing_product() {
        let mut cart = cart();
        cart.add_item(product("A", 1000), 1).unwrap();
        cart.add_item(product("A", 1000), 2).unwrap();
        cart.add_item(product("B", 500), 1).unwrap();

        assert_eq!(cart.len(), 2);
        assert_eq!(cart.line(&"A".into()).unwrap().quantity, 3);
        assert_eq!(cart.total_items(), 4);
        assert_eq!(cart.subtotal(), Money::from_cents(3500));
    }

    #[test]
    fn test_add_zero_quantity_is_rejected() {
        let mut cart = cart();
        let err = cart.add_item(product("A", 1000), 0).unwrap_err();
        assert_eq!(err, CartError::InvalidQuantity { quantity: 0 });
        assert!(cart.is_empty());
    }

    #[test]
    fn test_add_refreshes_price_of_existing_line() {
        let mut cart = cart();
        cart.add_item(product("A", 1000), 1).unwrap();
        cart.add_item(product("A", 1200), 1).unwrap();
        assert_eq!(cart.subtotal(), Money::from_cents(2400));
    }

    #[test]
    fn test_update_quantity_sets_not_increments() {
        let mut cart = cart();
        cart.add_item(product("A", 1000), 2).unwrap();
        cart.update_quantity(&"A".into(), 5);
        assert_eq!(cart.line(&"A".into()).unwrap().quantity, 5);
    }

    #[test]
    fn test_update_quantity_zero_or_negative_removes() {
        let mut cart = cart();
        cart.add_item(product("A", 1000), 2).unwrap();
        cart.add_item(product("B", 500), 2).unwrap();

        cart.update_quantity(&"A".into(), 0);
        cart.update_quantity(&"B".into(), -5);
        assert!(cart.is_empty());
        assert!(cart.subtotal().is_zero());
    }

    #[test]
    fn test_decrement_from_one_removes_line() {
        let mut cart = cart();
        cart.add_item(product("A", 1000), 1).unwrap();
        let qty = i64::from(cart.line(&"A".into()).unwrap().quantity);
        cart.update_quantity(&"A".into(), qty - 1);
        assert!(cart.line(&"A".into()).is_none());
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let mut cart = cart();
        cart.add_item(product("A", 1000), 1).unwrap();
        cart.update_quantity(&"Z".into(), 3);
        cart.remove_item(&"Z".into());
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.total_items(), 1);
    }

    #[test]
    fn test_clear_rotates_nonce() {
        let mut cart = cart();
        cart.add_item(product("A", 1000), 1).unwrap();
        let before = cart.checkout_nonce();

        cart.clear();
        assert!(cart.is_empty());
        assert!(cart.subtotal().is_zero());
        assert_ne!(cart.checkout_nonce(), before);
    }

    #[test]
    fn test_remove_ordered_keeps_later_additions() {
        let mut cart = cart();
        cart.add_item(product("A", 1000), 2).unwrap();
        cart.add_item(product("B", 500), 1).unwrap();
        let snapshot = cart.snapshot();
        let before = cart.checkout_nonce();

        cart.add_item(product("A", 1000), 3).unwrap();
        cart.add_item(product("C", 250), 1).unwrap();
        cart.remove_ordered(&snapshot);

        assert_eq!(cart.len(), 2);
        assert_eq!(cart.line(&"A".into()).unwrap().quantity, 3);
        assert!(cart.line(&"B".into()).is_none());
        assert_eq!(cart.line(&"C".into()).unwrap().quantity, 1);
        assert_ne!(cart.checkout_nonce(), before);
    }

    #[test]
    fn test_remove_ordered_tolerates_lines_changed_since_snapshot() {
        let mut cart = cart();
        cart.add_item(product("A", 1000), 4).unwrap();
        cart.add_item(product("B", 500), 1).unwrap();
        let snapshot = cart.snapshot();

        cart.update_quantity(&"A".into(), 1);
        cart.remove_item(&"B".into());
        cart.remove_ordered(&snapshot);

        assert!(cart.is_empty());
        assert!(!cart.needs_persist());
    }

    #[test]
    fn test_remove_ordered_with_unchanged_cart_empties_it() {
        let mut cart = cart();
        cart.add_item(product("A", 1000), 2).unwrap();
        let snapshot = cart.snapshot();

        cart.remove_ordered(&snapshot);
        assert!(cart.is_empty());
        assert_eq!(cart.storage().raw(CART_STORAGE_KEY).as_deref(), Some("[]"));
    }

    #[test]
    fn test_add_then_remove_restores_subtotal_exactly() {
        let mut cart = cart();
        cart.add_item(product("A", 1999), 3).unwrap();
        cart.add_item(product("B", 333), 7).unwrap();
        let before = cart.subtotal();

        cart.add_item(product("C", 4567), 2).unwrap();
        cart.remove_item(&"C".into());
        assert_eq!(cart.subtotal(), before);
    }

    #[test]
    fn test_adding_then_taking_back_units_of_existing_line_restores_subtotal() {
        let mut cart = cart();
        cart.add_item(product("A", 1999), 3).unwrap();
        cart.add_item(product("B", 333), 7).unwrap();
        let before = cart.subtotal();

        cart.add_item(product("B", 333), 2).unwrap();
        assert_eq!(cart.subtotal(), before + Money::from_cents(666));
        cart.update_quantity(&"B".into(), 7);
        assert_eq!(cart.subtotal(), before);
    }

    #[test]
    fn test_reprice_updates_live_prices_only_for_known_products() {
        let mut cart = cart();
        cart.add_item(product("A", 1000), 2).unwrap();
        cart.add_item(product("B", 500), 1).unwrap();

        let changed = cart.reprice(&[product("A", 900), product("C", 1)]);
        assert_eq!(changed, 1);
        assert_eq!(cart.subtotal(), Money::from_cents(2300));
    }

    #[test]
    fn test_snapshot_is_detached_from_cart() {
        let mut cart = cart();
        cart.add_item(product("A", 1000), 2).unwrap();
        let snapshot = cart.snapshot();

        cart.add_item(product("A", 1000), 5).unwrap();
        cart.reprice(&[product("A", 1)]);

        assert_eq!(snapshot.lines()[0].quantity, 2);
        assert_eq!(snapshot.total(), Money::from_cents(2000));
        assert_eq!(snapshot.checkout_nonce(), cart.checkout_nonce());
    }

    #[test]
    fn test_every_mutation_is_persisted() {
        let storage = InMemorySessionStorage::new();
        let mut cart = CartStore::new(storage.clone());

        cart.add_item(product("A", 1000), 2).unwrap();
        assert_eq!(
            storage.raw(CART_STORAGE_KEY).as_deref(),
            Some(r#"[{"productId":"A","quantity":2}]"#)
        );

        cart.update_quantity(&"A".into(), 0);
        assert_eq!(storage.raw(CART_STORAGE_KEY).as_deref(), Some("[]"));
    }

    #[test]
    fn test_storage_failure_is_swallowed_and_reconciled() {
        let storage = InMemorySessionStorage::new();
        let mut cart = CartStore::new(storage.clone());

        storage.set_fail_on_write(true);
        cart.add_item(product("A", 1000), 2).unwrap();
        assert_eq!(cart.total_items(), 2);
        assert!(cart.needs_persist());
        assert!(storage.raw(CART_STORAGE_KEY).is_none());
        assert!(!cart.flush());

        storage.set_fail_on_write(false);
        assert!(cart.flush());
        assert!(!cart.needs_persist());
        assert_eq!(
            storage.raw(CART_STORAGE_KEY).as_deref(),
            Some(r#"[{"productId":"A","quantity":2}]"#)
        );
    }
}
