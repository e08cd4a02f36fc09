//! Point-in-time copy of a cart used by checkout.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{Money, ProductId};
use domain::IdempotencyKey;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A cart line frozen at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotLine {
    pub product_id: ProductId,
    pub product_name: String,

    /// Unit price at the instant the snapshot was taken.
    pub unit_price: Money,

    pub quantity: u32,
}

impl SnapshotLine {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Immutable copy of a cart's lines.
///
/// Owns its data, so edits to the live cart after the snapshot was taken
/// never change what a commit writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    lines: Vec<SnapshotLine>,
    checkout_nonce: Uuid,
    taken_at: DateTime<Utc>,
}

impl CartSnapshot {
    /// Builds a snapshot from raw lines.
    ///
    /// Zero-quantity lines are dropped and repeated product ids are merged
    /// (keeping the first price seen) so the snapshot satisfies the same
    /// invariants as a cart.
    pub fn new(lines: Vec<SnapshotLine>, checkout_nonce: Uuid) -> Self {
        let mut merged: Vec<SnapshotLine> = Vec::with_capacity(lines.len());
        for line in lines.into_iter().filter(|l| l.quantity > 0) {
            match merged.iter_mut().find(|m| m.product_id == line.product_id) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(line.quantity)
                }
                None => merged.push(line),
            }
        }

        Self {
            lines: merged,
            checkout_nonce,
            taken_at: Utc::now(),
        }
    }

    pub fn lines(&self) -> &[SnapshotLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Sum of frozen line totals. This is the order total.
    pub fn total(&self) -> Money {
        self.lines.iter().map(SnapshotLine::line_total).sum()
    }

    pub fn total_items(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    pub fn checkout_nonce(&self) -> Uuid {
        self.checkout_nonce
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Derives the idempotency key for committing this snapshot.
    ///
    /// The key depends on the checkout nonce and on the line contents (in
    /// product-id order), so retrying the same cart in the same checkout
    /// cycle produces the same key while any edit produces a new one.
    pub fn idempotency_key(&self) -> IdempotencyKey {
        let ordered: BTreeMap<&ProductId, &SnapshotLine> =
            self.lines.iter().map(|l| (&l.product_id, l)).collect();

        let mut material = String::new();
        for (id, line) in ordered {
            material.push_str(&format!(
                "{}:{}:{}\n",
                id,
                line.quantity,
                line.unit_price.cents()
            ));
        }

        IdempotencyKey::derive(self.checkout_nonce, material.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, cents: i64, quantity: u32) -> SnapshotLine {
        SnapshotLine {
            product_id: ProductId::new(id),
            product_name: id.to_string(),
            unit_price: Money::from_cents(cents),
            quantity,
        }
    }

    #[test]
    fn total_sums_frozen_prices() {
        let snapshot = CartSnapshot::new(vec![line("A", 1000, 2), line("B", 500, 1)], Uuid::new_v4());
        assert_eq!(snapshot.total(), Money::from_cents(2500));
        assert_eq!(snapshot.total_items(), 3);
    }

    #[test]
    fn new_merges_duplicates_and_drops_empty_lines() {
        let snapshot = CartSnapshot::new(
            vec![line("A", 1000, 1), line("B", 500, 0), line("A", 1000, 2)],
            Uuid::new_v4(),
        );
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.lines()[0].quantity, 3);
    }

    #[test]
    fn idempotency_key_ignores_line_order() {
        let nonce = Uuid::new_v4();
        let a = CartSnapshot::new(vec![line("A", 1000, 2), line("B", 500, 1)], nonce);
        let b = CartSnapshot::new(vec![line("B", 500, 1), line("A", 1000, 2)], nonce);
        assert_eq!(a.idempotency_key(), b.idempotency_key());
    }

    #[test]
    fn idempotency_key_changes_with_contents_or_nonce() {
        let nonce = Uuid::new_v4();
        let base = CartSnapshot::new(vec![line("A", 1000, 2)], nonce);
        let more = CartSnapshot::new(vec![line("A", 1000, 3)], nonce);
        let repriced = CartSnapshot::new(vec![line("A", 1100, 2)], nonce);
        let other_cycle = CartSnapshot::new(vec![line("A", 1000, 2)], Uuid::new_v4());

        assert_ne!(base.idempotency_key(), more.idempotency_key());
        assert_ne!(base.idempotency_key(), repriced.idempotency_key());
        assert_ne!(base.idempotency_key(), other_cycle.idempotency_key());
    }
}
