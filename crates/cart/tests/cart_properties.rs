//! Behavioural tests for the session cart across reloads and long edit sequences.

use cart::{CART_STORAGE_KEY, CartStore, InMemorySessionStorage, SessionStorage};
use common::{Money, ProductId};
use domain::Product;
use proptest::prelude::*;

fn catalog() -> Vec<Product> {
    vec![
        Product::new("SKU-001", "Widget", Money::from_cents(1000)),
        Product::new("SKU-002", "Gadget", Money::from_cents(500)),
        Product::new("SKU-003", "Gizmo", Money::from_cents(2599)),
        Product::new("SKU-004", "Doohickey", Money::from_cents(1)),
    ]
}

fn assert_invariants<S: SessionStorage>(cart: &CartStore<S>) {
    let mut seen: Vec<&ProductId> = Vec::new();
    for line in cart.lines() {
        assert!(line.quantity >= 1, "line {} has quantity 0", line.product.id);
        assert!(!seen.contains(&&line.product.id), "duplicate line {}", line.product.id);
        seen.push(&line.product.id);
    }

    let expected: Money = cart
        .lines()
        .iter()
        .map(|l| l.product.price.multiply(l.quantity))
        .sum();
    assert_eq!(cart.subtotal(), expected);
}

/// One cart edit, referring to a catalog product by index.
#[derive(Debug, Clone)]
enum Edit {
    Add { product: usize, quantity: u32 },
    Update { product: usize, quantity: i64 },
    Remove { product: usize },
    Clear,
}

fn arb_edit() -> impl Strategy<Value = Edit> {
    let product = 0..catalog().len();
    prop_oneof![
        4 => (product.clone(), 0..4u32).prop_map(|(product, quantity)| Edit::Add { product, quantity }),
        2 => (product.clone(), -3..5i64).prop_map(|(product, quantity)| Edit::Update { product, quantity }),
        2 => product.prop_map(|product| Edit::Remove { product }),
        1 => Just(Edit::Clear),
    ]
}

fn apply<S: SessionStorage>(cart: &mut CartStore<S>, products: &[Product], edit: &Edit) {
    match *edit {
        Edit::Add { product, quantity } => {
            let result = cart.add_item(products[product].clone(), quantity);
            assert_eq!(result.is_err(), quantity == 0);
        }
        Edit::Update { product, quantity } => cart.update_quantity(&products[product].id, quantity),
        Edit::Remove { product } => cart.remove_item(&products[product].id),
        Edit::Clear => cart.clear(),
    }
}

proptest! {
    #[test]
    fn prop_invariants_hold_over_edit_sequences(edits in prop::collection::vec(arb_edit(), 0..200)) {
        let products = catalog();
        let storage = InMemorySessionStorage::new();
        let mut cart = CartStore::new(storage.clone());

        for edit in &edits {
            apply(&mut cart, &products, edit);
            assert_invariants(&cart);
        }

        let restored = CartStore::restore(storage, &products);
        prop_assert_eq!(restored.subtotal(), cart.subtotal());
        prop_assert_eq!(restored.total_items(), cart.total_items());
        prop_assert_eq!(restored.checkout_nonce(), cart.checkout_nonce());
    }

    #[test]
    fn prop_add_then_remove_restores_subtotal(
        edits in prop::collection::vec(arb_edit(), 0..50),
        product in 0..4usize,
        quantity in 1..10u32,
    ) {
        let products = catalog();
        let mut cart = CartStore::new(InMemorySessionStorage::new());
        for edit in &edits {
            apply(&mut cart, &products, edit);
        }
        let before = cart.subtotal();
        let prior_quantity = cart.line(&products[product].id).map(|l| l.quantity);

        cart.add_item(products[product].clone(), quantity).unwrap();
        match prior_quantity {
            Some(q) => cart.update_quantity(&products[product].id, i64::from(q)),
            None => cart.remove_item(&products[product].id),
        }
        prop_assert_eq!(cart.subtotal(), before);
    }
}

#[test]
fn test_restore_reproduces_lines_in_order() {
    let products = catalog();
    let storage = InMemorySessionStorage::new();
    let mut cart = CartStore::new(storage.clone());
    cart.add_item(products[2].clone(), 1).unwrap();
    cart.add_item(products[0].clone(), 2).unwrap();

    let restored = CartStore::restore(storage, &products);
    let ids: Vec<&str> = restored.lines().iter().map(|l| l.product.id.as_str()).collect();
    assert_eq!(ids, vec!["SKU-003", "SKU-001"]);
    assert_eq!(restored.subtotal(), Money::from_cents(4599));
}

#[test]
fn test_restore_from_empty_or_malformed_storage_is_empty() {
    let products = catalog();

    let empty = CartStore::restore(InMemorySessionStorage::new(), &products);
    assert!(empty.is_empty());

    let storage = InMemorySessionStorage::new();
    storage.set(CART_STORAGE_KEY, "{ definitely not a cart").unwrap();
    let malformed = CartStore::restore(storage, &products);
    assert!(malformed.is_empty());
    assert!(malformed.subtotal().is_zero());
}

#[test]
fn test_restore_repairs_bad_entries() {
    let products = catalog();
    let storage = InMemorySessionStorage::new();
    storage
        .set(
            CART_STORAGE_KEY,
            r#"[{"productId":"SKU-001","quantity":1},
                {"productId":"GONE","quantity":4},
                {"productId":"SKU-002","quantity":0},
                {"productId":"SKU-001","quantity":2}]"#,
        )
        .unwrap();

    let cart = CartStore::restore(storage.clone(), &products);
    assert_eq!(cart.len(), 1);
    assert_eq!(cart.total_items(), 3);
    assert_invariants(&cart);

    assert_eq!(
        storage.raw(CART_STORAGE_KEY).as_deref(),
        Some(r#"[{"productId":"SKU-001","quantity":3}]"#)
    );
}

#[test]
fn test_restore_prices_lines_from_current_catalog() {
    let mut products = catalog();
    let storage = InMemorySessionStorage::new();
    let mut cart = CartStore::new(storage.clone());
    cart.add_item(products[0].clone(), 2).unwrap();

    products[0].price = Money::from_cents(1250);
    let restored = CartStore::restore(storage, &products);
    assert_eq!(restored.subtotal(), Money::from_cents(2500));
}

#[test]
fn test_failed_write_is_invisible_to_user_and_recovers_on_next_mutation() {
    let products = catalog();
    let storage = InMemorySessionStorage::new();
    let mut cart = CartStore::new(storage.clone());
    cart.add_item(products[0].clone(), 1).unwrap();

    storage.set_fail_on_write(true);
    cart.add_item(products[1].clone(), 1).unwrap();
    assert_eq!(cart.len(), 2);
    assert!(cart.needs_persist());

    // Storage still holds the last good state.
    let stale = CartStore::restore(storage.clone(), &products);
    assert_eq!(stale.len(), 1);

    storage.set_fail_on_write(false);
    cart.update_quantity(&products[1].id, 3);
    assert!(!cart.needs_persist());

    let reloaded = CartStore::restore(storage, &products);
    assert_eq!(reloaded.total_items(), 4);
    assert_eq!(reloaded.subtotal(), cart.subtotal());
}

#[test]
fn test_unreadable_storage_restores_empty_cart() {
    let products = catalog();
    let storage = InMemorySessionStorage::new();
    let mut cart = CartStore::new(storage.clone());
    cart.add_item(products[0].clone(), 1).unwrap();

    storage.set_fail_on_read(true);
    let restored = CartStore::restore(storage, &products);
    assert!(restored.is_empty());
}

#[test]
fn test_clear_survives_reload_with_new_nonce() {
    let products = catalog();
    let storage = InMemorySessionStorage::new();
    let mut cart = CartStore::new(storage.clone());
    cart.add_item(products[0].clone(), 2).unwrap();
    let first_cycle = cart.snapshot().idempotency_key();

    cart.clear();
    let reloaded = CartStore::restore(storage, &products);
    assert!(reloaded.is_empty());
    assert_eq!(reloaded.checkout_nonce(), cart.checkout_nonce());

    cart.add_item(products[0].clone(), 2).unwrap();
    assert_ne!(cart.snapshot().idempotency_key(), first_cycle);
}
