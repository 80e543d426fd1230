//! Shopping cart store.
//!
//! Holds the ordered line items of the active session. A line item is
//! identified by its [`LineKey`] (`product id`, size, color): adding an item
//! whose key is already present accumulates quantity on the existing entry
//! instead of inserting a duplicate. Display fields of the first add win.
//!
//! Persisted under `"cart"` as
//! `{"state": {"cart": [...], "hasHydrated": bool}, "version": 0}`.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use woodmoon_core::{Price, ProductId};

use crate::storage::Storage;
use crate::store::{Change, PersistOptions, PersistedStore, Subscription};

/// Storage key of the cart snapshot.
pub const CART_STORAGE_KEY: &str = "cart";

const fn default_quantity() -> u32 {
    1
}

/// One distinct purchasable configuration in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    pub id: ProductId,
    #[serde(default)]
    pub name: String,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_color: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Image reference per color. Display only.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub images: BTreeMap<String, String>,
}

impl CartLineItem {
    /// A line item with quantity 1 and no variant selected.
    #[must_use]
    pub fn new(id: ProductId, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            selected_size: None,
            selected_color: None,
            quantity: default_quantity(),
            image_url: None,
            images: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.selected_size = Some(size.into());
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.selected_color = Some(color.into());
        self
    }

    #[must_use]
    pub const fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    #[must_use]
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// The identity key deciding whether two entries are the same line.
    #[must_use]
    pub fn key(&self) -> LineKey<'_> {
        LineKey {
            id: self.id,
            selected_size: self.selected_size.as_deref(),
            selected_color: self.selected_color.as_deref(),
        }
    }

    /// `price * quantity`, saturating at the `Decimal` bounds.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price.saturating_mul(Decimal::from(self.quantity))
    }

    /// Image to show: explicit URL, else the selected color's image, else any image.
    #[must_use]
    pub fn display_image(&self) -> Option<&str> {
        self.image_url
            .as_deref()
            .or_else(|| {
                self.selected_color
                    .as_ref()
                    .and_then(|color| self.images.get(color))
                    .map(String::as_str)
            })
            .or_else(|| self.images.values().next().map(String::as_str))
    }
}

/// Identity key of a line item: `(id, selectedSize, selectedColor)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineKey<'a> {
    pub id: ProductId,
    pub selected_size: Option<&'a str>,
    pub selected_color: Option<&'a str>,
}

/// Items to load into a freshly constructed cart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartSnapshot {
    pub items: Vec<CartLineItem>,
}

impl From<Vec<CartLineItem>> for CartSnapshot {
    fn from(items: Vec<CartLineItem>) -> Self {
        Self { items }
    }
}

/// Cart store state, serialized as-is into the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartState {
    #[serde(default)]
    pub cart: Vec<CartLineItem>,
    #[serde(default)]
    pub has_hydrated: bool,
}

impl CartState {
    fn position(&self, key: LineKey<'_>) -> Option<usize> {
        self.cart.iter().position(|line| line.key() == key)
    }
}

/// Ordered, key-deduplicated cart with durable persistence.
#[derive(Debug, Clone)]
pub struct CartStore {
    store: PersistedStore<CartState>,
}

impl CartStore {
    /// An empty cart that has not read its snapshot yet.
    ///
    /// Until it hydrates, mutations stay in memory so the stored snapshot is
    /// not overwritten before it has been read.
    #[must_use]
    pub(crate) fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            store: PersistedStore::new(
                CartState::default(),
                storage,
                PersistOptions::new(CART_STORAGE_KEY),
            ),
        }
    }

    /// Create the cart and load its persisted snapshot.
    #[must_use]
    pub fn open(storage: Arc<dyn Storage>) -> Self {
        let cart = Self::new(storage);
        cart.rehydrate();
        cart
    }

    /// Add `item`, merging into an existing line with the same key.
    ///
    /// A quantity of 0 counts as unspecified, i.e. 1. On merge only the
    /// quantity of the existing line changes.
    pub fn add_to_cart(&self, item: CartLineItem) {
        let quantity = item.quantity.max(1);
        tracing::debug!(product_id = %item.id, quantity, "Adding to cart");

        self.mutate(move |state| match state.position(item.key()) {
            Some(index) => {
                if let Some(line) = state.cart.get_mut(index) {
                    line.quantity = line.quantity.saturating_add(quantity);
                }
            }
            None => state.cart.push(CartLineItem { quantity, ..item }),
        });
    }

    /// Remove the line whose key matches `item`. Quantity is ignored.
    ///
    /// Removing an item that is not in the cart changes nothing.
    pub fn remove_from_cart(&self, item: &CartLineItem) {
        tracing::debug!(product_id = %item.id, "Removing from cart");
        let key = item.key();
        self.mutate(|state| state.cart.retain(|line| line.key() != key));
    }

    /// Empty the cart.
    pub fn clear_cart(&self) {
        tracing::debug!("Clearing cart");
        self.mutate(|state| state.cart.clear());
    }

    /// Load `snapshot` as the cart's initial content.
    ///
    /// Only the first call has an effect: it replaces the items, marks the
    /// cart hydrated, persists and notifies. Later calls return `false`.
    pub fn hydrate(&self, snapshot: CartSnapshot) -> bool {
        let count = snapshot.items.len();
        let change = self.store.update(move |state| {
            if state.has_hydrated {
                return Change::Unchanged;
            }
            state.cart = snapshot.items;
            state.has_hydrated = true;
            Change::Persisted
        });

        if change == Change::Unchanged {
            tracing::debug!("Cart already hydrated, ignoring snapshot");
            return false;
        }
        tracing::debug!(items = count, "Cart hydrated");
        true
    }

    /// Load the snapshot persisted under `"cart"`, once per process.
    ///
    /// When nothing usable is stored the cart is still marked hydrated, with
    /// whatever items it already holds.
    pub fn rehydrate(&self) {
        if !self.hydrate_from_storage() {
            self.finish_hydration();
        }
    }

    /// Hydrate from the `"cart"` snapshot if one is usable.
    ///
    /// Returns `false` when the cart was already hydrated or nothing usable
    /// is stored; the hydration flag is left alone in that case.
    pub(crate) fn hydrate_from_storage(&self) -> bool {
        if self.has_hydrated() {
            return false;
        }
        self.store
            .load_persisted()
            .is_some_and(|persisted| self.hydrate(CartSnapshot::from(persisted.cart)))
    }

    /// Mark the cart hydrated without writing. The stored snapshot may be
    /// unreadable rather than absent, so it is left for the next mutation.
    pub(crate) fn finish_hydration(&self) {
        let change = self.store.update(|state| {
            if state.has_hydrated {
                return Change::Unchanged;
            }
            state.has_hydrated = true;
            Change::InMemory
        });
        if change != Change::Unchanged {
            tracing::debug!("No persisted cart, starting empty");
        }
    }

    /// Whether the persisted snapshot has been loaded. Never reverts to `false`.
    #[must_use]
    pub fn has_hydrated(&self) -> bool {
        self.store.with(|state| state.has_hydrated)
    }

    /// The line items, in insertion order.
    #[must_use]
    pub fn items(&self) -> Vec<CartLineItem> {
        self.store.with(|state| state.cart.clone())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.with(|state| state.cart.is_empty())
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.store.with(|state| state.cart.len())
    }

    /// Total quantity across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.store
            .with(|state| state.cart.iter().map(|line| u64::from(line.quantity)).sum::<u64>())
    }

    /// Sum of `price * quantity` over all lines, saturating at the `Decimal` bounds.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        let amount = self.store.with(|state| {
            state
                .cart
                .iter()
                .map(CartLineItem::line_total)
                .fold(Decimal::ZERO, Decimal::saturating_add)
        });
        Price::lkr(amount)
    }

    /// Apply a line mutation; it is persisted only once the cart has hydrated.
    fn mutate(&self, mutation: impl FnOnce(&mut CartState)) {
        self.store.update(|state| {
            mutation(state);
            if state.has_hydrated {
                Change::Persisted
            } else {
                Change::InMemory
            }
        });
    }

    /// Register a listener called with `(new, previous)` after every change.
    #[must_use = "dropping the subscription unsubscribes the listener"]
    pub fn subscribe(
        &self,
        listener: impl Fn(&CartState, &CartState) + Send + Sync + 'static,
    ) -> Subscription {
        self.store.subscribe(listener)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, StorageError};

    /// Storage whose reads always fail with an I/O error.
    #[derive(Debug, Clone, Default)]
    struct UnreadableStorage {
        writes: Arc<std::sync::atomic::AtomicUsize>,
    }

    impl Storage for UnreadableStorage {
        fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Io {
                key: key.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            })
        }

        fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            self.writes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }

        fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    fn item(id: i64) -> CartLineItem {
        CartLineItem::new(ProductId::new(id), format!("Product {id}"), Decimal::new(1000, 0))
    }

    fn cart() -> (CartStore, MemoryStorage) {
        let storage = MemoryStorage::new();
        (CartStore::open(Arc::new(storage.clone())), storage)
    }

    #[test]
    fn test_same_key_accumulates_quantity() {
        let (cart, _) = cart();
        cart.add_to_cart(item(1).with_quantity(1));
        cart.add_to_cart(item(1).with_quantity(2));

        let items = cart.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 3);
    }

    #[test]
    fn test_zero_quantity_counts_as_one() {
        let (cart, _) = cart();
        cart.add_to_cart(item(1).with_quantity(0));
        cart.add_to_cart(item(1).with_quantity(0));
        assert_eq!(cart.items()[0].quantity, 2);
    }

    #[test]
    fn test_first_display_fields_win() {
        let (cart, _) = cart();
        cart.add_to_cart(item(1));
        let mut changed = item(1);
        changed.name = "Renamed".to_string();
        changed.price = Decimal::new(5, 0);
        cart.add_to_cart(changed);

        let line = &cart.items()[0];
        assert_eq!(line.name, "Product 1");
        assert_eq!(line.price, Decimal::new(1000, 0));
        assert_eq!(line.quantity, 2);
    }

    #[test]
    fn test_variants_are_distinct_lines() {
        let (cart, _) = cart();
        cart.add_to_cart(item(1).with_color("red"));
        cart.add_to_cart(item(1).with_color("blue"));
        cart.add_to_cart(item(1).with_color("red").with_size("L"));

        let colors: Vec<_> = cart
            .items()
            .into_iter()
            .map(|l| (l.selected_color, l.selected_size))
            .collect();
        assert_eq!(
            colors,
            vec![
                (Some("red".to_string()), None),
                (Some("blue".to_string()), None),
                (Some("red".to_string()), Some("L".to_string())),
            ]
        );
    }

    #[test]
    fn test_quantity_saturates() {
        let (cart, _) = cart();
        cart.add_to_cart(item(1).with_quantity(u32::MAX));
        cart.add_to_cart(item(1).with_quantity(5));
        assert_eq!(cart.items()[0].quantity, u32::MAX);
    }

    #[test]
    fn test_remove_ignores_quantity_and_keeps_order() {
        let (cart, _) = cart();
        cart.add_to_cart(item(1));
        cart.add_to_cart(item(2).with_quantity(4));
        cart.add_to_cart(item(3));

        cart.remove_from_cart(&item(2).with_quantity(1));
        let ids: Vec<i64> = cart.items().iter().map(|l| l.id.as_i64()).collect();
        assert_eq!(ids, vec![1, 3]);

        cart.remove_from_cart(&item(9));
        assert_eq!(cart.line_count(), 2);
    }

    #[test]
    fn test_clear_then_add_is_fresh() {
        let (cart, _) = cart();
        cart.add_to_cart(item(1).with_quantity(3));
        cart.clear_cart();
        assert!(cart.is_empty());

        cart.add_to_cart(item(1));
        assert_eq!(cart.items(), vec![item(1)]);
    }

    #[test]
    fn test_totals() {
        let (cart, _) = cart();
        cart.add_to_cart(item(1).with_quantity(2));
        cart.add_to_cart(
            CartLineItem::new(ProductId::new(2), "Teak stool", Decimal::new(2550, 2)),
        );

        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.subtotal().to_string(), "LKR 2025.50");
    }

    #[test]
    fn test_every_mutation_persists() {
        let (cart, storage) = cart();
        cart.add_to_cart(item(7).with_color("oak"));

        let raw = storage.get_item(CART_STORAGE_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], 0);
        assert_eq!(value["state"]["hasHydrated"], true);
        assert_eq!(value["state"]["cart"][0]["id"], 7);
        assert_eq!(value["state"]["cart"][0]["selectedColor"], "oak");
        assert_eq!(value["state"]["cart"][0]["price"], 1000.0);

        cart.clear_cart();
        let raw = storage.get_item(CART_STORAGE_KEY).unwrap().unwrap();
        assert!(raw.contains(r#""cart":[]"#));
    }

    #[test]
    fn test_hydrate_only_once() {
        let cart = CartStore::new(Arc::new(MemoryStorage::new()));
        assert!(!cart.has_hydrated());

        assert!(cart.hydrate(CartSnapshot::from(vec![item(1)])));
        assert!(cart.has_hydrated());
        assert!(!cart.hydrate(CartSnapshot::from(vec![item(2)])));

        assert_eq!(cart.items(), vec![item(1)]);
    }

    #[test]
    fn test_rehydrate_restores_persisted_cart() {
        let storage = MemoryStorage::new();
        let first = CartStore::open(Arc::new(storage.clone()));
        first.add_to_cart(item(1).with_quantity(2));

        let second = CartStore::open(Arc::new(storage));
        assert!(second.has_hydrated());
        assert_eq!(second.items(), vec![item(1).with_quantity(2)]);
    }

    #[test]
    fn test_rehydrate_with_corrupt_snapshot_starts_empty() {
        let storage = MemoryStorage::new();
        storage.set_item(CART_STORAGE_KEY, "][").unwrap();

        let cart = CartStore::open(Arc::new(storage));
        assert!(cart.has_hydrated());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_hydrate_races_have_one_winner() {
        let cart = CartStore::new(Arc::new(MemoryStorage::new()));
        let handles: Vec<_> = (1..=8)
            .map(|id| {
                let cart = cart.clone();
                std::thread::spawn(move || cart.hydrate(CartSnapshot::from(vec![item(id)])))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(cart.line_count(), 1);
    }

    #[test]
    fn test_mutation_before_hydration_keeps_stored_cart() {
        let storage = MemoryStorage::new();
        CartStore::open(Arc::new(storage.clone())).add_to_cart(item(1));

        let cart = CartStore::new(Arc::new(storage.clone()));
        cart.add_to_cart(item(2));
        let raw = storage.get_item(CART_STORAGE_KEY).unwrap().unwrap();
        assert!(raw.contains(r#""id":1"#));
        assert!(!raw.contains(r#""id":2"#));

        cart.rehydrate();
        assert_eq!(cart.items(), vec![item(1)]);
    }

    #[test]
    fn test_unreadable_storage_is_not_overwritten_on_rehydrate() {
        let storage = UnreadableStorage::default();
        let cart = CartStore::open(Arc::new(storage.clone()));

        assert!(cart.has_hydrated());
        assert!(cart.is_empty());
        assert_eq!(storage.writes.load(std::sync::atomic::Ordering::SeqCst), 0);

        cart.add_to_cart(item(1));
        assert_eq!(storage.writes.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_totals_saturate_instead_of_overflowing() {
        let (cart, _) = cart();
        cart.add_to_cart(
            CartLineItem::new(ProductId::new(1), "Gold throne", Decimal::MAX).with_quantity(2),
        );
        cart.add_to_cart(item(2));

        assert_eq!(cart.items()[0].line_total(), Decimal::MAX);
        assert_eq!(cart.subtotal().amount, Decimal::MAX);
    }

    #[test]
    fn test_deserialize_defaults() {
        let line: CartLineItem = serde_json::from_str(r#"{"id": 3, "name": "Desk"}"#).unwrap();
        assert_eq!(line.quantity, 1);
        assert_eq!(line.price, Decimal::ZERO);
        assert_eq!(line.selected_size, None);

        let line: CartLineItem =
            serde_json::from_str(r#"{"id": 3, "price": 12.5, "quantity": 4}"#).unwrap();
        assert_eq!(line.line_total(), Decimal::new(50, 0));
    }

    #[test]
    fn test_display_image_fallbacks() {
        let mut line = item(1).with_color("walnut");
        assert_eq!(line.display_image(), None);

        line.images.insert("oak".to_string(), "/img/oak.png".to_string());
        assert_eq!(line.display_image(), Some("/img/oak.png"));

        line.images.insert("walnut".to_string(), "/img/walnut.png".to_string());
        assert_eq!(line.display_image(), Some("/img/walnut.png"));

        let line = line.with_image_url("/img/main.png");
        assert_eq!(line.display_image(), Some("/img/main.png"));
    }
}
