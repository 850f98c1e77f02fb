//! # Cart
//!
//! The in-memory shopping cart. Persistence lives in `aura-client`; this type
//! only enforces the cart's invariants.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  UI Action                Operation               Cart Change           │
//! │  ─────────                ─────────               ───────────           │
//! │                                                                         │
//! │  Add to cart ───────────► add(item) ────────────► merge qty or push    │
//! │                                                                         │
//! │  Quantity stepper ──────► set_quantity(id, n) ──► qty = n, or drop     │
//! │                                                   the line when n ≤ 0  │
//! │                                                                         │
//! │  Remove button ─────────► remove(id) ───────────► filter by id         │
//! │                                                                         │
//! │  Order placed ──────────► clear() ──────────────► items.clear()        │
//! │                                                                         │
//! │  Badge / summary ───────► count(), total() ─────► (read only)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::Product;
use crate::validation::validate_quantity;
use crate::{MAX_CART_LINES, MAX_LINE_QUANTITY};

/// A line in the shopping cart.
///
/// ## Design Notes
/// The price is frozen when the product is added, so the cart keeps showing
/// the same amount even if the catalog changes before checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Product id.
    #[serde(alias = "_id", alias = "productId")]
    pub id: String,

    /// Product name at time of adding.
    pub name: String,

    /// Unit price at time of adding.
    #[ts(type = "string | number")]
    pub price: Money,

    /// Units of this product; always at least 1 while the line exists.
    pub quantity: u32,

    /// Explicit bundle flag. `None` means "unknown", in which case pricing
    /// falls back to the name heuristic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_bundle: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl CartItem {
    /// Creates a plain cart line.
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Money, quantity: u32) -> Self {
        CartItem {
            id: id.into(),
            name: name.into(),
            price,
            quantity,
            is_bundle: None,
            color: None,
            image: None,
        }
    }

    /// Creates a cart line from a catalog product.
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        CartItem {
            id: product.id.clone(),
            name: product.name.clone(),
            price: product.price,
            quantity,
            is_bundle: product.is_bundle,
            color: product.color.clone(),
            image: product.image.clone(),
        }
    }

    /// Marks the line as a bundle (or not) explicitly.
    pub fn with_bundle_flag(mut self, is_bundle: bool) -> Self {
        self.is_bundle = Some(is_bundle);
        self
    }

    /// Unit price × quantity.
    pub fn line_total(&self) -> Money {
        self.price.multiply_quantity(self.quantity)
    }
}

/// The shopping cart.
///
/// ## Invariants
/// - Lines are unique by `id` (adding the same product merges quantities)
/// - Every line has quantity ≥ 1
/// - At most [`MAX_CART_LINES`] lines, each at most [`MAX_LINE_QUANTITY`]
///
/// Serializes as a bare JSON array of lines, which is the persisted snapshot
/// format. Deserializing goes through [`Cart::from_snapshot`], so a decoded
/// cart always holds the invariants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<CartItem>", into = "Vec<CartItem>")]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Creates a new empty cart.
    pub fn new() -> Self {
        Cart { items: Vec::new() }
    }

    /// Rebuilds a cart from a persisted snapshot, dropping lines that break
    /// the invariants and merging duplicate ids.
    pub fn from_snapshot(items: Vec<CartItem>) -> Self {
        let mut cart = Cart::new();
        for item in items {
            if item.quantity == 0 {
                continue;
            }
            // Oversized or duplicate-overflowing lines are dropped, not fatal.
            let _ = cart.add(item);
        }
        cart
    }

    /// Adds a line or increases the quantity of an existing one.
    ///
    /// ## Behavior
    /// - Product already in cart: quantities are summed
    /// - Product not in cart: line is appended
    pub fn add(&mut self, item: CartItem) -> CoreResult<()> {
        validate_quantity(i64::from(item.quantity))?;

        if let Some(existing) = self.items.iter_mut().find(|i| i.id == item.id) {
            let new_qty = existing.quantity + item.quantity;
            if new_qty > MAX_LINE_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_LINE_QUANTITY,
                });
            }
            existing.quantity = new_qty;
            return Ok(());
        }

        if self.items.len() >= MAX_CART_LINES {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_LINES,
            });
        }

        self.items.push(item);
        Ok(())
    }

    /// Removes a line by product id. Returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.id != id);
        self.items.len() != before
    }

    /// Sets the quantity of a line; zero or negative removes it.
    pub fn set_quantity(&mut self, id: &str, quantity: i64) -> CoreResult<()> {
        if quantity <= 0 {
            return if self.remove(id) {
                Ok(())
            } else {
                Err(CoreError::NotInCart(id.to_string()))
            };
        }

        let quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| *q <= MAX_LINE_QUANTITY)
            .ok_or(CoreError::QuantityTooLarge {
                requested: u32::try_from(quantity).unwrap_or(u32::MAX),
                max: MAX_LINE_QUANTITY,
            })?;

        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| CoreError::NotInCart(id.to_string()))?;
        item.quantity = quantity;
        Ok(())
    }

    /// Removes every line.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Sum of price × quantity over all lines.
    pub fn total(&self) -> Money {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Sum of quantities over all lines.
    pub fn count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Number of distinct lines.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&CartItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }
}

impl From<Vec<CartItem>> for Cart {
    fn from(items: Vec<CartItem>) -> Self {
        Cart::from_snapshot(items)
    }
}

impl From<Cart> for Vec<CartItem> {
    fn from(cart: Cart) -> Self {
        cart.items
    }
}
