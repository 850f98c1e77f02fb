//! # aura-core: Pure Business Logic for the Aura Storefront
//!
//! This crate holds every rule of the storefront client that can be expressed
//! without touching the network or the disk.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Aura Storefront Architecture                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Frontend (web / terminal)                    │   │
//! │  │    Catalog ──► Cart ──► Checkout ──► Payment widget ──► Track   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    aura-client                                  │   │
//! │  │    ApiClient, PersistedCart, CheckoutFlow, ClientConfig         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ aura-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────────────┐  │   │
//! │  │   │  money   │ │   cart   │ │ pricing  │ │    checkout      │  │   │
//! │  │   │  Money   │ │   Cart   │ │ Quote    │ │  state machine   │  │   │
//! │  │   │  parsing │ │ Favorites│ │ Limits   │ │                  │  │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, User, Order, Vote, etc.)
//! - [`money`] - Money type in minor units with tolerant price parsing
//! - [`cart`] - Cart container (merge, remove, set-quantity, totals)
//! - [`favorites`] - Favorite product set
//! - [`pricing`] - Delivery fee tiers and daily order limits
//! - [`checkout`] - Payment/order state machine
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use aura_core::cart::{Cart, CartItem};
//! use aura_core::money::Money;
//! use aura_core::pricing::{PricingRules, DailyUsage};
//! use aura_core::types::Role;
//!
//! let mut cart = Cart::new();
//! cart.add(CartItem::new("p1", "Aura Mist 50ml", Money::from_minor(450_000), 2)).unwrap();
//!
//! let quote = PricingRules::default().quote(cart.items(), Role::Consumer, DailyUsage::default());
//! assert_eq!(quote.bottles, 2);
//! assert_eq!(quote.delivery_fee, Money::from_major(2_000));
//! ```

pub mod cart;
pub mod checkout;
pub mod error;
pub mod favorites;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

pub use cart::{Cart, CartItem};
pub use checkout::{CheckoutEvent, CheckoutMachine, CheckoutState};
pub use error::{CoreError, CoreResult, ValidationError};
pub use favorites::FavoriteSet;
pub use money::Money;
pub use pricing::{CheckoutQuote, DailyUsage, LimitViolation, PricingRules};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Bottles contained in one bundle (an "Auraset").
pub const BOTTLES_PER_BUNDLE: u32 = 5;

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_LINES: usize = 50;

/// Maximum quantity of a single cart line.
///
/// ## Business Reason
/// Stops fat-finger orders (typing 100 instead of 10) before the daily
/// limit check even runs.
pub const MAX_LINE_QUANTITY: u32 = 99;
