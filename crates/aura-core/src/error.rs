//! # Error Types
//!
//! Domain-specific error types for aura-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  aura-core errors (this file)                                          │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  aura-client errors (separate crate)                                   │
//! │  ├── ClientError      - Network / HTTP / session failures              │
//! │  └── CheckoutError    - Orchestration failures                         │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ClientError → UI toast            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product id, limit, role)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

use crate::pricing::LimitViolation;
use crate::types::OrderStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These represent business rule violations detected locally. None of them
/// require a server round trip to discover.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Product is not in the cart.
    #[error("Product not in cart: {0}")]
    NotInCart(String),

    /// Checkout attempted with nothing in the cart.
    #[error("Your cart is empty")]
    EmptyCart,

    /// Cart has reached its line limit.
    #[error("Cart cannot have more than {max} different products")]
    CartTooLarge { max: usize },

    /// Line quantity exceeds the maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: u32, max: u32 },

    /// Daily order limit exceeded for the user's role.
    ///
    /// ## User Workflow
    /// ```text
    /// Cart: 12 bottles, role consumer (cap 10)
    ///      │
    ///      ▼
    /// PricingRules::quote → limit_violation = Some(..)
    ///      │
    ///      ▼
    /// LimitExceeded → checkout blocked, no request sent
    /// ```
    #[error("{0}")]
    LimitExceeded(LimitViolation),

    /// The order is not among the signed-in user's orders.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Customers may only cancel pending or processing orders.
    #[error("Order {order_id} is {status} and can no longer be cancelled")]
    NotCancellable { order_id: String, status: OrderStatus },

    /// A checkout state transition that the machine does not allow.
    #[error("Cannot {event} while checkout is {state}")]
    InvalidTransition { state: String, event: String },

    /// Price text could not be understood.
    #[error("Invalid price '{input}': {reason}")]
    InvalidPrice { input: String, reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g. malformed phone number or email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
