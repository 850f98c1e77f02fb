//! # Client Error Types
//!
//! Error types for API calls, local storage and the checkout flow.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Client Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Transport     │  │   HTTP status   │  │     Local               │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Network        │  │  RateLimited    │  │  Config                 │ │
//! │  │  Decode         │  │  Server (5xx)   │  │  Storage                │ │
//! │  │                 │  │  Request (4xx)  │  │  Core (business rule)   │ │
//! │  │                 │  │  SessionExpired │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Every variant maps to one user-facing sentence via user_message().    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use aura_core::CoreError;
use serde::Serialize;
use thiserror::Error;

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

pub const NETWORK_MESSAGE: &str =
    "Unable to reach the server. Please check your connection and try again.";
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests. Please wait a moment and try again.";
pub const SERVER_MESSAGE: &str = "Something went wrong on our end. Please try again later.";
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

/// Client error type covering every failure the storefront client can hit.
#[derive(Debug, Error)]
pub enum ClientError {
    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The request never got an HTTP response.
    #[error("Network error: {0}")]
    Network(String),

    /// The response body was not what the endpoint promised.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    // =========================================================================
    // HTTP Status Errors
    // =========================================================================
    /// HTTP 429.
    #[error("Rate limited by server")]
    RateLimited,

    /// HTTP 5xx.
    #[error("Server error (HTTP {status})")]
    Server { status: u16 },

    /// Any other 4xx, with the server's message when it sent one.
    #[error("Request failed (HTTP {status}): {}", .message.as_deref().unwrap_or("no message"))]
    Request {
        status: u16,
        message: Option<String>,
    },

    /// 401 that a token refresh could not fix.
    #[error("Session expired")]
    SessionExpired,

    // =========================================================================
    // Local Errors
    // =========================================================================
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    /// Business rule violation detected locally.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::Config(format!("invalid URL: {}", err))
    }
}

impl From<toml::de::Error> for ClientError {
    fn from(err: toml::de::Error) -> Self {
        ClientError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ClientError {
    fn from(err: toml::ser::Error) -> Self {
        ClientError::Config(err.to_string())
    }
}

impl ClientError {
    /// Builds the error for a non-success HTTP status.
    pub fn from_status(status: u16, server_message: Option<String>) -> Self {
        match status {
            429 => ClientError::RateLimited,
            s if s >= 500 => ClientError::Server { status: s },
            s => ClientError::Request {
                status: s,
                message: server_message.filter(|m| !m.trim().is_empty()),
            },
        }
    }

    /// The one sentence shown to the user for this error.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Network(_) => NETWORK_MESSAGE.to_string(),
            ClientError::RateLimited => RATE_LIMITED_MESSAGE.to_string(),
            ClientError::Server { .. } | ClientError::Decode(_) => SERVER_MESSAGE.to_string(),
            ClientError::Request { status, message } => match message {
                Some(message) => message.clone(),
                None => format!("Request failed (HTTP {}). Please try again.", status),
            },
            ClientError::SessionExpired => SESSION_EXPIRED_MESSAGE.to_string(),
            ClientError::Config(msg) => format!("Configuration problem: {}", msg),
            ClientError::Storage(_) => "Could not save your data on this device.".to_string(),
            ClientError::Core(err) => err.to_string(),
        }
    }

    /// Machine-readable code for UI handling.
    pub fn code(&self) -> ErrorCode {
        match self {
            ClientError::Network(_) => ErrorCode::Network,
            ClientError::Decode(_) => ErrorCode::InvalidResponse,
            ClientError::RateLimited => ErrorCode::RateLimited,
            ClientError::Server { .. } => ErrorCode::ServerError,
            ClientError::Request { status: 404, .. } => ErrorCode::NotFound,
            ClientError::Request { .. } => ErrorCode::RequestFailed,
            ClientError::SessionExpired => ErrorCode::SessionExpired,
            ClientError::Config(_) => ErrorCode::ConfigError,
            ClientError::Storage(_) => ErrorCode::StorageError,
            ClientError::Core(CoreError::LimitExceeded(_)) => ErrorCode::LimitExceeded,
            ClientError::Core(CoreError::Validation(_)) => ErrorCode::ValidationError,
            ClientError::Core(_) => ErrorCode::BusinessRule,
        }
    }

    /// Returns true for failures a user can fix by simply trying again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::Network(_) | ClientError::RateLimited | ClientError::Server { .. }
        )
    }
}

// =============================================================================
// User-Facing Error
// =============================================================================

/// Error codes handed to the UI alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Network,
    RateLimited,
    ServerError,
    NotFound,
    RequestFailed,
    SessionExpired,
    InvalidResponse,
    ConfigError,
    StorageError,
    ValidationError,
    LimitExceeded,
    BusinessRule,
    PaymentFailed,
}

/// What a toast or error banner receives.
///
/// ```json
/// { "code": "RATE_LIMITED", "message": "Too many requests. Please wait a moment and try again." }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserFacingError {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&ClientError> for UserFacingError {
    fn from(err: &ClientError) -> Self {
        UserFacingError {
            code: err.code(),
            message: err.user_message(),
        }
    }
}

// =============================================================================
// Checkout Errors
// =============================================================================

/// Why a checkout attempt stopped.
///
/// Closing the payment widget is not an error; it is reported as
/// `CheckoutOutcome::Cancelled`.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Blocked locally before any request was sent.
    #[error(transparent)]
    Rejected(#[from] CoreError),

    #[error("Please log in to check out")]
    NotSignedIn,

    /// The backend would not open a payment session.
    #[error("Could not start payment: {0}")]
    Initialization(#[source] ClientError),

    /// The payment widget reported a failed charge.
    #[error("Payment failed: {0}")]
    Payment(String),

    /// A paid order is still waiting to be placed; starting a new payment
    /// would charge the customer twice.
    #[error("Payment {reference} has not been turned into an order yet")]
    OrderPending { reference: String },

    /// Payment succeeded but the order was not saved.
    #[error("Order could not be created for payment {reference}: {source}")]
    OrderCreation {
        reference: String,
        #[source]
        source: ClientError,
    },
}

impl CheckoutError {
    pub fn user_message(&self) -> String {
        match self {
            CheckoutError::Rejected(err) => err.to_string(),
            CheckoutError::NotSignedIn => self.to_string(),
            CheckoutError::Initialization(err) => err.user_message(),
            CheckoutError::Payment(message) => format!("Payment failed: {}", message),
            CheckoutError::OrderPending { reference } => format!(
                "Your payment {} went through but the order was not placed yet. Retry placing it before checking out again.",
                reference
            ),
            CheckoutError::OrderCreation { reference, source } => format!(
                "{} Your payment reference is {}.",
                source.user_message(),
                reference
            ),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            CheckoutError::Rejected(CoreError::LimitExceeded(_)) => ErrorCode::LimitExceeded,
            CheckoutError::Rejected(CoreError::Validation(_)) => ErrorCode::ValidationError,
            CheckoutError::Rejected(_) | CheckoutError::OrderPending { .. } => {
                ErrorCode::BusinessRule
            }
            CheckoutError::NotSignedIn => ErrorCode::SessionExpired,
            CheckoutError::Initialization(err) | CheckoutError::OrderCreation { source: err, .. } => {
                err.code()
            }
            CheckoutError::Payment(_) => ErrorCode::PaymentFailed,
        }
    }
}
