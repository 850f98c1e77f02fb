//! # Aura Client
//!
//! I/O half of the storefront: REST access, token handling, persistence of
//! client state and the checkout driver. Business rules live in `aura-core`.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          aura-client                                    │
//! │                                                                         │
//! │  ┌──────────────┐      ┌──────────────┐      ┌──────────────────┐      │
//! │  │  AppContext  │─────►│  ApiClient   │─────►│  HttpTransport   │      │
//! │  │  session     │      │  bearer +    │      │  (reqwest)       │      │
//! │  │  cart, favs  │      │  401 refresh │      └──────────────────┘      │
//! │  │  preferences │      └──────┬───────┘                                 │
//! │  └──────┬───────┘             │                                         │
//! │         │                     ▼                                         │
//! │         │              ┌──────────────┐      ┌──────────────────┐      │
//! │         └─────────────►│  Persister   │─────►│  KeyValueStore   │      │
//! │                        │  (JSON)      │      │  file / memory   │      │
//! │  ┌──────────────┐      └──────────────┘      └──────────────────┘      │
//! │  │ CheckoutFlow │──► PaymentGateway, Notifier, Navigator (UI seams)    │
//! │  └──────────────┘                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod checkout;
pub mod config;
pub mod context;
pub mod error;
pub mod storage;
pub mod tokens;
pub mod transport;
pub mod ui;

#[cfg(test)]
mod testing;

pub use api::ApiClient;
pub use checkout::{CheckoutFlow, CheckoutOutcome, GatewayOutcome, GatewayRequest, PaymentGateway};
pub use config::ClientConfig;
pub use context::{AppContext, PersistedCart, PersistedFavorites, Preferences};
pub use error::{CheckoutError, ClientError, ClientResult, ErrorCode, UserFacingError};
pub use storage::{FileStore, KeyValueStore, MemoryStore, Persister};
pub use tokens::TokenStore;
pub use transport::{HttpTransport, ReqwestTransport};
pub use ui::{Navigator, Notifier, ToastKind};
