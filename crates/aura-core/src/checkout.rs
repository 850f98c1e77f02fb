//! # Checkout State Machine
//!
//! Pure transition table for the payment and order-creation sequence. The
//! async driver in `aura-client` feeds events in; this module only decides
//! whether each step is legal.
//!
//! ## States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Checkout Lifecycle                                   │
//! │                                                                         │
//! │   Idle ──initiate──► Initializing ──session ready──► AwaitingGateway   │
//! │    ▲                      │                            │   │   │        │
//! │    │                 init failed                  paid │   │   │ failed │
//! │    │                      ▼                            │   │   ▼        │
//! │    │                   Failed ◄────────────────────────┼───┼─ Failed   │
//! │    │                                                   │   │            │
//! │    │                                                   │ closed         │
//! │    │                                                   ▼   ▼            │
//! │    │                                          Succeeded  Cancelled      │
//! │    │                                              │                     │
//! │    │                                         begin order                │
//! │    │                                              ▼                     │
//! │    │                   OrderFailed ◄──failed── CreatingOrder            │
//! │    │                      │    ▲                  │                     │
//! │    │                      └────┘ retry         created                  │
//! │    │                                              ▼                     │
//! │    └──────────── reset (any terminal state) ── OrderCreated             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use serde::Serialize;

use crate::error::{CoreError, CoreResult};

/// Where the checkout currently stands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CheckoutState {
    #[default]
    Idle,
    /// Waiting for the backend to open a gateway session.
    Initializing,
    /// Payment widget is open.
    AwaitingGateway { reference: String, access_code: String },
    /// Gateway confirmed payment; the order does not exist yet.
    Succeeded { reference: String },
    /// Widget closed without paying.
    Cancelled,
    Failed { message: String },
    CreatingOrder { reference: String },
    OrderCreated { order_id: String },
    /// Payment went through but the order was not saved. The reference is
    /// kept so order creation can be retried without charging again.
    OrderFailed { reference: String, message: String },
}

impl CheckoutState {
    pub fn name(&self) -> &'static str {
        match self {
            CheckoutState::Idle => "idle",
            CheckoutState::Initializing => "initializing",
            CheckoutState::AwaitingGateway { .. } => "awaiting payment",
            CheckoutState::Succeeded { .. } => "paid",
            CheckoutState::Cancelled => "cancelled",
            CheckoutState::Failed { .. } => "failed",
            CheckoutState::CreatingOrder { .. } => "creating the order",
            CheckoutState::OrderCreated { .. } => "complete",
            CheckoutState::OrderFailed { .. } => "waiting for order retry",
        }
    }

    /// States that only `Reset` (or a retry) can leave.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CheckoutState::Cancelled
                | CheckoutState::Failed { .. }
                | CheckoutState::OrderCreated { .. }
                | CheckoutState::OrderFailed { .. }
        )
    }
}

impl fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutEvent {
    Initiate,
    SessionReady { reference: String, access_code: String },
    InitFailed { message: String },
    GatewayPaid { reference: String },
    GatewayClosed,
    GatewayFailed { message: String },
    /// Start (or retry) order creation with the paid reference.
    BeginOrder,
    OrderCreated { order_id: String },
    OrderFailed { message: String },
    Reset,
}

impl CheckoutEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CheckoutEvent::Initiate => "start checkout",
            CheckoutEvent::SessionReady { .. } => "open the payment widget",
            CheckoutEvent::InitFailed { .. } => "fail initialization",
            CheckoutEvent::GatewayPaid { .. } => "confirm payment",
            CheckoutEvent::GatewayClosed => "close the payment widget",
            CheckoutEvent::GatewayFailed { .. } => "fail payment",
            CheckoutEvent::BeginOrder => "create the order",
            CheckoutEvent::OrderCreated { .. } => "complete the order",
            CheckoutEvent::OrderFailed { .. } => "fail the order",
            CheckoutEvent::Reset => "reset",
        }
    }
}

/// Holds the current [`CheckoutState`] and applies events to it.
#[derive(Debug, Clone, Default)]
pub struct CheckoutMachine {
    state: CheckoutState,
}

impl CheckoutMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &CheckoutState {
        &self.state
    }

    /// Picks up a paid checkout whose order was never confirmed, for example
    /// after a restart. Only `BeginOrder` and `Reset` leave this state.
    pub fn resume_unplaced(reference: impl Into<String>) -> Self {
        CheckoutMachine {
            state: CheckoutState::OrderFailed {
                reference: reference.into(),
                message: "Order was not confirmed".to_string(),
            },
        }
    }

    /// Computes the next state without mutating anything.
    pub fn transition(state: &CheckoutState, event: CheckoutEvent) -> CoreResult<CheckoutState> {
        use CheckoutEvent as E;
        use CheckoutState as S;

        let next = match (state, event) {
            (S::Idle, E::Initiate) => S::Initializing,

            (S::Initializing, E::SessionReady {
                reference,
                access_code,
            }) => S::AwaitingGateway {
                reference,
                access_code,
            },
            (S::Initializing, E::InitFailed { message }) => S::Failed { message },

            (S::AwaitingGateway { .. }, E::GatewayPaid { reference }) => S::Succeeded { reference },
            (S::AwaitingGateway { .. }, E::GatewayClosed) => S::Cancelled,
            (S::AwaitingGateway { .. }, E::GatewayFailed { message }) => S::Failed { message },

            (S::Succeeded { reference }, E::BeginOrder)
            | (S::OrderFailed { reference, .. }, E::BeginOrder) => S::CreatingOrder {
                reference: reference.clone(),
            },

            (S::CreatingOrder { .. }, E::OrderCreated { order_id }) => S::OrderCreated { order_id },
            (S::CreatingOrder { reference }, E::OrderFailed { message }) => S::OrderFailed {
                reference: reference.clone(),
                message,
            },

            (s, E::Reset) if s.is_terminal() || *s == S::Idle => S::Idle,

            (s, e) => {
                return Err(CoreError::InvalidTransition {
                    state: s.name().to_string(),
                    event: e.name().to_string(),
                })
            }
        };

        Ok(next)
    }

    /// Applies an event. On an illegal edge the state is left untouched.
    pub fn apply(&mut self, event: CheckoutEvent) -> CoreResult<&CheckoutState> {
        self.state = Self::transition(&self.state, event)?;
        Ok(&self.state)
    }

    /// Reference of the payment currently in flight, if any.
    pub fn payment_reference(&self) -> Option<&str> {
        match &self.state {
            CheckoutState::AwaitingGateway { reference, .. }
            | CheckoutState::Succeeded { reference }
            | CheckoutState::CreatingOrder { reference }
            | CheckoutState::OrderFailed { reference, .. } => Some(reference),
            _ => None,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
