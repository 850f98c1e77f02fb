//! # Checkout Flow
//!
//! Drives [`CheckoutMachine`] through payment and order creation.
//!
//! ## Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Checkout Sequence                                │
//! │                                                                         │
//! │  1. Pre-flight (local only)                                             │
//! │     cart not empty ─► delivery valid ─► signed in ─► within limits     │
//! │                                                                         │
//! │  2. POST /payments/initialize {amount (kobo), email}                    │
//! │     └─► access code + reference                                         │
//! │                                                                         │
//! │  3. PaymentGateway::open()                                              │
//! │     ├─ Closed ──► info toast, back to Idle, cart untouched             │
//! │     ├─ Failed ──► error toast, Failed                                  │
//! │     └─ Paid   ──► snapshot cart + delivery + reference                 │
//! │                                                                         │
//! │  4. POST /orders {snapshot}                                             │
//! │     ├─ error ──► error toast, OrderFailed, cart untouched (retryable)  │
//! │     └─ ok    ──► clear cart, navigate /orders/:id/track, success toast │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use aura_core::validation::validate_delivery_info;
use aura_core::{
    CheckoutEvent, CheckoutMachine, CheckoutState, CoreError, DailyUsage, DeliveryInfo, NewOrder,
    Order,
};
use tracing::{info, warn};

use crate::context::AppContext;
use crate::error::CheckoutError;
use crate::ui::{order_tracking_route, Notifier, ToastKind};

/// Parameters the payment widget is opened with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayRequest {
    pub public_key: String,
    /// Amount in minor units (kobo).
    pub amount: i64,
    pub currency: String,
    pub email: String,
    pub access_code: String,
    pub reference: String,
}

/// How the payment widget finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOutcome {
    Paid { reference: String },
    /// Closed without paying.
    Closed,
    Failed { message: String },
}

/// The external payment widget.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn open(&self, request: GatewayRequest) -> GatewayOutcome;
}

/// Successful end of a checkout attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutOutcome {
    Placed(Order),
    /// The user closed the widget. Nothing was charged.
    Cancelled,
}

pub const CANCELLED_MESSAGE: &str = "Payment cancelled. Your cart is still here.";
pub const PLACED_MESSAGE: &str = "Order placed successfully!";

/// One checkout at a time for one app context.
///
/// The order body frozen at payment time lives in the [`AppContext`] and is
/// persisted, so an unplaced order is picked up again after a restart.
pub struct CheckoutFlow {
    machine: CheckoutMachine,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
}

impl CheckoutFlow {
    pub fn new(gateway: Arc<dyn PaymentGateway>, notifier: Arc<dyn Notifier>) -> Self {
        CheckoutFlow {
            machine: CheckoutMachine::new(),
            gateway,
            notifier,
        }
    }

    pub fn state(&self) -> &CheckoutState {
        self.machine.state()
    }

    /// Runs a full checkout of the context's cart.
    ///
    /// Finished attempts are reset automatically. A paid order that was never
    /// placed is not, even across restarts: call
    /// [`retry_order`](Self::retry_order) or [`reset`](Self::reset) first so
    /// the customer is never charged twice by accident.
    pub async fn run(
        &mut self,
        ctx: &mut AppContext,
        delivery: DeliveryInfo,
        usage: DailyUsage,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let result = self.drive(ctx, delivery, usage).await;
        self.report(&result);
        result
    }

    /// Re-submits the order for a payment that already went through.
    pub async fn retry_order(
        &mut self,
        ctx: &mut AppContext,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        self.resume_pending(ctx);
        let result = self.place_order(ctx).await;
        self.report(&result);
        result
    }

    /// Abandons the current attempt, including an unplaced order.
    pub fn reset(&mut self, ctx: &mut AppContext) -> Result<(), CheckoutError> {
        self.resume_pending(ctx);
        self.machine.apply(CheckoutEvent::Reset)?;
        if let Some(order) = ctx.pending_order() {
            warn!(reference = %order.payment_reference, "Discarding unplaced order");
        }
        ctx.set_pending_order(None);
        Ok(())
    }

    /// Adopts an unplaced order left behind by an earlier attempt.
    fn resume_pending(&mut self, ctx: &AppContext) {
        if *self.machine.state() != CheckoutState::Idle {
            return;
        }
        if let Some(order) = ctx.pending_order() {
            info!(reference = %order.payment_reference, "Resuming unplaced order");
            self.machine = CheckoutMachine::resume_unplaced(order.payment_reference.clone());
        }
    }

    async fn drive(
        &mut self,
        ctx: &mut AppContext,
        delivery: DeliveryInfo,
        usage: DailyUsage,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        self.resume_pending(ctx);
        if let CheckoutState::OrderFailed { reference, .. } = self.machine.state() {
            return Err(CheckoutError::OrderPending {
                reference: reference.clone(),
            });
        }
        if self.machine.state().is_terminal() {
            self.machine.apply(CheckoutEvent::Reset)?;
        }

        // Pre-flight. Nothing below here runs if any check fails.
        if ctx.cart().cart().is_empty() {
            return Err(CoreError::EmptyCart.into());
        }
        validate_delivery_info(&delivery).map_err(CoreError::from)?;
        let email = match ctx.session() {
            Some(user) if ctx.is_signed_in() => user.email.clone(),
            _ => return Err(CheckoutError::NotSignedIn),
        };
        let quote = ctx.quote(usage);
        quote.ensure_allowed()?;

        self.machine.apply(CheckoutEvent::Initiate)?;
        info!(total = %quote.total, bottles = quote.bottles, bundles = quote.bundles, "Starting checkout");

        let session = match ctx.api().initialize_payment(quote.total, &email).await {
            Ok(session) => session,
            Err(e) => {
                self.machine.apply(CheckoutEvent::InitFailed {
                    message: e.user_message(),
                })?;
                return Err(CheckoutError::Initialization(e));
            }
        };
        self.machine.apply(CheckoutEvent::SessionReady {
            reference: session.reference.clone(),
            access_code: session.access_code.clone(),
        })?;

        let payment = &ctx.config().payment;
        let request = GatewayRequest {
            public_key: payment.public_key.clone(),
            amount: quote.total.minor(),
            currency: payment.currency.clone(),
            email,
            access_code: session.access_code,
            reference: session.reference,
        };

        match self.gateway.open(request).await {
            GatewayOutcome::Closed => {
                self.machine.apply(CheckoutEvent::GatewayClosed)?;
                self.machine.apply(CheckoutEvent::Reset)?;
                info!("Payment widget closed without paying");
                self.notifier.notify(ToastKind::Info, CANCELLED_MESSAGE);
                Ok(CheckoutOutcome::Cancelled)
            }
            GatewayOutcome::Failed { message } => {
                self.machine.apply(CheckoutEvent::GatewayFailed {
                    message: message.clone(),
                })?;
                Err(CheckoutError::Payment(message))
            }
            GatewayOutcome::Paid { reference } => {
                info!(%reference, "Payment confirmed");
                self.machine.apply(CheckoutEvent::GatewayPaid {
                    reference: reference.clone(),
                })?;
                let new_order = NewOrder {
                    items: ctx.cart().cart().items().to_vec(),
                    delivery,
                    delivery_fee: quote.delivery_fee,
                    subtotal: quote.subtotal,
                    total: quote.total,
                    payment_reference: reference,
                };
                ctx.set_pending_order(Some(new_order));
                self.place_order(ctx).await
            }
        }
    }

    async fn place_order(&mut self, ctx: &mut AppContext) -> Result<CheckoutOutcome, CheckoutError> {
        let new_order = match ctx.pending_order() {
            Some(order) => order.clone(),
            None => {
                return Err(CoreError::InvalidTransition {
                    state: self.machine.state().name().to_string(),
                    event: CheckoutEvent::BeginOrder.name().to_string(),
                }
                .into())
            }
        };
        self.machine.apply(CheckoutEvent::BeginOrder)?;
        let reference = new_order.payment_reference.clone();

        match ctx.api().create_order(&new_order).await {
            Ok(order) => {
                self.machine.apply(CheckoutEvent::OrderCreated {
                    order_id: order.id.clone(),
                })?;
                ctx.set_pending_order(None);
                ctx.cart_mut().clear();
                info!(order_id = %order.id, %reference, "Order placed");
                ctx.navigator().navigate(&order_tracking_route(&order.id));
                self.notifier.notify(ToastKind::Success, PLACED_MESSAGE);
                Ok(CheckoutOutcome::Placed(order))
            }
            Err(e) => {
                self.machine.apply(CheckoutEvent::OrderFailed {
                    message: e.user_message(),
                })?;
                Err(CheckoutError::OrderCreation {
                    reference,
                    source: e,
                })
            }
        }
    }

    fn report(&self, result: &Result<CheckoutOutcome, CheckoutError>) {
        if let Err(err) = result {
            warn!(code = ?err.code(), error = %err, state = %self.machine.state(), "Checkout stopped");
            self.notifier.notify(ToastKind::Error, &err.user_message());
        }
    }
}

impl std::fmt::Debug for CheckoutFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutFlow")
            .field("state", self.machine.state())
            .field("reference", &self.machine.payment_reference())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::error::ErrorCode;
    use crate::storage::{keys, KeyValueStore, MemoryStore};
    use crate::testing::{RecordingNavigator, RecordingNotifier, ScriptedGateway, ScriptedTransport};
    use aura_core::{CartItem, Money};
    use secrecy::SecretString;
    use serde_json::json;

    struct Harness {
        ctx: AppContext,
        transport: Arc<ScriptedTransport>,
        navigator: Arc<RecordingNavigator>,
        notifier: Arc<RecordingNotifier>,
    }

    fn delivery() -> DeliveryInfo {
        DeliveryInfo {
            full_name: "Ada Obi".to_string(),
            phone: "+234 803 555 0101".to_string(),
            address: "12 Allen Avenue".to_string(),
            city: "Ikeja".to_string(),
            state: "Lagos".to_string(),
            notes: None,
            location: None,
        }
    }

    async fn harness(bottles: u32) -> Harness {
        let transport = Arc::new(ScriptedTransport::new());
        let navigator = Arc::new(RecordingNavigator::default());
        let mut ctx = AppContext::new(
            ClientConfig::default(),
            Arc::new(MemoryStore::new()),
            transport.clone(),
            navigator.clone(),
        );
        transport.push_json(
            200,
            json!({
                "accessToken": "a1",
                "user": { "_id": "u1", "name": "Ada", "email": "ada@example.com" }
            }),
        );
        ctx.login("ada@example.com", &SecretString::from("pw".to_string()))
            .await
            .unwrap();
        if bottles > 0 {
            ctx.cart_mut()
                .add(CartItem::new("p1", "Oud Noir", Money::from_major(4_500), bottles))
                .unwrap();
        }
        Harness {
            ctx,
            transport,
            navigator,
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    fn checkout_flow(h: &Harness, outcome: GatewayOutcome) -> (CheckoutFlow, Arc<ScriptedGateway>) {
        let gateway = Arc::new(ScriptedGateway::new(outcome));
        (CheckoutFlow::new(gateway.clone(), h.notifier.clone()), gateway)
    }

    fn push_session(h: &Harness) {
        h.transport.push_json(
            200,
            json!({ "data": { "accessCode": "ac_1", "reference": "ref_1" } }),
        );
    }

    fn push_order(h: &Harness) {
        h.transport.push_json(
            201,
            json!({
                "_id": "o1",
                "total": "11000.00",
                "deliveryFee": 2000,
                "status": "pending",
                "paymentReference": "ref_1",
                "createdAt": "2026-10-16T09:30:00Z"
            }),
        );
    }

    #[tokio::test]
    async fn test_paid_checkout_places_order() {
        let mut h = harness(2).await;
        let (mut flow, gateway) = checkout_flow(
            &h,
            GatewayOutcome::Paid {
                reference: "ref_1".to_string(),
            },
        );
        push_session(&h);
        push_order(&h);

        let outcome = flow
            .run(&mut h.ctx, delivery(), DailyUsage::default())
            .await
            .unwrap();

        match outcome {
            CheckoutOutcome::Placed(order) => assert_eq!(order.id, "o1"),
            other => panic!("expected a placed order, got {:?}", other),
        }
        assert_eq!(
            flow.state(),
            &CheckoutState::OrderCreated {
                order_id: "o1".to_string()
            }
        );
        assert!(h.ctx.cart().cart().is_empty());
        assert_eq!(h.navigator.routes(), vec!["/orders/o1/track".to_string()]);
        assert_eq!(
            h.notifier.toasts(),
            vec![(ToastKind::Success, PLACED_MESSAGE.to_string())]
        );

        // 2 × ₦4,500 + ₦2,000 two-bottle delivery
        let opened = gateway.opened();
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].amount, 1_100_000);
        assert_eq!(opened[0].access_code, "ac_1");
        assert_eq!(opened[0].email, "ada@example.com");

        let sent = h.transport.requests();
        assert_eq!(sent[1].path, "/payments/initialize");
        assert_eq!(sent[2].path, "/orders");
        let body = sent[2].body.as_ref().unwrap();
        assert_eq!(body["paymentReference"], "ref_1");
        assert_eq!(body["total"], "11000.00");
        assert_eq!(body["items"][0]["quantity"], 2);
        assert_eq!(body["delivery"]["city"], "Ikeja");
    }

    #[tokio::test]
    async fn test_closed_widget_returns_to_idle() {
        let mut h = harness(2).await;
        let (mut flow, _) = checkout_flow(&h, GatewayOutcome::Closed);
        push_session(&h);

        let outcome = flow
            .run(&mut h.ctx, delivery(), DailyUsage::default())
            .await
            .unwrap();

        assert_eq!(outcome, CheckoutOutcome::Cancelled);
        assert_eq!(flow.state(), &CheckoutState::Idle);
        assert_eq!(h.ctx.cart().cart().count(), 2);
        assert_eq!(h.transport.requests().len(), 2);
        assert_eq!(h.notifier.toasts()[0].0, ToastKind::Info);
        assert!(h.navigator.routes().is_empty());
    }

    #[tokio::test]
    async fn test_order_failure_keeps_cart_and_can_retry() {
        let mut h = harness(2).await;
        let (mut flow, gateway) = checkout_flow(
            &h,
            GatewayOutcome::Paid {
                reference: "ref_1".to_string(),
            },
        );
        push_session(&h);
        h.transport.push(500, "");

        let err = flow
            .run(&mut h.ctx, delivery(), DailyUsage::default())
            .await
            .unwrap_err();
        assert!(matches!(
            &err,
            CheckoutError::OrderCreation { reference, .. } if reference == "ref_1"
        ));
        assert!(matches!(flow.state(), CheckoutState::OrderFailed { .. }));
        assert_eq!(h.ctx.cart().cart().count(), 2);
        assert_eq!(h.notifier.toasts()[0].0, ToastKind::Error);

        // a fresh run must not charge again
        let err = flow
            .run(&mut h.ctx, delivery(), DailyUsage::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::OrderPending { ref reference } if reference == "ref_1"));
        assert_eq!(gateway.opened().len(), 1);

        push_order(&h);
        let outcome = flow.retry_order(&mut h.ctx).await.unwrap();
        assert!(matches!(outcome, CheckoutOutcome::Placed(_)));
        assert!(h.ctx.cart().cart().is_empty());
        assert!(h.ctx.pending_order().is_none());

        let orders: Vec<_> = h
            .transport
            .requests()
            .into_iter()
            .filter(|r| r.path == "/orders")
            .collect();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].body, orders[1].body);
    }

    #[tokio::test]
    async fn test_unplaced_order_survives_restart() {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(ScriptedTransport::new());
        let open = || {
            AppContext::new(
                ClientConfig::default(),
                store.clone(),
                transport.clone(),
                Arc::new(RecordingNavigator::default()),
            )
        };

        let mut ctx = open();
        transport.push_json(
            200,
            json!({
                "accessToken": "a1",
                "user": { "_id": "u1", "name": "Ada", "email": "ada@example.com" }
            }),
        );
        ctx.login("ada@example.com", &SecretString::from("pw".to_string()))
            .await
            .unwrap();
        ctx.cart_mut()
            .add(CartItem::new("p1", "Oud Noir", Money::from_major(4_500), 1))
            .unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let paid = GatewayOutcome::Paid {
            reference: "ref_1".to_string(),
        };
        let mut flow = CheckoutFlow::new(Arc::new(ScriptedGateway::new(paid.clone())), notifier.clone());
        transport.push_json(200, json!({ "accessCode": "ac_1", "reference": "ref_1" }));
        transport.push(502, "");
        assert!(flow
            .run(&mut ctx, delivery(), DailyUsage::default())
            .await
            .is_err());
        assert!(store.get(keys::PENDING_ORDER).unwrap().is_some());
        drop(flow);
        drop(ctx);

        // next process
        let mut ctx = open();
        assert_eq!(ctx.pending_order().unwrap().payment_reference, "ref_1");
        let gateway = Arc::new(ScriptedGateway::new(paid));
        let mut flow = CheckoutFlow::new(gateway.clone(), notifier);

        let err = flow
            .run(&mut ctx, delivery(), DailyUsage::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::OrderPending { .. }));
        assert!(gateway.opened().is_empty());

        transport.push_json(
            201,
            json!({
                "_id": "o1",
                "total": "6500.00",
                "status": "pending",
                "paymentReference": "ref_1",
                "createdAt": "2026-10-16T09:30:00Z"
            }),
        );
        let outcome = flow.retry_order(&mut ctx).await.unwrap();
        assert!(matches!(outcome, CheckoutOutcome::Placed(_)));
        assert!(ctx.pending_order().is_none());
        assert!(ctx.cart().cart().is_empty());
        assert!(store.get(keys::PENDING_ORDER).unwrap().is_none());

        let orders: Vec<_> = transport
            .requests()
            .into_iter()
            .filter(|r| r.path == "/orders")
            .collect();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].body, orders[1].body);
        assert_eq!(transport.requests().iter().filter(|r| r.path == "/payments/initialize").count(), 1);
    }

    #[tokio::test]
    async fn test_reset_discards_unplaced_order() {
        let mut h = harness(1).await;
        let (mut flow, _) = checkout_flow(
            &h,
            GatewayOutcome::Paid {
                reference: "ref_1".to_string(),
            },
        );
        push_session(&h);
        h.transport.push(500, "");
        assert!(flow
            .run(&mut h.ctx, delivery(), DailyUsage::default())
            .await
            .is_err());

        flow.reset(&mut h.ctx).unwrap();
        assert_eq!(flow.state(), &CheckoutState::Idle);
        assert!(h.ctx.pending_order().is_none());
        assert!(matches!(
            flow.retry_order(&mut h.ctx).await,
            Err(CheckoutError::Rejected(CoreError::InvalidTransition { .. }))
        ));
    }

    #[tokio::test]
    async fn test_preflight_failures_stay_local() {
        // empty cart
        let mut h = harness(0).await;
        let (mut flow, gateway) = checkout_flow(&h, GatewayOutcome::Closed);
        let err = flow
            .run(&mut h.ctx, delivery(), DailyUsage::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Rejected(CoreError::EmptyCart)));

        // invalid delivery info
        let mut h = harness(1).await;
        let mut bad = delivery();
        bad.phone = "call me".to_string();
        let err = flow
            .run(&mut h.ctx, bad, DailyUsage::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        // consumer over the daily bottle cap
        let mut h = harness(4).await;
        let err = flow
            .run(&mut h.ctx, delivery(), DailyUsage { bottles: 8, bundles: 0 })
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::LimitExceeded);
        assert!(err.user_message().contains("at most 10 bottles"));

        // only the login request ever went out
        assert_eq!(h.transport.requests().len(), 1);
        assert!(gateway.opened().is_empty());
        assert_eq!(flow.state(), &CheckoutState::Idle);
    }

    #[tokio::test]
    async fn test_signed_out_checkout_is_rejected() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut ctx = AppContext::new(
            ClientConfig::default(),
            Arc::new(MemoryStore::new()),
            transport.clone(),
            Arc::new(RecordingNavigator::default()),
        );
        ctx.cart_mut()
            .add(CartItem::new("p1", "Oud Noir", Money::from_major(4_500), 1))
            .unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let mut flow = CheckoutFlow::new(Arc::new(ScriptedGateway::new(GatewayOutcome::Closed)), notifier.clone());

        let err = flow
            .run(&mut ctx, delivery(), DailyUsage::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::NotSignedIn));
        assert!(transport.requests().is_empty());
        assert_eq!(notifier.toasts().len(), 1);
    }

    #[tokio::test]
    async fn test_gateway_and_init_failures() {
        let mut h = harness(1).await;
        let (mut flow, _) = checkout_flow(
            &h,
            GatewayOutcome::Failed {
                message: "Card declined".to_string(),
            },
        );
        push_session(&h);
        let err = flow
            .run(&mut h.ctx, delivery(), DailyUsage::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PaymentFailed);
        assert!(matches!(flow.state(), CheckoutState::Failed { .. }));

        // a failed attempt resets on the next run
        h.transport.push(503, "");
        let err = flow
            .run(&mut h.ctx, delivery(), DailyUsage::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Initialization(_)));
        assert!(matches!(flow.state(), CheckoutState::Failed { .. }));
        assert_eq!(h.ctx.cart().cart().count(), 1);
    }
}
