//! Test doubles shared by the unit tests in this crate.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::Value;

use crate::checkout::{GatewayOutcome, GatewayRequest, PaymentGateway};
use crate::error::{ClientError, ClientResult};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Method};
use crate::ui::{Navigator, Notifier, ToastKind};

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

/// A request as the fake transport saw it, with the bearer exposed.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub bearer: Option<String>,
}

/// Replays queued responses in order and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<ClientResult<ApiResponse>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, status: u16, body: &str) {
        lock(&self.responses).push_back(Ok(ApiResponse::new(status, body)));
    }

    pub fn push_json(&self, status: u16, body: Value) {
        self.push(status, &body.to_string());
    }

    pub fn fail_next(&self, reason: &str) {
        lock(&self.responses).push_back(Err(ClientError::Network(reason.to_string())));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        lock(&self.requests).push(RecordedRequest {
            method: request.method,
            path: request.path.clone(),
            query: request.query.clone(),
            body: request.body.clone(),
            bearer: request.bearer.as_ref().map(|t| t.expose_secret().to_string()),
        });
        lock(&self.responses).pop_front().unwrap_or_else(|| {
            Err(ClientError::Network(format!(
                "no scripted response for {} {}",
                request.method.as_str(),
                request.path
            )))
        })
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn routes(&self) -> Vec<String> {
        lock(&self.routes).clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: &str) {
        lock(&self.routes).push(route.to_string());
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    toasts: Mutex<Vec<(ToastKind, String)>>,
}

impl RecordingNotifier {
    pub fn toasts(&self) -> Vec<(ToastKind, String)> {
        lock(&self.toasts).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, kind: ToastKind, message: &str) {
        lock(&self.toasts).push((kind, message.to_string()));
    }
}

/// Gateway that returns a fixed outcome and remembers what it was opened with.
pub struct ScriptedGateway {
    outcome: GatewayOutcome,
    opened: Mutex<Vec<GatewayRequest>>,
}

impl ScriptedGateway {
    pub fn new(outcome: GatewayOutcome) -> Self {
        ScriptedGateway {
            outcome,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn opened(&self) -> Vec<GatewayRequest> {
        lock(&self.opened).clone()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn open(&self, request: GatewayRequest) -> GatewayOutcome {
        lock(&self.opened).push(request);
        self.outcome.clone()
    }
}
