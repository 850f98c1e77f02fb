//! UI seams: navigation and toast notifications.
//!
//! The client never renders anything. It tells the frontend where to go and
//! what to show through these two traits.

use std::fmt;

/// Severity of a toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Success,
    Error,
}

impl fmt::Display for ToastKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToastKind::Info => write!(f, "info"),
            ToastKind::Success => write!(f, "success"),
            ToastKind::Error => write!(f, "error"),
        }
    }
}

/// Moves the UI to another route (a hard navigation on the web).
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &str);
}

/// Shows transient messages to the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: ToastKind, message: &str);
}

/// Route of the order tracking view.
pub fn order_tracking_route(order_id: &str) -> String {
    format!("/orders/{}/track", order_id)
}
