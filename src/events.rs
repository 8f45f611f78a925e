//! Flow events
//!
//! The authority and the gate report every protocol step through an
//! [`EventSink`] handed to them at construction. The default sink writes a
//! structured `tracing` event and bumps the matching Prometheus counter.

use std::sync::Arc;

use crate::metrics::{GATE_DECISIONS_TOTAL, LOGIN_ATTEMPTS_TOTAL};

/// One observable step of the login protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    /// Authority stored a new attempt and handed out a provider URL.
    AttemptCreated { rid: String },
    /// Provider code exchanged and identity recorded on the attempt.
    AttemptExchanged { rid: String, login: String },
    /// Exchange failed; the attempt stays pending until it expires.
    ExchangeFailed { rid: String, reason: String },
    /// Gate claimed the result of an attempt.
    AttemptConsumed { rid: String },
    /// A rid was presented that is unknown, expired or already used.
    InvalidRid { rid: String },
    /// Expired attempts removed by the sweeper.
    AttemptsPurged { count: usize },
    /// Gate sent the browser to log in.
    LoginRedirect { uri: String },
    /// Gate could not obtain a login URL from the authority.
    LoginRedirectFailed { reason: String },
    /// Gate minted a session after a successful callback.
    SessionIssued { login: String },
    /// Gate callback could not complete.
    CallbackFailed { reason: String },
    /// Authenticated identity rejected by the whitelist.
    Forbidden { id: String, login: String },
    /// Request passed the gate and went to the origin.
    Forwarded { login: String },
    /// HTTP routes mounted on a router.
    RoutesMounted { component: &'static str, routes: Vec<&'static str> },
}

/// Receiver for [`FlowEvent`]s.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: FlowEvent);
}

/// Shared handle used by the router states.
pub type SharedEventSink = Arc<dyn EventSink>;

/// Default sink: structured tracing plus Prometheus counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: FlowEvent) {
        match event {
            FlowEvent::AttemptCreated { rid } => {
                LOGIN_ATTEMPTS_TOTAL
                    .with_label_values(&["page_url", "ok"])
                    .inc();
                tracing::info!(%rid, "Login attempt created");
            }
            FlowEvent::AttemptExchanged { rid, login } => {
                LOGIN_ATTEMPTS_TOTAL
                    .with_label_values(&["exchange", "ok"])
                    .inc();
                tracing::info!(%rid, %login, "Authorization code exchanged");
            }
            FlowEvent::ExchangeFailed { rid, reason } => {
                LOGIN_ATTEMPTS_TOTAL
                    .with_label_values(&["exchange", "failed"])
                    .inc();
                tracing::warn!(%rid, %reason, "Authorization code exchange failed");
            }
            FlowEvent::AttemptConsumed { rid } => {
                LOGIN_ATTEMPTS_TOTAL
                    .with_label_values(&["result", "ok"])
                    .inc();
                tracing::info!(%rid, "Login result consumed");
            }
            FlowEvent::InvalidRid { rid } => {
                LOGIN_ATTEMPTS_TOTAL
                    .with_label_values(&["result", "invalid_rid"])
                    .inc();
                tracing::debug!(%rid, "Invalid rid presented");
            }
            FlowEvent::AttemptsPurged { count } => {
                tracing::debug!(count, "Expired login attempts purged");
            }
            FlowEvent::LoginRedirect { uri } => {
                GATE_DECISIONS_TOTAL
                    .with_label_values(&["login_redirect"])
                    .inc();
                tracing::debug!(%uri, "Redirecting to login");
            }
            FlowEvent::LoginRedirectFailed { reason } => {
                GATE_DECISIONS_TOTAL
                    .with_label_values(&["login_redirect_failed"])
                    .inc();
                tracing::error!(%reason, "Failed to obtain login URL from authority");
            }
            FlowEvent::SessionIssued { login } => {
                GATE_DECISIONS_TOTAL.with_label_values(&["callback_ok"]).inc();
                tracing::info!(%login, "Session issued");
            }
            FlowEvent::CallbackFailed { reason } => {
                GATE_DECISIONS_TOTAL
                    .with_label_values(&["callback_failed"])
                    .inc();
                tracing::warn!(%reason, "Login callback failed");
            }
            FlowEvent::Forbidden { id, login } => {
                GATE_DECISIONS_TOTAL.with_label_values(&["forbidden"]).inc();
                tracing::info!(%id, %login, "Identity not in whitelist");
            }
            FlowEvent::Forwarded { login } => {
                GATE_DECISIONS_TOTAL.with_label_values(&["forwarded"]).inc();
                tracing::trace!(%login, "Forwarding to origin");
            }
            FlowEvent::RoutesMounted { component, routes } => {
                for route in routes {
                    tracing::debug!(component, route, "Route mounted");
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Sink that keeps every event for assertions.
    #[derive(Default)]
    pub struct RecordingSink {
        events: Mutex<Vec<FlowEvent>>,
    }

    impl RecordingSink {
        pub fn events(&self) -> Vec<FlowEvent> {
            self.events.lock().expect("sink lock").clone()
        }
    }

    impl EventSink for RecordingSink {
        fn emit(&self, event: FlowEvent) {
            self.events.lock().expect("sink lock").push(event);
        }
    }
}
