//! Transport: how a serialized payload reaches the collection endpoint.
//!
//! Two strategies behind one trait:
//!
//! - **beacon** - fire-and-forget, nothing comes back
//! - **post** - a JSON POST whose reply is read, needed whenever the reply
//!   may carry a server-assigned visitor id
//!
//! Both are *initiated* synchronously and complete on the async runtime, so
//! the order of calls into a transport is the order requests were issued.

pub mod http;

pub use http::HttpTransport;

use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use crate::error::TransportResult;

/// Completion of a beacon. Carries no response.
pub type PendingBeacon = BoxFuture<'static, TransportResult<()>>;

/// Completion of an awaited POST.
pub type PendingResponse = BoxFuture<'static, TransportResult<TransportResponse>>;

/// Sends request bodies to the collector.
///
/// Both methods are called with the tracker's state lock held, so they must
/// start the request and return without calling back into the tracker. An
/// `Err` means the request never started.
pub trait Transport: Send + Sync {
    /// Queue a fire-and-forget delivery.
    fn beacon(&self, url: &str, body: String) -> TransportResult<PendingBeacon>;

    /// Start a POST whose response will be read.
    fn post(&self, url: &str, body: String) -> TransportResult<PendingResponse>;
}

/// Delivery strategy for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Beacon,
    Awaited,
}

impl Delivery {
    /// Beacon only when the caller prefers it and no identity reply is
    /// pending on this request.
    pub fn select(prefer_beacon: bool, awaiting_identity: bool) -> Self {
        if prefer_beacon && !awaiting_identity {
            Delivery::Beacon
        } else {
            Delivery::Awaited
        }
    }
}

/// Status and raw body of an awaited reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityReply {
    visitor_id: Option<String>,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Server-assigned visitor id, if the body is JSON carrying a non-empty
    /// `visitorId` string. Anything else counts as "no id this time".
    pub fn visitor_id(&self) -> Option<String> {
        match serde_json::from_str::<IdentityReply>(&self.body) {
            Ok(reply) => reply.visitor_id.filter(|id| !id.is_empty()),
            Err(e) => {
                debug!(status = self.status, error = %e, "Reply carries no visitor id");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_selection() {
        assert_eq!(Delivery::select(true, false), Delivery::Beacon);
        assert_eq!(Delivery::select(true, true), Delivery::Awaited);
        assert_eq!(Delivery::select(false, false), Delivery::Awaited);
        assert_eq!(Delivery::select(false, true), Delivery::Awaited);
    }

    #[test]
    fn test_visitor_id_from_reply() {
        let reply = TransportResponse::new(200, r#"{"visitorId":"abc"}"#);
        assert!(reply.is_success());
        assert_eq!(reply.visitor_id(), Some("abc".into()));
    }

    #[test]
    fn test_malformed_reply_has_no_visitor_id() {
        assert_eq!(TransportResponse::new(200, "ok").visitor_id(), None);
        assert_eq!(TransportResponse::new(200, "{}").visitor_id(), None);
        assert_eq!(
            TransportResponse::new(200, r#"{"visitorId":""}"#).visitor_id(),
            None
        );
        assert_eq!(
            TransportResponse::new(200, r#"{"visitorId":42}"#).visitor_id(),
            None
        );
    }

    #[test]
    fn test_status_classes() {
        assert!(TransportResponse::new(204, "").is_success());
        assert!(!TransportResponse::new(404, "").is_success());
        assert!(!TransportResponse::new(500, "").is_success());
    }
}
