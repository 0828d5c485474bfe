//! Testing utilities including a recording transport.
//!
//! Useful for testing hosts that embed the tracker without making real
//! network calls. Pair with [`crate::host::MemoryHost`] and
//! [`crate::listeners::ListenerBus`].

use std::collections::VecDeque;
use std::sync::Arc;

use futures::future;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{TransportError, TransportResult};
use crate::transport::{
    Delivery, PendingBeacon, PendingResponse, Transport, TransportResponse,
};

/// Record of a request handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub url: String,
    pub delivery: Delivery,
    /// Parsed body; `Value::Null` if the body was not JSON.
    pub body: Value,
}

impl RecordedRequest {
    /// Top-level string field of the body.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.body.get(name).and_then(Value::as_str)
    }

    pub fn is_user_update(&self) -> bool {
        self.url.ends_with(crate::config::USER_PATH)
    }
}

/// Scripted outcome of an awaited request.
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond(TransportResponse),
    /// The request fails after being started (connection refused, ...).
    NetworkError(String),
}

/// A transport that records every request in call order and answers awaited
/// ones from a script.
///
/// Replies are consumed in order; once the script runs out every awaited
/// request gets `200 {}`.
#[derive(Default)]
pub struct RecordingTransport {
    requests: Mutex<Vec<RecordedRequest>>,
    replies: Mutex<VecDeque<MockReply>>,
    unavailable: Mutex<bool>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a reply for the next awaited request.
    pub fn reply(&self, status: u16, body: impl Into<String>) {
        self.replies
            .lock()
            .push_back(MockReply::Respond(TransportResponse::new(status, body)));
    }

    /// Queue a `200` reply assigning `visitor_id`.
    pub fn reply_with_visitor(&self, visitor_id: &str) {
        self.reply(200, format!(r#"{{"visitorId":"{}"}}"#, visitor_id));
    }

    /// Queue a failure for the next awaited request.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.replies
            .lock()
            .push_back(MockReply::NetworkError(message.into()));
    }

    /// Make every call fail synchronously, as if the API were missing.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock() = unavailable;
    }

    /// Every request so far, in call order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Event names in call order; page views show up as `"<page>"` and user
    /// updates as `"<user>"`.
    pub fn timeline(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| {
                if r.is_user_update() {
                    "<user>".to_string()
                } else {
                    r.field("name")
                        .map(str::to_string)
                        .unwrap_or_else(|| "<page>".to_string())
                }
            })
            .collect()
    }

    fn record(&self, url: &str, body: &str, delivery: Delivery) -> TransportResult<()> {
        if *self.unavailable.lock() {
            return Err(TransportError::Unavailable("recording transport disabled".into()));
        }

        self.requests.lock().push(RecordedRequest {
            url: url.to_string(),
            delivery,
            body: serde_json::from_str(body).unwrap_or(Value::Null),
        });
        Ok(())
    }
}

impl Transport for RecordingTransport {
    fn beacon(&self, url: &str, body: String) -> TransportResult<PendingBeacon> {
        self.record(url, &body, Delivery::Beacon)?;
        Ok(future::ready(Ok(())).boxed())
    }

    fn post(&self, url: &str, body: String) -> TransportResult<PendingResponse> {
        self.record(url, &body, Delivery::Awaited)?;

        let reply = self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| MockReply::Respond(TransportResponse::new(200, "{}")));

        let result = match reply {
            MockReply::Respond(response) => Ok(response),
            MockReply::NetworkError(message) => Err(TransportError::Network(message)),
        };
        Ok(future::ready(result).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_in_call_order() {
        let transport = RecordingTransport::new();
        transport
            .beacon("https://x/s/e", r#"{"name":"a"}"#.into())
            .unwrap()
            .await
            .unwrap();
        transport
            .post("https://x/s/su", r#"{"fields":{}}"#.into())
            .unwrap()
            .await
            .unwrap();

        assert_eq!(transport.timeline(), vec!["a", "<user>"]);
        assert_eq!(transport.requests()[0].delivery, Delivery::Beacon);
        assert_eq!(transport.requests()[1].delivery, Delivery::Awaited);
    }

    #[tokio::test]
    async fn test_scripted_replies() {
        let transport = RecordingTransport::new();
        transport.reply_with_visitor("v1");
        transport.fail_next("boom");

        let first = transport.post("u", "{}".into()).unwrap().await.unwrap();
        assert_eq!(first.visitor_id(), Some("v1".into()));

        let second = transport.post("u", "{}".into()).unwrap().await;
        assert!(second.is_err());

        let third = transport.post("u", "{}".into()).unwrap().await.unwrap();
        assert_eq!(third.status, 200);
    }

    #[test]
    fn test_unavailable_fails_synchronously() {
        let transport = RecordingTransport::new();
        transport.set_unavailable(true);

        assert!(transport.beacon("u", "{}".into()).is_err());
        assert_eq!(transport.count(), 0);
    }
}
