//! Wire payloads and the calls captured before initialization.

use serde::Serialize;
use serde_json::{Map, Value};

/// Accumulated `set_user` fields.
pub type UserData = Map<String, Value>;

/// Body of `POST {api_host}/s/e`.
///
/// Custom events carry `name`; page views carry `referrer` (when there is
/// one) and no `name`. Absent fields are omitted from the JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pathname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visitor_id: Option<String>,
}

/// Body of `POST {api_host}/s/su`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub fields: UserData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visitor_id: Option<String>,
}

/// An outgoing request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Event(EventBody),
    User(UserBody),
}

impl Payload {
    pub fn visitor_id(&self) -> Option<&str> {
        match self {
            Payload::Event(body) => body.visitor_id.as_deref(),
            Payload::User(body) => body.visitor_id.as_deref(),
        }
    }

    pub fn set_visitor_id(&mut self, id: impl Into<String>) {
        let id = Some(id.into());
        match self {
            Payload::Event(body) => body.visitor_id = id,
            Payload::User(body) => body.visitor_id = id,
        }
    }
}

/// Where the event was observed: raw path plus query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathCapture {
    pub path: String,
    /// Appended to the resolved path; empty for caller-supplied paths.
    pub search: String,
}

/// An event call made before initialization, held unresolved until replay so
/// the configured path policy applies to it.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingEvent {
    Custom {
        name: String,
        data: Option<Value>,
        location: Option<PathCapture>,
    },
    PageView {
        location: PathCapture,
    },
}

/// One entry of the pre-init queue.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    Event(PendingEvent),
    /// Snapshot of the merged user data at call time.
    User(UserData),
}
