//! Visitor identity.
//!
//! A tracker starts out anonymous unless a visitor cookie from an earlier
//! load is found. A server reply may then assign an id, once. Later replies
//! never replace it, so racing responses cannot roll the identity back.

use serde_json::Value;
use tracing::debug;

use crate::cookie::VISITOR_COOKIE;
use crate::event::{Payload, UserData};
use crate::host::CookieJar;

/// Field of the user data used as a fallback visitor id.
pub const USER_ID_FIELD: &str = "userId";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VisitorIdentity {
    #[default]
    Anonymous,
    Identified(String),
}

impl VisitorIdentity {
    /// Read the persisted visitor id, if any.
    pub fn load(cookies: &dyn CookieJar) -> Self {
        match cookies.get(VISITOR_COOKIE).filter(|id| !id.is_empty()) {
            Some(id) => {
                debug!(visitor_id = %id, "Loaded persisted visitor id");
                VisitorIdentity::Identified(id)
            }
            None => VisitorIdentity::Anonymous,
        }
    }

    pub fn visitor_id(&self) -> Option<&str> {
        match self {
            VisitorIdentity::Anonymous => None,
            VisitorIdentity::Identified(id) => Some(id),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, VisitorIdentity::Anonymous)
    }

    /// Stamp the payload with the visitor id. A `userId` from user data is
    /// used only when no visitor id is known.
    pub fn attach(&self, payload: &mut Payload, user_data: &UserData) {
        if let Some(id) = self.visitor_id() {
            payload.set_visitor_id(id);
        } else if let Some(user_id) = user_data.get(USER_ID_FIELD).and_then(fallback_id) {
            payload.set_visitor_id(user_id);
        }
    }

    /// Adopt a server-assigned id. Only effective while anonymous; returns
    /// whether the identity changed.
    pub fn upgrade(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if id.is_empty() {
            return false;
        }

        match self {
            VisitorIdentity::Anonymous => {
                *self = VisitorIdentity::Identified(id);
                true
            }
            VisitorIdentity::Identified(current) => {
                if *current != id {
                    debug!(current = %current, ignored = %id, "Visitor already identified");
                }
                false
            }
        }
    }
}

/// A non-empty string or non-zero number, rendered as an id.
fn fallback_id(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventBody, UserBody};
    use crate::host::MemoryCookieJar;
    use serde_json::json;

    fn user(value: serde_json::Value) -> UserData {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_load_from_cookie() {
        let jar = MemoryCookieJar::new().with_cookie(VISITOR_COOKIE, "v-123");
        assert_eq!(
            VisitorIdentity::load(&jar),
            VisitorIdentity::Identified("v-123".into())
        );
    }

    #[test]
    fn test_load_without_cookie_is_anonymous() {
        let jar = MemoryCookieJar::new();
        assert!(VisitorIdentity::load(&jar).is_anonymous());

        let empty = MemoryCookieJar::new().with_cookie(VISITOR_COOKIE, "");
        assert!(VisitorIdentity::load(&empty).is_anonymous());
    }

    #[test]
    fn test_upgrade_is_monotonic() {
        let mut identity = VisitorIdentity::Anonymous;

        assert!(identity.upgrade("first"));
        assert!(!identity.upgrade("second"));
        assert_eq!(identity.visitor_id(), Some("first"));
    }

    #[test]
    fn test_upgrade_ignores_empty_id() {
        let mut identity = VisitorIdentity::Anonymous;
        assert!(!identity.upgrade(""));
        assert!(identity.is_anonymous());
    }

    #[test]
    fn test_attach_prefers_visitor_id_over_user_id() {
        let identity = VisitorIdentity::Identified("server-id".into());
        let mut payload = Payload::Event(EventBody::default());

        identity.attach(&mut payload, &user(json!({"userId": "user-7"})));
        assert_eq!(payload.visitor_id(), Some("server-id"));
    }

    #[test]
    fn test_attach_falls_back_to_user_id() {
        let identity = VisitorIdentity::Anonymous;
        let mut payload = Payload::User(UserBody::default());

        identity.attach(&mut payload, &user(json!({"userId": "user-7"})));
        assert_eq!(payload.visitor_id(), Some("user-7"));
    }

    #[test]
    fn test_attach_falls_back_to_numeric_user_id() {
        let identity = VisitorIdentity::Anonymous;
        let mut payload = Payload::Event(EventBody::default());

        identity.attach(&mut payload, &user(json!({"userId": 42})));
        assert_eq!(payload.visitor_id(), Some("42"));
    }

    #[test]
    fn test_attach_ignores_falsy_user_ids() {
        let identity = VisitorIdentity::Anonymous;

        for user_id in [json!(""), json!(0), json!(false), json!(null)] {
            let mut payload = Payload::Event(EventBody::default());
            identity.attach(&mut payload, &user(json!({ "userId": user_id })));
            assert_eq!(payload.visitor_id(), None);
        }
    }

    #[test]
    fn test_attach_leaves_anonymous_payload_alone() {
        let identity = VisitorIdentity::Anonymous;
        let mut payload = Payload::Event(EventBody::default());

        identity.attach(&mut payload, &UserData::new());
        assert_eq!(payload.visitor_id(), None);
    }
}
