//! Seline analytics tracker
//!
//! Observes page views and custom events on a host page, resolves a stable
//! visitor identity, and relays events to a collection endpoint. Opt-out and
//! automated browsers are respected, and nothing is ever raised into the
//! host.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use seline::{HttpTransport, ListenerBus, Location, MemoryHost, Options, Tracker};
//!
//! let host = Arc::new(MemoryHost::new().with_location(Location::new("/pricing")));
//! let bus = Arc::new(ListenerBus::new());
//!
//! let tracker = Tracker::builder(host, Arc::new(HttpTransport::new()?))
//!     .registrar(bus.clone())
//!     .build();
//!
//! // Calls before init are queued and replayed in order
//! tracker.track("signup: clicked", None);
//!
//! tracker.init(Options::new("project-token").with_mask_patterns(["/users/*"]));
//! tracker.set_user(serde_json::json!({"userId": "u-42", "plan": "pro"}));
//!
//! tracker.flush().await;
//! ```
//!
//! # Modules
//!
//! - [`tracker`] - Event composition, init/queue state machine, dispatch
//! - [`pathname`] - Skip/mask glob policy
//! - [`identity`] - Visitor identity and its one-way upgrade
//! - [`transport`] - Beacon and awaited delivery, `reqwest` implementation
//! - [`host`] - Host environment seams and in-memory/file implementations
//! - [`listeners`] - Navigation/visibility/click registration seam
//! - [`testing`] - Recording transport for tests

pub mod config;
pub mod cookie;
pub mod error;
pub mod event;
pub mod host;
pub mod identity;
pub mod listeners;
pub mod pathname;
pub mod queue;
pub mod testing;
pub mod tracker;
pub mod transport;

pub use config::{parse_patterns, Options, DEFAULT_API_HOST};
pub use error::{Result, TrackerError, TransportError, TransportResult};
pub use event::{EventBody, Payload, PendingEvent, QueueEvent, UserBody, UserData};
pub use host::{
    AutomationSignals, CookieJar, FileStorage, Host, Location, MemoryCookieJar, MemoryHost,
    MemoryStorage, Storage,
};
pub use identity::VisitorIdentity;
pub use listeners::{LinkClick, ListenerBus, ListenerRegistrar};
pub use pathname::{resolve, PathPolicy, ResolvedPath};
pub use queue::Phase;
pub use tracker::{Tracker, TrackerBuilder, OUTBOUND_EVENT};
pub use transport::{Delivery, HttpTransport, Transport, TransportResponse};
