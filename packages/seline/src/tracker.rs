//! The tracker: event composition, the init/queue state machine, dispatch,
//! and visitor upgrades from server replies.
//!
//! # Ordering
//!
//! Every public call takes the state lock, and transport calls are initiated
//! while it is held, so requests reach the transport in call order. Calls
//! made before [`Tracker::init`] are queued and replayed, in order, inside
//! the init transition. Replies are applied later from runtime tasks that
//! re-take the lock.
//!
//! # Failure
//!
//! Nothing here returns an error or panics into the caller. Opt-out,
//! automation and skip patterns are silent no-ops; transport failures are
//! logged and dropped.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config::{Endpoints, Options};
use crate::cookie::SetCookie;
use crate::event::{
    EventBody, PathCapture, Payload, PendingEvent, QueueEvent, UserBody, UserData,
};
use crate::host::{Host, DO_NOT_TRACK_KEY, REFERRER_SENT_KEY};
use crate::identity::VisitorIdentity;
use crate::listeners::{LinkClick, ListenerRegistrar};
use crate::pathname::{PathPolicy, ResolvedPath};
use crate::queue::{InitQueue, Phase};
use crate::transport::{Delivery, PendingResponse, Transport, TransportResponse};

/// Event name used for outbound link clicks.
pub const OUTBOUND_EVENT: &str = "outbound link: clicked";

/// Value written under the referrer session marker.
const REFERRER_SENT_VALUE: &str = "set";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Event,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendOutcome {
    Dispatched,
    Suppressed,
    Failed,
}

#[derive(Default)]
struct TrackerState {
    phase: Phase,
    options: Options,
    policy: PathPolicy,
    endpoints: Endpoints,
    identity: VisitorIdentity,
    user_data: UserData,
    last_page: Option<String>,
    referrer: Option<String>,
    queue: InitQueue,
    /// Runtime cookie flag; `enable_cookie_mode` can turn it on after init.
    cookie_mode: bool,
    auto_page_view: bool,
    listeners_registered: bool,
}

struct Inner {
    host: Arc<dyn Host>,
    transport: Arc<dyn Transport>,
    registrar: Option<Arc<dyn ListenerRegistrar>>,
    tasks: TaskTracker,
    /// Held across a whole flush so one flush cannot reopen the task
    /// tracker while another is still waiting on it.
    flush_lock: tokio::sync::Mutex<()>,
    state: Mutex<TrackerState>,
}

/// Handle to one tracker instance. Clones share the same state.
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<Inner>,
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Tracker")
            .field("phase", &state.phase)
            .field("identity", &state.identity)
            .field("queued", &state.queue.len())
            .finish()
    }
}

/// Builder for [`Tracker`].
pub struct TrackerBuilder {
    host: Arc<dyn Host>,
    transport: Arc<dyn Transport>,
    registrar: Option<Arc<dyn ListenerRegistrar>>,
}

impl TrackerBuilder {
    /// Where navigation, visibility and link-click handlers get registered.
    pub fn registrar(mut self, registrar: Arc<dyn ListenerRegistrar>) -> Self {
        self.registrar = Some(registrar);
        self
    }

    /// Build an uninitialized tracker. Calls are queued until `init`.
    pub fn build(self) -> Tracker {
        Tracker {
            inner: Arc::new(Inner {
                host: self.host,
                transport: self.transport,
                registrar: self.registrar,
                tasks: TaskTracker::new(),
                flush_lock: tokio::sync::Mutex::new(()),
                state: Mutex::new(TrackerState::default()),
            }),
        }
    }

    /// Build and initialize in one step, as a script-tag embed does.
    pub fn init(self, options: Options) -> Tracker {
        let tracker = self.build();
        tracker.init(options);
        tracker
    }
}

impl Tracker {
    pub fn builder(host: Arc<dyn Host>, transport: Arc<dyn Transport>) -> TrackerBuilder {
        TrackerBuilder {
            host,
            transport,
            registrar: None,
        }
    }

    /// An uninitialized tracker without a listener registrar.
    pub fn new(host: Arc<dyn Host>, transport: Arc<dyn Transport>) -> Self {
        Self::builder(host, transport).build()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Apply options and go live. Only the first call has any effect.
    ///
    /// In order: load the persisted visitor id, resolve the referrer, replay
    /// queued calls, then (with auto page view) register listeners and report
    /// the current page.
    pub fn init(&self, options: Options) {
        let auto_page_view = {
            let mut state = self.inner.state.lock();
            if state.phase != Phase::Uninitialized {
                debug!(phase = ?state.phase, "Tracker already initialized");
                return;
            }
            state.phase = Phase::Initializing;

            state.policy = PathPolicy::new(&options.mask_patterns, &options.skip_patterns);
            state.endpoints = options.endpoints();
            state.cookie_mode = state.cookie_mode || options.cookie_mode;
            state.auto_page_view = state.auto_page_view || options.auto_page_view;
            state.options = options;

            state.identity = VisitorIdentity::load(self.inner.host.cookies());

            let referrer_sent = self
                .inner
                .host
                .session_storage()
                .get(REFERRER_SENT_KEY)
                .is_some();
            state.referrer = if referrer_sent {
                Some(String::new())
            } else {
                self.inner.host.referrer()
            };

            let queued = state.queue.drain();
            info!(
                queued = queued.len(),
                identified = !state.identity.is_anonymous(),
                "Initializing tracker"
            );
            for event in queued {
                self.replay(&mut state, event);
            }

            state.phase = Phase::Ready;
            state.auto_page_view
        };

        if auto_page_view {
            self.register_listeners();
        }
    }

    pub fn phase(&self) -> Phase {
        self.inner.state.lock().phase
    }

    pub fn is_ready(&self) -> bool {
        self.phase().is_ready()
    }

    pub fn visitor_id(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .identity
            .visitor_id()
            .map(str::to_string)
    }

    pub fn user_data(&self) -> UserData {
        self.inner.state.lock().user_data.clone()
    }

    /// Whether automatic page views are on, from options or
    /// `enable_auto_page_view`.
    pub fn auto_page_view(&self) -> bool {
        self.inner.state.lock().auto_page_view
    }

    /// Number of calls waiting for `init`.
    pub fn queued(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Wait for in-flight requests and their reply handling to finish.
    pub async fn flush(&self) {
        let _guard = self.inner.flush_lock.lock().await;
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        self.inner.tasks.reopen();
    }

    // =========================================================================
    // Public surface
    // =========================================================================

    /// Record a custom event on the current page.
    pub fn track(&self, name: &str, data: Option<Value>) {
        if self.inner.host.tracking_disabled() {
            debug!(event = name, "Tracking disabled, dropping event");
            return;
        }

        let location = self.current_capture();
        let mut state = self.inner.state.lock();

        if !state.phase.is_ready() {
            let pending = PendingEvent::Custom {
                name: name.to_string(),
                data,
                location,
            };
            if state.queue.push(QueueEvent::Event(pending)) {
                debug!(event = name, queued = state.queue.len(), "Queued event until init");
            }
            return;
        }

        self.emit_custom(&mut state, name.to_string(), data, location);
    }

    /// Report a page view for `custom_path`, or for the current location.
    ///
    /// A repeat of the last reported path is ignored, so redundant
    /// navigation signals for the same URL report once.
    pub fn page(&self, custom_path: Option<&str>) {
        if self.inner.host.tracking_disabled() {
            debug!("Tracking disabled, dropping page view");
            return;
        }

        let capture = match custom_path {
            Some(path) => PathCapture {
                path: path.to_string(),
                search: String::new(),
            },
            None => match self.current_capture() {
                Some(capture) => capture,
                None => {
                    debug!("No location to report");
                    return;
                }
            },
        };

        let mut state = self.inner.state.lock();
        if state.last_page.as_deref() == Some(capture.path.as_str()) {
            debug!(path = %capture.path, "Duplicate page view ignored");
            return;
        }
        state.last_page = Some(capture.path.clone());

        if !state.phase.is_ready() {
            if state
                .queue
                .push(QueueEvent::Event(PendingEvent::PageView { location: capture }))
            {
                debug!(queued = state.queue.len(), "Queued page view until init");
            }
            return;
        }

        self.emit_page_view(&mut state, capture);
    }

    /// Merge fields into the user data and send the result.
    ///
    /// Merging happens immediately, even before init. The request always
    /// waits for the reply since it may carry the visitor id.
    pub fn set_user(&self, data: Value) {
        if self.inner.host.tracking_disabled() {
            debug!("Tracking disabled, dropping user update");
            return;
        }

        let Value::Object(fields) = data else {
            warn!("set_user expects a JSON object, ignoring");
            return;
        };

        let mut state = self.inner.state.lock();
        state.user_data.extend(fields);
        let snapshot = state.user_data.clone();

        if !state.phase.is_ready() {
            if state.queue.push(QueueEvent::User(snapshot)) {
                debug!(queued = state.queue.len(), "Queued user update until init");
            }
            return;
        }

        self.emit_user(&mut state, snapshot);
    }

    /// Turn on automatic page views after the fact.
    pub fn enable_auto_page_view(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.auto_page_view {
                return;
            }
            state.auto_page_view = true;
        }
        self.register_listeners();
    }

    /// Opt this visitor out. Persists across loads through local storage.
    pub fn do_not_track(&self) {
        match self
            .inner
            .host
            .local_storage()
            .set(DO_NOT_TRACK_KEY, "1")
        {
            Ok(()) => info!("Visitor opted out of tracking"),
            Err(e) => warn!(error = %e, "Failed to store opt-out flag"),
        }
    }

    /// Persist the visitor id from now on, starting with the current one.
    pub fn enable_cookie_mode(&self) {
        let visitor_id = {
            let mut state = self.inner.state.lock();
            state.cookie_mode = true;
            state.identity.visitor_id().map(str::to_string)
        };

        if let Some(id) = visitor_id {
            self.persist_visitor(&id);
        }
    }

    /// Report a click on a link leaving the site, if outbound tracking is on.
    pub fn track_link_click(&self, click: &LinkClick) {
        if !self.inner.state.lock().options.outbound {
            return;
        }

        let current = self.inner.host.hostname().unwrap_or_default();
        if !click.is_outbound(&current) {
            return;
        }

        self.track(
            OUTBOUND_EVENT,
            Some(json!({
                "url": click.href,
                "text": click.text.trim(),
                "hostname": click.hostname,
            })),
        );
    }

    // =========================================================================
    // Composition
    // =========================================================================

    fn current_capture(&self) -> Option<PathCapture> {
        self.inner
            .host
            .location()
            .filter(|l| !l.pathname.is_empty())
            .map(|l| PathCapture {
                path: l.pathname,
                search: l.search,
            })
    }

    fn replay(&self, state: &mut TrackerState, event: QueueEvent) {
        match event {
            QueueEvent::Event(PendingEvent::Custom {
                name,
                data,
                location,
            }) => self.emit_custom(state, name, data, location),
            QueueEvent::Event(PendingEvent::PageView { location }) => {
                self.emit_page_view(state, location)
            }
            QueueEvent::User(fields) => self.emit_user(state, fields),
        }
    }

    fn emit_custom(
        &self,
        state: &mut TrackerState,
        name: String,
        data: Option<Value>,
        location: Option<PathCapture>,
    ) {
        let pathname = match location {
            Some(capture) => match state.policy.resolve(&capture.path) {
                ResolvedPath::Suppressed => {
                    debug!(event = %name, path = %capture.path, "Event skipped by path policy");
                    return;
                }
                ResolvedPath::Report(path) => Some(format!("{}{}", path, capture.search)),
            },
            None => None,
        };

        let body = EventBody {
            token: state.options.token.clone(),
            name: Some(name),
            pathname,
            data,
            ..Default::default()
        };
        self.send(state, Endpoint::Event, Payload::Event(body), true);
    }

    fn emit_page_view(&self, state: &mut TrackerState, capture: PathCapture) {
        let Some(path) = state.policy.resolve(&capture.path).into_path() else {
            debug!(path = %capture.path, "Page view skipped by path policy");
            return;
        };

        let hostname = self.inner.host.hostname();
        let referrer = state.referrer.take().filter(|r| {
            !r.is_empty() && !hostname.as_deref().is_some_and(|h| r.contains(h))
        });

        let body = EventBody {
            token: state.options.token.clone(),
            pathname: Some(format!("{}{}", path, capture.search)),
            referrer: referrer.clone(),
            ..Default::default()
        };
        let outcome = self.send(state, Endpoint::Event, Payload::Event(body), true);

        if let Some(referrer) = referrer {
            if outcome == SendOutcome::Dispatched {
                if let Err(e) = self
                    .inner
                    .host
                    .session_storage()
                    .set(REFERRER_SENT_KEY, REFERRER_SENT_VALUE)
                {
                    warn!(error = %e, "Failed to mark referrer as sent");
                }
            } else {
                state.referrer = Some(referrer);
            }
        }
    }

    fn emit_user(&self, state: &mut TrackerState, fields: UserData) {
        let body = UserBody {
            token: state.options.token.clone(),
            fields,
            visitor_id: None,
        };
        self.send(state, Endpoint::User, Payload::User(body), false);
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    fn send(
        &self,
        state: &mut TrackerState,
        endpoint: Endpoint,
        mut payload: Payload,
        prefer_beacon: bool,
    ) -> SendOutcome {
        let host = &self.inner.host;
        if host.tracking_disabled() {
            debug!(?endpoint, "Send suppressed: visitor opted out");
            return SendOutcome::Suppressed;
        }
        if host.automation().is_automated() {
            debug!(?endpoint, "Send suppressed: automated browser");
            return SendOutcome::Suppressed;
        }

        state.identity.attach(&mut payload, &state.user_data);
        let awaiting_identity = state.cookie_mode && state.identity.is_anonymous();
        let delivery = Delivery::select(prefer_beacon, awaiting_identity);

        let url = match endpoint {
            Endpoint::Event => state.endpoints.event.clone(),
            Endpoint::User => state.endpoints.user.clone(),
        };

        let body = match serde_json::to_string(&payload) {
            Ok(body) => body,
            Err(e) => {
                error!(url = %url, error = %e, "Failed to serialize payload");
                return SendOutcome::Failed;
            }
        };

        let started = match delivery {
            Delivery::Beacon => self.inner.transport.beacon(&url, body).map(|pending| {
                let url = url.clone();
                self.spawn(async move {
                    if let Err(e) = pending.await {
                        warn!(url = %url, error = %e, "Beacon failed");
                    }
                })
            }),
            Delivery::Awaited => self.inner.transport.post(&url, body).map(|pending| {
                self.spawn(settle(
                    Arc::downgrade(&self.inner),
                    endpoint,
                    url.clone(),
                    pending,
                ))
            }),
        };

        match started {
            Ok(true) => {
                debug!(?endpoint, ?delivery, "Request dispatched");
                SendOutcome::Dispatched
            }
            Ok(false) => SendOutcome::Failed,
            Err(e) => {
                error!(url = %url, error = %e, "Failed to send");
                SendOutcome::Failed
            }
        }
    }

    fn spawn<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match Handle::try_current() {
            Ok(handle) => {
                self.inner.tasks.spawn_on(task, &handle);
                true
            }
            Err(_) => {
                error!("No async runtime available, request dropped");
                false
            }
        }
    }

    /// Apply a reply that may carry a server-assigned visitor id.
    fn absorb_reply(&self, endpoint: Endpoint, response: &TransportResponse) {
        let mut state = self.inner.state.lock();
        if !state.identity.is_anonymous() {
            return;
        }

        let persist = match endpoint {
            Endpoint::Event => {
                if !state.cookie_mode || !response.is_success() {
                    return;
                }
                true
            }
            Endpoint::User => state.options.cookie_on_identify || state.cookie_mode,
        };

        let Some(id) = response.visitor_id() else {
            return;
        };
        if !state.identity.upgrade(id.clone()) {
            return;
        }
        info!(visitor_id = %id, persist, "Visitor identified");

        if persist {
            self.persist_visitor(&id);
        }
    }

    fn persist_visitor(&self, id: &str) {
        let host = &self.inner.host;
        let cookie = SetCookie::visitor(id, host.hostname().as_deref(), Utc::now());
        if let Err(e) = host.cookies().set(&cookie) {
            warn!(error = %e, "Failed to persist visitor id");
        }
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    fn register_listeners(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.listeners_registered {
                return;
            }
            state.listeners_registered = true;
        }

        let Some(registrar) = self.inner.registrar.clone() else {
            self.page(None);
            return;
        };

        let weak = Arc::downgrade(&self.inner);
        registrar.on_navigate(Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                Tracker { inner }.page(None);
            }
        }));

        let weak = Arc::downgrade(&self.inner);
        registrar.on_link_click(Arc::new(move |click: &LinkClick| {
            if let Some(inner) = weak.upgrade() {
                Tracker { inner }.track_link_click(click);
            }
        }));

        if registrar.is_visible() {
            self.page(None);
        } else {
            let weak = Arc::downgrade(&self.inner);
            registrar.on_visible(Arc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    let tracker = Tracker { inner };
                    let nothing_reported = tracker.inner.state.lock().last_page.is_none();
                    if nothing_reported {
                        tracker.page(None);
                    }
                }
            }));
        }
    }
}

/// Await a reply and hand it to the tracker, if the tracker still exists.
async fn settle(inner: Weak<Inner>, endpoint: Endpoint, url: String, pending: PendingResponse) {
    let response = match pending.await {
        Ok(response) => response,
        Err(e) => {
            warn!(url = %url, error = %e, "Request failed");
            return;
        }
    };

    if !response.is_success() {
        warn!(url = %url, status = response.status, "Collector rejected request");
    }

    if let Some(inner) = inner.upgrade() {
        Tracker { inner }.absorb_reply(endpoint, &response);
    }
}
