//! Host environment seams.
//!
//! The tracker never talks to a browser directly. Everything it reads from
//! or writes to the embedding page goes through these traits, which a host
//! adapter implements against its real environment.
//!
//! - [`Storage`] - string key/value storage (local and session scoped)
//! - [`CookieJar`] - cookie reads and `document.cookie`-style writes
//! - [`Host`] - location, referrer and automation signals, plus access to
//!   the storages above

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::{MemoryCookieJar, MemoryHost, MemoryStorage};

use crate::cookie::SetCookie;
use crate::error::Result;

/// Local storage key holding `"1"` when the visitor opted out.
pub const DO_NOT_TRACK_KEY: &str = "seline-do-not-track";

/// Session storage key marking that the referrer was already reported.
pub const REFERRER_SENT_KEY: &str = "seline:referrer";

/// String key/value storage.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Cookie access.
pub trait CookieJar: Send + Sync {
    /// Decoded value of the named cookie.
    fn get(&self, name: &str) -> Option<String>;

    fn set(&self, cookie: &SetCookie) -> Result<()>;
}

/// Current page location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub pathname: String,
    /// Query string including the leading `?`, or empty.
    pub search: String,
    pub hostname: String,
}

impl Location {
    pub fn new(pathname: impl Into<String>) -> Self {
        Self {
            pathname: pathname.into(),
            ..Default::default()
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }
}

/// Signals that the page is driven by a test harness or headless bot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutomationSignals {
    pub webdriver: bool,
    pub cypress: bool,
    pub phantom: bool,
    pub nightmare: bool,
    /// Explicit opt-in to tracking under automation.
    pub allow_tracking: bool,
}

impl AutomationSignals {
    pub fn is_automated(&self) -> bool {
        (self.webdriver || self.cypress || self.phantom || self.nightmare) && !self.allow_tracking
    }
}

/// The embedding environment.
pub trait Host: Send + Sync {
    /// `None` when the host has no notion of a current page.
    fn location(&self) -> Option<Location>;

    fn referrer(&self) -> Option<String>;

    fn automation(&self) -> AutomationSignals;

    fn cookies(&self) -> &dyn CookieJar;

    fn local_storage(&self) -> &dyn Storage;

    fn session_storage(&self) -> &dyn Storage;

    fn hostname(&self) -> Option<String> {
        self.location()
            .map(|l| l.hostname)
            .filter(|h| !h.is_empty())
    }

    fn tracking_disabled(&self) -> bool {
        self.local_storage().get(DO_NOT_TRACK_KEY).as_deref() == Some("1")
    }
}
