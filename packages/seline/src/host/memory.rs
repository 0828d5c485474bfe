//! In-memory host for tests and headless use.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{AutomationSignals, CookieJar, Host, Location, Storage};
use crate::cookie::SetCookie;
use crate::error::Result;

/// In-memory key/value storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.items.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.items.write().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// In-memory cookie jar that keeps every rendered assignment for assertions.
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    values: RwLock<HashMap<String, String>>,
    writes: RwLock<Vec<String>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a cookie as if it were left by an earlier page load.
    pub fn with_cookie(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.write().insert(name.into(), value.into());
        self
    }

    /// Every `document.cookie` assignment made so far, in order.
    pub fn writes(&self) -> Vec<String> {
        self.writes.read().clone()
    }
}

impl CookieJar for MemoryCookieJar {
    fn get(&self, name: &str) -> Option<String> {
        self.values.read().get(name).cloned()
    }

    fn set(&self, cookie: &SetCookie) -> Result<()> {
        self.values
            .write()
            .insert(cookie.name.clone(), cookie.value.clone());
        self.writes.write().push(cookie.to_string());
        Ok(())
    }
}

/// A host whose location, referrer and storages are plain values.
///
/// Storages default to in-memory ones; swap in a [`super::FileStorage`] to
/// keep opt-out and cookies across process runs.
pub struct MemoryHost {
    location: RwLock<Option<Location>>,
    referrer: RwLock<Option<String>>,
    automation: RwLock<AutomationSignals>,
    cookies: Arc<dyn CookieJar>,
    local: Arc<dyn Storage>,
    session: Arc<dyn Storage>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            location: RwLock::new(None),
            referrer: RwLock::new(None),
            automation: RwLock::new(AutomationSignals::default()),
            cookies: Arc::new(MemoryCookieJar::new()),
            local: Arc::new(MemoryStorage::new()),
            session: Arc::new(MemoryStorage::new()),
        }
    }

    pub fn with_location(self, location: Location) -> Self {
        *self.location.write() = Some(location);
        self
    }

    pub fn with_referrer(self, referrer: impl Into<String>) -> Self {
        *self.referrer.write() = Some(referrer.into());
        self
    }

    pub fn with_automation(self, signals: AutomationSignals) -> Self {
        *self.automation.write() = signals;
        self
    }

    pub fn with_cookie_jar(mut self, cookies: Arc<dyn CookieJar>) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn with_local_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.local = storage;
        self
    }

    pub fn with_session_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.session = storage;
        self
    }

    /// Move to a new location, as a navigation would.
    pub fn navigate(&self, location: Location) {
        *self.location.write() = Some(location);
    }

    pub fn set_pathname(&self, pathname: impl Into<String>) {
        let mut current = self.location.write();
        let mut location = current.take().unwrap_or_default();
        location.pathname = pathname.into();
        location.search.clear();
        *current = Some(location);
    }
}

impl Host for MemoryHost {
    fn location(&self) -> Option<Location> {
        self.location.read().clone()
    }

    fn referrer(&self) -> Option<String> {
        self.referrer.read().clone()
    }

    fn automation(&self) -> AutomationSignals {
        *self.automation.read()
    }

    fn cookies(&self) -> &dyn CookieJar {
        self.cookies.as_ref()
    }

    fn local_storage(&self) -> &dyn Storage {
        self.local.as_ref()
    }

    fn session_storage(&self) -> &dyn Storage {
        self.session.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        assert!(storage.is_empty());
        storage.set("k", "v").unwrap();
        assert_eq!(storage.get("k"), Some("v".into()));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_cookie_jar_records_writes() {
        let jar = MemoryCookieJar::new();
        jar.set(&SetCookie::visitor("abc", Some("example.com"), Utc::now()))
            .unwrap();

        assert_eq!(jar.get("seline_vid"), Some("abc".into()));
        assert_eq!(jar.writes().len(), 1);
        assert!(jar.writes()[0].starts_with("seline_vid=abc;"));
    }

    #[test]
    fn test_set_pathname_keeps_hostname() {
        let host = MemoryHost::new()
            .with_location(Location::new("/a").with_search("?x=1").with_hostname("example.com"));
        host.set_pathname("/b");

        let location = host.location().unwrap();
        assert_eq!(location.pathname, "/b");
        assert_eq!(location.search, "");
        assert_eq!(location.hostname, "example.com");
    }
}
