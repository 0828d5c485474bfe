//! Listener registration seam.
//!
//! The tracker does not patch history APIs or attach DOM listeners itself.
//! It hands handlers to a [`ListenerRegistrar`], and the host adapter calls
//! them when a navigation happens, when the page becomes visible, or when a
//! link is clicked.
//!
//! [`ListenerBus`] is an in-process registrar: the host (or a test) drives
//! it by calling [`ListenerBus::navigate`], [`ListenerBus::show`] and
//! [`ListenerBus::click_link`].

use std::sync::Arc;

use parking_lot::RwLock;

/// Handler for navigation and visibility signals.
pub type SignalHandler = Arc<dyn Fn() + Send + Sync>;

/// Handler for link clicks.
pub type LinkHandler = Arc<dyn Fn(&LinkClick) + Send + Sync>;

/// A click on (or inside) an anchor element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkClick {
    pub href: String,
    pub hostname: String,
    /// Text content of the anchor, untrimmed.
    pub text: String,
}

impl LinkClick {
    pub fn new(href: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            hostname: hostname.into(),
            text: String::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Whether the link leaves `current_hostname`.
    pub fn is_outbound(&self, current_hostname: &str) -> bool {
        !self.href.is_empty() && !self.hostname.is_empty() && self.hostname != current_hostname
    }
}

pub trait ListenerRegistrar: Send + Sync {
    /// Called after every in-app navigation (history push, back/forward).
    fn on_navigate(&self, handler: SignalHandler);

    /// Called when the page transitions to visible.
    fn on_visible(&self, handler: SignalHandler);

    fn on_link_click(&self, handler: LinkHandler);

    fn is_visible(&self) -> bool;
}

/// In-process registrar driven by explicit calls.
pub struct ListenerBus {
    visible: RwLock<bool>,
    navigate: RwLock<Vec<SignalHandler>>,
    visible_handlers: RwLock<Vec<SignalHandler>>,
    link: RwLock<Vec<LinkHandler>>,
}

impl Default for ListenerBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerBus {
    /// A bus for a page that is currently visible.
    pub fn new() -> Self {
        Self {
            visible: RwLock::new(true),
            navigate: RwLock::new(Vec::new()),
            visible_handlers: RwLock::new(Vec::new()),
            link: RwLock::new(Vec::new()),
        }
    }

    /// A bus for a page loaded in the background.
    pub fn hidden() -> Self {
        let bus = Self::new();
        *bus.visible.write() = false;
        bus
    }

    pub fn navigate(&self) {
        // Handlers may re-enter the tracker; never call them under our lock
        let handlers = self.navigate.read().clone();
        for handler in handlers {
            handler();
        }
    }

    pub fn show(&self) {
        *self.visible.write() = true;
        let handlers = self.visible_handlers.read().clone();
        for handler in handlers {
            handler();
        }
    }

    pub fn hide(&self) {
        *self.visible.write() = false;
    }

    pub fn click_link(&self, click: &LinkClick) {
        let handlers = self.link.read().clone();
        for handler in handlers {
            handler(click);
        }
    }

    pub fn navigate_handler_count(&self) -> usize {
        self.navigate.read().len()
    }
}

impl ListenerRegistrar for ListenerBus {
    fn on_navigate(&self, handler: SignalHandler) {
        self.navigate.write().push(handler);
    }

    fn on_visible(&self, handler: SignalHandler) {
        self.visible_handlers.write().push(handler);
    }

    fn on_link_click(&self, handler: LinkHandler) {
        self.link.write().push(handler);
    }

    fn is_visible(&self) -> bool {
        *self.visible.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_outbound_detection() {
        let link = LinkClick::new("https://other.com/x", "other.com");
        assert!(link.is_outbound("example.com"));
        assert!(!link.is_outbound("other.com"));
        assert!(!LinkClick::new("", "other.com").is_outbound("example.com"));
        assert!(!LinkClick::new("/relative", "").is_outbound("example.com"));
    }

    #[test]
    fn test_bus_invokes_handlers() {
        let bus = ListenerBus::hidden();
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        bus.on_navigate(Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        let c = count.clone();
        bus.on_visible(Arc::new(move || {
            c.fetch_add(10, Ordering::SeqCst);
        }));

        assert!(!bus.is_visible());
        bus.navigate();
        bus.show();

        assert!(bus.is_visible());
        assert_eq!(count.load(Ordering::SeqCst), 11);
        assert_eq!(bus.navigate_handler_count(), 1);
    }
}
