//! Initialization phase and the pre-init call queue.

use std::collections::VecDeque;

use crate::event::QueueEvent;

/// Lifecycle of a tracker. Moves forward only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Uninitialized,
    Initializing,
    Ready,
}

impl Phase {
    pub fn is_ready(self) -> bool {
        self == Phase::Ready
    }
}

/// Calls made before `init`, in call order.
///
/// Drained exactly once, at the init transition. Events and user updates
/// share one queue so their interleaving survives replay.
#[derive(Debug, Default)]
pub struct InitQueue {
    entries: VecDeque<QueueEvent>,
    drained: bool,
}

impl InitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` once the queue has been drained; callers should send
    /// directly at that point.
    pub fn push(&mut self, event: QueueEvent) -> bool {
        if self.drained {
            return false;
        }
        self.entries.push_back(event);
        true
    }

    /// Take every entry, oldest first, and close the queue.
    pub fn drain(&mut self) -> Vec<QueueEvent> {
        self.drained = true;
        self.entries.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_drained(&self) -> bool {
        self.drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{PendingEvent, UserData};

    fn custom(name: &str) -> QueueEvent {
        QueueEvent::Event(PendingEvent::Custom {
            name: name.into(),
            data: None,
            location: None,
        })
    }

    #[test]
    fn test_drain_preserves_interleaving() {
        let mut queue = InitQueue::new();
        queue.push(custom("a"));
        queue.push(QueueEvent::User(UserData::new()));
        queue.push(custom("b"));

        let drained = queue.drain();
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0], custom("a"));
        assert!(matches!(drained[1], QueueEvent::User(_)));
        assert_eq!(drained[2], custom("b"));
    }

    #[test]
    fn test_drain_happens_once() {
        let mut queue = InitQueue::new();
        queue.push(custom("a"));

        assert_eq!(queue.drain().len(), 1);
        assert!(queue.is_drained());
        assert!(!queue.push(custom("late")));
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_phase_order() {
        assert!(!Phase::default().is_ready());
        assert!(!Phase::Initializing.is_ready());
        assert!(Phase::Ready.is_ready());
    }
}
