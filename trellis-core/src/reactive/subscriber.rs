//! Subscribers.
//!
//! Whatever re-evaluates when observed state changes (a render function, a
//! watcher, an [`Effect`](super::Effect)) is seen by the engine only through
//! the [`Subscriber`] trait.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a subscriber within dependency registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Allocate the next id. Ids are never reused within a process.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// A computation that wants to hear about changes to the state it read.
///
/// The engine never decides *when* a subscriber re-evaluates; it only calls
/// [`Subscriber::update`] synchronously at the point of mutation.
pub trait Subscriber: Send + Sync {
    /// Stable identity, used to register a subscriber at most once per
    /// registry.
    fn id(&self) -> SubscriberId;

    fn update(&self);
}

/// A subscriber that runs a callback on every change.
pub struct Watcher {
    id: SubscriberId,
    on_change: Box<dyn Fn() + Send + Sync>,
}

impl Watcher {
    pub fn new(on_change: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            id: SubscriberId::next(),
            on_change: Box::new(on_change),
        }
    }
}

impl Subscriber for Watcher {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn update(&self) {
        (self.on_change)();
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn ids_increase() {
        let first = SubscriberId::next();
        let second = SubscriberId::next();
        assert!(second > first);
        assert_ne!(first.raw(), 0);
    }

    #[test]
    fn watcher_runs_callback_per_update() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let watcher = Watcher::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        watcher.update();
        watcher.update();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn watchers_have_distinct_ids() {
        let a = Watcher::new(|| {});
        let b = Watcher::new(|| {});
        assert_ne!(a.id(), b.id());
        assert_eq!(format!("{:?}", a), format!("Watcher {{ id: {:?} }}", a.id()));
    }
}
