//! Dependency Registry
//!
//! A `Dep` is the set of subscribers interested in one observed property or
//! in the shape of one observed collection.
//!
//! # How Registries Work
//!
//! 1. When an observed property is read inside a reactive context, its
//!    registry adds the active subscriber (once).
//!
//! 2. When the property changes, the registry notifies every subscriber it
//!    holds, in registration order.
//!
//! 3. Notification works on a snapshot. A subscriber's `update()` may read
//!    the same state again and re-register, which must not disturb the pass
//!    that is already running.
//!
//! # Retention
//!
//! Subscribers are held weakly. A registry never keeps an abandoned
//! computation alive; dead handles are pruned on the next registration or
//! `notify`. Runtimes that want to detach earlier call [`Dep::remove_sub`],
//! or [`DepHandle::remove_sub`] through the handles the context collected.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, SubscriberId};

/// Unique identifier for a dependency registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DepId(u64);

impl DepId {
    /// Generate a new unique registry ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for DepId {
    fn default() -> Self {
        Self::new()
    }
}

type SubscriberSet = RwLock<IndexMap<SubscriberId, Weak<dyn Subscriber>>>;

/// An ordered, identity-deduplicated set of subscribers.
pub struct Dep {
    id: DepId,
    subs: Arc<SubscriberSet>,
}

impl Dep {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            id: DepId::new(),
            subs: Arc::new(RwLock::new(IndexMap::new())),
        }
    }

    /// Get the registry's unique ID.
    pub fn id(&self) -> DepId {
        self.id
    }

    /// A non-owning handle, used by computations to detach later.
    pub fn handle(&self) -> DepHandle {
        DepHandle {
            id: self.id,
            subs: Arc::downgrade(&self.subs),
        }
    }

    /// Register the active subscriber, if there is one.
    ///
    /// Registering the same subscriber twice is a no-op.
    pub fn depend(&self) {
        let Some(subscriber) = ReactiveContext::current_subscriber() else {
            return;
        };
        ReactiveContext::track_dependency(self.handle());
        self.add_sub(&subscriber);
    }

    /// Register a subscriber directly.
    pub fn add_sub(&self, subscriber: &Arc<dyn Subscriber>) {
        let id = subscriber.id();
        let mut subs = self.subs.write();
        if subs.contains_key(&id) {
            return;
        }
        subs.retain(|_, sub| sub.strong_count() > 0);
        subs.insert(id, Arc::downgrade(subscriber));
    }

    /// Remove a subscriber. Returns whether it was registered.
    pub fn remove_sub(&self, id: SubscriberId) -> bool {
        self.subs.write().shift_remove(&id).is_some()
    }

    /// Whether the subscriber is registered here.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subs
            .read()
            .get(&id)
            .is_some_and(|sub| sub.strong_count() > 0)
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subs
            .read()
            .values()
            .filter(|sub| sub.strong_count() > 0)
            .count()
    }

    /// Live subscribers in registration order. Prunes dead ones.
    fn snapshot(&self) -> SmallVec<[Arc<dyn Subscriber>; 4]> {
        let mut subs = self.subs.write();
        subs.retain(|_, sub| sub.strong_count() > 0);
        subs.values().filter_map(Weak::upgrade).collect()
    }

    /// Call `update()` on every subscriber registered when the pass starts.
    pub fn notify(&self) {
        let snapshot = self.snapshot();

        tracing::trace!(dep = self.id.raw(), subscribers = snapshot.len(), "notify");

        for subscriber in snapshot {
            subscriber.update();
        }
    }

    /// Notify several registries as one change.
    ///
    /// A subscriber registered on more than one of them is updated once, in
    /// the position of its first registration.
    pub fn notify_all<'a>(deps: impl IntoIterator<Item = &'a Dep>) {
        let mut merged: IndexMap<SubscriberId, Arc<dyn Subscriber>> = IndexMap::new();
        for dep in deps {
            for subscriber in dep.snapshot() {
                merged.entry(subscriber.id()).or_insert(subscriber);
            }
        }

        tracing::trace!(subscribers = merged.len(), "notify_all");

        for subscriber in merged.into_values() {
            subscriber.update();
        }
    }
}

/// Weak reference to a [`Dep`]'s subscriber set.
///
/// Recorded in the reactive context on every `depend()`, so a computation
/// can later leave registries it no longer reads without keeping them
/// alive.
#[derive(Clone)]
pub struct DepHandle {
    id: DepId,
    subs: Weak<SubscriberSet>,
}

impl DepHandle {
    pub fn id(&self) -> DepId {
        self.id
    }

    /// Remove a subscriber from the registry, if it still exists.
    pub fn remove_sub(&self, id: SubscriberId) -> bool {
        self.subs
            .upgrade()
            .is_some_and(|subs| subs.write().shift_remove(&id).is_some())
    }
}

impl std::fmt::Debug for DepHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DepHandle").field(&self.id).finish()
    }
}

impl Default for Dep {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.id)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
