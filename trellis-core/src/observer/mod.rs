//! Observation
//!
//! An [`Observer`] is attached to each observed object or array. Once
//! attached, it converts the object's keys into reactive accessors that
//! collect dependencies and dispatch updates, or, for arrays, routes the
//! mutating methods through the interceptor and observes every element.
//!
//! # Concepts
//!
//! ## Property registries
//!
//! Every reactive property owns one [`Dep`]. Reading the property inside a
//! reactive context registers the running computation there; writing a
//! different value notifies it.
//!
//! ## Shape registries
//!
//! Every observer owns one more [`Dep`] standing for "the shape of this
//! collection changed". Array mutations and the [`set`]/[`del`] helpers
//! notify it. Reading a property whose value is an observed collection
//! registers on the child's shape registry as well, so replacing the
//! property and reshaping the collection both reach the reader.
//!
//! ## Observation toggle
//!
//! Observation can be suspended per thread, e.g. while assigning defaults
//! that must stay raw. Prefer [`ObservingGuard`], which restores the previous
//! state when dropped.

mod array;
mod define;
mod mutate;

use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::reactive::Dep;
use crate::value::{ObjectKind, ObjectRef, Value};
use crate::value::{WeakArrayRef, WeakObjectRef};

pub use array::INTERCEPTED_METHODS;
pub use define::{define_reactive, ReactiveProperty, SetHook};
pub use mutate::{del, set};

thread_local! {
    static SHOULD_OBSERVE: Cell<bool> = const { Cell::new(true) };
}

/// Enable or disable creation of new observers on this thread.
///
/// Callers are responsible for restoring the previous state; see
/// [`ObservingGuard`] for a scoped alternative.
pub fn toggle_observing(enabled: bool) {
    SHOULD_OBSERVE.with(|flag| flag.set(enabled));
}

/// Whether new observers may currently be created on this thread.
pub fn should_observe() -> bool {
    SHOULD_OBSERVE.with(Cell::get)
}

/// Sets the observation toggle for a scope and restores it on drop.
pub struct ObservingGuard {
    previous: bool,
}

impl ObservingGuard {
    pub fn new(enabled: bool) -> Self {
        let previous = should_observe();
        toggle_observing(enabled);
        Self { previous }
    }

    /// Suspend observation until the guard is dropped.
    pub fn suspend() -> Self {
        Self::new(false)
    }
}

impl Drop for ObservingGuard {
    fn drop(&mut self) {
        toggle_observing(self.previous);
    }
}

#[derive(Clone)]
enum Target {
    Object(WeakObjectRef),
    Array(WeakArrayRef),
}

/// The capability attached to an observed value.
pub struct Observer {
    /// Non-owning: the value owns its observer, not the other way round.
    target: Target,
    dep: Dep,
    /// Number of roots using this value as their top-level state.
    root_count: AtomicUsize,
}

impl Observer {
    fn new(target: Target) -> Arc<Self> {
        Arc::new(Self {
            target,
            dep: Dep::new(),
            root_count: AtomicUsize::new(0),
        })
    }

    /// Attach a new observer to `value` and convert it.
    ///
    /// The marker is installed before any key is walked, so structures that
    /// refer back to themselves terminate.
    fn attach(value: &Value) -> Option<Arc<Self>> {
        match value {
            Value::Object(obj) => {
                let observer = Self::new(Target::Object(obj.downgrade()));
                obj.attach_observer(observer.clone());
                tracing::trace!(dep = observer.dep.id().raw(), "observing object");
                observer.walk(obj);
                Some(observer)
            }
            Value::Array(arr) => {
                let observer = Self::new(Target::Array(arr.downgrade()));
                arr.attach_observer(observer.clone());
                tracing::trace!(dep = observer.dep.id().raw(), len = arr.len(), "observing array");
                array::augment(arr);
                observer.observe_array(&arr.to_vec());
                Some(observer)
            }
            _ => None,
        }
    }

    /// Make every own enumerable key of `obj` reactive.
    fn walk(&self, obj: &ObjectRef) {
        for key in obj.keys() {
            define_reactive(obj, &key, None, None, false);
        }
    }

    /// Observe each element of a list.
    pub fn observe_array(&self, items: &[Value]) {
        for item in items {
            observe(item, false);
        }
    }

    /// The observed value, if it is still alive.
    pub fn value(&self) -> Option<Value> {
        match &self.target {
            Target::Object(obj) => obj.upgrade().map(Value::Object),
            Target::Array(arr) => arr.upgrade().map(Value::Array),
        }
    }

    /// The registry notified when the collection's shape changes.
    pub fn dep(&self) -> &Dep {
        &self.dep
    }

    pub fn root_count(&self) -> usize {
        self.root_count.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.target {
            Target::Object(_) => "object",
            Target::Array(_) => "array",
        };
        f.debug_struct("Observer")
            .field("target", &kind)
            .field("dep", &self.dep)
            .field("root_count", &self.root_count())
            .finish()
    }
}

/// Attempt to create an observer for a value.
///
/// Returns the existing observer if the value already has one, a new
/// observer if the value is eligible, and `None` otherwise. Eligible values
/// are plain objects and arrays that are extensible, while observation is
/// enabled. Root instances and render nodes are never observed.
///
/// With `as_root`, the value is additionally counted as root state, which
/// makes [`set`] and [`del`] refuse to change its shape.
pub fn observe(value: &Value, as_root: bool) -> Option<Arc<Observer>> {
    let observer = match value {
        Value::Object(obj) => match obj.observer() {
            Some(existing) => Some(existing),
            None if obj.kind() == ObjectKind::Plain && obj.is_extensible() && should_observe() => {
                Observer::attach(value)
            }
            None => None,
        },
        Value::Array(arr) => match arr.observer() {
            Some(existing) => Some(existing),
            None if should_observe() => Observer::attach(value),
            None => None,
        },
        _ => None,
    };

    if as_root {
        if let Some(observer) = &observer {
            observer.root_count.fetch_add(1, Ordering::SeqCst);
        }
    }
    observer
}

/// Make a value observable and hand it back.
pub fn observable(value: Value) -> Value {
    observe(&value, false);
    value
}
