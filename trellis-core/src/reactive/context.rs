//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when an observed property is
//! read, the registry behind it can register the current computation as a
//! subscriber.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When entering a reactive context (e.g., running an effect), the runtime
//! pushes the subscriber onto the stack. When the guard is dropped, it is
//! popped again, even if the computation panics.
//!
//! An entry may also be explicitly empty. This is how callers suspend
//! tracking for a bounded region without disturbing outer computations.

use std::cell::RefCell;
use std::sync::Arc;

use super::dep::DepHandle;
use super::subscriber::{Subscriber, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
struct ContextEntry {
    /// The computation being evaluated, or `None` for an untracked region.
    subscriber: Option<Arc<dyn Subscriber>>,
    /// Registries that were touched during this computation.
    dependencies: Vec<DepHandle>,
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if
/// the computation panics.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// While this context is active, any observed property that is read will
    /// register the subscriber on its dependency registry.
    ///
    /// The context is automatically exited when the returned guard is dropped.
    pub fn enter(subscriber: Arc<dyn Subscriber>) -> Self {
        let subscriber_id = Some(subscriber.id());
        Self::push(Some(subscriber));
        Self { subscriber_id }
    }

    /// Enter a region in which reads are not attributed to anybody.
    pub fn enter_untracked() -> Self {
        Self::push(None);
        Self { subscriber_id: None }
    }

    fn push(subscriber: Option<Arc<dyn Subscriber>>) {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber,
                dependencies: Vec::new(),
            });
        });
    }

    /// Run `f` with `subscriber` as the active computation.
    pub fn track<R>(subscriber: Arc<dyn Subscriber>, f: impl FnOnce() -> R) -> R {
        let _ctx = Self::enter(subscriber);
        f()
    }

    /// Run `f` without attributing its reads to the current computation.
    pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
        let _ctx = Self::enter_untracked();
        f()
    }

    /// Check if a subscriber is currently listening.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .is_some_and(|entry| entry.subscriber.is_some())
        })
    }

    /// Get the current subscriber, if any.
    pub fn current_subscriber() -> Option<Arc<dyn Subscriber>> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.subscriber.clone())
        })
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber_id() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.subscriber.as_ref().map(|s| s.id()))
        })
    }

    /// Record that the current computation touched the given registry.
    ///
    /// This is called by registries from `depend()`.
    pub fn track_dependency(dep: DepHandle) {
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                if entry.subscriber.is_some() {
                    entry.dependencies.push(dep);
                }
            }
        });
    }

    /// Get the registries touched so far in the current context.
    pub fn get_dependencies() -> Vec<DepHandle> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.dependencies.clone())
                .unwrap_or_default()
        })
    }

    /// Number of entries on this thread's stack.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        // The popped entry may own the last handle to its subscriber, so it
        // is dropped outside the borrow.
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());

        // Verify we're popping the right context.
        if let Some(entry) = popped {
            debug_assert_eq!(
                entry.subscriber.as_ref().map(|s| s.id()),
                self.subscriber_id,
                "ReactiveContext mismatch"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Dep, DepId, Watcher};

    fn watcher() -> Arc<dyn Subscriber> {
        Arc::new(Watcher::new(|| {}))
    }

    #[test]
    fn context_tracks_subscriber() {
        let sub = watcher();
        let id = sub.id();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());

        {
            let _ctx = ReactiveContext::enter(sub);

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_subscriber_id(), Some(id));
        }

        // Context should be cleaned up after drop
        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());
        assert_eq!(ReactiveContext::depth(), 0);
    }

    #[test]
    fn context_tracks_dependencies() {
        let _ctx = ReactiveContext::enter(watcher());

        let deps = [Dep::new(), Dep::new(), Dep::new()];
        for dep in &deps {
            ReactiveContext::track_dependency(dep.handle());
        }

        let ids: Vec<DepId> = ReactiveContext::get_dependencies()
            .iter()
            .map(|dep| dep.id())
            .collect();
        assert_eq!(ids, deps.iter().map(Dep::id).collect::<Vec<_>>());
    }

    #[test]
    fn nested_contexts() {
        let outer = watcher();
        let inner = watcher();
        let (id1, id2) = (outer.id(), inner.id());

        {
            let _ctx1 = ReactiveContext::enter(outer);
            assert_eq!(ReactiveContext::current_subscriber_id(), Some(id1));

            {
                let _ctx2 = ReactiveContext::enter(inner);
                assert_eq!(ReactiveContext::current_subscriber_id(), Some(id2));
            }

            // After inner context drops, outer should be current
            assert_eq!(ReactiveContext::current_subscriber_id(), Some(id1));
        }

        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn untracked_region_hides_outer_subscriber() {
        let _ctx = ReactiveContext::enter(watcher());

        ReactiveContext::untracked(|| {
            assert!(!ReactiveContext::is_active());
            ReactiveContext::track_dependency(Dep::new().handle());
            assert!(ReactiveContext::get_dependencies().is_empty());
        });

        assert!(ReactiveContext::is_active());
    }

    #[test]
    fn guard_pops_on_panic() {
        let sub = watcher();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            ReactiveContext::track(sub, || panic!("computation failed"))
        }));

        assert!(result.is_err());
        assert_eq!(ReactiveContext::depth(), 0);
        assert!(!ReactiveContext::is_active());
    }
}
