//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever the observed
//! state it read changes. It is the smallest runtime that can drive the
//! tracking context, and it is what tests and embedders use to consume
//! observed state.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately inside its own
//!    reactive context, so every property it reads registers the effect.
//!
//! 2. When any of those properties changes, the registry calls `update()`,
//!    which re-runs the function synchronously.
//!
//! 3. A change made by the effect to state it is itself reading does not
//!    re-enter the effect while it is running.
//!
//! 4. After each run the effect leaves every registry it read last time but
//!    not this time, so a branch that is no longer taken stops triggering
//!    it. Disposal leaves all of them.
//!
//! Scheduling (batching, deferred flushing) is deliberately absent.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::context::ReactiveContext;
use super::dep::{DepHandle, DepId};
use super::subscriber::{Subscriber, SubscriberId};

struct EffectInner {
    subscriber_id: SubscriberId,
    run: Box<dyn Fn() + Send + Sync>,
    /// Registries touched during the last completed run.
    dependencies: RwLock<IndexMap<DepId, DepHandle>>,
    disposed: AtomicBool,
    running: AtomicBool,
    run_count: AtomicUsize,
    this: Weak<EffectInner>,
}

/// Clears the running flag on every exit, including unwinding.
struct RunningFlag<'a>(&'a AtomicBool);

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl EffectInner {
    fn execute(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::trace!(subscriber = ?self.subscriber_id, "skipping reentrant effect run");
            return;
        }
        let _running = RunningFlag(&self.running);
        let Some(this) = self.this.upgrade() else {
            return;
        };

        let collected = {
            let _ctx = ReactiveContext::enter(this);
            (self.run)();
            ReactiveContext::get_dependencies()
        };
        let current: IndexMap<DepId, DepHandle> =
            collected.into_iter().map(|dep| (dep.id(), dep)).collect();

        let stale: Vec<DepHandle> = {
            let mut deps = self.dependencies.write();
            let stale = deps
                .drain(..)
                .filter(|(id, _)| !current.contains_key(id))
                .map(|(_, dep)| dep)
                .collect();
            *deps = current;
            stale
        };
        for dep in stale {
            dep.remove_sub(self.subscriber_id);
        }
        self.run_count.fetch_add(1, Ordering::SeqCst);
    }

    /// Leave every registry read during the last run.
    fn detach(&self) {
        let deps = std::mem::take(&mut *self.dependencies.write());
        for dep in deps.into_values() {
            dep.remove_sub(self.subscriber_id);
        }
    }
}

impl Subscriber for EffectInner {
    fn id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn update(&self) {
        self.execute();
    }
}

/// A side-effecting computation that runs when its dependencies change.
///
/// # Example
///
/// ```rust
/// use trellis_core::{observable, Effect, Value};
/// use serde_json::json;
///
/// let state = observable(Value::from(json!({ "count": 0 })));
/// let obj = state.as_object().unwrap().clone();
///
/// let reader = obj.clone();
/// let effect = Effect::new(move || {
///     let _ = reader.get("count");
/// });
///
/// obj.set("count", Value::from(5));
/// assert_eq!(effect.run_count(), 2);
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    /// Create a new effect and run it immediately to collect dependencies.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self::new_lazy(run);
        effect.execute();
        effect
    }

    /// Create a new effect without running it.
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let inner = Arc::new_cyclic(|this| EffectInner {
            subscriber_id: SubscriberId::next(),
            run: Box::new(run),
            dependencies: RwLock::new(IndexMap::new()),
            disposed: AtomicBool::new(false),
            running: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
            this: this.clone(),
        });
        Self { inner }
    }

    /// Get the subscriber ID for this effect.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// The effect as a subscriber handle, e.g. for [`Dep::add_sub`](super::Dep::add_sub).
    pub fn as_subscriber(&self) -> Arc<dyn Subscriber> {
        self.inner.clone()
    }

    /// Run the effect function inside its reactive context.
    pub fn execute(&self) {
        self.inner.execute();
    }

    /// Dispose of the effect. After disposal it will not run again and is
    /// no longer registered anywhere.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        self.inner.detach();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Number of completed runs.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Number of distinct registries read during the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.read().len()
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("subscriber_id", &self.inner.subscriber_id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Dep;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn effect_runs_on_creation() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let _effect = Effect::new(move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let effect = Effect::new_lazy(|| {});
        assert_eq!(effect.run_count(), 0);

        effect.execute();
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_collects_dependencies() {
        let a = Arc::new(Dep::new());
        let b = Arc::new(Dep::new());
        let (a_clone, b_clone) = (a.clone(), b.clone());

        let effect = Effect::new(move || {
            a_clone.depend();
            b_clone.depend();
            a_clone.depend();
        });

        assert_eq!(effect.dependency_count(), 2);
        assert!(a.contains(effect.subscriber_id()));

        a.notify();
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let dep = Arc::new(Dep::new());
        let dep_clone = dep.clone();
        let effect = Effect::new(move || dep_clone.depend());

        effect.dispose();
        assert!(effect.is_disposed());

        dep.notify();
        effect.execute();
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn dropped_effect_is_not_retained() {
        let dep = Arc::new(Dep::new());
        let dep_clone = dep.clone();
        let effect = Effect::new(move || dep_clone.depend());
        assert_eq!(dep.subscriber_count(), 1);

        drop(effect);
        assert_eq!(dep.subscriber_count(), 0);
    }

    #[test]
    fn reentrant_trigger_is_ignored() {
        let dep = Arc::new(Dep::new());
        let dep_clone = dep.clone();
        let effect = Effect::new(move || {
            dep_clone.depend();
            dep_clone.notify();
        });

        assert_eq!(effect.run_count(), 1);
        dep.notify();
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn effect_clone_shares_state() {
        let effect1 = Effect::new(|| {});
        let effect2 = effect1.clone();

        assert_eq!(effect1.subscriber_id(), effect2.subscriber_id());

        effect1.execute();
        assert_eq!(effect2.run_count(), 2);

        effect1.dispose();
        assert!(effect2.is_disposed());
    }

    #[test]
    fn effect_recovers_after_panicking_run() {
        let dep = Arc::new(Dep::new());
        let fail = Arc::new(AtomicBool::new(false));
        let (dep_clone, fail_clone) = (dep.clone(), fail.clone());
        let effect = Effect::new(move || {
            dep_clone.depend();
            if fail_clone.load(Ordering::SeqCst) {
                panic!("render failed");
            }
        });

        fail.store(true, Ordering::SeqCst);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| dep.notify()));
        assert!(result.is_err());
        assert_eq!(effect.run_count(), 1);

        fail.store(false, Ordering::SeqCst);
        dep.notify();
        assert_eq!(effect.run_count(), 2);
        assert_eq!(ReactiveContext::depth(), 0);
    }

    #[test]
    fn effect_leaves_registries_it_stopped_reading() {
        let flag = Arc::new(Dep::new());
        let branch = Arc::new(Dep::new());
        let take_branch = Arc::new(AtomicBool::new(true));
        let (flag_clone, branch_clone, take_clone) =
            (flag.clone(), branch.clone(), take_branch.clone());

        let effect = Effect::new(move || {
            flag_clone.depend();
            if take_clone.load(Ordering::SeqCst) {
                branch_clone.depend();
            }
        });
        assert!(branch.contains(effect.subscriber_id()));

        take_branch.store(false, Ordering::SeqCst);
        flag.notify();
        assert_eq!(effect.run_count(), 2);
        assert!(!branch.contains(effect.subscriber_id()));

        branch.notify();
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn dispose_detaches_from_registries() {
        let dep = Arc::new(Dep::new());
        let dep_clone = dep.clone();
        let effect = Effect::new(move || dep_clone.depend());
        assert_eq!(dep.subscriber_count(), 1);

        effect.dispose();
        assert_eq!(dep.subscriber_count(), 0);
        assert_eq!(effect.dependency_count(), 0);
    }
}
