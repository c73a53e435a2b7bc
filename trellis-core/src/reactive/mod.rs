//! Dependency Tracking
//!
//! This module holds the pieces shared by every observed value: the
//! tracking context, the per-property dependency registry, and the
//! subscribers that registries notify.
//!
//! # Concepts
//!
//! ## Context
//!
//! While a computation runs, its subscriber sits on top of a thread-local
//! stack. Reads of reactive properties register that subscriber with the
//! property's [`Dep`]. Nested computations push and pop their own entries,
//! and [`ReactiveContext::untracked`] pushes an entry with no subscriber to
//! read without registering.
//!
//! ## Dep
//!
//! A [`Dep`] is a set of subscribers that want to hear about one change.
//! It holds them weakly and notifies them in registration order.
//!
//! ## Effects
//!
//! An [`Effect`] runs a closure under its own subscriber and re-runs it
//! synchronously whenever something it read changes.

mod context;
mod dep;
mod effect;
mod subscriber;

pub use context::ReactiveContext;
pub use dep::{Dep, DepHandle, DepId};
pub use effect::Effect;
pub use subscriber::{Subscriber, SubscriberId, Watcher};
