//! Trellis Core
//!
//! Observable state for the Trellis declarative UI framework. Plain data
//! handed to [`observe`] is converted in place: every key becomes a reactive
//! property that records which computations read it and notifies them when
//! it is assigned a different value. Arrays are observed through their
//! mutating methods instead, since element writes cannot be intercepted.
//!
//! # Architecture
//!
//! - `value`: the dynamic value model (objects, arrays, primitives)
//! - `reactive`: tracking context, dependency registries, subscribers
//! - `observer`: observation, reactive properties, array interception and
//!   the [`set`]/[`del`] helpers
//! - `config`: per-thread settings and diagnostics routing
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use trellis_core::{del, observable, Effect, Value};
//!
//! let state = observable(Value::from(json!({ "user": { "name": "ada" } })));
//! let user = state.as_object().unwrap().get("user");
//!
//! let seen = state.clone();
//! let effect = Effect::new(move || {
//!     let user = seen.as_object().unwrap().get("user");
//!     let _ = user.as_object().unwrap().get("name");
//! });
//!
//! user.as_object().unwrap().set("name", Value::from("grace"));
//! assert_eq!(effect.run_count(), 2);
//!
//! del(&user, "name");
//! assert_eq!(effect.run_count(), 3);
//! ```

pub mod config;
pub mod error;
pub mod observer;
pub mod reactive;
pub mod value;

pub use config::{ArrayStrategy, Config};
pub use error::{ObserveError, Warning};
pub use observer::{
    define_reactive, del, observable, observe, set, should_observe, toggle_observing, Observer,
    ObservingGuard,
};
pub use reactive::{Dep, Effect, ReactiveContext, Subscriber, SubscriberId, Watcher};
pub use value::{ArrayRef, Key, ObjectKind, ObjectRef, PropertyDescriptor, Value};
