//! Shape-changing helpers.
//!
//! Adding or deleting a key cannot be intercepted, so [`set`] and [`del`]
//! perform the change and notify the collection's shape registry.

use std::sync::Arc;

use super::{define_reactive, Observer};
use crate::config;
use crate::error::Warning;
use crate::reactive::Dep;
use crate::value::{describe, Key, ObjectKind, ObjectRef, PropertyKind, Value};

/// Root state may not grow or shrink at runtime.
fn is_root(obj: &ObjectRef, observer: Option<&Arc<Observer>>) -> bool {
    obj.kind() == ObjectKind::Root || observer.is_some_and(|ob| ob.root_count() > 0)
}

/// Set a property, adding it as a reactive property if it is new.
///
/// Returns `value`. On arrays, index keys go through the intercepted
/// `splice`, growing the array first if needed.
pub fn set(target: &Value, key: impl Into<Key>, value: Value) -> Value {
    let key = key.into();
    match target {
        Value::Array(arr) => {
            match key.as_index() {
                Some(index) => match arr.set_len(arr.len().max(index)) {
                    Ok(()) => {
                        arr.splice(index, 1, [value.clone()]);
                    }
                    Err(err) => {
                        tracing::debug!(%err, "array index out of reach");
                        config::warn(Warning::InvalidArrayKey { key: key.to_name() });
                    }
                },
                None => config::warn(Warning::InvalidArrayKey { key: key.to_name() }),
            }
            value
        }
        Value::Object(obj) => {
            let name = key.to_name();
            if obj.has_own(&name) {
                obj.set(&name, value.clone());
                return value;
            }

            let observer = obj.observer();
            if is_root(obj, observer.as_ref()) {
                config::warn(Warning::RootPropertyAdd { key: name });
                return value;
            }
            match observer {
                None => obj.set(&name, value.clone()),
                Some(observer) => {
                    define_reactive(obj, &name, Some(value.clone()), None, false);
                    observer.dep().notify();
                }
            }
            value
        }
        _ => {
            config::warn(Warning::InvalidSetTarget {
                target: describe(target),
            });
            value
        }
    }
}

/// Delete a property and announce the change if needed.
///
/// On an observed object, subscribers of the object's shape and of the
/// deleted property are each updated once.
pub fn del(target: &Value, key: impl Into<Key>) {
    let key = key.into();
    match target {
        Value::Array(arr) => match key.as_index() {
            Some(index) => {
                arr.splice(index, 1, Vec::new());
            }
            None => config::warn(Warning::InvalidArrayKey { key: key.to_name() }),
        },
        Value::Object(obj) => {
            let name = key.to_name();
            let observer = obj.observer();
            if is_root(obj, observer.as_ref()) {
                config::warn(Warning::RootPropertyDelete { key: name });
                return;
            }
            let Some(descriptor) = obj.descriptor(&name) else {
                return;
            };
            if !obj.delete(&name) {
                return;
            }
            let Some(observer) = observer else {
                return;
            };
            // Readers of the removed key learn about it along with readers
            // of the object's shape.
            match &descriptor.kind {
                PropertyKind::Reactive(property) => {
                    Dep::notify_all([observer.dep(), property.dep()]);
                }
                _ => observer.dep().notify(),
            }
        }
        _ => config::warn(Warning::InvalidDeleteTarget {
            target: describe(target),
        }),
    }
}
