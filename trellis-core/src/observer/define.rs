//! Reactive property definition.
//!
//! [`define_reactive`] turns one key of an object into a tracked accessor
//! backed by its own [`Dep`]. Pre-existing accessors are kept and wrapped:
//! reads still go through the original getter and writes through the
//! original setter, with tracking and notification layered on top.

use std::sync::Arc;

use parking_lot::RwLock;

use super::{observe, Observer};
use crate::config;
use crate::reactive::{Dep, ReactiveContext};
use crate::value::{ArrayRef, Getter, ObjectRef, PropertyDescriptor, PropertyKind, Setter, Value};

/// Development-time hook invoked before a reactive property changes.
///
/// Used for warnings such as "this property is owned by the parent". It
/// only runs while diagnostics are enabled.
pub type SetHook = Arc<dyn Fn() + Send + Sync>;

/// The state behind one reactive key.
pub struct ReactiveProperty {
    key: String,
    dep: Dep,
    getter: Option<Getter>,
    setter: Option<Setter>,
    /// Backing store when there is no original getter.
    slot: RwLock<Value>,
    /// Observer of the current value, unless shallow.
    child: RwLock<Option<Arc<Observer>>>,
    hook: Option<SetHook>,
    shallow: bool,
}

impl ReactiveProperty {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The registry notified when this property is assigned a new value.
    pub fn dep(&self) -> &Dep {
        &self.dep
    }

    /// Observer of the property's current value, if any.
    pub fn child(&self) -> Option<Arc<Observer>> {
        self.child.read().clone()
    }

    pub fn is_shallow(&self) -> bool {
        self.shallow
    }

    fn current(&self) -> Value {
        match &self.getter {
            Some(get) => get(),
            None => self.slot.read().clone(),
        }
    }

    /// Read the value, registering the active subscriber.
    pub fn get(&self) -> Value {
        let value = self.current();
        if ReactiveContext::is_active() {
            self.dep.depend();
            if let Some(child) = self.child() {
                child.dep().depend();
                if let Value::Array(arr) = &value {
                    depend_array(arr);
                }
            }
        }
        value
    }

    /// Write the value and notify subscribers, unless nothing changed.
    pub fn set(&self, new_value: Value) {
        let value = self.current();
        if new_value.same_value(&value) {
            return;
        }
        if let Some(hook) = &self.hook {
            if config::diagnostics_enabled() {
                hook();
            }
        }
        // Getter without setter: read-only.
        if self.getter.is_some() && self.setter.is_none() {
            return;
        }

        let assigned = new_value.clone();
        match &self.setter {
            Some(set) => set(new_value),
            None => *self.slot.write() = new_value,
        }
        let child = if self.shallow {
            None
        } else {
            observe(&assigned, false)
        };
        *self.child.write() = child;

        self.dep.notify();
    }
}

impl std::fmt::Debug for ReactiveProperty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveProperty")
            .field("key", &self.key)
            .field("dep", &self.dep)
            .field("shallow", &self.shallow)
            .finish()
    }
}

/// Define a reactive property on an object.
///
/// When `value` is `None` the current value is read from the object, unless
/// the property is a getter-only accessor. Unless `shallow`, the value is
/// observed as well, so nested keys become reactive too.
///
/// Non-configurable properties are left alone, as are missing keys on
/// non-extensible objects.
pub fn define_reactive(
    obj: &ObjectRef,
    key: &str,
    value: Option<Value>,
    hook: Option<SetHook>,
    shallow: bool,
) {
    let dep = Dep::new();

    let existing = obj.descriptor(key);
    if existing.as_ref().is_some_and(|desc| !desc.configurable) {
        return;
    }

    let getter = existing.as_ref().and_then(PropertyDescriptor::getter);
    let setter = existing.as_ref().and_then(PropertyDescriptor::setter);
    let value = match value {
        Some(value) => value,
        None if getter.is_none() || setter.is_some() => obj.get(key),
        None => Value::Undefined,
    };

    let child = if shallow { None } else { observe(&value, false) };

    let property = Arc::new(ReactiveProperty {
        key: key.to_string(),
        dep,
        getter,
        setter,
        slot: RwLock::new(value),
        child: RwLock::new(child),
        hook,
        shallow,
    });
    let descriptor = PropertyDescriptor {
        kind: PropertyKind::Reactive(property),
        enumerable: true,
        configurable: true,
    };

    if let Err(err) = obj.define_property(key, descriptor) {
        tracing::trace!(key, %err, "property left untracked");
    }
}

/// Register on every observed element of an array, recursively.
///
/// Element access cannot be intercepted, so a read of the array as a whole
/// stands in for reads of its elements.
pub(crate) fn depend_array(arr: &ArrayRef) {
    for item in arr.to_vec() {
        if let Some(observer) = item.observer() {
            observer.dep().depend();
        }
        if let Value::Array(inner) = &item {
            depend_array(inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Subscriber, Watcher};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<dyn Subscriber>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let sub: Arc<dyn Subscriber> = Arc::new(Watcher::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));
        (sub, count)
    }

    fn reactive(obj: &ObjectRef, key: &str) -> Arc<ReactiveProperty> {
        match obj.descriptor(key).map(|desc| desc.kind) {
            Some(PropertyKind::Reactive(prop)) => prop,
            _ => panic!("'{key}' is not reactive"),
        }
    }

    #[test]
    fn reads_outside_context_do_not_register() {
        let obj = ObjectRef::from_pairs([("a", Value::from(1))]);
        define_reactive(&obj, "a", None, None, false);

        assert_eq!(obj.get("a"), Value::from(1));
        assert_eq!(reactive(&obj, "a").dep().subscriber_count(), 0);
    }

    #[test]
    fn explicit_value_wins_over_stored_value() {
        let obj = ObjectRef::from_pairs([("a", Value::from(1))]);
        define_reactive(&obj, "a", Some(Value::from(7)), None, false);
        assert_eq!(obj.get("a"), Value::from(7));
    }

    #[test]
    fn same_value_writes_are_suppressed() {
        let obj = ObjectRef::from_pairs([("a", Value::from(f64::NAN))]);
        define_reactive(&obj, "a", None, None, false);
        let (sub, count) = counter();
        ReactiveContext::track(sub.clone(), || obj.get("a"));

        obj.set("a", Value::from(f64::NAN));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        obj.set("a", Value::from(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn non_configurable_property_is_skipped() {
        let obj = ObjectRef::new();
        obj.define_property("a", PropertyDescriptor::data(Value::from(1)).non_configurable())
            .unwrap();

        define_reactive(&obj, "a", None, None, false);
        assert!(!obj.descriptor("a").unwrap().is_reactive());
    }

    #[test]
    fn existing_accessors_are_wrapped() {
        let store = Arc::new(RwLock::new(Value::from(1)));
        let (read, write) = (store.clone(), store.clone());
        let get: Getter = Arc::new(move || read.read().clone());
        let set: Setter = Arc::new(move |v| *write.write() = v);
        let obj = ObjectRef::new();
        obj.define_property("a", PropertyDescriptor::accessor(Some(get), Some(set)))
            .unwrap();
        define_reactive(&obj, "a", None, None, false);

        let (sub, count) = counter();
        assert_eq!(ReactiveContext::track(sub.clone(), || obj.get("a")), Value::from(1));

        obj.set("a", Value::from(2));
        assert_eq!(*store.read(), Value::from(2));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn getter_only_property_is_read_only() {
        let obj = ObjectRef::new();
        let get: Getter = Arc::new(|| Value::from(5));
        obj.define_property("a", PropertyDescriptor::accessor(Some(get), None))
            .unwrap();
        define_reactive(&obj, "a", None, None, false);

        let (sub, count) = counter();
        ReactiveContext::track(sub.clone(), || obj.get("a"));
        obj.set("a", Value::from(6));

        assert_eq!(obj.get("a"), Value::from(5));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn hook_runs_before_change_when_diagnostics_enabled() {
        let previous = config::set(config::Config {
            diagnostics: true,
            ..config::Config::default()
        });
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let hook: SetHook = Arc::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        let obj = ObjectRef::new();
        define_reactive(&obj, "a", Some(Value::from(1)), Some(hook), false);
        obj.set("a", Value::from(1));
        obj.set("a", Value::from(2));
        config::update(|cfg| cfg.diagnostics = false);
        obj.set("a", Value::from(3));
        config::set(previous);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(obj.get("a"), Value::from(3));
    }

    #[test]
    fn shallow_property_leaves_nested_value_raw() {
        let obj = ObjectRef::new();
        let nested = Value::from(json!({ "x": 1 }));
        define_reactive(&obj, "deep", Some(nested.clone()), None, true);

        assert!(nested.observer().is_none());
        assert!(reactive(&obj, "deep").is_shallow());
        assert!(reactive(&obj, "deep").child().is_none());

        obj.set("deep", Value::from(json!({ "y": 2 })));
        assert!(obj.get("deep").observer().is_none());
    }

    #[test]
    fn new_values_are_observed_on_assignment() {
        let obj = ObjectRef::new();
        define_reactive(&obj, "a", Some(Value::Null), None, false);

        let next = Value::from(json!({ "x": 1 }));
        obj.set("a", next.clone());

        let child = reactive(&obj, "a").child().unwrap();
        assert!(Arc::ptr_eq(&child, &next.observer().unwrap()));
    }

    #[test]
    fn reading_an_array_depends_on_nested_elements() {
        let obj = ObjectRef::new();
        let list = Value::from(json!([{ "a": 1 }, [{ "b": 2 }]]));
        define_reactive(&obj, "list", Some(list.clone()), None, false);

        let (sub, _) = counter();
        ReactiveContext::track(sub.clone(), || obj.get("list"));

        let arr = list.as_array().unwrap();
        let inner = arr.get(1);
        let grandchild = inner.as_array().unwrap().get(0);
        for value in [&list, &arr.get(0), &inner, &grandchild] {
            assert!(value.observer().unwrap().dep().contains(sub.id()));
        }
    }
}
