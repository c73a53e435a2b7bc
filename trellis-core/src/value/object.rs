//! Object handles and property descriptors.
//!
//! An object is an insertion-ordered table of property descriptors. A
//! property is either plain data, an accessor pair supplied by the embedder,
//! or a reactive accessor installed by the observer. Reads and writes always
//! go through the descriptor, which is what lets the observer intercept them.
//!
//! No lock is held while a getter, setter or reactive accessor runs, so
//! accessors are free to read and write the same object.

use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::Value;
use crate::error::ObserveError;
use crate::observer::{Observer, ReactiveProperty};

/// A getter closure for an accessor property.
pub type Getter = Arc<dyn Fn() -> Value + Send + Sync>;

/// A setter closure for an accessor property.
pub type Setter = Arc<dyn Fn(Value) + Send + Sync>;

/// What kind of object this is, as far as observation is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectKind {
    /// An ordinary state object. Observable.
    #[default]
    Plain,
    /// A framework root/component instance. Never observed itself, and
    /// rejects runtime shape changes through `set`/`del`.
    Root,
    /// An internal render-tree node. Never observed.
    RenderNode,
}

/// How a property stores or computes its value.
#[derive(Clone)]
pub enum PropertyKind {
    Data { value: Value, writable: bool },
    Accessor { get: Option<Getter>, set: Option<Setter> },
    /// Installed by [`define_reactive`](crate::define_reactive).
    Reactive(Arc<ReactiveProperty>),
}

/// A property and its attributes.
#[derive(Clone)]
pub struct PropertyDescriptor {
    pub kind: PropertyKind,
    /// Whether the key shows up in [`ObjectRef::keys`].
    pub enumerable: bool,
    /// Whether the property may be redefined or deleted.
    pub configurable: bool,
}

impl PropertyDescriptor {
    /// A writable, enumerable, configurable data property.
    pub fn data(value: Value) -> Self {
        Self {
            kind: PropertyKind::Data { value, writable: true },
            enumerable: true,
            configurable: true,
        }
    }

    /// An enumerable, configurable accessor property.
    pub fn accessor(get: Option<Getter>, set: Option<Setter>) -> Self {
        Self {
            kind: PropertyKind::Accessor { get, set },
            enumerable: true,
            configurable: true,
        }
    }

    pub fn read_only(mut self) -> Self {
        if let PropertyKind::Data { writable, .. } = &mut self.kind {
            *writable = false;
        }
        self
    }

    pub fn hidden(mut self) -> Self {
        self.enumerable = false;
        self
    }

    pub fn non_configurable(mut self) -> Self {
        self.configurable = false;
        self
    }

    /// The getter half of the property, if it is an accessor.
    ///
    /// A reactive property presents its tracked read as a getter, so it can
    /// be wrapped like any other accessor pair.
    pub fn getter(&self) -> Option<Getter> {
        match &self.kind {
            PropertyKind::Data { .. } => None,
            PropertyKind::Accessor { get, .. } => get.clone(),
            PropertyKind::Reactive(prop) => {
                let prop = prop.clone();
                let get: Getter = Arc::new(move || prop.get());
                Some(get)
            }
        }
    }

    /// The setter half of the property, if it is an accessor.
    pub fn setter(&self) -> Option<Setter> {
        match &self.kind {
            PropertyKind::Data { .. } => None,
            PropertyKind::Accessor { set, .. } => set.clone(),
            PropertyKind::Reactive(prop) => {
                let prop = prop.clone();
                let set: Setter = Arc::new(move |value| prop.set(value));
                Some(set)
            }
        }
    }

    pub fn is_reactive(&self) -> bool {
        matches!(self.kind, PropertyKind::Reactive(_))
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            PropertyKind::Data { writable: true, .. } => "data",
            PropertyKind::Data { writable: false, .. } => "read-only data",
            PropertyKind::Accessor { .. } => "accessor",
            PropertyKind::Reactive(_) => "reactive",
        };
        f.debug_struct("PropertyDescriptor")
            .field("kind", &kind)
            .field("enumerable", &self.enumerable)
            .field("configurable", &self.configurable)
            .finish()
    }
}

pub(crate) struct ObjectData {
    props: IndexMap<String, PropertyDescriptor>,
    kind: ObjectKind,
    extensible: bool,
    /// Hidden marker: set once the object has been observed.
    observer: Option<Arc<Observer>>,
}

/// A shared handle to an object.
#[derive(Clone)]
pub struct ObjectRef(Arc<RwLock<ObjectData>>);

/// Non-owning handle to an object.
#[derive(Clone)]
pub(crate) struct WeakObjectRef(Weak<RwLock<ObjectData>>);

impl WeakObjectRef {
    pub(crate) fn upgrade(&self) -> Option<ObjectRef> {
        self.0.upgrade().map(ObjectRef)
    }
}

impl ObjectRef {
    /// Create an empty plain object.
    pub fn new() -> Self {
        Self::with_kind(ObjectKind::Plain)
    }

    pub fn with_kind(kind: ObjectKind) -> Self {
        Self(Arc::new(RwLock::new(ObjectData {
            props: IndexMap::new(),
            kind,
            extensible: true,
            observer: None,
        })))
    }

    /// Create a plain object holding the given data properties, in order.
    pub fn from_pairs<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let obj = Self::new();
        {
            let mut data = obj.0.write();
            for (key, value) in pairs {
                data.props.insert(key.into(), PropertyDescriptor::data(value));
            }
        }
        obj
    }

    pub fn kind(&self) -> ObjectKind {
        self.0.read().kind
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn downgrade(&self) -> WeakObjectRef {
        WeakObjectRef(Arc::downgrade(&self.0))
    }

    /// Own enumerable keys, in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.0
            .read()
            .props
            .iter()
            .filter(|(_, desc)| desc.enumerable)
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn has_own(&self, key: &str) -> bool {
        self.0.read().props.contains_key(key)
    }

    pub fn descriptor(&self, key: &str) -> Option<PropertyDescriptor> {
        self.0.read().props.get(key).cloned()
    }

    /// Install or replace a property.
    ///
    /// Replacing a non-configurable property, or adding a property to a
    /// non-extensible object, fails.
    pub fn define_property(
        &self,
        key: &str,
        descriptor: PropertyDescriptor,
    ) -> Result<(), ObserveError> {
        let mut data = self.0.write();
        match data.props.get(key) {
            Some(existing) if !existing.configurable => {
                return Err(ObserveError::NonConfigurable {
                    key: key.to_string(),
                })
            }
            None if !data.extensible => {
                return Err(ObserveError::NotExtensible {
                    key: key.to_string(),
                })
            }
            _ => {}
        }
        // Replacing keeps the key's position.
        data.props.insert(key.to_string(), descriptor);
        Ok(())
    }

    /// Read a property. Reactive properties register the active subscriber.
    pub fn get(&self, key: &str) -> Value {
        let kind = self.0.read().props.get(key).map(|desc| desc.kind.clone());
        match kind {
            None => Value::Undefined,
            Some(PropertyKind::Data { value, .. }) => value,
            Some(PropertyKind::Accessor { get, .. }) => get.map(|get| get()).unwrap_or_default(),
            Some(PropertyKind::Reactive(prop)) => prop.get(),
        }
    }

    /// Assign a property.
    ///
    /// Existing properties are written through their descriptor; read-only
    /// data and getter-only accessors ignore the write. A missing key is added
    /// as plain data if the object is extensible. Adding a key this way is
    /// never reactive, see [`set`](crate::set).
    pub fn set(&self, key: &str, value: Value) {
        let kind = self.0.read().props.get(key).map(|desc| desc.kind.clone());
        match kind {
            Some(PropertyKind::Data { writable: true, .. }) => {
                let mut data = self.0.write();
                if let Some(PropertyKind::Data { value: slot, .. }) =
                    data.props.get_mut(key).map(|desc| &mut desc.kind)
                {
                    *slot = value;
                }
            }
            Some(PropertyKind::Data { .. }) => {}
            Some(PropertyKind::Accessor { set, .. }) => {
                if let Some(set) = set {
                    set(value);
                }
            }
            Some(PropertyKind::Reactive(prop)) => prop.set(value),
            None => {
                let mut data = self.0.write();
                if data.extensible {
                    data.props.insert(key.to_string(), PropertyDescriptor::data(value));
                }
            }
        }
    }

    /// Remove an own property. Returns `false` if it is non-configurable.
    pub fn delete(&self, key: &str) -> bool {
        let mut data = self.0.write();
        match data.props.get(key) {
            None => true,
            Some(desc) if !desc.configurable => false,
            Some(_) => {
                data.props.shift_remove(key);
                true
            }
        }
    }

    pub fn is_extensible(&self) -> bool {
        self.0.read().extensible
    }

    pub fn prevent_extensions(&self) {
        self.0.write().extensible = false;
    }

    /// Make every property read-only and non-configurable, and stop new
    /// properties from being added.
    pub fn freeze(&self) {
        let mut data = self.0.write();
        data.extensible = false;
        for desc in data.props.values_mut() {
            desc.configurable = false;
            if let PropertyKind::Data { writable, .. } = &mut desc.kind {
                *writable = false;
            }
        }
    }

    /// The observer attached to this object, if any.
    pub fn observer(&self) -> Option<Arc<Observer>> {
        self.0.read().observer.clone()
    }

    pub(crate) fn attach_observer(&self, observer: Arc<Observer>) {
        self.0.write().observer.get_or_insert(observer);
    }
}

impl Default for ObjectRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.read();
        let keys: Vec<&String> = data
            .props
            .iter()
            .filter(|(_, desc)| desc.enumerable)
            .map(|(key, _)| key)
            .collect();
        f.debug_struct("Object")
            .field("kind", &data.kind)
            .field("keys", &keys)
            .field("observed", &data.observer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn keys_keep_insertion_order_and_skip_hidden() {
        let obj = ObjectRef::from_pairs([("b", Value::from(1)), ("a", Value::from(2))]);
        obj.define_property("secret", PropertyDescriptor::data(Value::Null).hidden())
            .unwrap();
        obj.set("c", Value::from(3));

        assert_eq!(obj.keys(), vec!["b", "a", "c"]);
        assert!(obj.has_own("secret"));
    }

    #[test]
    fn read_only_data_ignores_writes() {
        let obj = ObjectRef::new();
        obj.define_property("k", PropertyDescriptor::data(Value::from(1)).read_only())
            .unwrap();
        obj.set("k", Value::from(2));
        assert_eq!(obj.get("k"), Value::from(1));
    }

    #[test]
    fn accessor_routes_reads_and_writes() {
        let store = Arc::new(RwLock::new(Value::from(1)));
        let writes = Arc::new(AtomicUsize::new(0));

        let read_store = store.clone();
        let write_store = store.clone();
        let write_count = writes.clone();
        let get: Getter = Arc::new(move || read_store.read().clone());
        let set: Setter = Arc::new(move |value| {
            write_count.fetch_add(1, Ordering::SeqCst);
            *write_store.write() = value;
        });

        let obj = ObjectRef::new();
        obj.define_property("k", PropertyDescriptor::accessor(Some(get), Some(set)))
            .unwrap();

        assert_eq!(obj.get("k"), Value::from(1));
        obj.set("k", Value::from(5));
        assert_eq!(obj.get("k"), Value::from(5));
        assert_eq!(writes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn getter_only_accessor_ignores_writes() {
        let get: Getter = Arc::new(|| Value::from("fixed"));
        let obj = ObjectRef::new();
        obj.define_property("k", PropertyDescriptor::accessor(Some(get), None))
            .unwrap();

        obj.set("k", Value::from("other"));
        assert_eq!(obj.get("k"), Value::from("fixed"));
    }

    #[test]
    fn non_configurable_properties_resist_redefinition_and_delete() {
        let obj = ObjectRef::new();
        obj.define_property("k", PropertyDescriptor::data(Value::from(1)).non_configurable())
            .unwrap();

        let err = obj
            .define_property("k", PropertyDescriptor::data(Value::from(2)))
            .unwrap_err();
        assert!(matches!(err, ObserveError::NonConfigurable { .. }));
        assert!(!obj.delete("k"));
        assert_eq!(obj.get("k"), Value::from(1));
    }

    #[test]
    fn frozen_object_rejects_changes() {
        let obj = ObjectRef::from_pairs([("a", Value::from(1))]);
        obj.freeze();

        obj.set("a", Value::from(2));
        obj.set("b", Value::from(3));

        assert!(!obj.is_extensible());
        assert_eq!(obj.get("a"), Value::from(1));
        assert!(!obj.has_own("b"));
        assert!(matches!(
            obj.define_property("b", PropertyDescriptor::data(Value::Null)),
            Err(ObserveError::NotExtensible { .. })
        ));
    }

    #[test]
    fn delete_missing_key_succeeds() {
        let obj = ObjectRef::new();
        assert!(obj.delete("nope"));
    }
}
