//! Array handles.
//!
//! Every array carries the method table used for its mutating operations.
//! Fresh arrays use the native table; the observer swaps in the intercepted
//! table when it takes the array over, so the interception is a property of
//! the instance rather than a global patch.
//!
//! Index reads and writes ([`ArrayRef::get`], [`ArrayRef::set_index`],
//! [`ArrayRef::set_len`]) never go through the table and are never tracked.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{Value, MAX_ARRAY_INDEX};
use crate::error::ObserveError;
use crate::observer::Observer;

/// Comparator for [`ArrayRef::sort_by`].
pub type Comparator<'a> = &'a dyn Fn(&Value, &Value) -> Ordering;

/// The mutating operations of an array.
#[derive(Clone, Copy)]
pub struct ArrayMethods {
    pub(crate) intercepted: bool,
    pub(crate) push: fn(&ArrayRef, Vec<Value>) -> usize,
    pub(crate) pop: fn(&ArrayRef) -> Option<Value>,
    pub(crate) shift: fn(&ArrayRef) -> Option<Value>,
    pub(crate) unshift: fn(&ArrayRef, Vec<Value>) -> usize,
    pub(crate) splice: fn(&ArrayRef, usize, usize, Vec<Value>) -> Vec<Value>,
    pub(crate) sort: fn(&ArrayRef, Option<Comparator<'_>>),
    pub(crate) reverse: fn(&ArrayRef),
}

/// The plain, untracked implementations.
pub(crate) mod native {
    use super::*;

    pub(crate) static METHODS: ArrayMethods = ArrayMethods {
        intercepted: false,
        push,
        pop,
        shift,
        unshift,
        splice,
        sort,
        reverse,
    };

    pub(crate) fn push(arr: &ArrayRef, items: Vec<Value>) -> usize {
        let mut data = arr.0.write();
        data.items.extend(items);
        data.items.len()
    }

    pub(crate) fn pop(arr: &ArrayRef) -> Option<Value> {
        arr.0.write().items.pop()
    }

    pub(crate) fn shift(arr: &ArrayRef) -> Option<Value> {
        let mut data = arr.0.write();
        if data.items.is_empty() {
            None
        } else {
            Some(data.items.remove(0))
        }
    }

    pub(crate) fn unshift(arr: &ArrayRef, items: Vec<Value>) -> usize {
        let mut data = arr.0.write();
        data.items.splice(0..0, items);
        data.items.len()
    }

    /// `start` is clamped to the length, and `delete_count` to what remains.
    pub(crate) fn splice(
        arr: &ArrayRef,
        start: usize,
        delete_count: usize,
        items: Vec<Value>,
    ) -> Vec<Value> {
        let mut data = arr.0.write();
        let len = data.items.len();
        let start = start.min(len);
        let end = start + delete_count.min(len - start);
        data.items.splice(start..end, items).collect()
    }

    /// Without a comparator, values order by their string rendering with
    /// `undefined` last. The sort is stable.
    pub(crate) fn sort(arr: &ArrayRef, compare: Option<Comparator<'_>>) {
        // Sort a copy so the comparator may read the array.
        let mut items = arr.to_vec();
        match compare {
            Some(compare) => items.sort_by(|a, b| compare(a, b)),
            None => items.sort_by(default_order),
        }
        arr.0.write().items = items;
    }

    pub(crate) fn reverse(arr: &ArrayRef) {
        arr.0.write().items.reverse();
    }

    fn default_order(a: &Value, b: &Value) -> Ordering {
        match (a, b) {
            (Value::Undefined, Value::Undefined) => Ordering::Equal,
            (Value::Undefined, _) => Ordering::Greater,
            (_, Value::Undefined) => Ordering::Less,
            _ => a.to_string().cmp(&b.to_string()),
        }
    }
}

pub(crate) struct ArrayData {
    items: Vec<Value>,
    methods: Cow<'static, ArrayMethods>,
    /// Hidden marker: set once the array has been observed.
    observer: Option<Arc<Observer>>,
}

/// Extend with `undefined` holes. Fails instead of aborting when the length
/// is out of range or the allocation is refused.
fn grow(items: &mut Vec<Value>, len: usize) -> Result<(), ObserveError> {
    if len > MAX_ARRAY_INDEX + 1 {
        return Err(ObserveError::ArrayLength { len });
    }
    let additional = len.saturating_sub(items.len());
    items
        .try_reserve_exact(additional)
        .map_err(|_| ObserveError::ArrayLength { len })?;
    items.resize(len, Value::Undefined);
    Ok(())
}

/// A shared handle to an array.
#[derive(Clone)]
pub struct ArrayRef(Arc<RwLock<ArrayData>>);

/// Non-owning handle to an array.
#[derive(Clone)]
pub(crate) struct WeakArrayRef(std::sync::Weak<RwLock<ArrayData>>);

impl WeakArrayRef {
    pub(crate) fn upgrade(&self) -> Option<ArrayRef> {
        self.0.upgrade().map(ArrayRef)
    }
}

impl ArrayRef {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        Self(Arc::new(RwLock::new(ArrayData {
            items,
            methods: Cow::Borrowed(&native::METHODS),
            observer: None,
        })))
    }

    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn downgrade(&self) -> WeakArrayRef {
        WeakArrayRef(Arc::downgrade(&self.0))
    }

    pub fn len(&self) -> usize {
        self.0.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().items.is_empty()
    }

    /// Element at `index`, or `undefined`.
    pub fn get(&self, index: usize) -> Value {
        self.0.read().items.get(index).cloned().unwrap_or_default()
    }

    /// Snapshot of the elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.read().items.clone()
    }

    /// Write one element directly. Grows the array with `undefined` holes if
    /// needed. Not intercepted.
    pub fn set_index(&self, index: usize, value: Value) -> Result<(), ObserveError> {
        let mut data = self.0.write();
        if index >= data.items.len() {
            let len = index.checked_add(1).ok_or(ObserveError::ArrayLength { len: index })?;
            grow(&mut data.items, len)?;
        }
        data.items[index] = value;
        Ok(())
    }

    /// Truncate or grow (with `undefined`) to `len`. Not intercepted.
    pub fn set_len(&self, len: usize) -> Result<(), ObserveError> {
        let mut data = self.0.write();
        if len <= data.items.len() {
            data.items.truncate(len);
            return Ok(());
        }
        grow(&mut data.items, len)
    }

    fn methods(&self) -> ArrayMethods {
        *self.0.read().methods
    }

    /// Append items, returning the new length.
    pub fn push(&self, items: impl IntoIterator<Item = Value>) -> usize {
        (self.methods().push)(self, items.into_iter().collect())
    }

    pub fn pop(&self) -> Option<Value> {
        (self.methods().pop)(self)
    }

    pub fn shift(&self) -> Option<Value> {
        (self.methods().shift)(self)
    }

    /// Prepend items, returning the new length.
    pub fn unshift(&self, items: impl IntoIterator<Item = Value>) -> usize {
        (self.methods().unshift)(self, items.into_iter().collect())
    }

    /// Remove `delete_count` elements at `start`, insert `items` there, and
    /// return the removed elements.
    pub fn splice(
        &self,
        start: usize,
        delete_count: usize,
        items: impl IntoIterator<Item = Value>,
    ) -> Vec<Value> {
        (self.methods().splice)(self, start, delete_count, items.into_iter().collect())
    }

    pub fn sort(&self) {
        (self.methods().sort)(self, None)
    }

    pub fn sort_by(&self, compare: impl Fn(&Value, &Value) -> Ordering) {
        (self.methods().sort)(self, Some(&compare))
    }

    pub fn reverse(&self) {
        (self.methods().reverse)(self)
    }

    /// Whether mutating operations go through the observer's interceptor.
    pub fn is_intercepted(&self) -> bool {
        self.0.read().methods.intercepted
    }

    /// Whether the intercepted table is this instance's own copy rather than
    /// the shared one.
    pub fn has_own_methods(&self) -> bool {
        matches!(self.0.read().methods, Cow::Owned(_))
    }

    pub(crate) fn install_methods(&self, methods: Cow<'static, ArrayMethods>) {
        self.0.write().methods = methods;
    }

    /// The observer attached to this array, if any.
    pub fn observer(&self) -> Option<Arc<Observer>> {
        self.0.read().observer.clone()
    }

    pub(crate) fn attach_observer(&self, observer: Arc<Observer>) {
        self.0.write().observer.get_or_insert(observer);
    }
}

impl Default for ArrayRef {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<Value> for ArrayRef {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.read();
        f.debug_struct("Array")
            .field("len", &data.items.len())
            .field("intercepted", &data.methods.intercepted)
            .field("observed", &data.observer.is_some())
            .finish()
    }
}
