//! Array mutation interception.
//!
//! Element writes cannot be intercepted, so observed arrays route their
//! mutating methods through this table instead. Each method performs the
//! native operation, observes whatever it inserted, and then notifies the
//! array's shape registry exactly once. The native result is returned
//! unchanged.

use std::borrow::Cow;

use crate::config::{self, ArrayStrategy};
use crate::value::{native, ArrayMethods, ArrayRef, Comparator, Value};

/// The intercepted method table shared by observed arrays.
pub static INTERCEPTED_METHODS: ArrayMethods = ArrayMethods {
    intercepted: true,
    push,
    pop,
    shift,
    unshift,
    splice,
    sort,
    reverse,
};

/// Install the intercepted table on an array, per the configured strategy.
pub(super) fn augment(arr: &ArrayRef) {
    let methods = match config::array_strategy() {
        ArrayStrategy::Shared => Cow::Borrowed(&INTERCEPTED_METHODS),
        ArrayStrategy::Copied => Cow::Owned(INTERCEPTED_METHODS),
    };
    arr.install_methods(methods);
}

/// Observe the inserted elements and announce the shape change.
fn changed<R>(arr: &ArrayRef, inserted: &[Value], result: R) -> R {
    if let Some(observer) = arr.observer() {
        observer.observe_array(inserted);
        observer.dep().notify();
    }
    result
}

fn push(arr: &ArrayRef, items: Vec<Value>) -> usize {
    let inserted = items.clone();
    changed(arr, &inserted, native::push(arr, items))
}

fn pop(arr: &ArrayRef) -> Option<Value> {
    changed(arr, &[], native::pop(arr))
}

fn shift(arr: &ArrayRef) -> Option<Value> {
    changed(arr, &[], native::shift(arr))
}

fn unshift(arr: &ArrayRef, items: Vec<Value>) -> usize {
    let inserted = items.clone();
    changed(arr, &inserted, native::unshift(arr, items))
}

fn splice(arr: &ArrayRef, start: usize, delete_count: usize, items: Vec<Value>) -> Vec<Value> {
    let inserted = items.clone();
    changed(arr, &inserted, native::splice(arr, start, delete_count, items))
}

fn sort(arr: &ArrayRef, compare: Option<Comparator<'_>>) {
    changed(arr, &[], native::sort(arr, compare))
}

fn reverse(arr: &ArrayRef) {
    changed(arr, &[], native::reverse(arr))
}
