//! Recursive object utilities: ownership-aware freezing and structural merge.
//!
//! A [`Frozen`] handle is the only way data crosses a wrapper boundary. There
//! are two ways to obtain one:
//!
//! - [`freeze_owned`] moves a value the caller has exclusive ownership of
//!   into the handle. No other live reference can exist, so nothing is copied.
//! - [`freeze_borrowed`] deep-clones data the caller does not own before
//!   freezing it, so later mutation of the source is never observed through
//!   the handle and vice versa.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::Value;

/// Shared, deeply immutable handle.
///
/// Clones of a handle share the same allocation; [`Frozen::ptr_eq`] reports
/// that identity, which is how memoised getters are observed to return the
/// same value.
pub struct Frozen<T: ?Sized>(Arc<T>);

impl<T: ?Sized> Frozen<T> {
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl<T: Clone> Frozen<T> {
    /// Independent mutable copy of the frozen value.
    pub fn thaw(&self) -> T {
        (*self.0).clone()
    }
}

impl<T: ?Sized> Clone for Frozen<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: ?Sized> Deref for Frozen<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: ?Sized> AsRef<T> for Frozen<T> {
    fn as_ref(&self) -> &T {
        &self.0
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Frozen<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Frozen").field(&&*self.0).finish()
    }
}

impl<T: ?Sized + PartialEq> PartialEq for Frozen<T> {
    fn eq(&self, other: &Self) -> bool {
        *self.0 == *other.0
    }
}

impl<T: ?Sized + Serialize> Serialize for Frozen<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (*self.0).serialize(serializer)
    }
}

/// Freeze a value the caller owns exclusively, without copying.
pub fn freeze_owned<T>(value: T) -> Frozen<T> {
    Frozen(Arc::new(value))
}

/// Clone then freeze a value owned by someone else.
pub fn freeze_borrowed<T: Clone>(value: &T) -> Frozen<T> {
    Frozen(Arc::new(value.clone()))
}

/// Structural equality of two JSON documents. Object key order is ignored.
pub fn structurally_equal(a: &Value, b: &Value) -> bool {
    a == b
}

/// Recursively merge `overlay` onto `base`.
///
/// Objects merge key by key; every other value in `overlay` (arrays
/// included) replaces the corresponding value in `base`. `null` in the
/// overlay replaces as well.
pub fn merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            let mut merged = base_map.clone();
            for (key, value) in overlay_map {
                let next = match merged.get(key) {
                    Some(existing) => merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        (_, overlay) => overlay.clone(),
    }
}
