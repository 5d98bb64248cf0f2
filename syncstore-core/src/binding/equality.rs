//! Equality Policies
//!
//! An equality policy decides whether a derived value "changed" for
//! re-render purposes. Two builtin strategies exist:
//!
//! - **identity** ([`SameValue`]): pointer identity for shared references,
//!   value identity for scalars and strings.
//! - **shallow** ([`ShallowEq`]): plain aggregates with the same shape whose
//!   elements are pairwise identical, one level deep.
//!
//! Both treat `NaN` as equal to itself. A selector that yields `NaN` (for
//! example a ratio over an empty set) would otherwise look changed on every
//! notification and re-render forever.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;

/// Identity comparison.
///
/// For floating point values this follows "same value" semantics: `NaN` is
/// identical to `NaN`, and `0.0` is not identical to `-0.0`.
pub trait SameValue {
    /// Whether `self` and `other` are the same value.
    fn same_value(&self, other: &Self) -> bool;
}

/// Compare two values with the identity policy.
pub fn same_value<T: SameValue + ?Sized>(a: &T, b: &T) -> bool {
    a.same_value(b)
}

macro_rules! same_value_by_eq {
    ($($ty:ty),* $(,)?) => {
        $(
            impl SameValue for $ty {
                #[inline]
                fn same_value(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

same_value_by_eq!(
    (), bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, str, String,
);

impl SameValue for f64 {
    #[inline]
    fn same_value(&self, other: &Self) -> bool {
        (self.is_nan() && other.is_nan()) || self.to_bits() == other.to_bits()
    }
}

impl SameValue for f32 {
    #[inline]
    fn same_value(&self, other: &Self) -> bool {
        (self.is_nan() && other.is_nan()) || self.to_bits() == other.to_bits()
    }
}

impl<T: ?Sized> SameValue for Arc<T> {
    #[inline]
    fn same_value(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

impl<T: ?Sized> SameValue for Rc<T> {
    #[inline]
    fn same_value(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

impl<T: SameValue + ?Sized> SameValue for &T {
    #[inline]
    fn same_value(&self, other: &Self) -> bool {
        (**self).same_value(*other)
    }
}

impl<T: SameValue> SameValue for Option<T> {
    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same_value(b),
            (None, None) => true,
            _ => false,
        }
    }
}

/// Shallow comparison of plain aggregates.
///
/// Two aggregates are shallow-equal when they have the same number of
/// entries, the same keys (for maps), and each pair of values is
/// [`SameValue`]-identical. Nested aggregates are compared by identity, not
/// recursively.
pub trait ShallowEq {
    /// Whether `self` and `other` are shallow-equal.
    fn shallow_eq(&self, other: &Self) -> bool;
}

/// Compare two values with the shallow policy.
pub fn shallow_equal<T: ShallowEq + ?Sized>(a: &T, b: &T) -> bool {
    a.shallow_eq(b)
}

impl<T: SameValue> ShallowEq for [T] {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.same_value(b))
    }
}

impl<T: SameValue> ShallowEq for Vec<T> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.as_slice().shallow_eq(other.as_slice())
    }
}

impl<T: SameValue, const N: usize> ShallowEq for [T; N] {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.as_slice().shallow_eq(other.as_slice())
    }
}

impl<K: Ord, V: SameValue> ShallowEq for BTreeMap<K, V> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, a)| other.get(k).is_some_and(|b| a.same_value(b)))
    }
}

impl<K: Eq + Hash, V: SameValue, H: BuildHasher> ShallowEq for HashMap<K, V, H> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, a)| other.get(k).is_some_and(|b| a.same_value(b)))
    }
}

impl<K: Eq + Hash, V: SameValue, H: BuildHasher> ShallowEq for IndexMap<K, V, H> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, a)| other.get(k).is_some_and(|b| a.same_value(b)))
    }
}

impl<T: ShallowEq> ShallowEq for Option<T> {
    fn shallow_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.shallow_eq(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: ShallowEq + ?Sized> ShallowEq for Arc<T> {
    fn shallow_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other) || (**self).shallow_eq(&**other)
    }
}

macro_rules! shallow_eq_tuple {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: SameValue),+> ShallowEq for ($($name,)+) {
            fn shallow_eq(&self, other: &Self) -> bool {
                $(self.$idx.same_value(&other.$idx))&&+
            }
        }
    };
}

shallow_eq_tuple!(A: 0);
shallow_eq_tuple!(A: 0, B: 1);
shallow_eq_tuple!(A: 0, B: 1, C: 2);
shallow_eq_tuple!(A: 0, B: 1, C: 2, D: 3);
shallow_eq_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4);
shallow_eq_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);

/// A pluggable comparison used to decide whether a selection changed.
///
/// Must be pure and deterministic.
pub struct Equality<V> {
    compare: Arc<dyn Fn(&V, &V) -> bool + Send + Sync>,
    name: &'static str,
}

impl<V: 'static> Equality<V> {
    /// Identity policy (the default).
    pub fn identity() -> Self
    where
        V: SameValue,
    {
        Self {
            compare: Arc::new(|a: &V, b: &V| a.same_value(b)),
            name: "identity",
        }
    }

    /// Shallow policy for plain aggregates.
    pub fn shallow() -> Self
    where
        V: ShallowEq,
    {
        Self {
            compare: Arc::new(|a: &V, b: &V| a.shallow_eq(b)),
            name: "shallow",
        }
    }

    /// Structural equality via `PartialEq`.
    ///
    /// Note that `NaN != NaN` under `PartialEq`, so a selection containing
    /// `NaN` compares as changed every time with this policy.
    pub fn structural() -> Self
    where
        V: PartialEq,
    {
        Self {
            compare: Arc::new(|a: &V, b: &V| a == b),
            name: "structural",
        }
    }

    /// A caller-supplied comparison.
    pub fn custom<F>(compare: F) -> Self
    where
        F: Fn(&V, &V) -> bool + Send + Sync + 'static,
    {
        Self {
            compare: Arc::new(compare),
            name: "custom",
        }
    }

    /// Whether `a` and `b` are equal under this policy.
    #[inline]
    pub fn equals(&self, a: &V, b: &V) -> bool {
        (self.compare)(a, b)
    }

    /// Name of the policy, for diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<V: SameValue + 'static> Default for Equality<V> {
    fn default() -> Self {
        Self::identity()
    }
}

impl<V> Clone for Equality<V> {
    fn clone(&self) -> Self {
        Self {
            compare: Arc::clone(&self.compare),
            name: self.name,
        }
    }
}

impl<V> fmt::Debug for Equality<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Equality").field(&self.name).finish()
    }
}
