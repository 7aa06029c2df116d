//! Typed property values.
//!
//! Item properties hold a [`Value`]: a single [`Scalar`], an ordered
//! sequence of scalars, or an unordered set of scalars. A scalar is either a
//! primitive or a [`Scalar::Reference`] to another item, which is what turns
//! a set of items into a graph.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::ids::ItemId;

/// A primitive value or a reference to another item.
///
/// Scalars are totally ordered so that sets of scalars iterate
/// deterministically. Reals compare with [`f64::total_cmp`], which means
/// `NaN` equals itself and `-0.0` sorts before `0.0`.
#[derive(Clone, Serialize, Deserialize)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
    Data(Vec<u8>),
    Reference(ItemId),
}

impl Scalar {
    fn rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0,
            Self::Int(_) => 1,
            Self::Real(_) => 2,
            Self::Text(_) => 3,
            Self::Data(_) => 4,
            Self::Reference(_) => 5,
        }
    }

    /// Short name of the scalar's type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
            Self::Data(_) => "data",
            Self::Reference(_) => "reference",
        }
    }

    /// The referenced item, if this scalar is a reference.
    pub fn as_reference(&self) -> Option<ItemId> {
        match self {
            Self::Reference(id) => Some(*id),
            _ => None,
        }
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scalar {}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Real(a), Self::Real(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Data(a), Self::Data(b)) => a.cmp(b),
            (Self::Reference(a), Self::Reference(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Self::Bool(v) => v.hash(state),
            Self::Int(v) => v.hash(state),
            Self::Real(v) => v.to_bits().hash(state),
            Self::Text(v) => v.hash(state),
            Self::Data(v) => v.hash(state),
            Self::Reference(v) => v.hash(state),
        }
    }
}

impl fmt::Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v:?}"),
            Self::Text(v) => write!(f, "{v:?}"),
            Self::Data(v) => write!(f, "<{} bytes>", v.len()),
            Self::Reference(v) => write!(f, "&{}", v.short_id()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(v) => write!(f, "{v}"),
            Self::Reference(v) => write!(f, "&{v}"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// The value of one item property.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
    /// A single primitive or reference.
    Scalar(Scalar),
    /// An ordered sequence; order and duplicates are significant.
    Sequence(Vec<Scalar>),
    /// An unordered set.
    Set(BTreeSet<Scalar>),
}

impl Value {
    /// Build a reference value.
    pub fn reference(id: ItemId) -> Self {
        Self::Scalar(Scalar::Reference(id))
    }

    /// Build a sequence from anything convertible into scalars.
    pub fn sequence<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scalar>,
    {
        Self::Sequence(items.into_iter().map(Into::into).collect())
    }

    /// Build a set from anything convertible into scalars.
    pub fn set<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scalar>,
    {
        Self::Set(items.into_iter().map(Into::into).collect())
    }

    /// The single scalar, if this is not a collection.
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Every item referenced by this value, in value order.
    pub fn references(&self) -> Vec<ItemId> {
        match self {
            Self::Scalar(s) => s.as_reference().into_iter().collect(),
            Self::Sequence(items) => items.iter().filter_map(Scalar::as_reference).collect(),
            Self::Set(items) => items.iter().filter_map(Scalar::as_reference).collect(),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(s) => write!(f, "{s:?}"),
            Self::Sequence(items) => f.debug_list().entries(items).finish(),
            Self::Set(items) => f.debug_set().entries(items).finish(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(s) => write!(f, "{s}"),
            other => write!(f, "{other:?}"),
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Scalar {
    fn from(v: Vec<u8>) -> Self {
        Self::Data(v)
    }
}

impl From<ItemId> for Scalar {
    fn from(v: ItemId) -> Self {
        Self::Reference(v)
    }
}

macro_rules! value_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::Scalar(v.into())
                }
            }
        )*
    };
}

value_from_scalar!(bool, i64, i32, f64, &str, String, Vec<u8>, ItemId, Scalar);
