//! Shard document model
//!
//! A [`ShardDoc`] is one hit as returned by one shard: its identity, where it
//! came from, its relevance score, and the sort values the shard reported for
//! it. The merge never mutates a document; it only retains or drops it.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single sort value reported by a shard.
///
/// Deserializes from a bare JSON number, string, or `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SortValue {
    /// Integer field value
    Int(i64),
    /// Floating-point field value
    Float(f64),
    /// String field value
    Text(String),
    /// Field absent on this document
    Missing,
}

impl SortValue {
    /// Whether this value is absent.
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Ascending comparison of two present values.
    ///
    /// Numbers compare numerically across `Int`/`Float`, text compares
    /// lexicographically, and numbers order before text. `Missing` is handled
    /// by the caller so it can stay last in both directions.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn natural_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Int(a), Self::Float(b)) => (*a as f64).total_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.total_cmp(&(*b as f64)),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.kind_rank().cmp(&other.kind_rank()),
        }
    }

    const fn kind_rank(&self) -> u8 {
        match self {
            Self::Int(_) | Self::Float(_) => 0,
            Self::Text(_) => 1,
            Self::Missing => 2,
        }
    }
}

impl From<i64> for SortValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for SortValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for SortValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

/// One hit returned by one shard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardDoc {
    /// Document unique key
    pub id: String,
    /// Shard that returned the hit
    pub shard: String,
    /// 0-based rank of the hit within its shard's response
    #[serde(default)]
    pub order_in_shard: usize,
    /// Relevance score computed by the shard (higher is better)
    #[serde(default)]
    pub score: f64,
    /// Sort values keyed by field name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sort_values: BTreeMap<String, SortValue>,
}

impl ShardDoc {
    /// Create a document with no sort values.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        shard: impl Into<String>,
        order_in_shard: usize,
        score: f64,
    ) -> Self {
        Self {
            id: id.into(),
            shard: shard.into(),
            order_in_shard,
            score,
            sort_values: BTreeMap::new(),
        }
    }

    /// Attach a sort value for `field`.
    #[must_use]
    pub fn with_sort_value(mut self, field: impl Into<String>, value: impl Into<SortValue>) -> Self {
        self.sort_values.insert(field.into(), value.into());
        self
    }

    /// The present sort value for `field`, if any.
    #[must_use]
    pub fn sort_value(&self, field: &str) -> Option<&SortValue> {
        self.sort_values.get(field).filter(|v| !v.is_missing())
    }
}
