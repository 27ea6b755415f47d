//! Sort specification and the shard document ordering built from it.
//!
//! A sort is a list of clauses such as `"price asc, score desc"`. The special
//! name `score` (no field qualifier) sorts by relevance; any other name sorts
//! by the shard-reported value for that field.
//!
//! [`ShardDocOrdering`] ranks [`ShardDoc`]s under such a sort:
//! 1. Same-shard shortcut (optional): two hits from the same shard keep the
//!    order the shard returned them in
//! 2. Clause-by-clause comparison; missing field values always sort last
//! 3. Tie-break: shard name ascending, then `order_in_shard` ascending

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::document::ShardDoc;
use crate::error::{MergeError, MergeResult};
use crate::ordering::{HitOrdering, MergeOrdering};

/// Reserved clause name for the relevance score.
pub const SCORE_KEY: &str = "score";

/// Sort direction of one clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Smallest value first
    Asc,
    /// Largest value first
    Desc,
}

impl SortDirection {
    /// Apply this direction to an ascending comparison.
    #[must_use]
    pub const fn apply(self, ascending: Ordering) -> Ordering {
        match self {
            Self::Asc => ascending,
            Self::Desc => ascending.reverse(),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

/// What a clause sorts on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SortKey {
    /// Relevance score with no field qualifier
    Score,
    /// A named field's reported sort value
    Field(String),
}

/// One sort clause
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SortField {
    /// Sort target
    pub key: SortKey,
    /// Sort direction
    pub direction: SortDirection,
}

impl SortField {
    /// Relevance score, best first.
    #[must_use]
    pub const fn score_desc() -> Self {
        Self {
            key: SortKey::Score,
            direction: SortDirection::Desc,
        }
    }

    /// A field clause.
    #[must_use]
    pub fn field(name: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            key: SortKey::Field(name.into()),
            direction,
        }
    }

    /// Whether this clause sorts on the bare relevance score.
    #[must_use]
    pub const fn is_score(&self) -> bool {
        matches!(self.key, SortKey::Score)
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            SortKey::Score => write!(f, "{SCORE_KEY} {}", self.direction),
            SortKey::Field(name) => write!(f, "{name} {}", self.direction),
        }
    }
}

impl FromStr for SortField {
    type Err = MergeError;

    fn from_str(s: &str) -> MergeResult<Self> {
        let mut parts = s.split_whitespace();
        let Some(name) = parts.next() else {
            return Err(MergeError::InvalidSort("empty sort clause".to_owned()));
        };
        let key = if name == SCORE_KEY {
            SortKey::Score
        } else {
            SortKey::Field(name.to_owned())
        };
        let direction = match parts.next().map(str::to_ascii_lowercase).as_deref() {
            None => match &key {
                SortKey::Score => SortDirection::Desc,
                SortKey::Field(_) => SortDirection::Asc,
            },
            Some("asc") => SortDirection::Asc,
            Some("desc") => SortDirection::Desc,
            Some(other) => {
                return Err(MergeError::InvalidSort(format!(
                    "unknown direction {other:?} in clause {s:?} (expected asc or desc)"
                )));
            }
        };
        if let Some(extra) = parts.next() {
            return Err(MergeError::InvalidSort(format!(
                "unexpected token {extra:?} in clause {s:?}"
            )));
        }
        Ok(Self { key, direction })
    }
}

impl TryFrom<String> for SortField {
    type Error = MergeError;

    fn try_from(value: String) -> MergeResult<Self> {
        value.parse()
    }
}

impl From<SortField> for String {
    fn from(field: SortField) -> Self {
        field.to_string()
    }
}

/// An ordered list of sort clauses
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortSpec {
    /// Clauses, most significant first
    pub fields: Vec<SortField>,
}

impl SortSpec {
    /// The default relevance sort: `score desc`.
    #[must_use]
    pub fn relevance() -> Self {
        Self {
            fields: vec![SortField::score_desc()],
        }
    }

    /// Whether any clause sorts on the bare relevance score.
    #[must_use]
    pub fn has_score_field(&self) -> bool {
        self.fields.iter().any(SortField::is_score)
    }
}

impl FromStr for SortSpec {
    type Err = MergeError;

    /// Parse a comma-separated clause list. An empty string means relevance.
    fn from_str(s: &str) -> MergeResult<Self> {
        if s.trim().is_empty() {
            return Ok(Self::relevance());
        }
        let fields = s
            .split(',')
            .map(str::parse)
            .collect::<MergeResult<Vec<SortField>>>()?;
        Ok(Self { fields })
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{field}")?;
        }
        Ok(())
    }
}

/// Ranks [`ShardDoc`]s under a [`SortSpec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardDocOrdering {
    spec: SortSpec,
    same_shard_shortcut: bool,
}

impl ShardDocOrdering {
    /// Ordering for `spec`, trusting each shard's own response order.
    #[must_use]
    pub const fn new(spec: SortSpec) -> Self {
        Self {
            spec,
            same_shard_shortcut: true,
        }
    }

    /// The sort this ordering ranks by.
    #[must_use]
    pub const fn spec(&self) -> &SortSpec {
        &self.spec
    }

    /// Whether same-shard hits are ordered by arrival instead of by value.
    #[must_use]
    pub const fn uses_same_shard_shortcut(&self) -> bool {
        self.same_shard_shortcut
    }

    fn clause_cmp(field: &SortField, a: &ShardDoc, b: &ShardDoc) -> Ordering {
        match &field.key {
            SortKey::Score => field.direction.apply(a.score.total_cmp(&b.score)),
            SortKey::Field(name) => match (a.sort_value(name), b.sort_value(name)) {
                (Some(x), Some(y)) => field.direction.apply(x.natural_cmp(y)),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        }
    }
}

impl HitOrdering for ShardDocOrdering {
    type Doc = ShardDoc;

    fn rank_cmp(&self, a: &ShardDoc, b: &ShardDoc) -> Ordering {
        if self.same_shard_shortcut && a.shard == b.shard {
            return a.order_in_shard.cmp(&b.order_in_shard);
        }
        self.spec
            .fields
            .iter()
            .map(|field| Self::clause_cmp(field, a, b))
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| {
                a.shard
                    .cmp(&b.shard)
                    .then(a.order_in_shard.cmp(&b.order_in_shard))
            })
    }
}

impl MergeOrdering for ShardDocOrdering {
    fn is_score_sort(&self) -> bool {
        self.spec.has_score_field()
    }

    fn relevance(&self) -> Self {
        Self::new(SortSpec::relevance())
    }

    fn exact(mut self) -> Self {
        self.same_shard_shortcut = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, shard: &str, order: usize, score: f64) -> ShardDoc {
        ShardDoc::new(id, shard, order, score)
    }

    #[test]
    fn parse_clause_defaults() {
        let score: SortField = "score".parse().unwrap();
        assert_eq!(score, SortField::score_desc());
        let price: SortField = "price".parse().unwrap();
        assert_eq!(price, SortField::field("price", SortDirection::Asc));
        let rating: SortField = "  rating   DESC ".parse().unwrap();
        assert_eq!(rating, SortField::field("rating", SortDirection::Desc));
    }

    #[test]
    fn parse_rejects_bad_clauses() {
        for bad in ["", "   ", "price up", "price asc extra"] {
            let err = bad.parse::<SortField>().unwrap_err();
            assert_eq!(err.error_type(), "INVALID_SORT", "{bad:?}");
        }
        assert!("price asc,,score desc".parse::<SortSpec>().is_err());
    }

    #[test]
    fn spec_round_trips_through_display() {
        let spec: SortSpec = "price asc, score asc, name desc".parse().unwrap();
        assert_eq!(spec.to_string(), "price asc, score asc, name desc");
        assert!(spec.has_score_field());
        let json = serde_json::to_string(&spec).unwrap();
        assert_eq!(json, r#"["price asc","score asc","name desc"]"#);
        let back: SortSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn empty_spec_string_means_relevance() {
        let spec: SortSpec = "".parse().unwrap();
        assert_eq!(spec, SortSpec::relevance());
    }

    #[test]
    fn field_named_like_score_prefix_is_not_score() {
        let spec: SortSpec = "score_boost desc".parse().unwrap();
        assert!(!spec.has_score_field());
    }

    #[test]
    fn score_desc_ranks_higher_scores_first() {
        let ord = ShardDocOrdering::new(SortSpec::relevance());
        let a = doc("a", "s1", 0, 2.0);
        let b = doc("b", "s2", 0, 1.0);
        assert!(ord.outranks(&a, &b));
        assert!(!ord.outranks(&b, &a));
    }

    #[test]
    fn same_shard_shortcut_uses_arrival_order() {
        let ord = ShardDocOrdering::new(SortSpec::relevance());
        // Inconsistent scores within one shard: the shortcut trusts the shard.
        let first = doc("a", "s1", 0, 1.0);
        let second = doc("b", "s1", 1, 5.0);
        assert!(ord.outranks(&first, &second));

        let exact = ord.exact();
        assert!(!exact.uses_same_shard_shortcut());
        assert!(exact.outranks(&second, &first));
    }

    #[test]
    fn missing_values_sort_last_in_both_directions() {
        let with = doc("a", "s1", 0, 0.0).with_sort_value("price", 5);
        let without = doc("b", "s2", 0, 0.0);
        for dir in [SortDirection::Asc, SortDirection::Desc] {
            let ord = ShardDocOrdering::new(SortSpec {
                fields: vec![SortField::field("price", dir)],
            });
            assert!(ord.outranks(&with, &without), "{dir}");
        }
    }

    #[test]
    fn later_clauses_break_ties() {
        let spec: SortSpec = "price asc, score desc".parse().unwrap();
        let ord = ShardDocOrdering::new(spec);
        let cheap_low = doc("a", "s1", 0, 1.0).with_sort_value("price", 10);
        let cheap_high = doc("b", "s2", 0, 3.0).with_sort_value("price", 10);
        let pricey = doc("c", "s3", 0, 9.0).with_sort_value("price", 20);
        assert!(ord.outranks(&cheap_high, &cheap_low));
        assert!(ord.outranks(&cheap_low, &pricey));
    }

    #[test]
    fn full_tie_breaks_on_shard_then_position() {
        let ord = ShardDocOrdering::new(SortSpec::relevance()).exact();
        let a = doc("x", "shard-a", 4, 1.0);
        let b = doc("y", "shard-b", 0, 1.0);
        assert!(ord.outranks(&a, &b));
        let a2 = doc("z", "shard-a", 5, 1.0);
        assert!(ord.outranks(&a, &a2));
        assert_eq!(ord.rank_cmp(&a, &a.clone()), Ordering::Equal);
    }

    #[test]
    fn relevance_ordering_is_score_desc_with_shortcut() {
        let spec: SortSpec = "price asc".parse().unwrap();
        let ord = ShardDocOrdering::new(spec).exact();
        let rel = ord.relevance();
        assert_eq!(rel.spec(), &SortSpec::relevance());
        assert!(rel.uses_same_shard_shortcut());
        assert!(!ord.is_score_sort());
        assert!(rel.is_score_sort());
    }
}
