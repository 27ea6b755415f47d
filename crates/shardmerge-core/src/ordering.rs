//! Ordering seam between the merge queues and the query's sort.
//!
//! The queues never look inside a document. Everything they know about rank
//! comes from a [`HitOrdering`], and the manager additionally asks a
//! [`MergeOrdering`] which queue layout the sort allows.

use std::cmp::Ordering;

/// A total order over documents, best first.
pub trait HitOrdering {
    /// The document type being ranked.
    type Doc;

    /// Compare two documents by rank.
    ///
    /// `Ordering::Less` means `a` ranks ahead of `b`. Implementations must
    /// be total and deterministic; ties should be broken explicitly.
    fn rank_cmp(&self, a: &Self::Doc, b: &Self::Doc) -> Ordering;

    /// True when `a` ranks strictly ahead of `b`.
    #[inline]
    fn outranks(&self, a: &Self::Doc, b: &Self::Doc) -> bool {
        self.rank_cmp(a, b) == Ordering::Less
    }
}

/// The extra knowledge the merge manager needs from a query ordering.
pub trait MergeOrdering: HitOrdering + Sized {
    /// Whether any clause of this ordering is the bare relevance score,
    /// ascending or descending.
    fn is_score_sort(&self) -> bool;

    /// The relevance-score ordering used for the re-ranked tier.
    #[must_use]
    fn relevance(&self) -> Self;

    /// This ordering with every arrival-order shortcut disabled.
    ///
    /// Documents forwarded out of the re-rank tier arrive out of shard order,
    /// so the primary queue must compare them on their sort values alone.
    #[must_use]
    fn exact(self) -> Self;
}
