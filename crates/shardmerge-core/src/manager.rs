//! Merge-queue orchestration for distributed result aggregation.
//!
//! [`MergeQueueManager`] owns the queues that per-shard hits are merged into.
//! The layout is chosen once, at construction:
//!
//! - **Single primary**: one queue of `offset + count` under the query sort.
//!   Used when re-ranking is off, and also when the query sort contains a
//!   bare score clause. Splitting tiers does not compose with a score-ordered
//!   base sort, and every shard coordinator must make the same choice, so the
//!   single-queue behavior is kept for that case.
//! - **Primary with re-rank**: a relevance-ordered queue of
//!   `min(rerank_docs, count)` for hits whose shard-local index falls under
//!   that threshold, plus an exact primary queue for everything else.
//!   Documents pushed out of the re-rank queue fall through to the primary
//!   queue and compete there under the query sort.
//!
//! Draining yields every primary survivor before any re-rank survivor. That
//! order is part of the response contract and must not be interleaved.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::config::{PageSpec, ReRankConfig};
use crate::error::{MergeError, MergeResult};
use crate::ordering::{HitOrdering, MergeOrdering};
use crate::queue::BoundedOrderedQueue;

/// Which queue layout a merge uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// One queue under the query sort
    SinglePrimary,
    /// A relevance-ordered re-rank queue in front of an exact primary queue
    PrimaryWithReRank,
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SinglePrimary => write!(f, "single_primary"),
            Self::PrimaryWithReRank => write!(f, "primary_with_rerank"),
        }
    }
}

/// Which queue a drained document came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeTier {
    /// The primary queue
    Primary,
    /// The re-rank queue
    ReRank,
}

impl fmt::Display for MergeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::ReRank => write!(f, "rerank"),
        }
    }
}

/// Lifecycle phase of a merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePhase {
    /// Accepting documents
    Ingest,
    /// Yielding results; no further documents accepted
    Drain,
}

/// Ingest-phase counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MergeStats {
    /// Documents passed to `add_document`
    pub offered: u64,
    /// Documents routed to the re-rank queue first
    pub routed_to_rerank: u64,
    /// Documents pushed out of the re-rank queue into the primary queue
    pub forwarded: u64,
    /// Documents dropped from the result set entirely
    pub dropped: u64,
}

enum MergeQueues<O: HitOrdering> {
    SinglePrimary {
        primary: BoundedOrderedQueue<O>,
    },
    PrimaryWithReRank {
        primary: BoundedOrderedQueue<O>,
        rerank: BoundedOrderedQueue<O>,
        threshold: usize,
    },
}

/// Merges per-shard hits into one bounded, ordered result set.
pub struct MergeQueueManager<O: HitOrdering> {
    queues: MergeQueues<O>,
    phase: MergePhase,
    stats: MergeStats,
}

impl<O: HitOrdering> fmt::Debug for MergeQueueManager<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("MergeQueueManager");
        s.field("strategy", &self.strategy())
            .field("phase", &self.phase)
            .field("primary", self.primary());
        if let MergeQueues::PrimaryWithReRank {
            rerank, threshold, ..
        } = &self.queues
        {
            s.field("rerank", rerank).field("threshold", threshold);
        }
        s.field("stats", &self.stats).finish()
    }
}

impl<O: MergeOrdering> MergeQueueManager<O> {
    /// Configure the merge for one query.
    ///
    /// Strategy selection, in order:
    /// 1. No re-rank config → single primary
    /// 2. Query sort has a bare score clause → single primary
    /// 3. Otherwise → primary with re-rank
    pub fn new(
        ordering: O,
        page: PageSpec,
        rerank: Option<&ReRankConfig>,
    ) -> MergeResult<Self> {
        let window = page.window()?;

        let queues = match rerank {
            Some(config) if !ordering.is_score_sort() => {
                let effective = config.effective_size(&page);
                let rerank = BoundedOrderedQueue::new(ordering.relevance(), effective);
                let primary = BoundedOrderedQueue::new(ordering.exact(), window - effective);
                MergeQueues::PrimaryWithReRank {
                    primary,
                    rerank,
                    threshold: effective,
                }
            }
            _ => MergeQueues::SinglePrimary {
                primary: BoundedOrderedQueue::new(ordering, window),
            },
        };

        let manager = Self {
            queues,
            phase: MergePhase::Ingest,
            stats: MergeStats::default(),
        };
        debug!(
            strategy = %manager.strategy(),
            rerank_requested = rerank.is_some(),
            offset = page.offset,
            count = page.count,
            primary_capacity = manager.primary_capacity(),
            rerank_capacity = ?manager.rerank_capacity(),
            "merge queues configured"
        );
        Ok(manager)
    }
}

impl<O: HitOrdering> MergeQueueManager<O> {
    /// Merge one shard hit.
    ///
    /// `shard_index` is the hit's 0-based rank within its own shard's
    /// response. Hits under the re-rank threshold try the re-rank queue
    /// first; whatever it pushes out (possibly the hit itself) is offered to
    /// the primary queue. Anything the primary queue pushes out is dropped.
    pub fn add_document(&mut self, doc: O::Doc, shard_index: usize) -> MergeResult<()> {
        if self.phase == MergePhase::Drain {
            warn!(shard_index, "add_document called after draining started");
            return Err(MergeError::IngestClosed);
        }
        self.stats.offered += 1;

        let (primary, candidate) = match &mut self.queues {
            MergeQueues::PrimaryWithReRank {
                primary,
                rerank,
                threshold,
            } if shard_index < *threshold => {
                self.stats.routed_to_rerank += 1;
                let Some(overflow) = rerank.offer(doc) else {
                    return Ok(());
                };
                self.stats.forwarded += 1;
                trace!(shard_index, "re-rank overflow forwarded to primary queue");
                (primary, overflow)
            }
            MergeQueues::PrimaryWithReRank { primary, .. }
            | MergeQueues::SinglePrimary { primary } => (primary, doc),
        };

        if primary.offer(candidate).is_some() {
            self.stats.dropped += 1;
            trace!(shard_index, "primary overflow dropped");
        }
        Ok(())
    }

    /// Next document in drain order, with the queue it came from.
    ///
    /// The first call closes ingest.
    pub fn next_ranked(&mut self) -> Option<(MergeTier, O::Doc)> {
        self.phase = MergePhase::Drain;
        match &mut self.queues {
            MergeQueues::SinglePrimary { primary } => {
                primary.pop().map(|doc| (MergeTier::Primary, doc))
            }
            MergeQueues::PrimaryWithReRank {
                primary, rerank, ..
            } => primary
                .pop()
                .map(|doc| (MergeTier::Primary, doc))
                .or_else(|| rerank.pop().map(|doc| (MergeTier::ReRank, doc))),
        }
    }

    /// Next document in drain order: primary survivors best to worst, then
    /// re-rank survivors best to worst.
    pub fn next_document(&mut self) -> Option<O::Doc> {
        self.next_ranked().map(|(_, doc)| doc)
    }

    /// Drain every remaining document in order.
    pub fn drain(&mut self) -> impl Iterator<Item = O::Doc> + '_ {
        std::iter::from_fn(move || self.next_document())
    }

    /// Retained documents minus `offset`, across both queues.
    ///
    /// Negative when `offset` exceeds what was retained; callers decide how
    /// to treat that. Closes ingest.
    pub fn result_size(&mut self, offset: usize) -> isize {
        self.phase = MergePhase::Drain;
        let retained = match &self.queues {
            MergeQueues::SinglePrimary { primary } => to_isize(primary.len()),
            MergeQueues::PrimaryWithReRank {
                primary, rerank, ..
            } => to_isize(primary.len()).saturating_add(to_isize(rerank.len())),
        };
        retained.saturating_sub(to_isize(offset))
    }

    /// The layout chosen at construction.
    #[must_use]
    pub const fn strategy(&self) -> MergeStrategy {
        match self.queues {
            MergeQueues::SinglePrimary { .. } => MergeStrategy::SinglePrimary,
            MergeQueues::PrimaryWithReRank { .. } => MergeStrategy::PrimaryWithReRank,
        }
    }

    /// Current lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> MergePhase {
        self.phase
    }

    /// Ingest counters so far.
    #[must_use]
    pub const fn stats(&self) -> MergeStats {
        self.stats
    }

    /// Capacity of the primary queue.
    #[must_use]
    pub const fn primary_capacity(&self) -> usize {
        self.primary().capacity()
    }

    /// Capacity of the re-rank queue, if there is one.
    #[must_use]
    pub const fn rerank_capacity(&self) -> Option<usize> {
        match &self.queues {
            MergeQueues::SinglePrimary { .. } => None,
            MergeQueues::PrimaryWithReRank { rerank, .. } => Some(rerank.capacity()),
        }
    }

    /// Shard-local index below which hits go to the re-rank queue (0 without one).
    #[must_use]
    pub const fn rerank_threshold(&self) -> usize {
        match &self.queues {
            MergeQueues::SinglePrimary { .. } => 0,
            MergeQueues::PrimaryWithReRank { threshold, .. } => *threshold,
        }
    }

    /// Documents currently held in the primary queue.
    #[must_use]
    pub fn primary_len(&self) -> usize {
        self.primary().len()
    }

    /// Documents currently held in the re-rank queue, if there is one.
    #[must_use]
    pub fn rerank_len(&self) -> Option<usize> {
        match &self.queues {
            MergeQueues::SinglePrimary { .. } => None,
            MergeQueues::PrimaryWithReRank { rerank, .. } => Some(rerank.len()),
        }
    }

    const fn primary(&self) -> &BoundedOrderedQueue<O> {
        match &self.queues {
            MergeQueues::SinglePrimary { primary }
            | MergeQueues::PrimaryWithReRank { primary, .. } => primary,
        }
    }
}

fn to_isize(n: usize) -> isize {
    isize::try_from(n).unwrap_or(isize::MAX)
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use super::*;

    /// `(key, score)` pairs: the query sorts by key descending, relevance by
    /// score descending. No shortcuts, so `exact` is the identity.
    #[derive(Clone)]
    struct Pairs {
        by_score: bool,
        score_sort: bool,
    }

    impl Pairs {
        const fn query() -> Self {
            Self {
                by_score: false,
                score_sort: false,
            }
        }
    }

    impl HitOrdering for Pairs {
        type Doc = (i64, i64);

        fn rank_cmp(&self, a: &Self::Doc, b: &Self::Doc) -> Ordering {
            if self.by_score {
                b.1.cmp(&a.1).then(b.0.cmp(&a.0))
            } else {
                b.0.cmp(&a.0).then(b.1.cmp(&a.1))
            }
        }
    }

    impl MergeOrdering for Pairs {
        fn is_score_sort(&self) -> bool {
            self.score_sort
        }

        fn relevance(&self) -> Self {
            Self {
                by_score: true,
                score_sort: true,
            }
        }

        fn exact(self) -> Self {
            self
        }
    }

    #[test]
    fn no_rerank_config_uses_single_queue() {
        let m = MergeQueueManager::new(Pairs::query(), PageSpec::new(2, 3), None).unwrap();
        assert_eq!(m.strategy(), MergeStrategy::SinglePrimary);
        assert_eq!(m.primary_capacity(), 5);
        assert_eq!(m.rerank_capacity(), None);
        assert_eq!(m.rerank_threshold(), 0);
    }

    #[test]
    fn score_sort_falls_back_to_single_queue() {
        let ordering = Pairs {
            by_score: false,
            score_sort: true,
        };
        let cfg = ReRankConfig::new(2);
        let m = MergeQueueManager::new(ordering, PageSpec::new(0, 4), Some(&cfg)).unwrap();
        assert_eq!(m.strategy(), MergeStrategy::SinglePrimary);
        assert_eq!(m.primary_capacity(), 4);
        assert_eq!(m.rerank_threshold(), 0);
    }

    #[test]
    fn rerank_splits_capacity() {
        let cfg = ReRankConfig::new(2);
        let m = MergeQueueManager::new(Pairs::query(), PageSpec::new(1, 4), Some(&cfg)).unwrap();
        assert_eq!(m.strategy(), MergeStrategy::PrimaryWithReRank);
        assert_eq!(m.rerank_capacity(), Some(2));
        assert_eq!(m.primary_capacity(), 3);
        assert_eq!(m.rerank_threshold(), 2);
    }

    #[test]
    fn rerank_depth_clamps_to_count() {
        let cfg = ReRankConfig::new(50);
        let m = MergeQueueManager::new(Pairs::query(), PageSpec::new(10, 3), Some(&cfg)).unwrap();
        assert_eq!(m.rerank_capacity(), Some(3));
        assert_eq!(m.primary_capacity(), 10);
        assert_eq!(m.rerank_threshold(), 3);
    }

    #[test]
    fn overflowing_window_is_rejected() {
        let err = MergeQueueManager::new(Pairs::query(), PageSpec::new(usize::MAX, 1), None)
            .unwrap_err();
        assert_eq!(err.error_type(), "INVALID_CONFIG");
    }

    #[test]
    fn rerank_overflow_falls_through_to_primary() {
        let cfg = ReRankConfig::new(2);
        let mut m =
            MergeQueueManager::new(Pairs::query(), PageSpec::new(0, 3), Some(&cfg)).unwrap();
        // Re-rank queue (capacity 2) by score; primary (capacity 1) by key.
        m.add_document((1, 10), 0).unwrap();
        m.add_document((2, 20), 1).unwrap();
        assert_eq!(m.rerank_len(), Some(2));
        assert_eq!(m.primary_len(), 0);

        // Better score pushes (1, 10) out of re-rank into primary.
        m.add_document((3, 30), 0).unwrap();
        assert_eq!(m.rerank_len(), Some(2));
        assert_eq!(m.primary_len(), 1);
        assert_eq!(m.stats().forwarded, 1);
        assert_eq!(m.stats().dropped, 0);

        // Worse score is rejected by re-rank, then beats (1, 10) on key.
        m.add_document((9, 5), 1).unwrap();
        assert_eq!(m.stats().forwarded, 2);
        assert_eq!(m.stats().dropped, 1);

        let drained: Vec<_> = std::iter::from_fn(|| m.next_ranked()).collect();
        assert_eq!(
            drained,
            vec![
                (MergeTier::Primary, (9, 5)),
                (MergeTier::ReRank, (3, 30)),
                (MergeTier::ReRank, (2, 20)),
            ]
        );
    }

    #[test]
    fn index_at_threshold_goes_straight_to_primary() {
        let cfg = ReRankConfig::new(2);
        let mut m =
            MergeQueueManager::new(Pairs::query(), PageSpec::new(0, 3), Some(&cfg)).unwrap();
        m.add_document((7, 100), 2).unwrap();
        assert_eq!(m.rerank_len(), Some(0));
        assert_eq!(m.primary_len(), 1);
        assert_eq!(m.stats().routed_to_rerank, 0);
    }

    #[test]
    fn add_after_drain_is_rejected() {
        let mut m = MergeQueueManager::new(Pairs::query(), PageSpec::new(0, 2), None).unwrap();
        m.add_document((1, 1), 0).unwrap();
        assert_eq!(m.phase(), MergePhase::Ingest);
        assert_eq!(m.result_size(0), 1);
        assert_eq!(m.phase(), MergePhase::Drain);

        let err = m.add_document((2, 2), 0).unwrap_err();
        assert!(matches!(err, MergeError::IngestClosed));
        assert_eq!(m.primary_len(), 1);
        assert_eq!(m.stats().offered, 1);
    }

    #[test]
    fn result_size_can_go_negative() {
        let mut m = MergeQueueManager::new(Pairs::query(), PageSpec::new(5, 5), None).unwrap();
        m.add_document((1, 1), 0).unwrap();
        m.add_document((2, 2), 1).unwrap();
        assert_eq!(m.result_size(5), -3);
        assert_eq!(m.result_size(0), 2);
    }

    #[test]
    fn result_size_counts_both_queues() {
        let cfg = ReRankConfig::new(1);
        let mut m =
            MergeQueueManager::new(Pairs::query(), PageSpec::new(1, 2), Some(&cfg)).unwrap();
        m.add_document((5, 5), 0).unwrap();
        m.add_document((4, 4), 1).unwrap();
        m.add_document((3, 3), 2).unwrap();
        assert_eq!(m.rerank_len(), Some(1));
        assert_eq!(m.primary_len(), 2);
        assert_eq!(m.result_size(1), 2);
    }

    #[test]
    fn debug_shows_strategy_and_queues() {
        let cfg = ReRankConfig::new(1);
        let m = MergeQueueManager::new(Pairs::query(), PageSpec::new(0, 2), Some(&cfg)).unwrap();
        let rendered = format!("{m:?}");
        assert!(rendered.contains("PrimaryWithReRank"));
        assert!(rendered.contains("threshold: 1"));
    }
}
