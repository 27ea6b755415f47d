//! Bounded merge queues for distributed search result aggregation
//!
//! Each shard of a distributed index returns its own locally ranked hits. This
//! crate merges those fragments into one globally ordered top-K:
//! - [`HitOrdering`] / [`MergeOrdering`]: the ranking seam the queues rely on
//! - [`BoundedOrderedQueue`]: a fixed-capacity best-N heap
//! - [`MergeQueueManager`]: picks a single- or two-tier queue layout per
//!   query (the second tier holds re-ranked hits) and exposes ingest/drain
//! - [`ShardDoc`] / [`ShardDocOrdering`] / [`SortSpec`]: a concrete shard
//!   document model and the sort it ranks under

#![forbid(unsafe_code)]

pub mod config;
pub mod document;
pub mod error;
pub mod manager;
pub mod ordering;
pub mod queue;
pub mod sort;

pub use config::{DEFAULT_RERANK_DOCS, PageSpec, RERANK_DOCS_ENV_VAR, ReRankConfig};
pub use document::{ShardDoc, SortValue};
pub use error::{MergeError, MergeResult};
pub use manager::{MergePhase, MergeQueueManager, MergeStats, MergeStrategy, MergeTier};
pub use ordering::{HitOrdering, MergeOrdering};
pub use queue::BoundedOrderedQueue;
pub use sort::{SCORE_KEY, ShardDocOrdering, SortDirection, SortField, SortKey, SortSpec};
