//! Merge configuration: the requested page window and re-ranking depth.

use serde::{Deserialize, Serialize};

use crate::error::{MergeError, MergeResult};

/// Default number of top documents eligible for re-ranking.
pub const DEFAULT_RERANK_DOCS: usize = 200;

/// Environment variable for overriding the re-rank depth.
pub const RERANK_DOCS_ENV_VAR: &str = "SHARDMERGE_RERANK_DOCS";

/// The page of results a query asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpec {
    /// Number of leading results to skip
    #[serde(default)]
    pub offset: usize,
    /// Number of results to return after the offset
    #[serde(default = "default_count")]
    pub count: usize,
}

const fn default_count() -> usize {
    10
}

impl Default for PageSpec {
    fn default() -> Self {
        Self {
            offset: 0,
            count: default_count(),
        }
    }
}

impl PageSpec {
    /// Create a page window.
    #[must_use]
    pub const fn new(offset: usize, count: usize) -> Self {
        Self { offset, count }
    }

    /// Build a page from signed request parameters, rejecting negatives.
    pub fn from_signed(offset: i64, count: i64) -> MergeResult<Self> {
        let offset = usize::try_from(offset).map_err(|_| {
            MergeError::InvalidConfig(format!("offset must be non-negative, got {offset}"))
        })?;
        let count = usize::try_from(count).map_err(|_| {
            MergeError::InvalidConfig(format!("count must be non-negative, got {count}"))
        })?;
        Ok(Self { offset, count })
    }

    /// Total number of documents the merge must retain: `offset + count`.
    pub fn window(&self) -> MergeResult<usize> {
        self.offset.checked_add(self.count).ok_or_else(|| {
            MergeError::InvalidConfig(format!(
                "offset {} + count {} overflows",
                self.offset, self.count
            ))
        })
    }
}

/// Re-ranking parameters for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReRankConfig {
    /// Number of top documents per shard eligible for the re-ranked tier
    pub rerank_docs: usize,
}

impl Default for ReRankConfig {
    fn default() -> Self {
        Self {
            rerank_docs: DEFAULT_RERANK_DOCS,
        }
    }
}

impl ReRankConfig {
    /// Create a config with an explicit depth.
    #[must_use]
    pub const fn new(rerank_docs: usize) -> Self {
        Self { rerank_docs }
    }

    /// Build from a signed request parameter, rejecting negatives.
    pub fn from_signed(rerank_docs: i64) -> MergeResult<Self> {
        usize::try_from(rerank_docs)
            .map(Self::new)
            .map_err(|_| {
                MergeError::InvalidConfig(format!(
                    "rerank_docs must be non-negative, got {rerank_docs}"
                ))
            })
    }

    /// Load from environment, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(RERANK_DOCS_ENV_VAR).ok().as_deref())
    }

    fn from_env_value(raw: Option<&str>) -> Self {
        let rerank_docs = raw
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_RERANK_DOCS);
        Self { rerank_docs }
    }

    /// The re-ranked tier size actually used for a page: `min(rerank_docs, count)`.
    #[must_use]
    pub fn effective_size(&self, page: &PageSpec) -> usize {
        self.rerank_docs.min(page.count)
    }
}
