//! Fixed-capacity best-N queue.
//!
//! [`BoundedOrderedQueue`] keeps the best `capacity` documents it has been
//! offered under a [`HitOrdering`]. It is a binary heap over a `Vec` rooted at
//! the *worst* retained document, so the admission check on a full queue is a
//! single comparison against the root.
//!
//! Draining first empties the heap worst-first into a vector and then pops
//! from its back, so only heap comparisons are ever made. A worst-to-best
//! vector is itself a valid worst-rooted heap, so offers made after draining
//! started stay correct; the next pop re-orders.

use std::fmt;

use crate::ordering::HitOrdering;

/// A bounded container holding the best-N documents seen so far.
pub struct BoundedOrderedQueue<O: HitOrdering> {
    ordering: O,
    capacity: usize,
    heap: Vec<O::Doc>,
    sorted: bool,
}

impl<O: HitOrdering> fmt::Debug for BoundedOrderedQueue<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BoundedOrderedQueue(len={}, capacity={})",
            self.heap.len(),
            self.capacity
        )
    }
}

impl<O: HitOrdering> BoundedOrderedQueue<O> {
    /// Create an empty queue. A capacity of zero is legal and rejects every offer.
    #[must_use]
    pub fn new(ordering: O, capacity: usize) -> Self {
        Self {
            ordering,
            capacity,
            // Shard pages are small; avoid reserving huge windows up front.
            heap: Vec::with_capacity(capacity.min(1024)),
            sorted: true,
        }
    }

    /// Offer a document.
    ///
    /// Returns `None` if the document was retained without displacing
    /// anything. Otherwise returns exactly one document: either the previous
    /// worst (when `doc` strictly outranks it) or `doc` itself. Ties keep the
    /// existing occupant.
    pub fn offer(&mut self, doc: O::Doc) -> Option<O::Doc> {
        if self.heap.len() < self.capacity {
            self.heap.push(doc);
            self.sift_up(self.heap.len() - 1);
            self.sorted = false;
            return None;
        }

        let Some(worst) = self.heap.first() else {
            return Some(doc);
        };
        if !self.ordering.outranks(&doc, worst) {
            return Some(doc);
        }

        let evicted = std::mem::replace(&mut self.heap[0], doc);
        self.sift_down(0);
        self.sorted = false;
        Some(evicted)
    }

    /// Remove and return the best remaining document.
    pub fn pop(&mut self) -> Option<O::Doc> {
        if !self.sorted {
            let mut ordered = Vec::with_capacity(self.heap.len());
            while let Some(worst) = self.pop_worst() {
                ordered.push(worst);
            }
            self.heap = ordered;
            self.sorted = true;
        }
        self.heap.pop()
    }

    fn pop_worst(&mut self) -> Option<O::Doc> {
        let last = self.heap.pop()?;
        if self.heap.is_empty() {
            return Some(last);
        }
        let worst = std::mem::replace(&mut self.heap[0], last);
        self.sift_down(0);
        Some(worst)
    }

    /// Number of retained documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether no documents are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Maximum number of retained documents.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the next offer has to evict something.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    /// Retained documents in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &O::Doc> {
        self.heap.iter()
    }

    /// The ordering this queue ranks by.
    #[must_use]
    pub const fn ordering(&self) -> &O {
        &self.ordering
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if !self.ordering.outranks(&self.heap[parent], &self.heap[idx]) {
                break;
            }
            self.heap.swap(parent, idx);
            idx = parent;
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.heap.len();
        loop {
            let mut worst = idx;
            for child in [2 * idx + 1, 2 * idx + 2] {
                if child < len && self.ordering.outranks(&self.heap[worst], &self.heap[child]) {
                    worst = child;
                }
            }
            if worst == idx {
                break;
            }
            self.heap.swap(idx, worst);
            idx = worst;
        }
    }
}
