use crate::DocId;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Heap entry ordered so that the *worst* candidate is the greatest:
/// lower score first, then higher ordinal.
#[derive(Debug, Clone, Copy)]
struct Entry {
    doc_id: DocId,
    score: f64,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then(self.doc_id.cmp(&other.doc_id))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Bounded top-k collector. Each document must be offered at most once.
pub struct TopKCollector {
    heap: BinaryHeap<Entry>,
    k: usize,
}

impl TopKCollector {
    pub fn new(k: usize) -> Self {
        Self { heap: BinaryHeap::with_capacity(k.saturating_add(1).min(1 << 20)), k }
    }

    pub fn insert(&mut self, doc_id: DocId, score: f64) {
        if self.k == 0 {
            return;
        }
        let entry = Entry { doc_id, score };
        if self.heap.len() < self.k {
            self.heap.push(entry);
        } else if self.heap.peek().is_some_and(|worst| entry < *worst) {
            self.heap.pop();
            self.heap.push(entry);
        }
    }

    pub fn len(&self) -> usize { self.heap.len() }

    pub fn is_empty(&self) -> bool { self.heap.is_empty() }

    /// Score descending, ordinal ascending.
    pub fn into_sorted(self) -> Vec<(DocId, f64)> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|e| (e.doc_id, e.score))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_best_k_with_ordinal_tie_break() {
        let mut c = TopKCollector::new(3);
        for (doc, score) in [(5, 1.0), (1, 2.0), (3, 1.0), (2, 1.0), (4, 0.5)] {
            c.insert(doc, score);
        }
        assert_eq!(c.into_sorted(), vec![(1, 2.0), (2, 1.0), (3, 1.0)]);
    }

    #[test]
    fn zero_capacity_collects_nothing() {
        let mut c = TopKCollector::new(0);
        c.insert(0, 1.0);
        assert!(c.is_empty());
    }
}
