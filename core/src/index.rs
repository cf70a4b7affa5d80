use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub type TermId = u32;
/// Dense internal document ordinal.
pub type DocId = u32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    /// Term frequency, or the quantized impact for pre-tokenized indices.
    pub tf: u32,
    pub positions: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermStats {
    /// Number of documents containing the term.
    pub df: u32,
    /// Total occurrences across the collection.
    pub cf: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectionStats {
    pub total_docs: u32,
    pub total_terms: u64,
    pub avg_doc_length: f64,
}

/// Mutable postings buffer for one ingestion segment.
#[derive(Debug, Default)]
pub struct SegmentBuffer {
    postings: BTreeMap<String, Vec<Posting>>,
    doc_lengths: BTreeMap<DocId, u32>,
    store_positions: bool,
}

impl SegmentBuffer {
    pub fn new(store_positions: bool) -> Self {
        Self { store_positions, ..Self::default() }
    }

    pub fn put(&mut self, term: &str, doc_id: DocId, tf: u32, positions: Option<Vec<u32>>) {
        let positions = if self.store_positions { positions } else { None };
        self.postings
            .entry(term.to_string())
            .or_default()
            .push(Posting { doc_id, tf, positions });
    }

    pub fn set_doc_length(&mut self, doc_id: DocId, len: u32) {
        self.doc_lengths.insert(doc_id, len);
    }

    pub fn num_terms(&self) -> usize { self.postings.len() }

    /// Append `other`, which covers later ordinals, into this buffer.
    pub fn merge(&mut self, other: SegmentBuffer) {
        for (term, postings) in other.postings {
            self.postings.entry(term).or_default().extend(postings);
        }
        self.doc_lengths.extend(other.doc_lengths);
    }

    /// Freeze into a dictionary covering `num_docs` ordinals. Term ids follow
    /// lexicographic term order.
    pub fn finish(self, num_docs: u32) -> TermDictionary {
        let mut doc_lengths = vec![0u32; num_docs as usize];
        for (doc_id, len) in self.doc_lengths {
            if let Some(slot) = doc_lengths.get_mut(doc_id as usize) {
                *slot = len;
            }
        }
        let mut terms = Vec::with_capacity(self.postings.len());
        let mut stats = Vec::with_capacity(self.postings.len());
        let mut postings = Vec::with_capacity(self.postings.len());
        for (term, mut plist) in self.postings {
            plist.sort_by_key(|p| p.doc_id);
            let cf = plist.iter().map(|p| p.tf as u64).sum();
            stats.push(TermStats { df: plist.len() as u32, cf });
            terms.push(term);
            postings.push(plist);
        }
        TermDictionary::from_parts(terms, stats, postings, doc_lengths)
    }
}

/// Committed, read-only term dictionary with postings and document lengths.
#[derive(Debug, Default)]
pub struct TermDictionary {
    terms: Vec<String>,
    lookup: HashMap<String, TermId>,
    stats: Vec<TermStats>,
    postings: Vec<Vec<Posting>>,
    doc_lengths: Vec<u32>,
    total_terms: u64,
}

impl TermDictionary {
    pub fn from_parts(
        terms: Vec<String>,
        stats: Vec<TermStats>,
        postings: Vec<Vec<Posting>>,
        doc_lengths: Vec<u32>,
    ) -> Self {
        let lookup = terms
            .iter()
            .enumerate()
            .map(|(id, t)| (t.clone(), id as TermId))
            .collect();
        let total_terms = doc_lengths.iter().map(|&l| l as u64).sum();
        Self { terms, lookup, stats, postings, doc_lengths, total_terms }
    }

    pub fn term_id(&self, term: &str) -> Option<TermId> {
        self.lookup.get(term).copied()
    }

    pub fn term(&self, term_id: TermId) -> Option<&str> {
        self.terms.get(term_id as usize).map(String::as_str)
    }

    /// Postings in ascending ordinal order; empty for absent terms.
    pub fn lookup(&self, term: &str) -> std::slice::Iter<'_, Posting> {
        self.postings_slice(term).iter()
    }

    pub(crate) fn postings_slice(&self, term: &str) -> &[Posting] {
        self.term_id(term)
            .and_then(|id| self.postings.get(id as usize))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Frequency of `term` in one document, by binary search over its postings.
    pub fn term_frequency(&self, term: &str, doc_id: DocId) -> Option<u32> {
        let plist = self.postings_slice(term);
        plist
            .binary_search_by_key(&doc_id, |p| p.doc_id)
            .ok()
            .map(|i| plist[i].tf)
    }

    pub fn term_stats(&self, term: &str) -> TermStats {
        self.term_id(term)
            .and_then(|id| self.stats.get(id as usize).copied())
            .unwrap_or_default()
    }

    pub fn doc_frequency(&self, term: &str) -> u32 { self.term_stats(term).df }

    pub fn collection_frequency(&self, term: &str) -> u64 { self.term_stats(term).cf }

    pub fn doc_length(&self, doc_id: DocId) -> u32 {
        self.doc_lengths.get(doc_id as usize).copied().unwrap_or(0)
    }

    pub fn collection_stats(&self) -> CollectionStats {
        let total_docs = self.doc_lengths.len() as u32;
        let avg_doc_length = if total_docs == 0 {
            0.0
        } else {
            self.total_terms as f64 / total_docs as f64
        };
        CollectionStats { total_docs, total_terms: self.total_terms, avg_doc_length }
    }

    pub fn num_terms(&self) -> usize { self.terms.len() }

    pub(crate) fn parts(&self) -> (&[String], &[TermStats], &[Vec<Posting>], &[u32]) {
        (&self.terms, &self.stats, &self.postings, &self.doc_lengths)
    }
}
