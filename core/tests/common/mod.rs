#![allow(dead_code)]

use sparrow_core::{Document, IndexOptions, IndexReader, SparseIndex};
use std::sync::Arc;
use tempfile::TempDir;

pub fn build(docs: &[(&str, &str)], options: IndexOptions) -> (TempDir, SparseIndex) {
    let dir = tempfile::tempdir().unwrap();
    let index = SparseIndex::new(dir.path().join("index"));
    let mut builder = index.indexer(options).unwrap();
    for (docno, text) in docs {
        builder.add(Document::new(*docno).field("text", *text)).unwrap();
    }
    builder.commit().unwrap();
    (dir, index)
}

pub fn reader(docs: &[(&str, &str)], options: IndexOptions) -> (TempDir, Arc<IndexReader>) {
    let (dir, index) = build(docs, options);
    let reader = index.reader().unwrap();
    (dir, reader)
}

pub fn chemistry() -> Vec<(&'static str, &'static str)> {
    vec![("d1", "chemical reactions"), ("d2", "biological systems")]
}

/// A small corpus where several documents tie on score.
pub fn corpus() -> Vec<(&'static str, &'static str)> {
    vec![
        ("a", "rust systems programming language"),
        ("b", "rust rust rust"),
        ("c", "chemical reactions in systems"),
        ("d", "rust systems"),
        ("e", "rust systems"),
        ("f", "biology of systems and reactions"),
        ("g", "nothing relevant here"),
    ]
}
