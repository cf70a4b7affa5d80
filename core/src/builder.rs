//! One-shot index construction.
//!
//! Ordinals are assigned as documents arrive. Buffered documents are analysed
//! by a rayon pool: each worker takes a contiguous slice and fills its own
//! [`SegmentBuffer`]. Segments are appended in ordinal order and merged at
//! commit, so postings stay sorted without a global sort.

use crate::docstore::{DocumentStore, CONTENTS_FIELD};
use crate::document::{contents, Document, FieldSelection, TOKS_FIELD};
use crate::index::SegmentBuffer;
use crate::persist::{save_dictionary, save_doc_vectors, save_docs, save_meta, IndexPaths, MetaFile, WriteLock, META_VERSION};
use crate::tokenizer::Analyzer;
use crate::{DocId, Error, Result, TermId};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexOptions {
    pub fields: FieldSelection,
    /// Ingestion workers.
    pub threads: usize,
    pub store_doc_vectors: bool,
    pub store_positions: bool,
    pub store_contents: bool,
    pub analyzer: Analyzer,
    /// Documents carry `toks` impacts instead of text to analyse.
    pub pretokenized: bool,
    /// Documents buffered before a parallel analysis pass.
    pub batch_size: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            fields: FieldSelection::All,
            threads: 8,
            store_doc_vectors: true,
            store_positions: false,
            store_contents: true,
            analyzer: Analyzer::English,
            pretokenized: false,
            batch_size: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommitSummary {
    pub path: PathBuf,
    pub num_docs: u32,
    pub num_terms: u32,
}

struct Pending {
    ordinal: DocId,
    text: String,
    toks: Option<BTreeMap<String, u32>>,
}

struct Segment {
    buffer: SegmentBuffer,
    vectors: Vec<(DocId, Vec<(String, u32)>)>,
}

pub struct IndexBuilder {
    paths: IndexPaths,
    options: IndexOptions,
    pool: rayon::ThreadPool,
    docs: DocumentStore,
    pending: Vec<Pending>,
    segments: Vec<Segment>,
    /// `None` once committed.
    lock: Option<WriteLock>,
    interrupt: Arc<AtomicBool>,
}

impl IndexBuilder {
    pub fn open<P: AsRef<Path>>(path: P, options: IndexOptions) -> Result<Self> {
        let paths = IndexPaths::new(path);
        if paths.is_built() {
            return Err(Error::AlreadyBuilt(paths.root));
        }
        let lock = WriteLock::acquire(&paths)?.ok_or_else(|| Error::IndexLocked(paths.root.clone()))?;
        // A concurrent builder may have committed between the check above and the lock.
        if paths.is_built() {
            lock.release()?;
            return Err(Error::AlreadyBuilt(paths.root));
        }
        let threads = options.threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("sparrow-index-{i}"))
            .build()?;
        tracing::info!(
            path = %paths.root.display(),
            threads,
            analyzer = %options.analyzer,
            pretokenized = options.pretokenized,
            "opened index builder"
        );
        Ok(Self {
            paths,
            docs: DocumentStore::new(options.store_contents),
            options,
            pool,
            pending: Vec::new(),
            segments: Vec::new(),
            lock: Some(lock),
            interrupt: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn options(&self) -> &IndexOptions { &self.options }

    /// Documents accepted so far.
    pub fn num_docs(&self) -> usize { self.docs.len() }

    /// Setting the flag makes the next `add` fail with `Interrupted`. The
    /// partial directory stays locked and unbuilt.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    pub fn add(&mut self, doc: Document) -> Result<DocId> {
        if self.lock.is_none() {
            return Err(Error::IndexClosed);
        }
        if self.interrupt.load(Ordering::Relaxed) {
            return Err(Error::Interrupted(self.docs.len()));
        }
        if self.options.pretokenized && doc.toks.is_none() {
            return Err(Error::MissingField { docno: doc.docno, field: TOKS_FIELD.into() });
        }
        if self.options.pretokenized {
            doc.validate_toks()?;
        }
        let selected = self.options.fields.select(&doc)?;
        let ordinal = self.docs.assign_ordinal(&doc.docno)?;
        let text = contents(&selected);
        let mut stored = Vec::with_capacity(selected.len() + 1);
        stored.push((CONTENTS_FIELD.to_string(), text.clone()));
        stored.extend(selected);
        self.docs.store_fields(ordinal, stored);
        self.pending.push(Pending { ordinal, text, toks: doc.toks });
        if self.pending.len() >= self.options.batch_size.max(1) {
            self.flush();
        }
        Ok(ordinal)
    }

    pub fn add_all<I>(&mut self, docs: I) -> Result<usize>
    where
        I: IntoIterator<Item = Document>,
    {
        let mut added = 0;
        for doc in docs {
            self.add(doc)?;
            added += 1;
        }
        Ok(added)
    }

    /// Analyse buffered documents into new segments, one per worker.
    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.pending);
        let workers = self.pool.current_num_threads().max(1);
        let chunk = pending.len().div_ceil(workers);
        let options = &self.options;
        let segments: Vec<Segment> = self
            .pool
            .install(|| pending.par_chunks(chunk).map(|slice| build_segment(slice, options)).collect());
        tracing::debug!(docs = pending.len(), segments = segments.len(), "flushed ingestion batch");
        self.segments.extend(segments);
    }

    /// Merge segments, write the index files, then the metadata record.
    pub fn commit(&mut self) -> Result<CommitSummary> {
        let Some(lock) = self.lock.take() else {
            return Err(Error::IndexClosed);
        };
        self.flush();
        let num_docs = self.docs.len() as u32;
        let mut merged = SegmentBuffer::new(self.options.store_positions);
        let mut vectors: Vec<(DocId, Vec<(String, u32)>)> = Vec::new();
        for segment in std::mem::take(&mut self.segments) {
            merged.merge(segment.buffer);
            vectors.extend(segment.vectors);
        }
        let dict = merged.finish(num_docs);
        save_dictionary(&self.paths, &dict)?;
        save_docs(&self.paths, &self.docs)?;
        if self.options.store_doc_vectors {
            let mut by_ordinal: Vec<Vec<(TermId, u32)>> = vec![Vec::new(); num_docs as usize];
            for (ordinal, vector) in vectors {
                by_ordinal[ordinal as usize] = vector
                    .into_iter()
                    .filter_map(|(term, tf)| Some((dict.term_id(&term)?, tf)))
                    .collect();
            }
            save_doc_vectors(&self.paths, &by_ordinal)?;
        }
        let num_terms = dict.num_terms() as u32;
        let meta = MetaFile {
            kind: "sparse_index".into(),
            format: "anserini".into(),
            store_doc_vectors: self.options.store_doc_vectors,
            store_positions: self.options.store_positions,
            store_contents: self.options.store_contents,
            pretokenized: self.options.pretokenized,
            analyzer: if self.options.pretokenized { Analyzer::Whitespace } else { self.options.analyzer },
            num_docs,
            num_terms,
            created_at: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_default(),
            version: META_VERSION,
        };
        save_meta(&self.paths, &meta)?;
        lock.release()?;
        tracing::info!(path = %self.paths.root.display(), num_docs, num_terms, "index build complete");
        Ok(CommitSummary { path: self.paths.root.clone(), num_docs, num_terms })
    }
}

fn build_segment(slice: &[Pending], options: &IndexOptions) -> Segment {
    let mut segment = Segment { buffer: SegmentBuffer::new(options.store_positions), vectors: Vec::new() };
    for doc in slice {
        let mut terms: BTreeMap<String, (u32, Vec<u32>)> = BTreeMap::new();
        let doc_len = match &doc.toks {
            Some(toks) if options.pretokenized => {
                for (term, impact) in toks {
                    terms.insert(term.clone(), (*impact, Vec::new()));
                }
                toks.values().map(|&w| w as u64).sum::<u64>()
            }
            _ => {
                let tokens = options.analyzer.tokenize(&doc.text);
                let len = tokens.len() as u64;
                for (term, pos) in tokens {
                    let entry = terms.entry(term).or_default();
                    entry.0 += 1;
                    entry.1.push(pos as u32);
                }
                len
            }
        };
        for (term, (tf, positions)) in &terms {
            if *tf == 0 {
                continue;
            }
            let positions = options.store_positions.then(|| positions.clone());
            segment.buffer.put(term, doc.ordinal, *tf, positions);
        }
        segment.buffer.set_doc_length(doc.ordinal, doc_len.min(u32::MAX as u64) as u32);
        if options.store_doc_vectors {
            segment
                .vectors
                .push((doc.ordinal, terms.into_iter().map(|(t, (tf, _))| (t, tf)).filter(|(_, tf)| *tf > 0).collect()));
        }
    }
    segment
}
