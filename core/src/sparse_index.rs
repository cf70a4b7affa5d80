use crate::builder::{CommitSummary, IndexBuilder, IndexOptions};
use crate::document::{Document, FieldSelection, Record};
use crate::persist::IndexPaths;
use crate::pipeline::{ReRanker, Retriever, TextLoader};
use crate::scoring::{Similarity, SimilarityArgs};
use crate::search::IndexReader;
use crate::Result;
use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A sparse index directory, built or not, and the entry point for
/// indexing, retrieval, re-ranking and text loading over it.
pub struct SparseIndex {
    path: PathBuf,
    reader: Mutex<Option<Arc<IndexReader>>>,
}

impl SparseIndex {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf(), reader: Mutex::new(None) }
    }

    pub fn path(&self) -> &Path { &self.path }

    pub fn built(&self) -> bool { IndexPaths::new(&self.path).is_built() }

    pub fn indexer(&self, options: IndexOptions) -> Result<IndexBuilder> {
        IndexBuilder::open(&self.path, options)
    }

    /// Build from records with a `docno` column in one pass.
    pub fn index<I>(&self, records: I, options: IndexOptions) -> Result<CommitSummary>
    where
        I: IntoIterator<Item = Record>,
    {
        let mut builder = self.indexer(options)?;
        for record in records {
            builder.add(Document::from_record(record)?)?;
        }
        builder.commit()
    }

    /// Opened lazily once the index is built, then shared.
    pub fn reader(&self) -> Result<Arc<IndexReader>> {
        let mut slot = self.reader.lock();
        if let Some(reader) = slot.as_ref() {
            return Ok(Arc::clone(reader));
        }
        let reader = Arc::new(IndexReader::open(&self.path)?);
        *slot = Some(Arc::clone(&reader));
        Ok(reader)
    }

    pub fn retriever(&self, similarity: Similarity) -> Result<Retriever> {
        Retriever::new(self.reader()?, similarity)
    }

    /// Retriever for a similarity named as a string, e.g. `"BM25"`.
    pub fn retriever_named(&self, name: &str, args: &SimilarityArgs) -> Result<Retriever> {
        self.retriever(Similarity::from_name(name, args)?)
    }

    pub fn bm25(&self, k1: f64, b: f64) -> Result<Retriever> {
        self.retriever(Similarity::bm25(k1, b))
    }

    pub fn qld(&self, mu: f64) -> Result<Retriever> {
        self.retriever(Similarity::qld(mu))
    }

    pub fn tfidf(&self) -> Result<Retriever> {
        self.retriever(Similarity::TfIdf)
    }

    pub fn impact(&self) -> Result<Retriever> {
        self.retriever(Similarity::Impact)
    }

    pub fn reranker(&self, similarity: Similarity) -> Result<ReRanker> {
        ReRanker::new(self.reader()?, similarity)
    }

    pub fn text_loader(&self, fields: FieldSelection) -> Result<TextLoader> {
        let fields = self.resolve_fields(&fields)?;
        Ok(TextLoader::new(self.reader()?, Some(fields)))
    }

    /// Stored field names.
    pub fn fields(&self) -> Result<Vec<String>> {
        Ok(self.reader()?.fields())
    }

    pub fn resolve_fields(&self, selection: &FieldSelection) -> Result<Vec<String>> {
        match selection {
            FieldSelection::All => self.fields(),
            FieldSelection::Only(fields) => Ok(fields.clone()),
        }
    }

    pub fn num_docs(&self) -> Result<usize> {
        Ok(self.reader()?.num_docs())
    }
}

impl fmt::Debug for SparseIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SparseIndex({:?})", self.path)
    }
}
