use crate::collector::TopKCollector;
use crate::docstore::DocumentStore;
use crate::index::TermDictionary;
use crate::persist::{load_dictionary, load_doc_vectors, load_docs, load_meta, IndexPaths, MetaFile};
use crate::query::{Query, WeightedTerm};
use crate::scoring::Similarity;
use crate::tokenizer::Analyzer;
use crate::{DocId, Error, Result, TermId};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub ordinal: DocId,
    pub docno: String,
    pub score: f64,
    /// Requested stored fields, in request order; `None` where not stored.
    pub fields: Vec<(String, Option<String>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopDocs {
    /// Documents matching at least one query term.
    pub total_hits: usize,
    pub hits: Vec<Hit>,
}

/// Read-only view of a committed index. Safe to share across threads.
pub struct IndexReader {
    root: PathBuf,
    meta: MetaFile,
    dict: TermDictionary,
    docs: DocumentStore,
    vectors: Option<Vec<Vec<(TermId, u32)>>>,
}

impl IndexReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let paths = IndexPaths::new(path);
        if !paths.is_built() {
            return Err(Error::NotBuilt(paths.root));
        }
        let meta = load_meta(&paths)?;
        let dict = load_dictionary(&paths)?;
        let docs = load_docs(&paths)?;
        let vectors = if meta.store_doc_vectors { Some(load_doc_vectors(&paths)?) } else { None };
        tracing::info!(
            path = %paths.root.display(),
            num_docs = meta.num_docs,
            num_terms = meta.num_terms,
            analyzer = %meta.analyzer,
            "opened index"
        );
        Ok(Self { root: paths.root, meta, dict, docs, vectors })
    }

    pub fn path(&self) -> &Path { &self.root }

    pub fn meta(&self) -> &MetaFile { &self.meta }

    pub fn analyzer(&self) -> Analyzer { self.meta.analyzer }

    pub fn dictionary(&self) -> &TermDictionary { &self.dict }

    pub fn documents(&self) -> &DocumentStore { &self.docs }

    pub fn num_docs(&self) -> usize { self.docs.len() }

    /// Stored field names.
    pub fn fields(&self) -> Vec<String> { self.docs.fields() }

    /// Impact scoring needs postings that carry impacts.
    pub fn check_similarity(&self, similarity: &Similarity) -> Result<()> {
        if matches!(similarity, Similarity::Impact) && !self.meta.pretokenized {
            return Err(Error::UnsupportedStrategy(
                "impact scoring requires an index built from pre-tokenized impacts".into(),
            ));
        }
        Ok(())
    }

    pub fn resolve(&self, query: &Query) -> Result<Vec<WeightedTerm>> {
        query.resolve(&self.meta.analyzer)
    }

    pub fn search(&self, query: &Query, similarity: &Similarity, k: usize) -> Result<Vec<Hit>> {
        Ok(self.top_docs(query, similarity, k)?.hits)
    }

    pub fn top_docs(&self, query: &Query, similarity: &Similarity, k: usize) -> Result<TopDocs> {
        self.check_similarity(similarity)?;
        let terms = self.resolve(query)?;
        Ok(self.evaluate(&terms, similarity, k, &[]))
    }

    pub fn search_with_fields(
        &self,
        query: &Query,
        similarity: &Similarity,
        k: usize,
        fields: &[String],
    ) -> Result<Vec<Hit>> {
        self.check_similarity(similarity)?;
        let terms = self.resolve(query)?;
        Ok(self.evaluate(&terms, similarity, k, fields).hits)
    }

    /// Evaluate queries in parallel. All queries are validated before any is
    /// evaluated; results follow input order.
    pub fn batch_search(
        &self,
        queries: &[Query],
        similarity: &Similarity,
        k: usize,
        fields: &[String],
    ) -> Result<Vec<Vec<Hit>>> {
        self.check_similarity(similarity)?;
        let resolved = queries
            .iter()
            .map(|q| self.resolve(q))
            .collect::<Result<Vec<_>>>()?;
        Ok(resolved
            .par_iter()
            .map(|terms| self.evaluate(terms, similarity, k, fields).hits)
            .collect())
    }

    /// Score one document directly, without postings traversal.
    pub fn score(&self, query: &Query, docno: &str, similarity: &Similarity) -> Result<f64> {
        self.check_similarity(similarity)?;
        let terms = self.resolve(query)?;
        self.score_terms(&terms, docno, similarity)
    }

    pub fn score_terms(&self, terms: &[WeightedTerm], docno: &str, similarity: &Similarity) -> Result<f64> {
        let ordinal = self.docs.resolve(docno)?;
        let collection = self.dict.collection_stats();
        let doc_len = self.dict.doc_length(ordinal);
        let mut total = 0.0;
        for wt in terms {
            if let Some(tf) = self.dict.term_frequency(&wt.term, ordinal) {
                let scorer = similarity.term_scorer(wt.weight, self.dict.term_stats(&wt.term), collection);
                total += scorer.score(tf, doc_len);
            }
        }
        Ok(total)
    }

    /// Term-at-a-time accumulation into a per-document map, then a bounded heap.
    fn evaluate(&self, terms: &[WeightedTerm], similarity: &Similarity, k: usize, fields: &[String]) -> TopDocs {
        let collection = self.dict.collection_stats();
        let mut accumulators: HashMap<DocId, f64> = HashMap::new();
        for wt in terms {
            let scorer = similarity.term_scorer(wt.weight, self.dict.term_stats(&wt.term), collection);
            for posting in self.dict.lookup(&wt.term) {
                let contrib = scorer.score(posting.tf, self.dict.doc_length(posting.doc_id));
                *accumulators.entry(posting.doc_id).or_insert(0.0) += contrib;
            }
        }
        let total_hits = accumulators.len();
        let mut collector = TopKCollector::new(k);
        for (doc_id, score) in accumulators {
            collector.insert(doc_id, score);
        }
        let hits = collector
            .into_sorted()
            .into_iter()
            .map(|(ordinal, score)| Hit {
                ordinal,
                docno: self.docs.docno(ordinal).unwrap_or_default().to_string(),
                score,
                fields: fields
                    .iter()
                    .map(|f| (f.clone(), self.docs.get_field(ordinal, f).map(str::to_string)))
                    .collect(),
            })
            .collect();
        TopDocs { total_hits, hits }
    }

    /// All stored fields of a document.
    pub fn stored_fields(&self, docno: &str) -> Result<Vec<(String, String)>> {
        let ordinal = self.docs.resolve(docno)?;
        Ok(self
            .docs
            .fields()
            .into_iter()
            .filter_map(|f| {
                let value = self.docs.get_field(ordinal, &f)?.to_string();
                Some((f, value))
            })
            .collect())
    }

    /// Term frequencies of a document, or `None` when vectors were not stored.
    pub fn doc_vector(&self, docno: &str) -> Result<Option<Vec<(String, u32)>>> {
        let ordinal = self.docs.resolve(docno)?;
        let Some(vectors) = &self.vectors else {
            return Ok(None);
        };
        let vector = vectors
            .get(ordinal as usize)
            .map(|v| {
                v.iter()
                    .filter_map(|(tid, tf)| Some((self.dict.term(*tid)?.to_string(), *tf)))
                    .collect()
            })
            .unwrap_or_default();
        Ok(Some(vector))
    }
}
