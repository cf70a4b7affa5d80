//! Embeddable sparse-index search engine: analysis, inverted index
//! construction, BM25 / query-likelihood / TF-IDF / impact scoring, and
//! record-frame adapters for retrieval, re-ranking and text loading.

pub mod builder;
pub mod collector;
pub mod docstore;
pub mod document;
pub mod error;
pub mod index;
pub mod persist;
pub mod pipeline;
pub mod query;
pub mod scoring;
pub mod search;
pub mod sparse_index;
pub mod tokenizer;

pub use builder::{CommitSummary, IndexBuilder, IndexOptions};
pub use docstore::{DocumentStore, CONTENTS_FIELD};
pub use document::{Document, FieldSelection, Record};
pub use error::{Error, Result};
pub use index::{CollectionStats, DocId, Posting, TermDictionary, TermId, TermStats};
pub use persist::MetaFile;
pub use pipeline::{QueryColumn, ReRanker, Retriever, TextLoader};
pub use query::{Query, QueryExpr, WeightedTerm};
pub use scoring::{Similarity, SimilarityArgs, SimilarityKind};
pub use search::{Hit, IndexReader, TopDocs};
pub use sparse_index::SparseIndex;
pub use tokenizer::Analyzer;
