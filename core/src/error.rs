use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The target directory already holds a committed index.
    #[error("index at {0} is already built")]
    AlreadyBuilt(PathBuf),
    /// The builder was used after `commit()`.
    #[error("index builder is closed")]
    IndexClosed,
    /// Another builder holds the write lock, or an earlier build was abandoned.
    #[error("index at {0} is locked by another builder (remove the directory to restart)")]
    IndexLocked(PathBuf),
    #[error("no index has been built at {0}")]
    NotBuilt(PathBuf),
    #[error("unknown document: {0}")]
    UnknownDocument(String),
    #[error("duplicate document: {0}")]
    DuplicateDocument(String),
    #[error("unsupported similarity: {0}")]
    UnsupportedStrategy(String),
    #[error("invalid query term {term:?}: {reason}")]
    InvalidQueryTerm { term: String, reason: &'static str },
    #[error("could not parse query {query:?} at byte {offset}: {reason}")]
    QueryParse {
        query: String,
        offset: usize,
        reason: &'static str,
    },
    #[error("document {docno:?} has an invalid impact for term {term:?}: {reason}")]
    InvalidImpact {
        docno: String,
        term: String,
        reason: &'static str,
    },
    #[error("document {docno:?} has no field {field:?}")]
    MissingField { docno: String, field: String },
    #[error("input has none of the query columns: query_lucene, query_toks, query")]
    MissingQueryColumn,
    #[error("unknown analyzer: {0}")]
    UnknownAnalyzer(String),
    #[error("index build interrupted after {0} documents")]
    Interrupted(usize),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Bincode(#[from] bincode::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    /// Configuration and input errors, as opposed to I/O or lifecycle failures.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedStrategy(_)
                | Error::InvalidQueryTerm { .. }
                | Error::QueryParse { .. }
                | Error::MissingField { .. }
                | Error::InvalidImpact { .. }
                | Error::MissingQueryColumn
                | Error::UnknownAnalyzer(_)
                | Error::DuplicateDocument(_)
        )
    }
}
