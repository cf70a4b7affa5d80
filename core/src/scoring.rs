//! Similarity functions.
//!
//! Every strategy scores a document as the sum over query terms of
//! `weight * contribution(tf, doc_len)`, where the contribution depends only
//! on the term's collection statistics and the strategy parameters.

use crate::index::{CollectionStats, TermStats};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_BM25_K1: f64 = 0.9;
pub const DEFAULT_BM25_B: f64 = 0.4;
pub const DEFAULT_QLD_MU: f64 = 1000.0;

/// Named numeric knobs, e.g. `bm25.k1`. Missing keys take defaults.
pub type SimilarityArgs = HashMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityKind {
    Bm25,
    Qld,
    TfIdf,
    Impact,
}

impl FromStr for SimilarityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bm25" => Ok(SimilarityKind::Bm25),
            "qld" => Ok(SimilarityKind::Qld),
            "tfidf" => Ok(SimilarityKind::TfIdf),
            "impact" => Ok(SimilarityKind::Impact),
            _ => Err(Error::UnsupportedStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for SimilarityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SimilarityKind::Bm25 => "BM25",
            SimilarityKind::Qld => "QLD",
            SimilarityKind::TfIdf => "TFIDF",
            SimilarityKind::Impact => "Impact",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: DEFAULT_BM25_K1, b: DEFAULT_BM25_B }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QldParams {
    pub mu: f64,
}

impl Default for QldParams {
    fn default() -> Self {
        Self { mu: DEFAULT_QLD_MU }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Similarity {
    Bm25(Bm25Params),
    /// Query likelihood with Dirichlet smoothing.
    Qld(QldParams),
    /// Classic TF-IDF.
    TfIdf,
    /// Pre-computed impacts, summed as stored.
    Impact,
}

impl Default for Similarity {
    fn default() -> Self {
        Similarity::Bm25(Bm25Params::default())
    }
}

impl Similarity {
    pub fn bm25(k1: f64, b: f64) -> Self {
        Similarity::Bm25(Bm25Params { k1, b })
    }

    pub fn qld(mu: f64) -> Self {
        Similarity::Qld(QldParams { mu })
    }

    /// Build from a strategy name and per-key overrides of the defaults.
    pub fn from_name(name: &str, args: &SimilarityArgs) -> Result<Self> {
        Ok(Self::with_args(name.parse()?, args))
    }

    pub fn with_args(kind: SimilarityKind, args: &SimilarityArgs) -> Self {
        for key in args.keys() {
            if !matches!(key.as_str(), "bm25.k1" | "bm25.b" | "qld.mu" | "qld_mu") {
                tracing::debug!(key = key.as_str(), "ignoring unknown similarity argument");
            }
        }
        match kind {
            SimilarityKind::Bm25 => Similarity::Bm25(Bm25Params {
                k1: args.get("bm25.k1").copied().unwrap_or(DEFAULT_BM25_K1),
                b: args.get("bm25.b").copied().unwrap_or(DEFAULT_BM25_B),
            }),
            SimilarityKind::Qld => Similarity::Qld(QldParams {
                mu: args
                    .get("qld.mu")
                    .or_else(|| args.get("qld_mu"))
                    .copied()
                    .unwrap_or(DEFAULT_QLD_MU),
            }),
            SimilarityKind::TfIdf => Similarity::TfIdf,
            SimilarityKind::Impact => Similarity::Impact,
        }
    }

    pub fn kind(&self) -> SimilarityKind {
        match self {
            Similarity::Bm25(_) => SimilarityKind::Bm25,
            Similarity::Qld(_) => SimilarityKind::Qld,
            Similarity::TfIdf => SimilarityKind::TfIdf,
            Similarity::Impact => SimilarityKind::Impact,
        }
    }

    /// Per-term scorer with the statistics-dependent parts precomputed.
    pub fn term_scorer(&self, weight: f64, term: TermStats, collection: CollectionStats) -> TermScorer {
        let n = collection.total_docs as f64;
        let df = term.df as f64;
        match *self {
            Similarity::Bm25(Bm25Params { k1, b }) => TermScorer::Bm25 {
                weight,
                idf: bm25_idf(n, df),
                k1,
                b,
                avgdl: collection.avg_doc_length.max(f64::MIN_POSITIVE),
            },
            Similarity::Qld(QldParams { mu }) => TermScorer::Qld {
                weight,
                mu,
                p_collection: (term.cf as f64 + 1.0) / (collection.total_terms as f64 + 1.0),
            },
            Similarity::TfIdf => TermScorer::TfIdf { weight, idf: classic_idf(n, df) },
            Similarity::Impact => TermScorer::Impact { weight },
        }
    }
}

impl fmt::Display for Similarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Similarity::Bm25(p) => write!(f, "BM25(k1={}, b={})", p.k1, p.b),
            Similarity::Qld(p) => write!(f, "QLD(mu={})", p.mu),
            Similarity::TfIdf => f.write_str("TFIDF"),
            Similarity::Impact => f.write_str("Impact"),
        }
    }
}

/// `ln(1 + (N - df + 0.5) / (df + 0.5))`
pub fn bm25_idf(n: f64, df: f64) -> f64 {
    (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
}

/// `1 + ln((N + 1) / (df + 1))`
pub fn classic_idf(n: f64, df: f64) -> f64 {
    1.0 + ((n + 1.0) / (df + 1.0)).ln()
}

#[derive(Debug, Clone, Copy)]
pub enum TermScorer {
    Bm25 { weight: f64, idf: f64, k1: f64, b: f64, avgdl: f64 },
    Qld { weight: f64, mu: f64, p_collection: f64 },
    TfIdf { weight: f64, idf: f64 },
    Impact { weight: f64 },
}

impl TermScorer {
    pub fn score(&self, tf: u32, doc_len: u32) -> f64 {
        let tf = tf as f64;
        let dl = doc_len as f64;
        match *self {
            TermScorer::Bm25 { weight, idf, k1, b, avgdl } => {
                weight * idf * (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * dl / avgdl))
            }
            TermScorer::Qld { weight, mu, p_collection } => {
                let s = (1.0 + tf / (mu * p_collection)).ln() + (mu / (dl + mu)).ln();
                weight * s.max(0.0)
            }
            TermScorer::TfIdf { weight, idf } => weight * tf.sqrt() * idf,
            TermScorer::Impact { weight } => weight * tf,
        }
    }
}
