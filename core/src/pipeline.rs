//! Record-frame adapters: retrieval, re-ranking and text loading over
//! rows of `serde_json` objects.

use crate::document::{Record, DOCNO_FIELD};
use crate::query::Query;
use crate::scoring::Similarity;
use crate::search::IndexReader;
use crate::{Error, Result};
use rayon::prelude::*;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

pub const QID_FIELD: &str = "qid";
pub const SCORE_FIELD: &str = "score";
pub const RANK_FIELD: &str = "rank";

/// Which column carries the query. Detected in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryColumn {
    /// `query_lucene`: query syntax, see [`crate::QueryExpr::parse`].
    Parsed,
    /// `query_toks`: object of term to weight.
    Tokens,
    /// `query`: raw text.
    Text,
}

impl QueryColumn {
    pub const ALL: [QueryColumn; 3] = [QueryColumn::Parsed, QueryColumn::Tokens, QueryColumn::Text];

    pub fn name(self) -> &'static str {
        match self {
            QueryColumn::Parsed => "query_lucene",
            QueryColumn::Tokens => "query_toks",
            QueryColumn::Text => "query",
        }
    }

    /// The first query column present in every record.
    pub fn detect(frame: &[Record]) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|col| frame.iter().all(|r| r.contains_key(col.name())))
            .ok_or(Error::MissingQueryColumn)
    }

    pub fn query(self, record: &Record) -> Result<Query> {
        let value = record.get(self.name()).ok_or(Error::MissingQueryColumn)?;
        match self {
            QueryColumn::Parsed => Query::parse(&text_of(value)),
            QueryColumn::Text => Ok(Query::Text(text_of(value))),
            QueryColumn::Tokens => {
                let Value::Object(map) = value else {
                    return Err(Error::InvalidQueryTerm {
                        term: value.to_string(),
                        reason: "query_toks must be an object of term to weight",
                    });
                };
                map.iter()
                    .map(|(term, w)| {
                        let weight = w.as_f64().ok_or_else(|| Error::InvalidQueryTerm {
                            term: term.clone(),
                            reason: "weight must be numeric",
                        })?;
                        Ok((term.clone(), weight))
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(Query::Tokens)
            }
        }
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn require_docno(frame: &[Record]) -> Result<()> {
    if frame.iter().all(|r| r.contains_key(DOCNO_FIELD)) {
        Ok(())
    } else {
        Err(Error::MissingField { docno: String::new(), field: DOCNO_FIELD.into() })
    }
}

/// Top-k retrieval for every query row.
pub struct Retriever {
    reader: Arc<IndexReader>,
    similarity: Similarity,
    num_results: usize,
    include_fields: Vec<String>,
}

impl Retriever {
    pub fn new(reader: Arc<IndexReader>, similarity: Similarity) -> Result<Self> {
        reader.check_similarity(&similarity)?;
        Ok(Self { reader, similarity, num_results: 1000, include_fields: Vec::new() })
    }

    pub fn num_results(mut self, num_results: usize) -> Self {
        self.num_results = num_results;
        self
    }

    pub fn include_fields(mut self, fields: Vec<String>) -> Self {
        self.include_fields = fields;
        self
    }

    pub fn similarity(&self) -> &Similarity { &self.similarity }

    /// Retrieve for a single text query with `qid` "1".
    pub fn search(&self, query: &str) -> Result<Vec<Record>> {
        let mut record = Record::new();
        record.insert(QID_FIELD.into(), Value::from("1"));
        record.insert(QueryColumn::Text.name().into(), Value::from(query));
        self.transform(&[record])
    }

    /// One output row per hit: the input row's columns plus `docno`, `score`,
    /// `rank` and any included fields. Rows follow input order.
    pub fn transform(&self, frame: &[Record]) -> Result<Vec<Record>> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }
        let column = QueryColumn::detect(frame)?;
        let queries = frame.iter().map(|r| column.query(r)).collect::<Result<Vec<_>>>()?;
        let results = self
            .reader
            .batch_search(&queries, &self.similarity, self.num_results, &self.include_fields)?;
        let mut out = Vec::new();
        for (record, hits) in frame.iter().zip(results) {
            for (rank, hit) in hits.into_iter().enumerate() {
                let mut row = record.clone();
                row.insert(DOCNO_FIELD.into(), Value::from(hit.docno));
                row.insert(SCORE_FIELD.into(), Value::from(hit.score));
                row.insert(RANK_FIELD.into(), Value::from(rank));
                for (field, value) in hit.fields {
                    row.insert(field, value.map(Value::from).unwrap_or(Value::Null));
                }
                out.push(row);
            }
        }
        tracing::debug!(queries = frame.len(), rows = out.len(), similarity = %self.similarity, "retrieved");
        Ok(out)
    }
}

/// Scores caller-supplied (query, docno) rows.
pub struct ReRanker {
    reader: Arc<IndexReader>,
    similarity: Similarity,
}

impl ReRanker {
    pub fn new(reader: Arc<IndexReader>, similarity: Similarity) -> Result<Self> {
        reader.check_similarity(&similarity)?;
        Ok(Self { reader, similarity })
    }

    /// Adds `score` and `rank`, re-ordering rows within each `qid`. Unknown
    /// docnos get a null score and rank last.
    pub fn transform(&self, frame: &[Record]) -> Result<Vec<Record>> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }
        require_docno(frame)?;
        let column = QueryColumn::detect(frame)?;
        let resolved = frame
            .iter()
            .map(|r| self.reader.resolve(&column.query(r)?))
            .collect::<Result<Vec<_>>>()?;
        let scores: Vec<Option<f64>> = frame
            .par_iter()
            .zip(resolved.par_iter())
            .map(|(record, terms)| {
                let docno = record.get(DOCNO_FIELD).map(text_of).unwrap_or_default();
                match self.reader.score_terms(terms, &docno, &self.similarity) {
                    Ok(score) => Ok(Some(score)),
                    Err(Error::UnknownDocument(_)) => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .collect::<Result<Vec<_>>>()?;
        let rows = frame
            .iter()
            .zip(scores)
            .map(|(record, score)| {
                let mut row = record.clone();
                row.insert(SCORE_FIELD.into(), score.map(Value::from).unwrap_or(Value::Null));
                row
            })
            .collect();
        Ok(add_ranks(rows))
    }
}

/// Group rows by `qid` (first-appearance order), sort each group by score
/// descending with nulls last, and number ranks from 0.
pub fn add_ranks(rows: Vec<Record>) -> Vec<Record> {
    // Keyed by the qid's JSON text, so "1" and 1 stay distinct.
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<Record>> = Vec::new();
    for row in rows {
        let key = row.get(QID_FIELD).map_or_else(|| Value::Null.to_string(), Value::to_string);
        let slot = *slots.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(row);
    }
    let mut out = Vec::new();
    for mut group in groups {
        group.sort_by(|a, b| compare_scores(a.get(SCORE_FIELD), b.get(SCORE_FIELD)));
        for (rank, mut row) in group.into_iter().enumerate() {
            row.insert(RANK_FIELD.into(), Value::from(rank));
            out.push(row);
        }
    }
    out
}

fn compare_scores(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a.and_then(Value::as_f64), b.and_then(Value::as_f64)) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Adds stored field columns for each `docno` row.
pub struct TextLoader {
    reader: Arc<IndexReader>,
    fields: Vec<String>,
}

impl TextLoader {
    /// `None` loads every stored field.
    pub fn new(reader: Arc<IndexReader>, fields: Option<Vec<String>>) -> Self {
        let fields = fields.unwrap_or_else(|| reader.fields());
        Self { reader, fields }
    }

    pub fn fields(&self) -> &[String] { &self.fields }

    pub fn transform(&self, frame: &[Record]) -> Result<Vec<Record>> {
        require_docno(frame)?;
        let docs = self.reader.documents();
        Ok(frame
            .iter()
            .map(|record| {
                let docno = record.get(DOCNO_FIELD).map(text_of).unwrap_or_default();
                let ordinal = docs.resolve(&docno).ok();
                let mut row = record.clone();
                for field in &self.fields {
                    let value = ordinal
                        .and_then(|o| docs.get_field(o, field))
                        .map(Value::from)
                        .unwrap_or(Value::Null);
                    row.insert(field.clone(), value);
                }
                row
            })
            .collect())
    }
}
