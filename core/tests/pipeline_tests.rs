mod common;

use common::{build, chemistry, corpus};
use serde_json::{json, Value};
use std::collections::HashMap;
use sparrow_core::{Error, FieldSelection, IndexOptions, Record, Similarity, SimilarityArgs, SparseIndex};

fn frame(value: Value) -> Vec<Record> {
    value.as_array().unwrap().iter().map(|v| v.as_object().unwrap().clone()).collect()
}

fn column(rows: &[Record], name: &str) -> Vec<Value> {
    rows.iter().map(|r| r[name].clone()).collect()
}

#[test]
fn retriever_adds_docno_score_and_rank() {
    let (_dir, index) = build(&chemistry(), IndexOptions::default());
    let retriever = index.bm25(0.9, 0.4).unwrap();
    let out = retriever
        .transform(&frame(json!([
            {"qid": "q1", "query": "chemical reactions"},
            {"qid": "q2", "query": "biological"},
        ])))
        .unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0]["qid"], "q1");
    assert_eq!(out[0]["query"], "chemical reactions");
    assert_eq!(out[0]["docno"], "d1");
    assert_eq!(out[0]["rank"], 0);
    assert!((out[0]["score"].as_f64().unwrap() - 2.0 * 2f64.ln()).abs() < 1e-6);
    assert_eq!(out[1]["qid"], "q2");
    assert_eq!(out[1]["docno"], "d2");
}

#[test]
fn retriever_caps_rows_per_query() {
    let (_dir, index) = build(&corpus(), IndexOptions::default());
    let retriever = index.retriever(Similarity::TfIdf).unwrap().num_results(2);
    let out = retriever
        .transform(&frame(json!([{"qid": "1", "query": "rust"}, {"qid": "2", "query": "systems"}])))
        .unwrap();
    assert_eq!(column(&out, "qid"), vec!["1", "1", "2", "2"]);
    assert_eq!(column(&out, "rank"), vec![0, 1, 0, 1]);
}

#[test]
fn retriever_search_uses_qid_one() {
    let (_dir, index) = build(&chemistry(), IndexOptions::default());
    let out = index.tfidf().unwrap().search("chemical").unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0]["qid"], "1");
}

#[test]
fn retriever_detects_query_columns() {
    let (_dir, index) = build(&chemistry(), IndexOptions::default());
    let retriever = index.bm25(0.9, 0.4).unwrap();
    let out = retriever
        .transform(&frame(json!([{"qid": "1", "query_toks": {"biological": 1.5}}])))
        .unwrap();
    assert_eq!(out[0]["docno"], "d2");
    let out = retriever
        .transform(&frame(json!([{"qid": "1", "query_lucene": "chemical^3", "query": "biological"}])))
        .unwrap();
    assert_eq!(out[0]["docno"], "d1");
    assert!((out[0]["score"].as_f64().unwrap() - 3.0 * 2f64.ln()).abs() < 1e-9);
    let err = retriever.transform(&frame(json!([{"qid": "1", "text": "chemical"}]))).unwrap_err();
    assert!(matches!(err, Error::MissingQueryColumn));
}

#[test]
fn included_fields_match_the_text_loader() {
    let (_dir, index) = build(&corpus(), IndexOptions::default());
    let fields = vec!["text".to_string(), "contents".to_string()];
    let retrieved = index
        .bm25(0.9, 0.4)
        .unwrap()
        .include_fields(fields.clone())
        .transform(&frame(json!([{"qid": "1", "query": "reactions"}])))
        .unwrap();
    assert_eq!(retrieved.len(), 2);

    let bare: Vec<Record> = retrieved
        .iter()
        .map(|r| {
            let mut row = r.clone();
            row.remove("text");
            row.remove("contents");
            row
        })
        .collect();
    let loaded = index.text_loader(FieldSelection::Only(fields)).unwrap().transform(&bare).unwrap();
    assert_eq!(loaded, retrieved);
}

#[test]
fn impact_retriever_fails_eagerly_on_text_indices() {
    let (_dir, index) = build(&chemistry(), IndexOptions::default());
    assert!(matches!(index.impact(), Err(Error::UnsupportedStrategy(_))));
    assert!(matches!(
        index.retriever_named("Impact", &SimilarityArgs::new()),
        Err(Error::UnsupportedStrategy(_))
    ));
}

#[test]
fn reranker_scores_and_orders_candidates() {
    let (_dir, index) = build(&chemistry(), IndexOptions::default());
    let reranker = index.reranker(Similarity::bm25(0.9, 0.4)).unwrap();
    let out = reranker
        .transform(&frame(json!([
            {"qid": "1", "query": "chemical", "docno": "d2"},
            {"qid": "1", "query": "chemical", "docno": "missing"},
            {"qid": "1", "query": "chemical", "docno": "d1"},
        ])))
        .unwrap();
    assert_eq!(column(&out, "docno"), vec!["d1", "d2", "missing"]);
    assert_eq!(column(&out, "rank"), vec![0, 1, 2]);
    assert!((out[0]["score"].as_f64().unwrap() - 2f64.ln()).abs() < 1e-9);
    assert_eq!(out[1]["score"], 0.0);
    assert!(out[2]["score"].is_null());
}

#[test]
fn reranker_agrees_with_retriever() {
    let (_dir, index) = build(&corpus(), IndexOptions::default());
    let similarity = Similarity::qld(1000.0);
    let retrieved = index
        .retriever(similarity)
        .unwrap()
        .transform(&frame(json!([{"qid": "1", "query": "rust systems"}])))
        .unwrap();
    let candidates: Vec<Record> = retrieved
        .iter()
        .rev()
        .map(|r| {
            let mut row = r.clone();
            row.remove("score");
            row.remove("rank");
            row
        })
        .collect();
    let reranked = index.reranker(similarity).unwrap().transform(&candidates).unwrap();
    assert_eq!(reranked.len(), retrieved.len());
    let scores = |rows: &[Record]| -> HashMap<String, u64> {
        rows.iter()
            .map(|r| (r["docno"].as_str().unwrap().to_string(), r["score"].as_f64().unwrap().to_bits()))
            .collect()
    };
    assert_eq!(scores(&reranked), scores(&retrieved));
}

#[test]
fn reranker_requires_docno() {
    let (_dir, index) = build(&chemistry(), IndexOptions::default());
    let reranker = index.reranker(Similarity::TfIdf).unwrap();
    let err = reranker.transform(&frame(json!([{"qid": "1", "query": "chemical"}]))).unwrap_err();
    assert!(matches!(err, Error::MissingField { field, .. } if field == "docno"));
}

#[test]
fn text_loader_fills_stored_fields() {
    let (_dir, index) = build(&chemistry(), IndexOptions::default());
    let loader = index.text_loader(FieldSelection::All).unwrap();
    assert_eq!(loader.fields(), ["contents", "text"]);
    let out = loader
        .transform(&frame(json!([{"docno": "d2", "qid": "7"}, {"docno": "nope"}])))
        .unwrap();
    assert_eq!(out[0]["text"], "biological systems");
    assert_eq!(out[0]["contents"], "biological systems");
    assert_eq!(out[0]["qid"], "7");
    assert!(out[1]["text"].is_null());
}

#[test]
fn explicit_field_selection_limits_indexed_text() {
    let dir = tempfile::tempdir().unwrap();
    let index = SparseIndex::new(dir.path().join("index"));
    let records = frame(json!([
        {"docno": "d1", "title": "Chemistry", "body": "reactions", "year": 2001},
        {"docno": "d2", "title": "Biology", "body": "systems", "year": 2002},
    ]));
    let options = IndexOptions { fields: FieldSelection::parse("title,year"), ..IndexOptions::default() };
    index.index(records, options).unwrap();

    let retriever = index.tfidf().unwrap();
    assert!(retriever.search("reactions").unwrap().is_empty());
    let out = retriever.search("2002").unwrap();
    assert_eq!(out[0]["docno"], "d2");
    assert_eq!(index.fields().unwrap(), vec!["contents", "title", "year"]);
}

#[test]
fn star_selection_indexes_every_string_field() {
    let dir = tempfile::tempdir().unwrap();
    let index = SparseIndex::new(dir.path().join("index"));
    let records = frame(json!([{"docno": "d1", "title": "Chemistry", "body": "reactions", "year": 2001}]));
    index.index(records, IndexOptions::default()).unwrap();
    let retriever = index.tfidf().unwrap();
    assert_eq!(retriever.search("reactions").unwrap().len(), 1);
    assert!(retriever.search("2001").unwrap().is_empty());
    let loaded = index
        .text_loader(FieldSelection::All)
        .unwrap()
        .transform(&frame(json!([{"docno": "d1"}])))
        .unwrap();
    assert_eq!(loaded[0]["contents"], "Chemistry\nreactions");
}
