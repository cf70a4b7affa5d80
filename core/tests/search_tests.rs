mod common;

use common::{chemistry, corpus, reader};
use sparrow_core::{Analyzer, Document, Error, IndexOptions, Query, Similarity, SimilarityArgs, SparseIndex};

fn whitespace() -> IndexOptions {
    IndexOptions { analyzer: Analyzer::Whitespace, ..IndexOptions::default() }
}

fn xyz() -> Vec<(&'static str, &'static str)> {
    vec![("a", "x y x"), ("b", "x z"), ("c", "z z z z")]
}

#[test]
fn chemistry_query_finds_only_the_chemistry_document() {
    let (_dir, reader) = reader(&chemistry(), IndexOptions::default());
    let hits = reader.search(&Query::text("chemical reactions"), &Similarity::bm25(0.9, 0.4), 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].docno, "d1");
    // idf = ln 2 per term; dl == avgdl so the tf part is 1.
    assert!((hits[0].score - 2.0 * 2f64.ln()).abs() < 1e-6);
}

#[test]
fn bm25_matches_hand_computation() {
    let (_dir, reader) = reader(&xyz(), whitespace());
    let hits = reader.search(&Query::text("x"), &Similarity::bm25(0.9, 0.4), 10).unwrap();
    let idf = 1.6f64.ln();
    let a = idf * 3.8 / 2.9;
    let b = idf * 1.9 / (1.0 + 0.9 * (0.6 + 0.4 * 2.0 / 3.0));
    assert_eq!(hits.iter().map(|h| h.docno.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
    assert!((hits[0].score - a).abs() < 1e-9);
    assert!((hits[1].score - b).abs() < 1e-9);
}

#[test]
fn qld_matches_hand_computation() {
    let (_dir, reader) = reader(&xyz(), whitespace());
    let hits = reader.search(&Query::text("x"), &Similarity::qld(1000.0), 10).unwrap();
    // cf(x) = 3 over 9 tokens.
    let p = 4.0 / 10.0;
    let qld = |tf: f64, dl: f64| ((1.0 + tf / (1000.0 * p)).ln() + (1000.0 / (dl + 1000.0)).ln()).max(0.0);
    assert_eq!(hits[0].docno, "a");
    assert!((hits[0].score - qld(2.0, 3.0)).abs() < 1e-12);
    assert!((hits[1].score - qld(1.0, 2.0)).abs() < 1e-12);
}

#[test]
fn tfidf_matches_hand_computation() {
    let (_dir, reader) = reader(&xyz(), whitespace());
    let hits = reader.search(&Query::text("x"), &Similarity::TfIdf, 10).unwrap();
    let idf = 1.0 + (4.0f64 / 3.0).ln();
    assert!((hits[0].score - 2f64.sqrt() * idf).abs() < 1e-12);
    assert!((hits[1].score - idf).abs() < 1e-12);
}

#[test]
fn similarity_from_name_uses_defaults_and_overrides() {
    let (_dir, reader) = reader(&xyz(), whitespace());
    let mut args = SimilarityArgs::new();
    args.insert("bm25.k1".into(), 1.2);
    args.insert("unknown.key".into(), 3.0);
    let named = Similarity::from_name("bm25", &args).unwrap();
    assert_eq!(named, Similarity::bm25(1.2, 0.4));
    let a = reader.search(&Query::text("x"), &named, 1).unwrap();
    let b = reader.search(&Query::text("x"), &Similarity::bm25(1.2, 0.4), 1).unwrap();
    assert_eq!(a, b);

    let mut legacy = SimilarityArgs::new();
    legacy.insert("qld_mu".into(), 500.0);
    assert_eq!(Similarity::from_name("QLD", &legacy).unwrap(), Similarity::qld(500.0));
    assert!(matches!(Similarity::from_name("DPH", &args), Err(Error::UnsupportedStrategy(_))));
}

#[test]
fn direct_scores_equal_search_scores() {
    let (_dir, reader) = reader(&corpus(), IndexOptions::default());
    let query = Query::text("rust systems reactions");
    for similarity in [Similarity::bm25(0.9, 0.4), Similarity::qld(1000.0), Similarity::TfIdf] {
        let hits = reader.search(&query, &similarity, 100).unwrap();
        assert!(!hits.is_empty());
        for hit in &hits {
            let direct = reader.score(&query, &hit.docno, &similarity).unwrap();
            assert_eq!(direct.to_bits(), hit.score.to_bits(), "{} under {}", hit.docno, similarity);
        }
    }
}

#[test]
fn results_are_bounded_and_ordered() {
    let (_dir, reader) = reader(&corpus(), IndexOptions::default());
    let query = Query::text("rust systems");
    let top = reader.top_docs(&query, &Similarity::bm25(0.9, 0.4), 3).unwrap();
    assert_eq!(top.hits.len(), 3);
    assert_eq!(top.total_hits, 6);
    assert!(top.hits.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(reader.search(&query, &Similarity::bm25(0.9, 0.4), 0).unwrap().is_empty());
}

#[test]
fn ties_break_by_insertion_order() {
    let (_dir, reader) = reader(&corpus(), IndexOptions::default());
    let hits = reader.search(&Query::text("rust systems"), &Similarity::bm25(0.9, 0.4), 10).unwrap();
    let d = hits.iter().position(|h| h.docno == "d").unwrap();
    let e = hits.iter().position(|h| h.docno == "e").unwrap();
    assert_eq!(hits[d].score, hits[e].score);
    assert_eq!(e, d + 1);
}

#[test]
fn unmatched_and_empty_queries_return_nothing() {
    let (_dir, reader) = reader(&chemistry(), IndexOptions::default());
    let sim = Similarity::bm25(0.9, 0.4);
    assert!(reader.search(&Query::text("astronomy"), &sim, 10).unwrap().is_empty());
    assert!(reader.search(&Query::text("the of and"), &sim, 10).unwrap().is_empty());
    assert!(reader.search(&Query::text(""), &sim, 10).unwrap().is_empty());
}

#[test]
fn unknown_docno_fails_direct_scoring() {
    let (_dir, reader) = reader(&chemistry(), IndexOptions::default());
    let err = reader.score(&Query::text("chemical"), "d9", &Similarity::TfIdf).unwrap_err();
    assert!(matches!(err, Error::UnknownDocument(id) if id == "d9"));
    assert_eq!(reader.score(&Query::text("chemical"), "d2", &Similarity::TfIdf).unwrap(), 0.0);
}

#[test]
fn parsed_queries_apply_boosts() {
    let (_dir, reader) = reader(&chemistry(), IndexOptions::default());
    let sim = Similarity::bm25(0.9, 0.4);
    let hits = reader.search(&Query::parse("chemical^2 reactions").unwrap(), &sim, 10).unwrap();
    assert!((hits[0].score - 3.0 * 2f64.ln()).abs() < 1e-9);
    let grouped = reader.search(&Query::parse("(chemical reactions)^0.5").unwrap(), &sim, 10).unwrap();
    assert!((grouped[0].score - 2f64.ln()).abs() < 1e-9);
    assert!(matches!(Query::parse("title:chemical"), Err(Error::QueryParse { .. })));
}

#[test]
fn token_queries_are_analysed_and_validated() {
    let (_dir, reader) = reader(&chemistry(), IndexOptions::default());
    let sim = Similarity::bm25(0.9, 0.4);
    let hits = reader.search(&Query::tokens([("Chemicals", 2.0)]), &sim, 10).unwrap();
    assert_eq!(hits[0].docno, "d1");
    assert!((hits[0].score - 2.0 * 2f64.ln()).abs() < 1e-9);
    let err = reader.search(&Query::tokens([("", 1.0)]), &sim, 10).unwrap_err();
    assert!(matches!(err, Error::InvalidQueryTerm { .. }));
    let err = reader.search(&Query::tokens([("chemical", f64::NAN)]), &sim, 10).unwrap_err();
    assert!(matches!(err, Error::InvalidQueryTerm { .. }));
}

#[test]
fn cjk_index_matches_part_of_a_run() {
    let docs = [("zh", "中文信息检索系统"), ("ko", "한국어 정보 검색"), ("en", "information retrieval")];
    let options = IndexOptions { analyzer: Analyzer::Cjk, ..IndexOptions::default() };
    let (_dir, reader) = reader(&docs, options);
    let sim = Similarity::bm25(0.9, 0.4);
    let hits = reader.search(&Query::text("信息"), &sim, 10).unwrap();
    assert_eq!(hits.iter().map(|h| h.docno.as_str()).collect::<Vec<_>>(), vec!["zh"]);
    let hits = reader.search(&Query::text("검색"), &sim, 10).unwrap();
    assert_eq!(hits[0].docno, "ko");
    assert_eq!(reader.search(&Query::text("the retrieval"), &sim, 10).unwrap()[0].docno, "en");
}

#[test]
fn batch_results_follow_input_order() {
    let (_dir, reader) = reader(&chemistry(), IndexOptions::default());
    let queries = vec![Query::text("biological"), Query::text("chemical"), Query::text("astronomy")];
    let results = reader
        .batch_search(&queries, &Similarity::bm25(0.9, 0.4), 10, &["contents".to_string()])
        .unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0][0].docno, "d2");
    assert_eq!(results[1][0].docno, "d1");
    assert_eq!(results[1][0].fields, vec![("contents".to_string(), Some("chemical reactions".to_string()))]);
    assert!(results[2].is_empty());
}

#[test]
fn batch_validates_every_query_first() {
    let (_dir, reader) = reader(&chemistry(), IndexOptions::default());
    let queries = vec![Query::text("chemical"), Query::tokens([(" ", 1.0)])];
    let err = reader.batch_search(&queries, &Similarity::TfIdf, 10, &[]).unwrap_err();
    assert!(matches!(err, Error::InvalidQueryTerm { .. }));
}

#[test]
fn impact_requires_a_pretokenized_index() {
    let (_dir, reader) = reader(&chemistry(), IndexOptions::default());
    let err = reader.search(&Query::text("chemical"), &Similarity::Impact, 10).unwrap_err();
    assert!(matches!(err, Error::UnsupportedStrategy(_)));
}

#[test]
fn impact_scores_weight_times_stored_impact() {
    let dir = tempfile::tempdir().unwrap();
    let index = SparseIndex::new(dir.path().join("impact"));
    let options = IndexOptions { pretokenized: true, ..IndexOptions::default() };
    let mut builder = index.indexer(options).unwrap();
    builder.add(Document::new("d1").with_toks([("chemical", 2), ("reactions", 3)])).unwrap();
    builder.add(Document::new("d2").with_toks([("chemical", 1)])).unwrap();
    builder.commit().unwrap();

    let reader = index.reader().unwrap();
    assert_eq!(reader.analyzer(), Analyzer::Whitespace);
    let query = Query::tokens([("chemical", 5.3), ("reactions", 1.1)]);
    let hits = reader.search(&query, &Similarity::Impact, 10).unwrap();
    assert_eq!(hits[0].docno, "d1");
    assert!((hits[0].score - 13.9).abs() < 1e-9);
    assert!((hits[1].score - 5.3).abs() < 1e-9);
}

#[test]
fn pretokenized_documents_require_impacts() {
    let dir = tempfile::tempdir().unwrap();
    let index = SparseIndex::new(dir.path().join("impact"));
    let options = IndexOptions { pretokenized: true, ..IndexOptions::default() };
    let mut builder = index.indexer(options).unwrap();
    let err = builder.add(Document::new("d1").field("text", "chemical")).unwrap_err();
    assert!(matches!(err, Error::MissingField { field, .. } if field == "toks"));
}
