use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use sparrow_core::{
    Analyzer, Document, FieldSelection, IndexBuilder, IndexOptions, Query, Record, Similarity, SimilarityArgs,
    SparseIndex,
};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sparrow-indexer")]
#[command(about = "Build, inspect and query sparse indices", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index from JSON/JSONL files or a directory of them
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Output index directory
        #[arg(long)]
        output: PathBuf,
        /// Fields to index: "*" or a comma-separated list
        #[arg(long, default_value = "*")]
        fields: String,
        /// Ingestion worker threads
        #[arg(long, default_value_t = 8)]
        threads: usize,
        /// Analyzer name (en, en_nostem, whitespace, cjk, or a language code)
        #[arg(long, default_value = "en")]
        analyzer: Analyzer,
        /// Documents carry a `toks` object of term impacts
        #[arg(long, default_value_t = false)]
        pretokenized: bool,
        /// Skip per-document term vectors
        #[arg(long, default_value_t = false)]
        no_doc_vectors: bool,
        /// Keep term positions in postings
        #[arg(long, default_value_t = false)]
        positions: bool,
        /// Do not store field text
        #[arg(long, default_value_t = false)]
        no_contents: bool,
        /// Documents buffered per parallel analysis pass
        #[arg(long, default_value_t = 10_000)]
        batch_size: usize,
    },
    /// Print index metadata and collection statistics
    Info {
        #[arg(long)]
        index: PathBuf,
    },
    /// Run a query and print ranked hits as JSON lines
    Search {
        #[arg(long)]
        index: PathBuf,
        /// Query text
        #[arg(long)]
        query: String,
        /// Parse the query as query syntax rather than plain text
        #[arg(long, default_value_t = false)]
        parsed: bool,
        /// BM25, QLD, TFIDF or Impact
        #[arg(long, default_value = "BM25")]
        similarity: String,
        /// Similarity parameters as key=value, e.g. bm25.k1=1.2
        #[arg(long = "arg", value_parser = parse_arg)]
        args: Vec<(String, f64)>,
        #[arg(long, default_value_t = 10)]
        k: usize,
        /// Stored fields to print with each hit
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
    },
}

fn parse_arg(s: &str) -> Result<(String, f64), String> {
    let (key, value) = s.split_once('=').ok_or_else(|| format!("expected key=value, got {s}"))?;
    let value = value.trim().parse::<f64>().map_err(|e| format!("{key}: {e}"))?;
    Ok((key.trim().to_string(), value))
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            output,
            fields,
            threads,
            analyzer,
            pretokenized,
            no_doc_vectors,
            positions,
            no_contents,
            batch_size,
        } => {
            let options = IndexOptions {
                fields: FieldSelection::parse(&fields),
                threads,
                store_doc_vectors: !no_doc_vectors,
                store_positions: positions,
                store_contents: !no_contents,
                analyzer,
                pretokenized,
                batch_size,
            };
            build_index(&input, &output, options)
        }
        Commands::Info { index } => print_info(&index),
        Commands::Search { index, query, parsed, similarity, args, k, fields } => {
            let args: SimilarityArgs = args.into_iter().collect();
            let similarity = Similarity::from_name(&similarity, &args)?;
            let query = if parsed { Query::parse(&query)? } else { Query::text(query) };
            run_search(&index, &query, &similarity, k, &fields)
        }
    }
}

fn input_files(input: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        bail!("input {} does not exist", input.display());
    }
    Ok(files)
}

fn build_index(input: &Path, output: &Path, options: IndexOptions) -> Result<()> {
    let files = input_files(input)?;
    let mut builder = SparseIndex::new(output).indexer(options)?;
    for file in &files {
        let added = if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            index_jsonl(file, &mut builder)?
        } else {
            index_json(file, &mut builder)?
        };
        tracing::debug!(file = %file.display(), added, "ingested file");
    }
    tracing::info!(files = files.len(), num_docs = builder.num_docs(), "ingested documents");
    let summary = builder.commit()?;
    println!("{}", serde_json::json!({
        "path": summary.path.display().to_string(),
        "num_docs": summary.num_docs,
        "num_terms": summary.num_terms,
    }));
    Ok(())
}

fn index_jsonl(file: &Path, builder: &mut IndexBuilder) -> Result<usize> {
    let reader = BufReader::new(File::open(file)?);
    let mut added = 0;
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let value: Value = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}", file.display(), lineno + 1))?;
        ingest(value, builder)?;
        added += 1;
    }
    Ok(added)
}

fn index_json(file: &Path, builder: &mut IndexBuilder) -> Result<usize> {
    let reader = BufReader::new(File::open(file)?);
    let json: Value = serde_json::from_reader(reader).with_context(|| file.display().to_string())?;
    match json {
        Value::Array(arr) => {
            let n = arr.len();
            for v in arr {
                ingest(v, builder)?;
            }
            Ok(n)
        }
        obj @ Value::Object(_) => {
            ingest(obj, builder)?;
            Ok(1)
        }
        _ => Ok(0),
    }
}

fn ingest(value: Value, builder: &mut IndexBuilder) -> Result<()> {
    let Value::Object(record) = value else {
        bail!("expected a JSON object per document");
    };
    builder.add(Document::from_record(record)?)?;
    Ok(())
}

fn print_info(index: &Path) -> Result<()> {
    let reader = SparseIndex::new(index).reader()?;
    let stats = reader.dictionary().collection_stats();
    let info = serde_json::json!({
        "meta": reader.meta(),
        "fields": reader.fields(),
        "total_docs": stats.total_docs,
        "total_terms": stats.total_terms,
        "avg_doc_length": stats.avg_doc_length,
    });
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn run_search(index: &Path, query: &Query, similarity: &Similarity, k: usize, fields: &[String]) -> Result<()> {
    let reader = SparseIndex::new(index).reader()?;
    let start = std::time::Instant::now();
    let hits = reader.search_with_fields(query, similarity, k, fields)?;
    tracing::info!(hits = hits.len(), took_s = start.elapsed().as_secs_f64(), %similarity, "search complete");
    for (rank, hit) in hits.into_iter().enumerate() {
        let mut row = Record::new();
        row.insert("rank".into(), rank.into());
        row.insert("docno".into(), hit.docno.into());
        row.insert("score".into(), hit.score.into());
        for (field, value) in hit.fields {
            row.insert(field, value.map(Value::from).unwrap_or(Value::Null));
        }
        println!("{}", Value::Object(row));
    }
    Ok(())
}
