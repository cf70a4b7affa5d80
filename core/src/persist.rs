use crate::docstore::DocumentStore;
use crate::index::{Posting, TermDictionary, TermStats};
use crate::tokenizer::Analyzer;
use crate::{DocId, Result, TermId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

pub const META_VERSION: u32 = 1;

/// Sidecar metadata, written once as the last step of a build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    #[serde(rename = "type")]
    pub kind: String,
    pub format: String,
    pub store_doc_vectors: bool,
    pub store_positions: bool,
    pub store_contents: bool,
    #[serde(default)]
    pub pretokenized: bool,
    #[serde(default)]
    pub analyzer: Analyzer,
    pub num_docs: u32,
    pub num_terms: u32,
    pub created_at: String,
    pub version: u32,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn lock(&self) -> PathBuf { self.root.join("write.lock") }
    fn meta_tmp(&self) -> PathBuf { self.root.join("meta.json.tmp") }
    fn dictionary(&self) -> PathBuf { self.root.join("dictionary.bin") }
    fn postings(&self) -> PathBuf { self.root.join("postings.bin") }
    fn docs(&self) -> PathBuf { self.root.join("docs.bin") }
    fn doc_id_map(&self) -> PathBuf { self.root.join("doc_id_map.bin") }
    fn vectors(&self) -> PathBuf { self.root.join("vectors.bin") }

    /// True once a build has committed here.
    pub fn is_built(&self) -> bool { self.meta().is_file() }

    pub fn is_locked(&self) -> bool { self.lock().exists() }
}

/// Exclusive write lock on an index directory, held for the duration of a build.
///
/// The lock file is only removed by [`WriteLock::release`]; a builder that is
/// dropped without committing leaves the directory locked.
#[derive(Debug)]
pub struct WriteLock {
    path: PathBuf,
}

impl WriteLock {
    pub fn acquire(paths: &IndexPaths) -> Result<Option<Self>> {
        create_dir_all(&paths.root)?;
        let path = paths.lock();
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut f) => {
                writeln!(f, "{}", std::process::id())?;
                Ok(Some(Self { path }))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn release(self) -> Result<()> {
        std::fs::remove_file(&self.path)?;
        Ok(())
    }
}

fn save_bin<T: Serialize + ?Sized>(path: PathBuf, value: &T) -> Result<()> {
    let mut f = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut f, value)?;
    f.flush()?;
    Ok(())
}

fn load_bin<T: DeserializeOwned>(path: PathBuf) -> Result<T> {
    let f = BufReader::new(File::open(path)?);
    Ok(bincode::deserialize_from(f)?)
}

pub fn save_dictionary(paths: &IndexPaths, dict: &TermDictionary) -> Result<()> {
    let (terms, stats, postings, doc_lengths) = dict.parts();
    save_bin(paths.dictionary(), &(terms, stats, doc_lengths))?;
    save_bin(paths.postings(), postings)
}

pub fn load_dictionary(paths: &IndexPaths) -> Result<TermDictionary> {
    let (terms, stats, doc_lengths): (Vec<String>, Vec<TermStats>, Vec<u32>) = load_bin(paths.dictionary())?;
    let postings: Vec<Vec<Posting>> = load_bin(paths.postings())?;
    Ok(TermDictionary::from_parts(terms, stats, postings, doc_lengths))
}

pub fn save_docs(paths: &IndexPaths, docs: &DocumentStore) -> Result<()> {
    save_bin(paths.docs(), docs)?;
    save_bin(paths.doc_id_map(), docs.id_map())
}

pub fn load_docs(paths: &IndexPaths) -> Result<DocumentStore> {
    let store: DocumentStore = load_bin(paths.docs())?;
    let ids: HashMap<String, DocId> = load_bin(paths.doc_id_map())?;
    Ok(DocumentStore::from_parts(store, ids))
}

pub fn save_doc_vectors(paths: &IndexPaths, vectors: &[Vec<(TermId, u32)>]) -> Result<()> {
    save_bin(paths.vectors(), vectors)
}

pub fn load_doc_vectors(paths: &IndexPaths) -> Result<Vec<Vec<(TermId, u32)>>> {
    load_bin(paths.vectors())
}

/// Written to a temporary file, synced, then renamed into place, so
/// `meta.json` either holds a complete record or does not exist.
pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let tmp = paths.meta_tmp();
    let json = serde_json::to_string_pretty(meta)?;
    let mut f = File::create(&tmp)?;
    f.write_all(json.as_bytes())?;
    f.sync_all()?;
    drop(f);
    std::fs::rename(&tmp, paths.meta())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}
