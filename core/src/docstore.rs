use crate::{DocId, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Field holding the concatenated indexed text.
pub const CONTENTS_FIELD: &str = "contents";

/// Maps external document ids to ordinals and keeps stored field values.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DocumentStore {
    store_contents: bool,
    docnos: Vec<String>,
    field_names: Vec<String>,
    /// Per ordinal, one slot per entry of `field_names`.
    stored: Vec<Vec<Option<String>>>,
    #[serde(skip)]
    ids: HashMap<String, DocId>,
}

impl DocumentStore {
    pub fn new(store_contents: bool) -> Self {
        Self { store_contents, ..Self::default() }
    }

    pub(crate) fn from_parts(mut store: DocumentStore, ids: HashMap<String, DocId>) -> Self {
        store.ids = ids;
        store
    }

    pub fn assign_ordinal(&mut self, docno: &str) -> Result<DocId> {
        if self.ids.contains_key(docno) {
            return Err(Error::DuplicateDocument(docno.to_string()));
        }
        let ordinal = self.docnos.len() as DocId;
        self.ids.insert(docno.to_string(), ordinal);
        self.docnos.push(docno.to_string());
        if self.store_contents {
            self.stored.push(Vec::new());
        }
        Ok(ordinal)
    }

    /// Record stored values for an already-assigned ordinal. A no-op when
    /// contents are not stored.
    pub fn store_fields<I>(&mut self, ordinal: DocId, fields: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        if !self.store_contents {
            return;
        }
        for (name, value) in fields {
            let slot = match self.field_names.iter().position(|f| *f == name) {
                Some(slot) => slot,
                None => {
                    self.field_names.push(name);
                    self.field_names.len() - 1
                }
            };
            if let Some(row) = self.stored.get_mut(ordinal as usize) {
                if row.len() <= slot {
                    row.resize(slot + 1, None);
                }
                row[slot] = Some(value);
            }
        }
    }

    pub fn get_field(&self, ordinal: DocId, field: &str) -> Option<&str> {
        let slot = self.field_names.iter().position(|f| f == field)?;
        self.stored
            .get(ordinal as usize)?
            .get(slot)?
            .as_deref()
    }

    pub fn resolve(&self, docno: &str) -> Result<DocId> {
        self.ids
            .get(docno)
            .copied()
            .ok_or_else(|| Error::UnknownDocument(docno.to_string()))
    }

    pub fn docno(&self, ordinal: DocId) -> Option<&str> {
        self.docnos.get(ordinal as usize).map(String::as_str)
    }

    /// Stored field names, `contents` first.
    pub fn fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = self
            .field_names
            .iter()
            .filter(|f| f.as_str() == CONTENTS_FIELD)
            .cloned()
            .collect();
        fields.extend(self.field_names.iter().filter(|f| f.as_str() != CONTENTS_FIELD).cloned());
        fields
    }

    pub fn len(&self) -> usize { self.docnos.len() }

    pub fn is_empty(&self) -> bool { self.docnos.is_empty() }

    pub fn stores_contents(&self) -> bool { self.store_contents }

    pub(crate) fn id_map(&self) -> &HashMap<String, DocId> { &self.ids }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_resolve_back() {
        let mut store = DocumentStore::new(true);
        let a = store.assign_ordinal("d1").unwrap();
        let b = store.assign_ordinal("d2").unwrap();
        assert_eq!((a, b), (0, 1));
        assert_eq!(store.resolve("d2").unwrap(), b);
        assert_eq!(store.docno(a), Some("d1"));
    }

    #[test]
    fn duplicate_docno_rejected() {
        let mut store = DocumentStore::new(false);
        store.assign_ordinal("d1").unwrap();
        assert!(matches!(store.assign_ordinal("d1"), Err(Error::DuplicateDocument(id)) if id == "d1"));
    }

    #[test]
    fn unknown_docno_is_an_error() {
        let store = DocumentStore::new(true);
        assert!(matches!(store.resolve("nope"), Err(Error::UnknownDocument(_))));
    }

    #[test]
    fn fields_absent_without_stored_contents() {
        let mut store = DocumentStore::new(false);
        let ord = store.assign_ordinal("d1").unwrap();
        store.store_fields(ord, [(CONTENTS_FIELD.to_string(), "text".to_string())]);
        assert_eq!(store.get_field(ord, CONTENTS_FIELD), None);
        assert!(store.fields().is_empty());
    }

    #[test]
    fn contents_listed_first() {
        let mut store = DocumentStore::new(true);
        let ord = store.assign_ordinal("d1").unwrap();
        store.store_fields(ord, [
            ("title".to_string(), "T".to_string()),
            (CONTENTS_FIELD.to_string(), "T\nbody".to_string()),
        ]);
        assert_eq!(store.fields(), vec!["contents", "title"]);
        assert_eq!(store.get_field(ord, "title"), Some("T"));
        assert_eq!(store.get_field(ord, "missing"), None);
    }
}
