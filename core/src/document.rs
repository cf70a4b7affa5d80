use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A record in a frame: column name to value, in insertion order.
pub type Record = Map<String, Value>;

pub const DOCNO_FIELD: &str = "docno";
/// Column carrying pre-tokenized term impacts.
pub const TOKS_FIELD: &str = "toks";

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub docno: String,
    pub fields: Vec<(String, Value)>,
    /// Term to quantized impact, for pre-tokenized indices.
    pub toks: Option<BTreeMap<String, u32>>,
}

impl Document {
    pub fn new(docno: impl Into<String>) -> Self {
        Self { docno: docno.into(), fields: Vec::new(), toks: None }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn with_toks<I, S>(mut self, toks: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        self.toks = Some(toks.into_iter().map(|(t, w)| (t.into(), w)).collect());
        self
    }

    /// Convert a record with a required string `docno`. A `toks` object is
    /// taken as term impacts: finite non-negative numbers, rounded to the
    /// nearest integer.
    pub fn from_record(record: Record) -> Result<Self> {
        let docno = match record.get(DOCNO_FIELD) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => {
                return Err(Error::MissingField { docno: String::new(), field: DOCNO_FIELD.into() })
            }
        };
        let mut doc = Document::new(docno);
        for (name, value) in record {
            if name == DOCNO_FIELD {
                continue;
            }
            match value {
                Value::Object(map) if name == TOKS_FIELD => {
                    let mut toks = BTreeMap::new();
                    for (term, weight) in map {
                        let impact = impact_from_json(&doc.docno, &term, &weight)?;
                        toks.insert(term, impact);
                    }
                    doc.toks = Some(toks);
                }
                value => doc.fields.push((name, value)),
            }
        }
        doc.validate_toks()?;
        Ok(doc)
    }

    /// Impact terms are indexed verbatim, so they must be non-empty and free
    /// of whitespace and control characters.
    pub fn validate_toks(&self) -> Result<()> {
        let Some(toks) = &self.toks else {
            return Ok(());
        };
        for term in toks.keys() {
            let reason = if term.is_empty() {
                "empty term"
            } else if term.chars().any(char::is_whitespace) {
                "term contains whitespace"
            } else if term.chars().any(char::is_control) {
                "term contains a control character"
            } else {
                continue;
            };
            return Err(Error::InvalidImpact { docno: self.docno.clone(), term: term.clone(), reason });
        }
        Ok(())
    }

    fn value(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

fn impact_from_json(docno: &str, term: &str, weight: &Value) -> Result<u32> {
    let invalid = |reason| Error::InvalidImpact { docno: docno.to_string(), term: term.to_string(), reason };
    let w = weight.as_f64().ok_or_else(|| invalid("impact is not a number"))?;
    if !w.is_finite() {
        return Err(invalid("impact is not finite"));
    }
    if w < 0.0 {
        return Err(invalid("impact is negative"));
    }
    Ok(w.round().min(u32::MAX as f64) as u32)
}

/// Which fields are concatenated into the indexed `contents`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "FieldSpec", into = "FieldSpec")]
pub enum FieldSelection {
    /// Every string field except `docno`, in insertion order.
    #[default]
    All,
    Only(Vec<String>),
}

/// Wire form: `"*"`, a single field name, or a list of names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum FieldSpec {
    One(String),
    Many(Vec<String>),
}

impl From<FieldSpec> for FieldSelection {
    fn from(spec: FieldSpec) -> Self {
        match spec {
            FieldSpec::One(s) if s == "*" => FieldSelection::All,
            FieldSpec::One(s) => FieldSelection::Only(vec![s]),
            FieldSpec::Many(fields) => FieldSelection::Only(fields),
        }
    }
}

impl From<FieldSelection> for FieldSpec {
    fn from(selection: FieldSelection) -> Self {
        match selection {
            FieldSelection::All => FieldSpec::One("*".into()),
            FieldSelection::Only(fields) => FieldSpec::Many(fields),
        }
    }
}

impl FieldSelection {
    pub fn parse(spec: &str) -> Self {
        if spec.trim() == "*" {
            FieldSelection::All
        } else {
            FieldSelection::Only(spec.split(',').map(|f| f.trim().to_string()).filter(|f| !f.is_empty()).collect())
        }
    }

    /// Selected `(field, text)` pairs. Explicit fields are stringified.
    pub fn select(&self, doc: &Document) -> Result<Vec<(String, String)>> {
        match self {
            FieldSelection::All => Ok(doc
                .fields
                .iter()
                .filter_map(|(name, value)| match value {
                    Value::String(s) => Some((name.clone(), s.clone())),
                    _ => None,
                })
                .collect()),
            FieldSelection::Only(names) => names
                .iter()
                .map(|name| {
                    let value = doc.value(name).ok_or_else(|| Error::MissingField {
                        docno: doc.docno.clone(),
                        field: name.clone(),
                    })?;
                    let text = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    Ok((name.clone(), text))
                })
                .collect(),
        }
    }
}

/// Newline-joined text of the selected fields.
pub fn contents(selected: &[(String, String)]) -> String {
    selected.iter().map(|(_, text)| text.as_str()).collect::<Vec<_>>().join("\n")
}
