//! Query representations and their resolution to weighted terms.
//!
//! Raw text, weighted token bags and parsed expressions all resolve through
//! [`QueryExpr`] to an ordered list of `(term, weight)` pairs. Duplicate terms
//! accumulate their weights and keep the position of their first occurrence.

use crate::docstore::CONTENTS_FIELD;
use crate::tokenizer::Analyzer;
use crate::{Error, Result};
use std::fmt;

/// Characters with meaning in the query syntax.
const SPECIAL: &[char] = &[
    '\\', '+', '-', '!', '(', ')', ':', '^', '[', ']', '"', '{', '}', '~', '*', '?', '|', '&', '/',
];

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Text(String),
    Tokens(Vec<(String, f64)>),
    Parsed(QueryExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryExpr {
    /// Unanalyzed text with a boost. Analysis may turn it into several terms.
    Term { text: String, boost: f64 },
    /// Disjunction; the boost multiplies into every clause.
    Or { clauses: Vec<QueryExpr>, boost: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeightedTerm {
    pub term: String,
    pub weight: f64,
}

impl Query {
    pub fn text(text: impl Into<String>) -> Self {
        Query::Text(text.into())
    }

    pub fn tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Query::Tokens(tokens.into_iter().map(|(t, w)| (t.into(), w)).collect())
    }

    pub fn parse(query: &str) -> Result<Self> {
        Ok(Query::Parsed(QueryExpr::parse(query)?))
    }

    pub fn to_expr(&self) -> Result<QueryExpr> {
        match self {
            Query::Text(text) => Ok(QueryExpr::Term { text: text.clone(), boost: 1.0 }),
            Query::Tokens(tokens) => QueryExpr::from_tokens(tokens),
            Query::Parsed(expr) => Ok(expr.clone()),
        }
    }

    pub fn resolve(&self, analyzer: &Analyzer) -> Result<Vec<WeightedTerm>> {
        Ok(self.to_expr()?.resolve(analyzer))
    }
}

impl QueryExpr {
    pub fn term(text: impl Into<String>, boost: f64) -> Self {
        QueryExpr::Term { text: text.into(), boost }
    }

    /// Validate each token and build a disjunction of boosted terms.
    pub fn from_tokens(tokens: &[(String, f64)]) -> Result<Self> {
        let mut clauses = Vec::with_capacity(tokens.len());
        for (token, weight) in tokens {
            validate_token(token, *weight)?;
            clauses.push(QueryExpr::term(token.clone(), *weight));
        }
        Ok(QueryExpr::Or { clauses, boost: 1.0 })
    }

    pub fn parse(query: &str) -> Result<Self> {
        Parser { src: query, pos: 0 }.parse()
    }

    pub fn resolve(&self, analyzer: &Analyzer) -> Vec<WeightedTerm> {
        let mut out: Vec<WeightedTerm> = Vec::new();
        self.collect(analyzer, 1.0, &mut out);
        out
    }

    fn collect(&self, analyzer: &Analyzer, factor: f64, out: &mut Vec<WeightedTerm>) {
        match self {
            QueryExpr::Term { text, boost } => {
                for term in analyzer.terms(text) {
                    let weight = factor * boost;
                    match out.iter_mut().find(|wt| wt.term == term) {
                        Some(existing) => existing.weight += weight,
                        None => out.push(WeightedTerm { term, weight }),
                    }
                }
            }
            QueryExpr::Or { clauses, boost } => {
                for clause in clauses {
                    clause.collect(analyzer, factor * boost, out);
                }
            }
        }
    }
}

fn validate_token(token: &str, weight: f64) -> Result<()> {
    let invalid = |reason| Error::InvalidQueryTerm { term: token.to_string(), reason };
    if token.trim().is_empty() {
        return Err(invalid("empty term"));
    }
    if token.chars().any(char::is_whitespace) {
        return Err(invalid("term contains whitespace"));
    }
    if token.chars().any(char::is_control) {
        return Err(invalid("term contains control characters"));
    }
    if !weight.is_finite() || weight < 0.0 {
        return Err(invalid("weight must be finite and non-negative"));
    }
    Ok(())
}

/// Backslash-escape characters that carry meaning in the query syntax.
pub fn escape(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if SPECIAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl fmt::Display for QueryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryExpr::Term { text, boost } => {
                // A bare `OR` would read back as the keyword.
                if text.is_empty() || text == "OR" || text.chars().any(char::is_whitespace) {
                    write!(f, "\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))?;
                } else {
                    f.write_str(&escape(text))?;
                }
                if *boost != 1.0 {
                    write!(f, "^{boost}")?;
                }
                Ok(())
            }
            QueryExpr::Or { clauses, boost } => {
                let grouped = *boost != 1.0;
                if grouped {
                    f.write_str("(")?;
                }
                for (i, clause) in clauses.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{clause}")?;
                }
                if grouped {
                    write!(f, ")^{boost}")?;
                }
                Ok(())
            }
        }
    }
}

/// Recursive-descent parser for `term`, `term^2.5`, `contents:term`,
/// `"quoted text"`, `( ... )^boost` and the no-op `OR` keyword.
struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn parse(mut self) -> Result<QueryExpr> {
        let clauses = self.clauses(false)?;
        if self.pos < self.src.len() {
            return Err(self.error("unbalanced ')'"));
        }
        Ok(QueryExpr::Or { clauses, boost: 1.0 })
    }

    fn error(&self, reason: &'static str) -> Error {
        Error::QueryParse { query: self.src.to_string(), offset: self.pos, reason }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn clauses(&mut self, nested: bool) -> Result<Vec<QueryExpr>> {
        let mut clauses = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None if nested => return Err(self.error("unclosed '('")),
                None => return Ok(clauses),
                Some(')') if nested => {
                    self.bump();
                    return Ok(clauses);
                }
                Some(')') => return Ok(clauses),
                Some(_) => {
                    if self.keyword_or() {
                        continue;
                    }
                    clauses.push(self.clause()?);
                }
            }
        }
    }

    fn keyword_or(&mut self) -> bool {
        let rest = &self.src[self.pos..];
        if rest.starts_with("OR") && rest[2..].chars().next().map_or(true, char::is_whitespace) {
            self.pos += 2;
            return true;
        }
        false
    }

    fn clause(&mut self) -> Result<QueryExpr> {
        match self.peek() {
            Some('(') => {
                self.bump();
                let clauses = self.clauses(true)?;
                let boost = self.boost()?;
                Ok(QueryExpr::Or { clauses, boost })
            }
            Some('+') | Some('-') | Some('!') => Err(self.error("required/prohibited clauses are not supported")),
            _ => {
                let mut text = self.word()?;
                if self.peek() == Some(':') {
                    self.bump();
                    if text != CONTENTS_FIELD {
                        return Err(self.error("only the contents field is searchable"));
                    }
                    text = self.word()?;
                }
                let boost = self.boost()?;
                Ok(QueryExpr::Term { text, boost })
            }
        }
    }

    fn word(&mut self) -> Result<String> {
        if self.peek() == Some('"') {
            return self.quoted();
        }
        let mut text = String::new();
        while let Some(c) = self.peek() {
            match c {
                '\\' => {
                    self.bump();
                    match self.bump() {
                        Some(escaped) => text.push(escaped),
                        None => return Err(self.error("dangling escape")),
                    }
                }
                '(' | ')' | ':' | '^' => break,
                '*' | '?' | '~' | '{' | '}' | '[' | ']' => {
                    return Err(self.error("wildcard, fuzzy and range syntax is not supported"))
                }
                c if c.is_whitespace() => break,
                c => {
                    self.bump();
                    text.push(c);
                }
            }
        }
        if text.is_empty() {
            return Err(self.error("expected a term"));
        }
        Ok(text)
    }

    fn quoted(&mut self) -> Result<String> {
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated quote")),
                Some('"') => return Ok(text),
                Some('\\') => match self.bump() {
                    Some(escaped) => text.push(escaped),
                    None => return Err(self.error("dangling escape")),
                },
                Some(c) => text.push(c),
            }
        }
    }

    fn boost(&mut self) -> Result<f64> {
        if self.peek() != Some('^') {
            return Ok(1.0);
        }
        self.bump();
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            self.bump();
        }
        self.src[start..self.pos]
            .parse::<f64>()
            .map_err(|_| self.error("invalid boost"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(resolved: &[WeightedTerm]) -> Vec<(&str, f64)> {
        resolved.iter().map(|wt| (wt.term.as_str(), wt.weight)).collect()
    }

    #[test]
    fn text_query_sums_repeated_terms() {
        let resolved = Query::text("rust and Rust systems").resolve(&Analyzer::English).unwrap();
        assert_eq!(terms(&resolved), vec![("rust", 2.0), ("system", 1.0)]);
    }

    #[test]
    fn token_bag_keeps_weights() {
        let q = Query::tokens([("chemical", 5.3), ("reactions", 1.1)]);
        let resolved = q.resolve(&Analyzer::English).unwrap();
        assert_eq!(terms(&resolved), vec![("chemic", 5.3), ("reaction", 1.1)]);
    }

    #[test]
    fn token_bag_rejects_malformed_terms() {
        for bad in ["", "  ", "two words", "tab\tbed"] {
            let err = Query::tokens([(bad, 1.0)]).resolve(&Analyzer::Whitespace).unwrap_err();
            assert!(matches!(err, Error::InvalidQueryTerm { .. }), "{bad:?}");
        }
        let err = Query::tokens([("ok", f64::NAN)]).resolve(&Analyzer::Whitespace).unwrap_err();
        assert!(matches!(err, Error::InvalidQueryTerm { .. }));
    }

    #[test]
    fn parses_boosts_fields_and_groups() {
        let expr = QueryExpr::parse("contents:rust^2 (fast OR safe)^0.5").unwrap();
        let resolved = expr.resolve(&Analyzer::Whitespace);
        assert_eq!(terms(&resolved), vec![("rust", 2.0), ("fast", 0.5), ("safe", 0.5)]);
    }

    #[test]
    fn parse_errors_carry_offsets() {
        assert!(matches!(QueryExpr::parse("(open"), Err(Error::QueryParse { .. })));
        assert!(matches!(QueryExpr::parse("title:x"), Err(Error::QueryParse { .. })));
        assert!(matches!(QueryExpr::parse("wild*"), Err(Error::QueryParse { .. })));
        assert!(matches!(QueryExpr::parse("+must"), Err(Error::QueryParse { offset: 0, .. })));
    }

    #[test]
    fn escaped_tokens_survive_display_and_parse() {
        let tokens = vec![("a:b".to_string(), 2.0), ("c^d".to_string(), 1.0)];
        let expr = QueryExpr::from_tokens(&tokens).unwrap();
        let reparsed = QueryExpr::parse(&expr.to_string()).unwrap();
        assert_eq!(reparsed.resolve(&Analyzer::Whitespace), expr.resolve(&Analyzer::Whitespace));
        assert_eq!(escape("a:b"), "a\\:b");
    }

    #[test]
    fn or_token_is_quoted_so_it_is_not_read_as_the_keyword() {
        let tokens = vec![("OR".to_string(), 1.0), ("x".to_string(), 2.0)];
        let expr = QueryExpr::from_tokens(&tokens).unwrap();
        let shown = expr.to_string();
        assert!(shown.contains("\"OR\""), "{shown}");
        let reparsed = QueryExpr::parse(&shown).unwrap();
        assert_eq!(reparsed.resolve(&Analyzer::Whitespace), expr.resolve(&Analyzer::Whitespace));
        assert_eq!(reparsed.resolve(&Analyzer::Whitespace).len(), 2);
    }

    #[test]
    fn stopword_only_query_resolves_empty() {
        assert!(Query::text("the of and").resolve(&Analyzer::English).unwrap().is_empty());
    }
}
