use crate::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*|\p{N}+").expect("valid regex");
    /// A run of CJK characters, or a word or number that contains none.
    static ref CJK_RE: Regex = Regex::new(
        r"(?u)(?P<cjk>[\p{Han}\p{Hiragana}\p{Katakana}\p{Hangul}]+)|[\p{L}--[\p{Han}\p{Hiragana}\p{Katakana}\p{Hangul}]][\p{L}\p{N}_'--[\p{Han}\p{Hiragana}\p{Katakana}\p{Hangul}]]*|\p{N}+"
    )
    .expect("valid regex");
    static ref ENGLISH_STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref LANGUAGE_STEMMERS: HashMap<Language, Stemmer> =
        LANGUAGES.iter().map(|(_, lang)| (*lang, Stemmer::create(lang.algorithm()))).collect();
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Text analysis pipeline, recorded in index metadata and reused at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Analyzer {
    /// NFKC, lowercase, English stopwords, Snowball English stemmer.
    #[default]
    English,
    /// As `English`, without stemming.
    EnglishNoStem,
    /// Split on whitespace only. Terms are taken verbatim.
    Whitespace,
    /// NFKC, lowercase, Snowball stemmer for the language. No stopword list.
    Stemmed(Language),
    /// Chinese, Japanese and Korean: overlapping bigrams over CJK runs, a
    /// lone CJK character as a unigram. Other words are lowercased and
    /// filtered by the English stopword list, unstemmed.
    Cjk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Arabic,
    Danish,
    Dutch,
    Finnish,
    French,
    German,
    Greek,
    Hungarian,
    Italian,
    Norwegian,
    Portuguese,
    Romanian,
    Russian,
    Spanish,
    Swedish,
    Tamil,
    Turkish,
}

const LANGUAGES: &[(&str, Language)] = &[
    ("ar", Language::Arabic),
    ("da", Language::Danish),
    ("nl", Language::Dutch),
    ("fi", Language::Finnish),
    ("fr", Language::French),
    ("de", Language::German),
    ("el", Language::Greek),
    ("hu", Language::Hungarian),
    ("it", Language::Italian),
    ("no", Language::Norwegian),
    ("pt", Language::Portuguese),
    ("ro", Language::Romanian),
    ("ru", Language::Russian),
    ("es", Language::Spanish),
    ("sv", Language::Swedish),
    ("ta", Language::Tamil),
    ("tr", Language::Turkish),
];

impl Language {
    fn algorithm(self) -> Algorithm {
        match self {
            Language::Arabic => Algorithm::Arabic,
            Language::Danish => Algorithm::Danish,
            Language::Dutch => Algorithm::Dutch,
            Language::Finnish => Algorithm::Finnish,
            Language::French => Algorithm::French,
            Language::German => Algorithm::German,
            Language::Greek => Algorithm::Greek,
            Language::Hungarian => Algorithm::Hungarian,
            Language::Italian => Algorithm::Italian,
            Language::Norwegian => Algorithm::Norwegian,
            Language::Portuguese => Algorithm::Portuguese,
            Language::Romanian => Algorithm::Romanian,
            Language::Russian => Algorithm::Russian,
            Language::Spanish => Algorithm::Spanish,
            Language::Swedish => Algorithm::Swedish,
            Language::Tamil => Algorithm::Tamil,
            Language::Turkish => Algorithm::Turkish,
        }
    }

    fn code(self) -> &'static str {
        LANGUAGES
            .iter()
            .find(|(_, lang)| *lang == self)
            .map(|(code, _)| *code)
            .unwrap_or("en")
    }
}

impl Analyzer {
    /// Tokenize text into (term, position). Positions count raw tokens, so
    /// dropped stopwords still leave a gap.
    pub fn tokenize(&self, text: &str) -> Vec<(String, usize)> {
        match self {
            Analyzer::Whitespace => text
                .split_whitespace()
                .enumerate()
                .map(|(pos, tok)| (tok.to_string(), pos))
                .collect(),
            Analyzer::English => normalized_tokens(text, true, Some(&*ENGLISH_STEMMER)),
            Analyzer::EnglishNoStem => normalized_tokens(text, true, None),
            Analyzer::Stemmed(lang) => normalized_tokens(text, false, LANGUAGE_STEMMERS.get(lang)),
            Analyzer::Cjk => cjk_tokens(text),
        }
    }

    /// Terms only, in order.
    pub fn terms(&self, text: &str) -> Vec<String> {
        self.tokenize(text).into_iter().map(|(t, _)| t).collect()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Analyzer::English => "en",
            Analyzer::EnglishNoStem => "en_nostem",
            Analyzer::Whitespace => "whitespace",
            Analyzer::Stemmed(lang) => lang.code(),
            Analyzer::Cjk => "cjk",
        }
    }
}

fn normalized_tokens(text: &str, stopwords: bool, stemmer: Option<&Stemmer>) -> Vec<(String, usize)> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    let mut tokens = Vec::new();
    for (pos, mat) in RE.find_iter(&normalized).enumerate() {
        let token = mat.as_str();
        if stopwords && is_stopword(token) { continue; }
        let term = match stemmer {
            Some(stemmer) => stemmer.stem(token).to_string(),
            None => token.to_string(),
        };
        tokens.push((term, pos));
    }
    tokens
}

fn cjk_tokens(text: &str) -> Vec<(String, usize)> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    let mut tokens = Vec::new();
    let mut pos = 0;
    for caps in CJK_RE.captures_iter(&normalized) {
        match caps.name("cjk") {
            Some(run) => {
                let chars: Vec<char> = run.as_str().chars().collect();
                if chars.len() == 1 {
                    tokens.push((chars[0].to_string(), pos));
                    pos += 1;
                }
                for pair in chars.windows(2) {
                    tokens.push((pair.iter().collect(), pos));
                    pos += 1;
                }
            }
            None => {
                let token = &caps[0];
                if !is_stopword(token) {
                    tokens.push((token.to_string(), pos));
                }
                pos += 1;
            }
        }
    }
    tokens
}

/// Tokenize with the default English analyzer.
pub fn tokenize(text: &str) -> Vec<(String, usize)> {
    Analyzer::English.tokenize(text)
}

impl fmt::Display for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Analyzer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "en" | "english" | "porter" => Ok(Analyzer::English),
            "en_nostem" | "english_nostem" => Ok(Analyzer::EnglishNoStem),
            "whitespace" => Ok(Analyzer::Whitespace),
            "cjk" | "zh" | "ko" => Ok(Analyzer::Cjk),
            other => LANGUAGES
                .iter()
                .find(|(code, _)| *code == other)
                .map(|(_, lang)| Analyzer::Stemmed(*lang))
                .ok_or_else(|| Error::UnknownAnalyzer(s.to_string())),
        }
    }
}

impl From<Analyzer> for String {
    fn from(analyzer: Analyzer) -> Self {
        analyzer.name().to_string()
    }
}

impl TryFrom<String> for Analyzer {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}
