//! Text normalization for embedding input.
//!
//! Turns raw résumé/job text into a canonical token stream:
//! 1. Lowercase
//! 2. Collapse newline runs, then whitespace runs, to single spaces
//! 3. Strip everything outside `[a-z0-9 ]`
//! 4. Drop stop-words and single-character tokens
//! 5. Reduce each token to its dictionary lemma
//! 6. Rejoin with single spaces
//!
//! The output is a pure function of the input and normalization is
//! idempotent: `normalize(normalize(x)) == normalize(x)`.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

/// Fixed English stop-word set. Tokens in this set never survive
/// normalization.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an",
    "and", "any", "are", "as", "at", "be", "because", "been", "before",
    "being", "below", "between", "both", "but", "by", "can", "could", "did",
    "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "him", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "itself", "just", "may", "me", "might", "more", "most", "must", "my",
    "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or",
    "other", "our", "ours", "out", "over", "own", "same", "shall", "she",
    "should", "so", "some", "such", "than", "that", "the", "their",
    "theirs", "them", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "very", "was", "we",
    "were", "what", "when", "where", "which", "while", "who", "whom", "why",
    "will", "with", "would", "you", "your", "yours",
];

static STOP_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| STOP_WORDS.iter().copied().collect());

/// Plural forms that suffix rules would mangle.
static IRREGULAR: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("children", "child"),
        ("men", "man"),
        ("women", "woman"),
        ("feet", "foot"),
        ("teeth", "tooth"),
        ("geese", "goose"),
        ("mice", "mouse"),
        ("lives", "life"),
        ("wives", "wife"),
        ("knives", "knife"),
        ("leaves", "leaf"),
        ("indices", "index"),
        ("matrices", "matrix"),
        ("analyses", "analysis"),
        ("criteria", "criterion"),
    ])
});

/// Words that look plural but are their own lemma.
static INVARIANT: Lazy<HashSet<&'static str>> =
    Lazy::new(|| HashSet::from(["news", "series", "species"]));

static RE_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_NON_ALNUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9 ]").unwrap());

/// Normalize raw text into the canonical token stream.
///
/// Empty (or all-noise) input produces an empty string, never an error.
pub fn normalize(raw: &str) -> String {
    let text = raw.to_lowercase();
    let text = RE_NEWLINES.replace_all(&text, " ");
    let text = RE_WHITESPACE.replace_all(&text, " ");
    let text = RE_NON_ALNUM.replace_all(&text, " ");

    let lemmas = text
        .split_whitespace()
        .filter(|t| keep_token(t))
        .map(lemmatize)
        // A lemma can shrink into the stop list ("cans" -> "can") or below
        // the length floor; filter again so normalize stays idempotent.
        .filter(|t| keep_token(t));

    let mut out = String::new();
    for lemma in lemmas {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&lemma);
    }
    out
}

/// Tokenize already-normalized text, applying the same stop-word and
/// length filters. Shared with the keyword extractor.
pub(crate) fn filtered_tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter(|t| keep_token(t))
        .map(|t| t.to_string())
        .collect()
}

fn keep_token(token: &str) -> bool {
    token.len() > 1 && !STOP_SET.contains(token)
}

/// Dictionary-based lemmatization for noun forms.
///
/// Irregular table first, then ordered suffix rules. Stable on its own
/// output: lemmatize(lemmatize(t)) == lemmatize(t).
fn lemmatize(token: &str) -> String {
    if let Some(lemma) = IRREGULAR.get(token) {
        return (*lemma).to_string();
    }
    if INVARIANT.contains(token) {
        return token.to_string();
    }

    let n = token.len();
    if n > 4 && token.ends_with("ies") {
        return format!("{}y", &token[..n - 3]);
    }
    if n > 4 && token.ends_with("ves") {
        return format!("{}f", &token[..n - 3]);
    }
    if n > 4 && token.ends_with("sses") {
        return token[..n - 2].to_string();
    }
    if n > 4 && (token.ends_with("ches") || token.ends_with("shes")) {
        return token[..n - 2].to_string();
    }
    if n > 3 && token.ends_with("xes") {
        return token[..n - 2].to_string();
    }
    if n > 3
        && token.ends_with('s')
        && !token.ends_with("ss")
        && !token.ends_with("us")
        && !token.ends_with("is")
    {
        return token[..n - 1].to_string();
    }

    token.to_string()
}
