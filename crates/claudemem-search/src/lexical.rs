//! Lexical (BM25) scoring over code unit content and summaries (spec.md §4.9).
//!
//! The retriever's lexical signal needs exact-token recall — identifiers,
//! error strings, log messages — that a dense embedding tends to blur.
//! `LexicalIndex` builds a classic Okapi BM25 inverted index over each
//! unit's tokenized `content` plus `summary`, rebuilt whenever the index
//! store's unit set changes (it is cheap enough to not warrant incremental
//! updates at the scale this engine targets).

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

const K1: f32 = 1.2;
const B: f32 = 0.75;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z0-9_]+").unwrap());

/// Split identifiers on case/underscore boundaries in addition to
/// whitespace/punctuation, so `parseHttpRequest` and `parse_http_request`
/// both contribute the tokens `parse`, `http`, `request`.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for raw in TOKEN_RE.find_iter(text) {
        for piece in split_identifier(raw.as_str()) {
            if !piece.is_empty() {
                tokens.push(piece.to_lowercase());
            }
        }
    }
    tokens
}

fn split_identifier(word: &str) -> Vec<&str> {
    if word.contains('_') {
        return word.split('_').filter(|s| !s.is_empty()).collect();
    }
    let mut parts = Vec::new();
    let mut start = 0;
    let chars: Vec<char> = word.chars().collect();
    for i in 1..chars.len() {
        let prev = chars[i - 1];
        let cur = chars[i];
        if prev.is_lowercase() && cur.is_uppercase() {
            parts.push(&word[start..byte_index(&chars, i)]);
            start = byte_index(&chars, i);
        }
    }
    parts.push(&word[start..]);
    parts
}

fn byte_index(chars: &[char], char_idx: usize) -> usize {
    chars[..char_idx].iter().map(|c| c.len_utf8()).sum()
}

struct Document {
    id: String,
    length: usize,
    term_freqs: HashMap<String, u32>,
}

/// A BM25 inverted index over a fixed snapshot of documents.
pub struct LexicalIndex {
    documents: Vec<Document>,
    postings: HashMap<String, Vec<usize>>,
    avg_doc_length: f32,
}

impl LexicalIndex {
    /// Build an index over `(unit_id, content, summary)` triples.
    pub fn build<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str, Option<&'a str>)>) -> Self {
        let mut documents = Vec::new();
        let mut postings: HashMap<String, Vec<usize>> = HashMap::new();

        for (id, content, summary) in entries {
            let mut text = content.to_string();
            if let Some(summary) = summary {
                text.push(' ');
                text.push_str(summary);
            }
            let tokens = tokenize(&text);
            let mut term_freqs: HashMap<String, u32> = HashMap::new();
            for token in &tokens {
                *term_freqs.entry(token.clone()).or_insert(0) += 1;
            }
            let doc_idx = documents.len();
            for term in term_freqs.keys() {
                postings.entry(term.clone()).or_default().push(doc_idx);
            }
            documents.push(Document {
                id: id.to_string(),
                length: tokens.len(),
                term_freqs,
            });
        }

        let avg_doc_length = if documents.is_empty() {
            0.0
        } else {
            documents.iter().map(|d| d.length as f32).sum::<f32>() / documents.len() as f32
        };

        Self {
            documents,
            postings,
            avg_doc_length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Score `query` against every document containing at least one query
    /// term, returning `(unit_id, score)` pairs sorted by descending score.
    pub fn search(&self, query: &str, k: usize) -> Vec<(String, f32)> {
        if self.documents.is_empty() {
            return Vec::new();
        }
        let query_terms = tokenize(query);
        let n = self.documents.len() as f32;

        let mut scores: HashMap<usize, f32> = HashMap::new();
        for term in &query_terms {
            let Some(doc_ids) = self.postings.get(term) else {
                continue;
            };
            let doc_freq = doc_ids.len() as f32;
            let idf = ((n - doc_freq + 0.5) / (doc_freq + 0.5) + 1.0).ln();
            for &doc_idx in doc_ids {
                let doc = &self.documents[doc_idx];
                let tf = *doc.term_freqs.get(term).unwrap_or(&0) as f32;
                let norm = 1.0 - B + B * (doc.length as f32 / self.avg_doc_length.max(1.0));
                let score = idf * (tf * (K1 + 1.0)) / (tf + K1 * norm);
                *scores.entry(doc_idx).or_insert(0.0) += score;
            }
        }

        let mut ranked: Vec<(usize, f32)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);
        ranked
            .into_iter()
            .map(|(idx, score)| (self.documents[idx].id.clone(), score))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_camel_and_snake_case() {
        assert_eq!(tokenize("parseHttpRequest"), vec!["parse", "http", "request"]);
        assert_eq!(tokenize("parse_http_request"), vec!["parse", "http", "request"]);
    }

    #[test]
    fn search_ranks_exact_term_match_higher() {
        let docs = vec![
            ("a", "fn retry_with_backoff() { sleep() }", None),
            ("b", "fn connect_database() { pool() }", None),
        ];
        let index = LexicalIndex::build(docs);
        let hits = index.search("backoff retry", 5);
        assert_eq!(hits[0].0, "a");
    }

    #[test]
    fn empty_index_returns_no_hits() {
        let index = LexicalIndex::build(Vec::<(&str, &str, Option<&str>)>::new());
        assert!(index.search("anything", 5).is_empty());
    }

    #[test]
    fn unmatched_query_returns_no_hits() {
        let docs = vec![("a", "fn connect_database() {}", None)];
        let index = LexicalIndex::build(docs);
        assert!(index.search("zzz_nonexistent_token", 5).is_empty());
    }
}
