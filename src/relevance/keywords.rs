//! Keyphrase extraction over the embedding space.
//!
//! Candidates are unigrams and adjacent bigrams from the filtered token
//! stream. The document and every candidate are embedded in one batch and
//! each candidate is ranked by cosine similarity to the document embedding.
//! Scores are an internal detail; only the ordered phrases are returned.

use crate::relevance::embeddings::{Embedder, EmbeddingError};
use crate::relevance::normalize::filtered_tokens;
use crate::relevance::similarity::cosine_similarity;

/// Extract up to `top_n` representative phrases from `text`, ordered by
/// descending relevance to the whole document.
///
/// `text` is expected to be normalized already. Empty input or
/// `top_n == 0` yields an empty vec, not an error. Ties break by first
/// occurrence in the text, so the output is deterministic.
pub fn extract_keywords(
    embedder: &Embedder,
    text: &str,
    top_n: usize,
) -> Result<Vec<String>, EmbeddingError> {
    if top_n == 0 {
        return Ok(vec![]);
    }

    let candidates = candidate_phrases(text);
    if candidates.is_empty() {
        return Ok(vec![]);
    }

    let mut batch = Vec::with_capacity(candidates.len() + 1);
    batch.push(text.to_string());
    batch.extend(candidates.iter().cloned());

    let mut embeddings = embedder.embed_batch(&batch)?;
    let doc_embedding = embeddings.remove(0);

    let mut scored: Vec<(String, f32)> = candidates
        .into_iter()
        .zip(embeddings)
        .map(|(phrase, embedding)| {
            // Dimensions all come from one model; a mismatch here cannot
            // happen, but the zero-norm policy still applies.
            let score = cosine_similarity(&doc_embedding, &embedding).unwrap_or(0.0);
            (phrase, score)
        })
        .collect();

    // Stable sort keeps first-occurrence order among equal scores
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_n);

    Ok(scored.into_iter().map(|(phrase, _)| phrase).collect())
}

/// Unigram and adjacent-bigram candidates, deduplicated preserving first
/// occurrence.
pub(crate) fn candidate_phrases(text: &str) -> Vec<String> {
    let tokens = filtered_tokens(text);

    let mut seen = std::collections::HashSet::new();
    let mut candidates = Vec::new();

    for token in &tokens {
        if seen.insert(token.clone()) {
            candidates.push(token.clone());
        }
    }
    for pair in tokens.windows(2) {
        let bigram = format!("{} {}", pair[0], pair[1]);
        if seen.insert(bigram.clone()) {
            candidates.push(bigram);
        }
    }

    candidates
}
