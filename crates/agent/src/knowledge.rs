//! Knowledge relevance ranking.
//!
//! Pure scoring of stored entries against the request text. The caller
//! decides what to do with the result, including recording usage for the
//! entries that were actually surfaced.

use codeweave_core::knowledge::{KnowledgeEntry, KnowledgeScope};

/// Entries surfaced per request by default.
pub const DEFAULT_TOP_K: usize = 8;

const TAG_MARKER_SCORE: f64 = 10.0;
const TAG_KEYWORD_SCORE: f64 = 5.0;
const CONTENT_OVERLAP_SCORE: f64 = 3.0;
const GLOBAL_SCOPE_SCORE: f64 = 1.0;
const USAGE_WEIGHT: f64 = 0.1;

/// Shortest request word that counts toward content overlap.
const SIGNIFICANT_WORD_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry {
    pub entry: KnowledgeEntry,
    pub score: f64,
}

/// Rank `entries` against `request`, returning at most `top_k`, best first.
///
/// Ties keep input order. Entries that match nothing (global scope and usage
/// alone do not count as a match) are left out.
pub fn rank(entries: &[KnowledgeEntry], request: &str, top_k: usize) -> Vec<RankedEntry> {
    let request = request.to_lowercase();
    let words = words(&request);
    let significant: Vec<&str> = words
        .iter()
        .map(|w| w.trim_start_matches('#'))
        .filter(|w| w.chars().count() >= SIGNIFICANT_WORD_LEN)
        .collect();

    let mut ranked: Vec<RankedEntry> = entries
        .iter()
        .filter_map(|entry| {
            let matched = match_score(entry, &request, &words, &significant);
            if matched == 0.0 {
                return None;
            }
            let scope = if entry.scope == KnowledgeScope::Global { GLOBAL_SCOPE_SCORE } else { 0.0 };
            Some(RankedEntry {
                entry: entry.clone(),
                score: matched + scope + USAGE_WEIGHT * f64::from(entry.usage_count),
            })
        })
        .collect();

    // sort_by is stable
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(top_k);
    ranked
}

fn match_score(entry: &KnowledgeEntry, request: &str, words: &[&str], significant: &[&str]) -> f64 {
    let mut score = 0.0;
    for tag in &entry.tags {
        if request.contains(tag.as_str()) {
            score += TAG_MARKER_SCORE;
        } else if keyword_present(tag.trim_start_matches('#'), request, words) {
            score += TAG_KEYWORD_SCORE;
        }
    }

    let content = entry.content.to_lowercase();
    if significant.iter().any(|w| content.contains(w)) {
        score += CONTENT_OVERLAP_SCORE;
    }
    score
}

/// A bare keyword matches a whole request word; hyphenated keywords also
/// match as a phrase.
fn keyword_present(keyword: &str, request: &str, words: &[&str]) -> bool {
    if keyword.is_empty() {
        return false;
    }
    if words.iter().any(|w| w.trim_start_matches('#') == keyword) {
        return true;
    }
    keyword.contains('-') && (request.contains(keyword) || request.contains(&keyword.replace('-', " ")))
}

fn words(text: &str) -> Vec<&str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '#' || c == '-' || c == '_'))
        .filter(|w| !w.is_empty())
        .collect()
}

/// Prompt section listing surfaced entries.
pub fn render(ranked: &[RankedEntry]) -> String {
    ranked
        .iter()
        .map(|r| {
            let tags = if r.entry.tags.is_empty() { String::new() } else { format!("[{}] ", r.entry.tags.join(" ")) };
            format!("- {tags}{}", r.entry.content.trim())
        })
        .collect::<Vec<_>>()
        .join("\n")
}
