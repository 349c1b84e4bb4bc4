// Suggestion canonicalization and provenance-weighted deduplication

use crate::data::{NodeStatus, QueryRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// A canonical suggestion with the distinct queries that surfaced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedSuggestion {
    pub text: String,
    /// Number of distinct source queries, not raw mentions
    pub occurrences: u64,
    pub provenance: BTreeSet<String>,
    /// Shallowest crawl depth at which it was seen
    pub min_depth: usize,
}

fn is_edge_noise(c: char) -> bool {
    c.is_whitespace() || c.is_ascii_punctuation() || is_unicode_punctuation(c)
}

fn is_unicode_punctuation(c: char) -> bool {
    matches!(
        c,
        '\u{2018}' | '\u{2019}' | '\u{201C}' | '\u{201D}' | '\u{2013}' | '\u{2014}'
            | '\u{2026}' | '\u{00AB}' | '\u{00BB}' | '\u{00BF}' | '\u{00A1}'
    )
}

/// Lowercase, collapse internal whitespace and strip punctuation from both
/// ends. Returns `None` when nothing is left. Idempotent.
pub fn canonicalize(raw: &str) -> Option<String> {
    let lowered = raw.to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    let stripped = collapsed.trim_matches(is_edge_noise);

    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}

/// Group suggestions of completed queries by canonical form.
///
/// Output is ordered by occurrence count descending, then text.
pub fn deduplicate<'a, I>(records: I) -> Vec<NormalizedSuggestion>
where
    I: IntoIterator<Item = &'a QueryRecord>,
{
    let mut grouped: BTreeMap<String, (BTreeSet<String>, usize)> = BTreeMap::new();
    let mut raw_total = 0usize;

    for record in records {
        if record.status != NodeStatus::Completed {
            continue;
        }
        for raw in &record.suggestions {
            let Some(text) = canonicalize(raw) else {
                continue;
            };
            raw_total += 1;
            let entry = grouped
                .entry(text)
                .or_insert_with(|| (BTreeSet::new(), record.depth));
            entry.0.insert(record.query.clone());
            entry.1 = entry.1.min(record.depth);
        }
    }

    let mut suggestions: Vec<NormalizedSuggestion> = grouped
        .into_iter()
        .map(|(text, (provenance, min_depth))| NormalizedSuggestion {
            text,
            occurrences: provenance.len() as u64,
            provenance,
            min_depth,
        })
        .collect();
    suggestions.sort_by(|a, b| b.occurrences.cmp(&a.occurrences).then_with(|| a.text.cmp(&b.text)));

    info!(
        "Normalized {} raw suggestions into {} unique",
        raw_total,
        suggestions.len()
    );
    suggestions
}

/// Keep suggestions mentioning at least one keyword. An empty keyword list
/// keeps everything.
pub fn retain_relevant(
    suggestions: Vec<NormalizedSuggestion>,
    keywords: &[String],
) -> Vec<NormalizedSuggestion> {
    if keywords.is_empty() {
        return suggestions;
    }
    let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    let before = suggestions.len();
    let kept: Vec<NormalizedSuggestion> = suggestions
        .into_iter()
        .filter(|s| keywords.iter().any(|k| s.text.contains(k.as_str())))
        .collect();

    info!("Relevance filter kept {} of {} suggestions", kept.len(), before);
    kept
}
