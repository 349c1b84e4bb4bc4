// Coverage gaps: missing key modifiers and themes absent from one puzzle type

use crate::categorize::TaggedSuggestion;
use crate::config::{AnalysisConfig, Vocabulary};
use crate::model::Axis;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Key modifiers never seen together with a puzzle type or audience.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModifierGap {
    pub axis: Axis,
    pub value: String,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossTypeOpportunity {
    pub puzzle_type: String,
    pub theme: String,
    pub other_types_with_theme: usize,
}

/// Values of `axis` mapped to the values of `other` they co-occur with.
fn co_occurrences<'a>(
    suggestions: &'a [TaggedSuggestion],
    axis: Axis,
    other: Axis,
) -> BTreeMap<&'a str, BTreeSet<&'a str>> {
    let mut seen: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for tagged in suggestions {
        if let (Some(value), Some(other_value)) = (tagged.tags.get(axis), tagged.tags.get(other)) {
            seen.entry(value).or_default().insert(other_value);
        }
    }
    seen
}

/// For every puzzle type, then every audience, in vocabulary order: the key
/// modifiers it never appears with. Values missing none are left out.
pub fn modifier_gaps(
    suggestions: &[TaggedSuggestion],
    vocabulary: &Vocabulary,
    key_modifiers: &[String],
) -> Vec<ModifierGap> {
    let mut gaps = Vec::new();

    for axis in [Axis::PuzzleType, Axis::Audience] {
        let seen = co_occurrences(suggestions, axis, Axis::Modifier);
        let mut reported = BTreeSet::new();

        for value in &vocabulary.axis(axis).terms {
            let value = value.trim();
            if !reported.insert(value) {
                continue;
            }
            let existing = seen.get(value);
            let missing: Vec<String> = key_modifiers
                .iter()
                .filter(|m| !existing.is_some_and(|e| e.contains(m.as_str())))
                .cloned()
                .collect();
            if !missing.is_empty() {
                gaps.push(ModifierGap {
                    axis,
                    value: value.to_string(),
                    missing,
                });
            }
        }
    }
    gaps
}

/// (puzzle type, theme) pairs never seen, where the theme is carried by at
/// least `min_types` other puzzle types. Ranked by that count descending,
/// then puzzle type and theme.
pub fn cross_type_opportunities(
    suggestions: &[TaggedSuggestion],
    vocabulary: &Vocabulary,
    min_types: usize,
) -> Vec<CrossTypeOpportunity> {
    let type_themes = co_occurrences(suggestions, Axis::PuzzleType, Axis::Theme);
    let themes_seen: BTreeSet<&str> = type_themes.values().flatten().copied().collect();

    let puzzle_types: BTreeSet<&str> = vocabulary
        .puzzle_type
        .terms
        .iter()
        .map(|t| t.trim())
        .collect();

    let mut opportunities = Vec::new();
    for &puzzle_type in &puzzle_types {
        for &theme in &themes_seen {
            if type_themes
                .get(puzzle_type)
                .is_some_and(|themes| themes.contains(theme))
            {
                continue;
            }
            let others = type_themes
                .iter()
                .filter(|(other, themes)| **other != puzzle_type && themes.contains(theme))
                .count();
            if others >= min_types {
                opportunities.push(CrossTypeOpportunity {
                    puzzle_type: puzzle_type.to_string(),
                    theme: theme.to_string(),
                    other_types_with_theme: others,
                });
            }
        }
    }

    opportunities.sort_by(|a, b| {
        b.other_types_with_theme
            .cmp(&a.other_types_with_theme)
            .then_with(|| a.puzzle_type.cmp(&b.puzzle_type))
            .then_with(|| a.theme.cmp(&b.theme))
    });
    opportunities
}

/// Both coverage reports under one analysis configuration.
pub fn coverage_gaps(
    suggestions: &[TaggedSuggestion],
    vocabulary: &Vocabulary,
    config: &AnalysisConfig,
) -> (Vec<ModifierGap>, Vec<CrossTypeOpportunity>) {
    let modifier = modifier_gaps(suggestions, vocabulary, &config.key_modifiers);
    let cross_type = cross_type_opportunities(suggestions, vocabulary, config.cross_type_min_types);
    info!(
        "Coverage: {} modifier gaps, {} cross-type opportunities",
        modifier.len(),
        cross_type.len()
    );
    (modifier, cross_type)
}
