use crate::config::Vocabulary;
use crate::error::{NicheError, Result};
use crate::model::{Axis, UNCATEGORIZED};
use crate::normalize::NormalizedSuggestion;
use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::info;

/// The matched term per axis, or none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryTags {
    tags: [Option<String>; 5],
}

impl CategoryTags {
    fn slot(axis: Axis) -> usize {
        match axis {
            Axis::PuzzleType => 0,
            Axis::Audience => 1,
            Axis::Theme => 2,
            Axis::Modifier => 3,
            Axis::AgeRange => 4,
        }
    }

    pub fn get(&self, axis: Axis) -> Option<&str> {
        self.tags[Self::slot(axis)].as_deref()
    }

    pub fn set(&mut self, axis: Axis, term: impl Into<String>) {
        self.tags[Self::slot(axis)] = Some(term.into());
    }

    /// The tag, or `"uncategorized"`
    pub fn label(&self, axis: Axis) -> &str {
        self.get(axis).unwrap_or(UNCATEGORIZED)
    }
}

impl Serialize for CategoryTags {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Axis::ALL.len()))?;
        for axis in Axis::ALL {
            map.serialize_entry(axis.as_str(), self.label(axis))?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TaggedSuggestion {
    #[serde(flatten)]
    pub suggestion: NormalizedSuggestion,
    pub tags: CategoryTags,
}

struct TermMatcher {
    term: String,
    pattern: Regex,
}

/// Lexical tagger: for each axis, the first term in that axis's match order
/// found in the text on word boundaries becomes the tag.
pub struct Categorizer {
    axes: Vec<(Axis, Vec<TermMatcher>)>,
}

impl Categorizer {
    pub fn new(vocabulary: &Vocabulary) -> Result<Self> {
        let mut axes = Vec::with_capacity(Axis::ALL.len());
        for axis in Axis::ALL {
            let mut matchers = Vec::new();
            for term in vocabulary.axis(axis).match_order() {
                let needle = term.trim().to_lowercase();
                if needle.is_empty() {
                    continue;
                }
                let pattern = Regex::new(&format!(r"(?:^|\W){}(?:\W|$)", regex::escape(&needle)))
                    .map_err(|e| {
                        NicheError::Config(format!("cannot match term '{}' on {}: {}", term, axis, e))
                    })?;
                matchers.push(TermMatcher {
                    term: term.trim().to_string(),
                    pattern,
                });
            }
            axes.push((axis, matchers));
        }
        Ok(Self { axes })
    }

    pub fn tag(&self, text: &str) -> CategoryTags {
        let text = text.to_lowercase();
        let mut tags = CategoryTags::default();
        for (axis, matchers) in &self.axes {
            if let Some(matcher) = matchers.iter().find(|m| m.pattern.is_match(&text)) {
                tags.set(*axis, matcher.term.clone());
            }
        }
        tags
    }

    pub fn categorize(&self, suggestions: Vec<NormalizedSuggestion>) -> Vec<TaggedSuggestion> {
        let tagged: Vec<TaggedSuggestion> = suggestions
            .into_iter()
            .map(|suggestion| TaggedSuggestion {
                tags: self.tag(&suggestion.text),
                suggestion,
            })
            .collect();

        info!("Categorized {} suggestions", tagged.len());
        tagged
    }
}
