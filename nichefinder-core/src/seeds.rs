// Seed query generation from vocabulary templates

use crate::config::Vocabulary;
use crate::error::{NicheError, Result};
use crate::model::Axis;
use std::collections::BTreeSet;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(Axis),
}

/// A parsed seed template such as `"{puzzle_type} book for {audience}"`.
///
/// Each distinct axis is bound to one term per expansion, so a placeholder
/// repeated in the same template always receives the same term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
    axes: Vec<Axis>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut axes = Vec::new();
        let mut rest = source;

        while let Some(open) = rest.find('{') {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(|| {
                NicheError::Config(format!("template '{}' has an unclosed placeholder", source))
            })?;
            let name = after[..close].trim();
            let axis = Axis::from_name(name).ok_or_else(|| {
                NicheError::Config(format!(
                    "template '{}' refers to unknown axis '{}'",
                    source, name
                ))
            })?;
            if !axes.contains(&axis) {
                axes.push(axis);
            }
            segments.push(Segment::Slot(axis));
            rest = &after[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
            axes,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Distinct axes referenced, in order of first appearance
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    fn render(&self, binding: &[(Axis, &str)]) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(axis) => {
                    if let Some((_, term)) = binding.iter().find(|(a, _)| a == axis) {
                        out.push_str(term);
                    }
                }
            }
        }
        out.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Every rendering over the cross product of the referenced axes' terms.
    pub fn expand(&self, vocabulary: &Vocabulary) -> Vec<String> {
        let mut results = Vec::new();
        let mut binding: Vec<(Axis, &str)> = Vec::with_capacity(self.axes.len());
        self.expand_from(0, vocabulary, &mut binding, &mut results);
        results
    }

    fn expand_from<'v>(
        &self,
        index: usize,
        vocabulary: &'v Vocabulary,
        binding: &mut Vec<(Axis, &'v str)>,
        results: &mut Vec<String>,
    ) {
        let Some(&axis) = self.axes.get(index) else {
            results.push(self.render(binding));
            return;
        };
        for term in &vocabulary.axis(axis).terms {
            binding.push((axis, term.as_str()));
            self.expand_from(index + 1, vocabulary, binding, results);
            binding.pop();
        }
    }
}

/// Expand all templates into a deduplicated, lexicographically sorted seed
/// list. Identical vocabularies always yield identical output.
pub fn generate_seeds(vocabulary: &Vocabulary) -> Result<Vec<String>> {
    let mut seeds = BTreeSet::new();
    for template in vocabulary.parsed_templates()? {
        seeds.extend(
            template
                .expand(vocabulary)
                .into_iter()
                .filter(|seed| !seed.is_empty()),
        );
    }

    let seeds: Vec<String> = seeds.into_iter().collect();
    info!("Generated {} unique seed queries", seeds.len());
    Ok(seeds)
}
