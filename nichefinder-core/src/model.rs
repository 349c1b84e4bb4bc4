use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag value for an axis on which no term matched.
pub const UNCATEGORIZED: &str = "uncategorized";

/// The five independent categorical dimensions used to build seeds and tag
/// suggestions. Declaration order is the canonical axis order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    PuzzleType,
    Audience,
    Theme,
    Modifier,
    AgeRange,
}

impl Axis {
    pub const ALL: [Axis; 5] = [
        Axis::PuzzleType,
        Axis::Audience,
        Axis::Theme,
        Axis::Modifier,
        Axis::AgeRange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::PuzzleType => "puzzle_type",
            Axis::Audience => "audience",
            Axis::Theme => "theme",
            Axis::Modifier => "modifier",
            Axis::AgeRange => "age_range",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Axis::ALL.into_iter().find(|axis| axis.as_str() == name)
    }

    /// Every unordered pair of distinct axes, in canonical order.
    pub fn pairs() -> Vec<(Axis, Axis)> {
        let mut pairs = Vec::with_capacity(10);
        for (i, a) in Axis::ALL.iter().enumerate() {
            for b in &Axis::ALL[i + 1..] {
                pairs.push((*a, *b));
            }
        }
        pairs
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
