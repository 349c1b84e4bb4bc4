use crate::error::{NicheError, Result};
use crate::model::Axis;
use crate::seeds::Template;
use nichefinder_scanner::{ClientConfig, SuggestionClient};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const PUZZLE_TYPES: &[&str] = &[
    "word search", "crossword", "sudoku", "cryptogram", "maze",
    "word scramble", "number search", "logic puzzle", "word find",
    "brain teaser", "dot to dot", "hidden word", "acrostic", "kakuro",
    "kenken", "nonogram", "picture puzzle", "rebus puzzle", "trivia",
    "riddle book", "activity book", "puzzle book",
];

pub const AUDIENCES: &[&str] = &[
    "kids", "adults", "seniors", "teens", "women", "men", "boys", "girls",
    "toddlers", "elderly", "beginners", "experts", "students", "teachers",
    "couples", "families",
];

pub const THEMES: &[&str] = &[
    "animals", "sports", "bible", "travel", "food", "nature", "science",
    "history", "music", "movies", "holidays", "christmas", "halloween",
    "easter", "space", "ocean", "dinosaurs", "dogs", "cats", "horses",
    "cars", "military", "nursing", "gardening", "cooking", "fishing",
    "camping", "yoga", "disney", "harry potter", "spanish", "french",
    "german", "japanese", "math", "geography", "usa", "football",
    "baseball", "basketball", "soccer", "golf", "horror", "mystery",
    "fantasy", "flowers", "birds", "farm", "beach", "winter", "summer",
    "spring", "fall autumn", "birthday", "wedding", "baby shower",
    "retirement", "teacher appreciation",
];

pub const MODIFIERS: &[&str] = &[
    "large print", "easy", "hard", "giant", "relaxing", "fun",
    "challenging", "simple", "big", "small", "spiral bound",
    "pocket size", "jumbo", "mini", "deluxe",
];

pub const AGE_RANGES: &[&str] = &[
    "ages 3-5", "ages 4-8", "ages 6-8", "ages 8-10",
    "ages 8-12", "ages 9-12", "ages 10-14",
];

pub const DEFAULT_TEMPLATES: &[&str] = &[
    "{puzzle_type} book",
    "{puzzle_type} book for {audience}",
    "{puzzle_type} book for {audience} {modifier}",
    "{puzzle_type} book about {theme}",
    "{puzzle_type} book {theme}",
    "{puzzle_type} book {modifier}",
    "{puzzle_type} for {audience} {theme}",
    "{puzzle_type} {theme} for {audience}",
    "{puzzle_type} book for {age_range}",
    "{puzzle_type} {modifier}",
];

const EXTRA_RELEVANCE_KEYWORDS: &[&str] = &["puzzle", "riddle", "rebus", "logic"];

pub const KEY_MODIFIERS: &[&str] = &["large print", "easy", "hard", "giant", "relaxing"];

fn owned(terms: &[&str]) -> Vec<String> {
    terms.iter().map(|t| t.to_string()).collect()
}

/// Top-level configuration, loaded from a JSON file. Every field has a
/// default so partial files are accepted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NicheConfig {
    pub crawl: CrawlConfig,
    pub client: ClientConfig,
    pub vocabulary: Vocabulary,
    pub analysis: AnalysisConfig,
}

impl NicheConfig {
    /// Load and validate configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            NicheError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            NicheError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Keywords for the relevance filter, falling back to the configured
    /// puzzle types when none were set.
    pub fn relevance_keywords(&self) -> Vec<String> {
        match &self.analysis.relevance_keywords {
            Some(keywords) => keywords.clone(),
            None => {
                let mut keywords = self.vocabulary.puzzle_type.terms.clone();
                keywords.extend(owned(EXTRA_RELEVANCE_KEYWORDS));
                keywords
            }
        }
    }

    /// Check everything that can be checked without touching the network.
    pub fn validate(&self) -> Result<()> {
        self.crawl.validate()?;
        self.vocabulary.validate()?;
        SuggestionClient::new(&self.client)?;
        Ok(())
    }
}

/// Where child queries come from when a node is expanded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchSource {
    /// `"<query> <letter>"` for the node's own query
    #[default]
    Query,
    /// `"<suggestion> <letter>"` for every suggestion the node returned
    Suggestions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Deepest level that is fetched; seeds are depth 0
    pub max_depth: usize,

    /// Attempts per node before a transient failure becomes permanent
    pub max_attempts: u32,

    pub backoff_base_secs: f64,
    pub backoff_cap_secs: f64,

    /// Stop the crawl after this many failed nodes in a row; 0 disables
    pub max_consecutive_failures: usize,

    pub branch_from: BranchSource,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_attempts: 3,
            backoff_base_secs: 1.0,
            backoff_cap_secs: 60.0,
            max_consecutive_failures: 10,
            branch_from: BranchSource::Query,
        }
    }
}

impl CrawlConfig {
    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(NicheError::Config(
                "crawl.max_attempts must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("crawl.backoff_base_secs", self.backoff_base_secs),
            ("crawl.backoff_cap_secs", self.backoff_cap_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(NicheError::Config(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if self.backoff_cap_secs < self.backoff_base_secs {
            return Err(NicheError::Config(format!(
                "crawl.backoff_cap_secs ({}) is below crawl.backoff_base_secs ({})",
                self.backoff_cap_secs, self.backoff_base_secs
            )));
        }
        Ok(())
    }

    /// Pause before retry number `retry` (0 for the first retry):
    /// base * 2^retry, capped.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let factor = 2f64.powi(retry.min(30) as i32);
        let secs = (self.backoff_base_secs * factor).min(self.backoff_cap_secs);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
    }
}

/// Candidate terms of one axis.
///
/// `terms` drives seed generation in the order given. Tag matching uses a
/// separate, explicit order: every term named in `priority` first, in that
/// order, then the remaining terms longest first (ties keep `terms` order).
/// Without a `priority` list, "little kids" is therefore tried before "kids".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisTerms {
    pub terms: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub priority: Vec<String>,
}

impl AxisTerms {
    pub fn new(terms: &[&str]) -> Self {
        Self {
            terms: owned(terms),
            priority: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: &[&str]) -> Self {
        self.priority = owned(priority);
        self
    }

    pub fn match_order(&self) -> Vec<&str> {
        let mut ordered: Vec<&str> = self.priority.iter().map(String::as_str).collect();
        let mut rest: Vec<&str> = self
            .terms
            .iter()
            .map(String::as_str)
            .filter(|term| !ordered.contains(term))
            .collect();
        rest.sort_by_key(|term| std::cmp::Reverse(term.chars().count()));

        for term in rest {
            if !ordered.contains(&term) {
                ordered.push(term);
            }
        }
        ordered
    }

    fn validate(&self, axis: Axis) -> Result<()> {
        for term in &self.terms {
            if term.trim().is_empty() {
                return Err(NicheError::Config(format!(
                    "axis {} contains a blank term",
                    axis
                )));
            }
        }
        let known: HashSet<&str> = self.terms.iter().map(String::as_str).collect();
        for term in &self.priority {
            if !known.contains(term.as_str()) {
                return Err(NicheError::Config(format!(
                    "axis {} priority names '{}', which is not one of its terms",
                    axis, term
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    pub puzzle_type: AxisTerms,
    pub audience: AxisTerms,
    pub theme: AxisTerms,
    pub modifier: AxisTerms,
    pub age_range: AxisTerms,

    /// Seed templates; `{axis}` placeholders expand to that axis's terms
    pub templates: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            puzzle_type: AxisTerms::new(PUZZLE_TYPES),
            audience: AxisTerms::new(AUDIENCES),
            theme: AxisTerms::new(THEMES),
            modifier: AxisTerms::new(MODIFIERS),
            age_range: AxisTerms::new(AGE_RANGES),
            templates: owned(DEFAULT_TEMPLATES),
        }
    }
}

impl Vocabulary {
    /// A vocabulary with no terms and no templates.
    pub fn empty() -> Self {
        Self {
            puzzle_type: AxisTerms::default(),
            audience: AxisTerms::default(),
            theme: AxisTerms::default(),
            modifier: AxisTerms::default(),
            age_range: AxisTerms::default(),
            templates: Vec::new(),
        }
    }

    pub fn axis(&self, axis: Axis) -> &AxisTerms {
        match axis {
            Axis::PuzzleType => &self.puzzle_type,
            Axis::Audience => &self.audience,
            Axis::Theme => &self.theme,
            Axis::Modifier => &self.modifier,
            Axis::AgeRange => &self.age_range,
        }
    }

    pub fn axis_mut(&mut self, axis: Axis) -> &mut AxisTerms {
        match axis {
            Axis::PuzzleType => &mut self.puzzle_type,
            Axis::Audience => &mut self.audience,
            Axis::Theme => &mut self.theme,
            Axis::Modifier => &mut self.modifier,
            Axis::AgeRange => &mut self.age_range,
        }
    }

    pub fn parsed_templates(&self) -> Result<Vec<Template>> {
        self.templates.iter().map(|t| Template::parse(t)).collect()
    }

    fn validate(&self) -> Result<()> {
        for axis in Axis::ALL {
            self.axis(axis).validate(axis)?;
        }
        if self.templates.is_empty() {
            return Err(NicheError::Config(
                "vocabulary.templates must not be empty".to_string(),
            ));
        }
        for template in self.parsed_templates()? {
            for axis in template.axes() {
                if self.axis(*axis).terms.is_empty() {
                    return Err(NicheError::Config(format!(
                        "template '{}' uses axis {}, which has no terms",
                        template.source(),
                        axis
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Cells with at most this many suggestions count as empty
    pub sparsity_threshold: u64,

    /// Surrounding demand must exceed this for an empty cell to be flagged
    pub demand_threshold: u64,

    /// Suggestions must contain one of these; an empty list keeps
    /// everything. Unset means the loaded puzzle types plus a few generic
    /// puzzle words.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_keywords: Option<Vec<String>>,

    /// Modifiers every puzzle type and audience is expected to carry
    pub key_modifiers: Vec<String>,

    /// Other puzzle types that must carry a theme before its absence counts
    pub cross_type_min_types: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sparsity_threshold: 0,
            demand_threshold: 0,
            relevance_keywords: None,
            key_modifiers: owned(KEY_MODIFIERS),
            cross_type_min_types: 2,
        }
    }
}
