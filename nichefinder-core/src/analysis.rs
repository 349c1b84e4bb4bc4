use crate::categorize::{Categorizer, TaggedSuggestion};
use crate::config::NicheConfig;
use crate::coverage::{self, CrossTypeOpportunity, ModifierGap};
use crate::data::{Database, NodeStatus, QueryRecord};
use crate::error::Result;
use crate::gaps::{self, GapMatrix, Opportunity};
use crate::normalize;
use serde::Serialize;
use tracing::info;

/// Everything the analysis stages derive from a crawl, ready for export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisOutput {
    pub suggestions: Vec<TaggedSuggestion>,
    pub matrices: Vec<GapMatrix>,
    pub opportunities: Vec<Opportunity>,
    pub modifier_gaps: Vec<ModifierGap>,
    pub cross_type_opportunities: Vec<CrossTypeOpportunity>,
}

/// Normalize, filter, categorize and cross-reference the suggestions of
/// completed queries. Records in any other status are ignored.
pub fn analyze(records: &[QueryRecord], config: &NicheConfig) -> Result<AnalysisOutput> {
    let completed = records
        .iter()
        .filter(|r| r.status == NodeStatus::Completed)
        .count();
    info!(
        "Analyzing {} completed queries ({} records)",
        completed,
        records.len()
    );

    let normalized = normalize::deduplicate(records);
    let relevant = normalize::retain_relevant(normalized, &config.relevance_keywords());

    let categorizer = Categorizer::new(&config.vocabulary)?;
    let suggestions = categorizer.categorize(relevant);

    let matrices = gaps::build_matrices(&suggestions, &config.vocabulary);
    let opportunities = gaps::find_opportunities(
        &matrices,
        config.analysis.sparsity_threshold,
        config.analysis.demand_threshold,
    );
    let (modifier_gaps, cross_type_opportunities) =
        coverage::coverage_gaps(&suggestions, &config.vocabulary, &config.analysis);

    Ok(AnalysisOutput {
        suggestions,
        matrices,
        opportunities,
        modifier_gaps,
        cross_type_opportunities,
    })
}

/// Run [`analyze`] over the completed queries of a state database.
pub fn analyze_database(db: &Database, config: &NicheConfig) -> Result<AnalysisOutput> {
    let records = db.records_with_status(NodeStatus::Completed)?;
    analyze(&records, config)
}
