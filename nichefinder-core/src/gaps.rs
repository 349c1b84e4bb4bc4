// Axis-pair cross-reference matrices and opportunity ranking

use crate::categorize::TaggedSuggestion;
use crate::config::Vocabulary;
use crate::model::Axis;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GapCell {
    pub row: String,
    pub column: String,
    /// Suggestions tagged with both values
    pub count: u64,
    /// Summed occurrence counts of those suggestions
    pub demand: u64,
}

/// Counts for every (row value, column value) combination of one axis
/// pair. Rows and columns are the vocabulary terms of each axis, in
/// vocabulary order; `uncategorized` never appears.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GapMatrix {
    pub row_axis: Axis,
    pub column_axis: Axis,
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    /// Row-major, `rows.len() * columns.len()` cells
    pub cells: Vec<GapCell>,
}

impl GapMatrix {
    pub fn cell(&self, row: &str, column: &str) -> Option<&GapCell> {
        let r = self.rows.iter().position(|v| v == row)?;
        let c = self.columns.iter().position(|v| v == column)?;
        self.cells.get(r * self.columns.len() + c)
    }

    pub fn row_demand(&self, row: &str) -> u64 {
        self.cells
            .iter()
            .filter(|cell| cell.row == row)
            .map(|cell| cell.demand)
            .sum()
    }

    pub fn column_demand(&self, column: &str) -> u64 {
        self.cells
            .iter()
            .filter(|cell| cell.column == column)
            .map(|cell| cell.demand)
            .sum()
    }

    pub fn total_count(&self) -> u64 {
        self.cells.iter().map(|cell| cell.count).sum()
    }
}

/// Trimmed terms of an axis in vocabulary order, first occurrence only
fn axis_values(vocabulary: &Vocabulary, axis: Axis) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for term in &vocabulary.axis(axis).terms {
        let term = term.trim();
        if !term.is_empty() && !values.iter().any(|v| v == term) {
            values.push(term.to_string());
        }
    }
    values
}

pub fn build_matrix(
    suggestions: &[TaggedSuggestion],
    vocabulary: &Vocabulary,
    row_axis: Axis,
    column_axis: Axis,
) -> GapMatrix {
    let rows = axis_values(vocabulary, row_axis);
    let columns = axis_values(vocabulary, column_axis);

    let mut tally: HashMap<(&str, &str), (u64, u64)> = HashMap::new();
    for tagged in suggestions {
        let (Some(row), Some(column)) = (tagged.tags.get(row_axis), tagged.tags.get(column_axis))
        else {
            continue;
        };
        let entry = tally.entry((row, column)).or_default();
        entry.0 += 1;
        entry.1 += tagged.suggestion.occurrences;
    }

    let mut cells = Vec::with_capacity(rows.len() * columns.len());
    for row in &rows {
        for column in &columns {
            let (count, demand) = tally
                .get(&(row.as_str(), column.as_str()))
                .copied()
                .unwrap_or_default();
            cells.push(GapCell {
                row: row.clone(),
                column: column.clone(),
                count,
                demand,
            });
        }
    }

    GapMatrix {
        row_axis,
        column_axis,
        rows,
        columns,
        cells,
    }
}

/// One matrix per unordered pair of distinct axes.
pub fn build_matrices(suggestions: &[TaggedSuggestion], vocabulary: &Vocabulary) -> Vec<GapMatrix> {
    Axis::pairs()
        .into_iter()
        .map(|(row_axis, column_axis)| {
            let matrix = build_matrix(suggestions, vocabulary, row_axis, column_axis);
            debug!(
                "{} x {}: {} populated cells",
                row_axis,
                column_axis,
                matrix.cells.iter().filter(|c| c.count > 0).count()
            );
            matrix
        })
        .collect()
}

/// A sparse cell surrounded by demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Opportunity {
    pub row_axis: Axis,
    pub column_axis: Axis,
    pub row: String,
    pub column: String,
    pub count: u64,
    /// Demand elsewhere in the same row
    pub row_demand: u64,
    /// Demand elsewhere in the same column
    pub column_demand: u64,
    pub score: u64,
}

impl Opportunity {
    /// Descending score, then row value, column value and axis pair.
    fn rank(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| self.row.cmp(&other.row))
            .then_with(|| self.column.cmp(&other.column))
            .then_with(|| self.row_axis.cmp(&other.row_axis))
            .then_with(|| self.column_axis.cmp(&other.column_axis))
    }
}

/// Cells with `count <= sparsity_threshold` whose adjacent demand (the
/// rest of their row plus the rest of their column) exceeds
/// `demand_threshold`, ranked.
pub fn find_opportunities(
    matrices: &[GapMatrix],
    sparsity_threshold: u64,
    demand_threshold: u64,
) -> Vec<Opportunity> {
    let mut opportunities = Vec::new();

    for matrix in matrices {
        let row_totals: HashMap<&str, u64> = matrix
            .rows
            .iter()
            .map(|row| (row.as_str(), matrix.row_demand(row)))
            .collect();
        let column_totals: HashMap<&str, u64> = matrix
            .columns
            .iter()
            .map(|column| (column.as_str(), matrix.column_demand(column)))
            .collect();

        for cell in &matrix.cells {
            if cell.count > sparsity_threshold {
                continue;
            }
            let row_demand = row_totals
                .get(cell.row.as_str())
                .copied()
                .unwrap_or_default()
                .saturating_sub(cell.demand);
            let column_demand = column_totals
                .get(cell.column.as_str())
                .copied()
                .unwrap_or_default()
                .saturating_sub(cell.demand);
            let score = row_demand + column_demand;

            if score > demand_threshold {
                opportunities.push(Opportunity {
                    row_axis: matrix.row_axis,
                    column_axis: matrix.column_axis,
                    row: cell.row.clone(),
                    column: cell.column.clone(),
                    count: cell.count,
                    row_demand,
                    column_demand,
                    score,
                });
            }
        }
    }

    opportunities.sort_by(Opportunity::rank);
    info!("Found {} opportunities across {} matrices", opportunities.len(), matrices.len());
    opportunities
}
