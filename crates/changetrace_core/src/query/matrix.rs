//! Dense traceability matrix materialized from the sparse trace graph.
//!
//! Cells with no stored link carry a `RelationshipType::None` link so a
//! renderer never has to special-case holes.

use crate::model::trace::TraceLink;
use crate::repo::trace_graph::TraceGraph;
use serde::Serialize;

/// One matrix cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceCell {
    pub row_id: String,
    pub column_id: String,
    /// Stored link in either direction, or an absence marker `row -> column`.
    pub link: TraceLink,
}

impl TraceCell {
    pub fn is_linked(&self) -> bool {
        self.link.relationship_type.is_present()
    }

    /// Whether the stored link points from the column to the row.
    pub fn is_reversed(&self) -> bool {
        self.is_linked() && self.link.source_id == self.column_id
    }
}

/// Row-major matrix of row artifacts against column artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceMatrix {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    cells: Vec<TraceCell>,
}

impl TraceMatrix {
    /// Builds the matrix from one graph snapshot.
    ///
    /// A `row -> column` link wins over a `column -> row` link when both exist.
    pub fn build(graph: &TraceGraph, rows: Vec<String>, columns: Vec<String>) -> Self {
        let mut cells = Vec::with_capacity(rows.len() * columns.len());
        for row in &rows {
            for column in &columns {
                let link = graph
                    .link(row, column)
                    .or_else(|| graph.link(column, row))
                    .cloned()
                    .unwrap_or_else(|| TraceLink::absent(row.as_str(), column.as_str()));
                cells.push(TraceCell {
                    row_id: row.clone(),
                    column_id: column.clone(),
                    link,
                });
            }
        }
        Self {
            rows,
            columns,
            cells,
        }
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&TraceCell> {
        if row >= self.rows.len() || column >= self.columns.len() {
            return None;
        }
        self.cells.get(row * self.columns.len() + column)
    }

    pub fn row(&self, row: usize) -> &[TraceCell] {
        let width = self.columns.len();
        let start = (row * width).min(self.cells.len());
        let end = (start + width).min(self.cells.len());
        &self.cells[start..end]
    }

    pub fn cells(&self) -> &[TraceCell] {
        &self.cells
    }

    pub fn linked_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_linked()).count()
    }
}
