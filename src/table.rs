//! In-memory tabular data and the fuzzy column/value resolver.

use crate::text::normalize;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A single cell, mirroring the backing store's storage classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Numeric view of the cell. Text is parsed after trimming; anything
    /// that is not a number yields `None` and callers decide the coercion.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Integer(v) => Some(*v as f64),
            Cell::Real(v) => Some(*v),
            Cell::Text(s) => s.trim().parse().ok(),
            Cell::Null => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Integer(v) => write!(f, "{}", v),
            Cell::Real(v) => write!(f, "{}", v),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

/// A fully loaded table: real backing-store name, lower-cased column names
/// and row-major cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// All columns whose normalized name contains the normalized search
    /// term, in schema discovery order.
    pub fn matching_columns(&self, term: &str) -> Vec<String> {
        let needle = normalize(term);
        self.columns
            .iter()
            .filter(|c| normalize(c).contains(&needle))
            .cloned()
            .collect()
    }

    /// First column containing the term, by discovery order.
    pub fn first_matching_column(&self, term: &str) -> Option<String> {
        self.matching_columns(term).into_iter().next()
    }

    /// Flexible lookup used for mapped names: a normalized exact match wins
    /// over the first substring match.
    pub fn find_column(&self, term: &str) -> Option<String> {
        let needle = normalize(term);
        self.columns
            .iter()
            .find(|c| normalize(c) == needle)
            .or_else(|| self.columns.iter().find(|c| normalize(c).contains(&needle)))
            .cloned()
    }

    /// New table holding clones of the rows at the given indices.
    pub fn retain_rows(&self, keep: &[usize]) -> Table {
        Table {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows: keep.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// Sums a column numerically; cells that do not parse count as zero so
    /// aggregates stay well-defined over dirty data.
    pub fn sum_numeric(&self, column: &str) -> f64 {
        let Some(idx) = self.column_index(column) else {
            return 0.0;
        };
        self.rows
            .iter()
            .map(|row| row[idx].as_f64().unwrap_or(0.0))
            .sum()
    }

    /// Number of distinct non-null values in a column, compared by their
    /// string form.
    pub fn distinct_count(&self, column: &str) -> usize {
        let Some(idx) = self.column_index(column) else {
            return 0;
        };
        let mut seen = HashSet::new();
        for row in &self.rows {
            if !row[idx].is_null() {
                seen.insert(row[idx].to_string());
            }
        }
        seen.len()
    }
}

/// Outcome of a value filter. An empty table is a successful filter that
/// matched zero rows, which callers must keep distinct from "no such
/// filterable column".
#[derive(Debug, Clone)]
pub enum ValueFilter {
    Matched { table: Table, column: String },
    Empty(Table),
    NoColumn,
}

/// Filters rows where some column matching `term` equals `value` after
/// trimming and lower-casing both sides. Candidate columns are tried in
/// discovery order and the first one producing at least one row wins.
pub fn filter_by_value(table: &Table, term: &str, value: &str) -> ValueFilter {
    let wanted = value.trim().to_lowercase();
    let candidates = table.matching_columns(term);
    if candidates.is_empty() {
        return ValueFilter::NoColumn;
    }
    debug!("candidate columns for '{}': {:?}", term, candidates);

    for candidate in &candidates {
        let idx = match table.column_index(candidate) {
            Some(idx) => idx,
            None => continue,
        };
        let keep: Vec<usize> = table
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row[idx].to_string().trim().to_lowercase() == wanted)
            .map(|(i, _)| i)
            .collect();
        if !keep.is_empty() {
            debug!("filtered by column '{}': {} rows", candidate, keep.len());
            return ValueFilter::Matched {
                table: table.retain_rows(&keep),
                column: candidate.clone(),
            };
        }
    }

    ValueFilter::Empty(table.retain_rows(&[]))
}
