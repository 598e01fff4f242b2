//! # Fleet KPI
//!
//! A library for answering fleet-maintenance KPI questions over a
//! relational schema with inconsistent naming (accents, casing, synonyms).
//!
//! ## Core Concepts
//!
//! - **Schema resolution**: table, column and value references are matched
//!   fuzzily against the real schema after accent/case normalization
//! - **Period filtering**: inclusive date ranges over columns holding
//!   heterogeneous date formats (ISO and day-first)
//! - **KPI catalog**: ~20 registered metrics, each with a formula and a
//!   fixed direction of improvement
//! - **Derived analyses**: period-over-period evolution, month-by-month
//!   breakdowns and the INDOA composite score
//!
//! The engine is driven by an upstream agent shell that fills the request
//! types in [`schema`] and relays the returned string to the end user.
//! Every public operation is total: it always returns a string, never
//! panics or propagates an error.
//!
//! ## Example
//!
//! ```rust,ignore
//! use fleet_kpi::{KpiEngine, KpiRequest};
//! use chrono::NaiveDate;
//!
//! let mut engine = KpiEngine::open("fleet.db")?;
//! let answer = engine.compute(
//!     "ICMQ",
//!     &KpiRequest::period(
//!         NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!         NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
//!     ),
//! );
//! println!("{}", answer);
//! ```

pub mod catalog;
pub mod error;
pub mod evolution;
pub mod goals;
pub mod period;
pub mod schema;
pub mod store;
pub mod table;
pub mod text;

pub use catalog::{compute, Direction, KpiOutcome, KpiSymbol};
pub use error::{FleetKpiError, Result};
pub use evolution::{classify_change, Verdict};
pub use schema::{schema_as_json, EvolutionRequest, GoalRequest, KpiRequest, MonthlyRequest};
pub use store::{SqliteStore, TableCache, TableStore};
pub use table::{filter_by_value, Cell, Table, ValueFilter};
pub use text::{extract_number, normalize};

use log::{error, info};
use std::path::Path;

/// The engine owns the table cache and exposes the operations the agent
/// shell calls. `&mut self` access keeps the cache single-consumer.
pub struct KpiEngine {
    cache: TableCache,
}

impl KpiEngine {
    pub fn new(store: Box<dyn TableStore>) -> Self {
        Self {
            cache: TableCache::new(store),
        }
    }

    /// Engine over a SQLite database file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Box::new(SqliteStore::open(path)?)))
    }

    /// Computes one KPI by (fuzzily resolved) name.
    pub fn compute(&mut self, indicator: &str, req: &KpiRequest) -> String {
        match KpiSymbol::resolve(indicator) {
            Some(symbol) => self.compute_symbol(symbol, req),
            None => {
                info!("unknown indicator requested: '{}'", indicator);
                FleetKpiError::UnknownIndicator(indicator.to_string()).to_string()
            }
        }
    }

    /// Computes one KPI for a known symbol.
    pub fn compute_symbol(&mut self, symbol: KpiSymbol, req: &KpiRequest) -> String {
        catalog::compute(&mut self.cache, symbol, req).message
    }

    /// Computes one KPI and returns the structured outcome (value plus
    /// message) for shells that want the number without re-parsing prose.
    pub fn compute_outcome(&mut self, symbol: KpiSymbol, req: &KpiRequest) -> KpiOutcome {
        catalog::compute(&mut self.cache, symbol, req)
    }

    /// Compares one indicator between two periods.
    pub fn evolution(&mut self, req: &EvolutionRequest) -> String {
        evolution::evolution(&mut self.cache, req).unwrap_or_else(|e| {
            error!("evolution analysis failed: {}", e);
            e.to_string()
        })
    }

    /// Computes one indicator for every month of a year.
    pub fn monthly_breakdown(&mut self, req: &MonthlyRequest) -> String {
        evolution::monthly_breakdown(&mut self.cache, req).unwrap_or_else(|e| {
            error!("monthly breakdown failed: {}", e);
            e.to_string()
        })
    }

    /// Looks up the official goal of an indicator for a company and month.
    pub fn goal(&mut self, req: &GoalRequest) -> String {
        goals::goal_message(
            &mut self.cache,
            &req.indicator,
            &req.company,
            req.reference_date,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_engine() -> KpiEngine {
        KpiEngine::new(Box::new(SqliteStore::in_memory().unwrap()))
    }

    #[test]
    fn test_unknown_indicator_is_a_message_not_a_panic() {
        let mut engine = empty_engine();
        let answer = engine.compute("does not exist", &KpiRequest::default());
        assert!(answer.contains("not configured"));
    }

    #[test]
    fn test_missing_tables_degrade_to_messages() {
        let mut engine = empty_engine();
        let answer = engine.compute("ICMQ", &KpiRequest::default());
        assert!(answer.contains("not found"));
    }
}
