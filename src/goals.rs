//! Official per-company monthly goal lookup.

use crate::error::{FleetKpiError, Result};
use crate::period::{parse_date_value, same_month};
use crate::store::TableCache;
use crate::text::extract_number;
use chrono::NaiveDate;
use log::debug;

const GOALS_TABLE: &str = "METAS_INDICADORES";

/// Resolves the numeric target of an indicator for a company in the
/// calendar month of the reference date. The first matching row wins.
pub fn lookup_goal(
    cache: &mut TableCache,
    indicator: &str,
    company: &str,
    reference: NaiveDate,
) -> Result<f64> {
    let table = cache
        .load(GOALS_TABLE)
        .ok_or_else(|| FleetKpiError::TableNotFound(GOALS_TABLE.to_string()))?;

    let company_idx = table
        .column_index("empresa")
        .ok_or_else(|| FleetKpiError::ColumnsNotFound {
            table: table.name.clone(),
            details: "empresa".to_string(),
        })?;
    let date_idx = table
        .column_index("data")
        .ok_or_else(|| FleetKpiError::ColumnsNotFound {
            table: table.name.clone(),
            details: "data".to_string(),
        })?;

    let wanted_company = company.to_lowercase();
    let row = table
        .rows
        .iter()
        .find(|row| {
            if row[company_idx].to_string().to_lowercase() != wanted_company {
                return false;
            }
            let raw = row[date_idx].to_string();
            match parse_date_value(raw.trim()) {
                Some(parsed) => same_month(parsed, reference),
                None => false,
            }
        })
        .ok_or_else(|| FleetKpiError::GoalNotFound {
            company: company.to_string(),
            month: reference.format("%m/%Y").to_string(),
        })?;

    let indicator_column = table
        .find_column(&indicator.to_uppercase())
        .ok_or_else(|| FleetKpiError::IndicatorNotInGoals(indicator.to_string()))?;
    let indicator_idx = table
        .column_index(&indicator_column)
        .ok_or_else(|| FleetKpiError::IndicatorNotInGoals(indicator.to_string()))?;

    let cell = &row[indicator_idx];
    // Goals entered as text sometimes carry a Brazilian decimal comma.
    let value = cell
        .as_f64()
        .or_else(|| extract_number(&cell.to_string()))
        .ok_or_else(|| FleetKpiError::NumericExtraction(cell.to_string()))?;
    debug!(
        "goal for {} / {} in {}: {}",
        indicator,
        company,
        reference.format("%m/%Y"),
        value
    );
    Ok(value)
}

/// Message-producing wrapper used at the engine boundary.
pub fn goal_message(
    cache: &mut TableCache,
    indicator: &str,
    company: &str,
    reference: NaiveDate,
) -> String {
    match lookup_goal(cache, indicator, company, reference) {
        Ok(value) => format!(
            "The {} goal for {} in {} is {}.",
            indicator,
            company,
            reference.format("%m/%Y"),
            value
        ),
        Err(e) => e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    fn seeded_cache() -> TableCache {
        let store = SqliteStore::in_memory().unwrap();
        store
            .connection()
            .execute_batch(
                "CREATE TABLE METAS_INDICADORES (Empresa TEXT, Data TEXT, ICMQ REAL, OEMCP REAL, QETT TEXT);
                 INSERT INTO METAS_INDICADORES VALUES
                   ('Leblon', '2024-01-01', 5.2, 3.0, '1.200,5'),
                   ('Leblon', '2024-02-01', 4.9, 2.0, '1.100,0'),
                   ('Nobel', '2024-01-01', 6.0, 4.0, '900,0');",
            )
            .unwrap();
        TableCache::new(Box::new(store))
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_goal_lookup_by_company_and_month() {
        let mut cache = seeded_cache();
        let goal = lookup_goal(&mut cache, "ICMQ", "Leblon", day(2024, 1, 1)).unwrap();
        assert_eq!(goal, 5.2);
        let goal = lookup_goal(&mut cache, "ICMQ", "Leblon", day(2024, 2, 15)).unwrap();
        assert_eq!(goal, 4.9);
        let goal = lookup_goal(&mut cache, "ICMQ", "Nobel", day(2024, 1, 1)).unwrap();
        assert_eq!(goal, 6.0);
    }

    #[test]
    fn test_goal_company_match_is_case_insensitive() {
        let mut cache = seeded_cache();
        let goal = lookup_goal(&mut cache, "oemcp", "LEBLON", day(2024, 1, 1)).unwrap();
        assert_eq!(goal, 3.0);
    }

    #[test]
    fn test_goal_text_values_use_extraction() {
        let mut cache = seeded_cache();
        let goal = lookup_goal(&mut cache, "QETT", "Leblon", day(2024, 1, 1)).unwrap();
        assert_eq!(goal, 1200.5);
    }

    #[test]
    fn test_goal_not_found_variants() {
        let mut cache = seeded_cache();
        let err = lookup_goal(&mut cache, "ICMQ", "Leblon", day(2025, 1, 1)).unwrap_err();
        assert!(matches!(err, FleetKpiError::GoalNotFound { .. }));

        let err = lookup_goal(&mut cache, "IDF", "Leblon", day(2024, 1, 1)).unwrap_err();
        assert!(matches!(err, FleetKpiError::IndicatorNotInGoals(_)));
    }

    #[test]
    fn test_goal_message_formats() {
        let mut cache = seeded_cache();
        let message = goal_message(&mut cache, "ICMQ", "Leblon", day(2024, 1, 1));
        assert_eq!(message, "The ICMQ goal for Leblon in 01/2024 is 5.2.");

        let message = goal_message(&mut cache, "ICMQ", "Pavuna", day(2024, 1, 1));
        assert!(message.contains("Goal not found for Pavuna in 01/2024"));
    }
}
