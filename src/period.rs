//! Date-range filtering over heterogeneously formatted date columns.

use crate::table::Table;
use crate::text::normalize;
use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, warn};

/// Canonical date column per logical table.
const DATE_COLUMNS: [(&str, &str); 6] = [
    ("INDMANTMANUAL", "DtMovimento"),
    ("CTM", "DtGasto"),
    ("MANT001", "DtOcorrencia"),
    ("MANT002", "DtManutencao"),
    ("MANT004", "DataSaida"),
    ("IND003", "DtOperacao"),
];

fn mapped_date_column(logical: &str) -> Option<&'static str> {
    DATE_COLUMNS
        .iter()
        .find(|(table, _)| *table == logical)
        .map(|(_, column)| *column)
}

/// Resolves the date column of a table: mapped name first (flexible match
/// against the actual schema), otherwise any column containing "data" or
/// "dt".
pub fn resolve_date_column(table: &Table, logical: &str) -> Option<String> {
    match mapped_date_column(logical) {
        Some(mapped) => table.find_column(mapped),
        None => table
            .columns
            .iter()
            .find(|c| {
                let n = normalize(c);
                n.contains("data") || n.contains("dt")
            })
            .cloned(),
    }
}

const MONTH_FIRST_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y",
];

const DAY_FIRST_FORMATS: [&str; 4] = [
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d/%m/%y",
];

fn parse_with(formats: &[&str], raw: &str) -> Option<NaiveDateTime> {
    for format in formats {
        if format.contains("%H") {
            if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(dt);
            }
        } else if let Ok(d) = NaiveDate::parse_from_str(raw, format) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }
    None
}

/// Parses one date string: common month-first layouts, then a day-first
/// retry to recover ambiguous D/M/Y values.
pub fn parse_date_value(raw: &str) -> Option<NaiveDateTime> {
    parse_with(&MONTH_FIRST_FORMATS, raw).or_else(|| parse_with(&DAY_FIRST_FORMATS, raw))
}

/// Restricts a table to rows whose date falls inside the inclusive range.
///
/// Filtering is best-effort: with no bounds the input is returned
/// unchanged, an unresolvable date column returns the unfiltered table
/// with a warning suffix, and rows whose date cannot be parsed are dropped
/// from consideration. The returned suffix describes the applied bounds
/// and states explicitly when zero rows matched.
pub fn filter_by_period(
    table: &Table,
    logical: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> (Table, String) {
    if start.is_none() && end.is_none() {
        return (table.clone(), String::new());
    }

    let Some(date_column) = resolve_date_column(table, logical) else {
        warn!("date column not found for {}", logical);
        return (table.clone(), " (date column not found)".to_string());
    };
    let Some(idx) = table.column_index(&date_column) else {
        return (table.clone(), " (date column not found)".to_string());
    };

    let start_bound = start.map(|d| d.and_time(NaiveTime::MIN));
    // End bound is inclusive through the last second of that day.
    let end_bound = end.and_then(|d| d.and_hms_opt(23, 59, 59));

    let mut bounds = String::new();
    if let Some(d) = start {
        bounds.push_str(&format!(" >= {}", d));
    }
    if let Some(d) = end {
        bounds.push_str(&format!(" <= {}", d));
    }

    let keep: Vec<usize> = table
        .rows
        .iter()
        .enumerate()
        .filter_map(|(i, row)| {
            let raw = row[idx].to_string();
            let parsed = parse_date_value(raw.trim())?;
            let after_start = start_bound.map_or(true, |s| parsed >= s);
            let before_end = end_bound.map_or(true, |e| parsed <= e);
            (after_start && before_end).then_some(i)
        })
        .collect();

    let filtered = table.retain_rows(&keep);
    debug!(
        "period filter ({}): {} -> {} rows",
        date_column,
        table.len(),
        filtered.len()
    );

    if filtered.is_empty() {
        let suffix = format!(" (0 rows matched{})", bounds);
        return (filtered, suffix);
    }
    (filtered, format!(" (date range:{})", bounds))
}

pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .unwrap()
        .checked_sub_days(Days::new(1))
        .unwrap()
}

/// Inclusive first/last day of a calendar month.
pub fn month_bounds(year: i32, month: u32) -> (NaiveDate, NaiveDate) {
    (
        NaiveDate::from_ymd_opt(year, month, 1).unwrap(),
        last_day_of_month(year, month),
    )
}

/// True when two dates fall in the same calendar month of the same year.
pub fn same_month(a: NaiveDateTime, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    fn dated_table(values: &[&str]) -> Table {
        let mut table = Table::new("CTM", vec!["dtgasto".to_string(), "valorgasto".to_string()]);
        table.rows = values
            .iter()
            .map(|v| vec![Cell::Text(v.to_string()), Cell::Real(1.0)])
            .collect();
        table
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_no_bounds_is_identity() {
        let table = dated_table(&["2024-01-10", "garbage"]);
        let (filtered, suffix) = filter_by_period(&table, "CTM", None, None);
        assert_eq!(filtered.len(), table.len());
        assert!(suffix.is_empty());
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let table = dated_table(&["2024-01-01", "2024-01-15", "2024-01-31", "2024-02-01"]);
        let (filtered, _) =
            filter_by_period(&table, "CTM", Some(day(2024, 1, 1)), Some(day(2024, 1, 31)));
        assert_eq!(filtered.len(), 3);
    }

    #[test]
    fn test_end_of_day_keeps_timestamps() {
        let table = dated_table(&["2024-01-31 18:45:00", "2024-02-01 00:00:01"]);
        let (filtered, _) =
            filter_by_period(&table, "CTM", Some(day(2024, 1, 1)), Some(day(2024, 1, 31)));
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn test_day_first_recovery() {
        // 25/01/2024 fails the month-first pass and is recovered day-first.
        let table = dated_table(&["25/01/2024", "2024-01-10"]);
        let (filtered, _) =
            filter_by_period(&table, "CTM", Some(day(2024, 1, 1)), Some(day(2024, 1, 31)));
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn test_unparsable_rows_are_dropped() {
        let table = dated_table(&["2024-01-10", "not a date", ""]);
        let (filtered, suffix) =
            filter_by_period(&table, "CTM", Some(day(2024, 1, 1)), Some(day(2024, 1, 31)));
        assert_eq!(filtered.len(), 1);
        assert!(suffix.contains("date range"));
    }

    #[test]
    fn test_zero_rows_suffix() {
        let table = dated_table(&["2024-01-10"]);
        let (filtered, suffix) =
            filter_by_period(&table, "CTM", Some(day(2025, 1, 1)), Some(day(2025, 1, 31)));
        assert!(filtered.is_empty());
        assert!(suffix.contains("0 rows matched"));
        assert!(suffix.contains(">= 2025-01-01"));
        assert!(suffix.contains("<= 2025-01-31"));
    }

    #[test]
    fn test_missing_date_column_is_best_effort() {
        let mut table = Table::new("UNKNOWN", vec!["valor".to_string()]);
        table.rows = vec![vec![Cell::Real(1.0)]];
        let (filtered, suffix) =
            filter_by_period(&table, "UNKNOWN", Some(day(2024, 1, 1)), None);
        assert_eq!(filtered.len(), 1);
        assert!(suffix.contains("date column not found"));
    }

    #[test]
    fn test_heuristic_date_column_for_unmapped_table() {
        let mut table = Table::new("X", vec!["id".to_string(), "datalancamento".to_string()]);
        table.rows = vec![
            vec![Cell::Integer(1), Cell::Text("2024-03-05".to_string())],
            vec![Cell::Integer(2), Cell::Text("2024-04-05".to_string())],
        ];
        let (filtered, _) =
            filter_by_period(&table, "X", Some(day(2024, 3, 1)), Some(day(2024, 3, 31)));
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn test_mapped_column_resolved_flexibly() {
        // Accented real column still resolves against the mapped name.
        let mut table = Table::new(
            "MANT001",
            vec!["dtocorrência".to_string(), "oiddocumento".to_string()],
        );
        table.rows = vec![vec![
            Cell::Text("2024-01-10".to_string()),
            Cell::Integer(1),
        ]];
        assert_eq!(
            resolve_date_column(&table, "MANT001"),
            Some("dtocorrência".to_string())
        );
    }

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(last_day_of_month(2023, 2), day(2023, 2, 28));
        assert_eq!(last_day_of_month(2024, 2), day(2024, 2, 29));
        assert_eq!(last_day_of_month(2024, 12), day(2024, 12, 31));
    }

    #[test]
    fn test_month_bounds() {
        assert_eq!(month_bounds(2024, 2), (day(2024, 2, 1), day(2024, 2, 29)));
    }
}
