//! Request types crossing the boundary with the upstream agent shell.
//!
//! The shell generates tool schemas from these types, fills them from the
//! conversation and receives a single formatted string back; nothing else
//! crosses the boundary.

use crate::error::Result;
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// JSON Schema of one request type, serialized for the shell's tool
/// definitions.
pub fn schema_as_json<T: JsonSchema>() -> Result<String> {
    let schema = schemars::gen::SchemaGenerator::default().into_root_schema_for::<T>();
    Ok(serde_json::to_string_pretty(&schema)?)
}

/// Parameters accepted by every KPI computation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct KpiRequest {
    #[schemars(description = "Column name for a categorical filter (e.g. 'onibus', 'empresa')")]
    pub filter_column: Option<String>,

    #[schemars(description = "Value for the categorical filter (e.g. 'b 1151', 'Leblon')")]
    pub filter_value: Option<String>,

    #[schemars(description = "Start date (YYYY-MM-DD). For whole months always use day 01.")]
    pub start_date: Option<NaiveDate>,

    #[schemars(
        description = "End date (YYYY-MM-DD). For whole months use the LAST day of the month (28, 30 or 31)."
    )]
    pub end_date: Option<NaiveDate>,
}

impl KpiRequest {
    /// Request covering a date range with no categorical filter.
    pub fn period(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start_date: Some(start),
            end_date: Some(end),
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter_column = Some(column.into());
        self.filter_value = Some(value.into());
        self
    }
}

/// Parameters for a period-over-period comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EvolutionRequest {
    #[schemars(description = "Indicator name (e.g. 'ICMQ', 'IDF', 'KmFalhas')")]
    pub indicator: String,

    #[schemars(description = "Column name for a categorical filter (e.g. 'onibus')")]
    pub filter_column: Option<String>,

    #[schemars(description = "Value for the categorical filter (e.g. '1234')")]
    pub filter_value: Option<String>,

    #[schemars(description = "Current period start date (YYYY-MM-DD)")]
    pub current_start: NaiveDate,

    #[schemars(description = "Current period end date (YYYY-MM-DD)")]
    pub current_end: NaiveDate,

    #[schemars(description = "Previous period start date (YYYY-MM-DD)")]
    pub previous_start: NaiveDate,

    #[schemars(description = "Previous period end date (YYYY-MM-DD)")]
    pub previous_end: NaiveDate,
}

/// Parameters for a month-by-month breakdown of one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MonthlyRequest {
    #[schemars(description = "Indicator name (e.g. 'ICMQ', 'IDF')")]
    pub indicator: String,

    #[schemars(description = "Year to analyse (e.g. 2024)")]
    pub year: i32,

    #[schemars(description = "Column name for a categorical filter (e.g. 'onibus')")]
    pub filter_column: Option<String>,

    #[schemars(description = "Value for the categorical filter (e.g. '1234')")]
    pub filter_value: Option<String>,
}

/// Parameters for an official goal lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GoalRequest {
    #[schemars(description = "Indicator symbol (e.g. 'ICMQ', 'IDF')")]
    pub indicator: String,

    #[schemars(description = "Company name (e.g. 'Leblon', 'Nobel', 'São Bento')")]
    pub company: String,

    #[schemars(
        description = "Reference date for the goal (YYYY-MM-DD, always use day 01 of the month)"
    )]
    pub reference_date: NaiveDate,
}
