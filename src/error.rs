use thiserror::Error;

#[derive(Error, Debug)]
pub enum FleetKpiError {
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Required columns not found in {table}: {details}")]
    ColumnsNotFound { table: String, details: String },

    #[error("Indicator '{0}' is not configured for analysis")]
    UnknownIndicator(String),

    #[error("Goal not found for {company} in {month}")]
    GoalNotFound { company: String, month: String },

    #[error("Indicator {0} not present in the goals table")]
    IndicatorNotInGoals(String),

    #[error("Could not extract a numeric value from '{0}'")]
    NumericExtraction(String),

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FleetKpiError>;
