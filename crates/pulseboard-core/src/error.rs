use thiserror::Error;

/// Errors raised while loading, filtering and aggregating an event table.
///
/// `MissingColumn` and `EmptyDataset` are fatal to a load. `UnavailableDimension`
/// only affects the one breakdown that needed the column; dashboard assembly
/// turns it into an unavailable section.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("required column `{column}` is missing")]
    MissingColumn { column: String },

    #[error("no rows with a valid timestamp")]
    EmptyDataset,

    #[error("column `{dimension}` is not available for {breakdown}")]
    UnavailableDimension {
        dimension: String,
        breakdown: &'static str,
    },

    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    #[error("invalid dashboard config: {0}")]
    InvalidConfig(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
