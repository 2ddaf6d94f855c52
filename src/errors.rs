//! Unified error types and result handling for the datagroup store.

use thiserror::Error;

/// Every failure the crate can report.
///
/// Lookups by id that find nothing are *not* errors for the lenient store
/// operations; only the `*_checked` variants surface the `*NotFound` cases.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Error bubbled up from `SeaORM`
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Position or count did not fit the target integer type
    #[error("Integer conversion error: {0}")]
    IntConversion(#[from] std::num::TryFromIntError),

    /// No datagroup carries this id
    #[error("Datagroup not found: {id}")]
    DatagroupNotFound {
        /// The id that was looked up
        id: i64,
    },

    /// No dataset carries this id
    #[error("Dataset not found: {id}")]
    DatasetNotFound {
        /// The id that was looked up
        id: i64,
    },

    /// A datagroup with this id already exists
    #[error("Datagroup id {id} is already in use")]
    DuplicateDatagroupId {
        /// The colliding id
        id: i64,
    },

    /// A dataset with this id already exists somewhere in the store
    #[error("Dataset id {id} is already in use")]
    DuplicateDatasetId {
        /// The colliding id
        id: i64,
    },

    /// Plain delete of a group that still owns datasets
    #[error("Datagroup {id} still contains {datasets} dataset(s)")]
    DatagroupNotEmpty {
        /// Group id
        id: i64,
        /// Number of datasets still owned by the group
        datasets: usize,
    },

    /// NaN or infinite amount
    #[error("Invalid amount for {field}: {amount}")]
    InvalidAmount {
        /// Field the amount was destined for
        field: &'static str,
        /// The rejected value
        amount: f64,
    },

    /// Structural invariant would be broken
    #[error("Validation error: {message}")]
    Validation {
        /// Description of the violated invariant
        message: String,
    },

    /// Text code that does not map to a known enum value
    #[error("Invalid value for {field}: {value:?}")]
    InvalidValue {
        /// Field being parsed
        field: &'static str,
        /// Offending text
        value: String,
    },
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
