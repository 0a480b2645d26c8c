//! Domain error types.
//!
//! Query and asset failures are typed so the command dispatcher can tell a
//! "not found" request apart from a degraded environment or an unexpected
//! failure. Everything else travels as `anyhow::Error`.

use std::time::Duration;
use thiserror::Error;

/// A request referenced something that does not exist in the loaded tables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// A condition identifier is not a column of the table.
    #[error("The column '{column}' does not exist in {table}.")]
    MissingColumn { table: String, column: String },

    /// A compartment label is not present in the annotation table.
    #[error("The compartment '{0}' was not found.")]
    MissingCompartment(String),
}

/// An external asset the session depends on is unavailable.
#[derive(Debug, Error)]
pub enum AssetError {
    /// The SQLite database file does not exist.
    #[error("database not found at {0}")]
    DatabaseMissing(String),

    /// The downloadable archive does not exist.
    #[error("archive not found at {0}")]
    ArchiveMissing(String),

    /// The archive is still being read in the background.
    #[error("archive is not ready yet (waited {0:?})")]
    ArchiveNotReady(Duration),

    /// The background read failed.
    #[error("archive could not be read: {0}")]
    ArchiveUnreadable(String),
}
