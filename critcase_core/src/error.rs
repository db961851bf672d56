//! Error types for the critcase_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for critcase_core operations
///
/// Wrong treatment steps are not errors: they are scored outcomes returned
/// by [`crate::GameEngine::apply_treatment`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catalog validation error
    #[error("Catalog validation error: {0}")]
    CatalogValidation(String),

    /// Requested case id is not in the catalog
    #[error("Unknown case: {0}")]
    UnknownCase(String),

    /// Player input rejected before touching game state
    #[error("Validation error: {0}")]
    Validation(String),

    /// Reflection submitted while no failure is awaiting acknowledgement
    #[error("No failure is awaiting acknowledgement")]
    NothingToAcknowledge,

    /// Engine called outside the phase it supports (programmer error)
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// Leaderboard collaborator error
    #[error("Leaderboard error: {0}")]
    Leaderboard(String),

    /// Feedback collaborator error
    #[error("Feedback error: {0}")]
    Feedback(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
