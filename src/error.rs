//! Error types for the binaural session backend.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// The schedule service could not be reached or returned a failure status
    #[error("schedule request failed: {0}")]
    ScheduleRequest(String),

    /// The platform audio output could not be acquired
    #[error("audio output unavailable: {0}")]
    AudioUnavailable(String),

    /// The schedule failed validation and was rejected before use
    #[error("malformed schedule: {0}")]
    MalformedSchedule(String),

    /// No step's timestamp has been reached at the given elapsed time
    #[error("no active step at {elapsed_sec}s")]
    NoActiveStep { elapsed_sec: f64 },

    /// Configuration file errors
    #[error("configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using the crate Error.
pub type Result<T> = std::result::Result<T, Error>;
