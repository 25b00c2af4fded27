//! Core error types for timebank-core.
//!
//! This module defines a comprehensive error hierarchy using thiserror
//! for better error handling and reporting across the library.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for timebank-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Entry store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Calculation errors
    #[error("Calculation error: {0}")]
    Calculation(#[from] CalculationError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Entry store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Entry failed validation before write
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Write lock still contended after all retries
    #[error("Write lock exhausted after {attempts} attempts")]
    LockExhausted { attempts: u32 },

    /// Persisting a storage key failed
    #[error("Failed to persist '{key}': {source}")]
    Persist {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Serializing store state failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Hours must be finite and positive
    #[error("Invalid hours value: {value}")]
    InvalidHours { value: f64 },

    /// Date string could not be parsed
    #[error("Invalid date: {input}")]
    InvalidDate { input: String },

    /// A required field was empty
    #[error("Missing required field: {field}")]
    MissingField { field: String },
}

/// Calculation errors.
#[derive(Error, Debug)]
pub enum CalculationError {
    /// No work schedule configured for the user
    #[error("No work schedule configured")]
    MissingSchedule,

    /// Schedule produced an invalid day interval
    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    /// Entry carries a non-finite hours value
    #[error("Entry '{entry_id}' has invalid hours: {value}")]
    InvalidHours { entry_id: String, value: f64 },
}

/// Work schedule errors.
#[derive(Error, Debug)]
pub enum ScheduleError {
    /// Day interval end precedes start
    #[error("Invalid day interval: end ({end}) must be after start ({start})")]
    InvalidInterval {
        start: chrono::NaiveTime,
        end: chrono::NaiveTime,
    },

    /// Weekday index outside 0..=6
    #[error("Invalid weekday index: {index} (expected 0 = Monday .. 6 = Sunday)")]
    InvalidWeekday { index: u8 },

    /// Rotation week index outside 0..=1
    #[error("Invalid rotation week: {index} (expected 0 or 1)")]
    InvalidWeek { index: usize },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
