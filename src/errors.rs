// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClockdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid trigger for task '{task}': {reason}")]
    InvalidTrigger { task: String, reason: String },

    #[error("Invalid step in task '{task}': {reason}")]
    InvalidStep { task: String, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cycle detected in DAG: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClockdagError {
    /// Errors that mean the configuration itself is unusable.
    ///
    /// These are fatal at load time: the scheduler never starts with them.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ClockdagError::ConfigError(_)
                | ClockdagError::InvalidTrigger { .. }
                | ClockdagError::InvalidStep { .. }
                | ClockdagError::DagCycle(_)
                | ClockdagError::TomlError(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ClockdagError>;
