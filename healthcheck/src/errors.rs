//! Error types for local failures
//!
//! Remote misbehaviour never surfaces here: checkers turn it into result
//! fields. These types cover what the local process itself can get wrong
//! (unreadable config, corrupt state, undeliverable notifications).

use std::fmt;

/// Main error type for the health checker
#[derive(Debug)]
pub enum MonitorError {
    /// Configuration-related errors
    Config(ConfigError),

    /// Alarm state or report persistence errors
    State(StateError),

    /// Notification delivery errors
    Notify(NotifyError),
}

/// Configuration error variants
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to load configuration file
    LoadFailed { path: String, reason: String },

    /// Invalid configuration value
    InvalidValue { field: String, reason: String },

    /// Missing required configuration
    MissingRequired { field: String },

    /// Configuration parsing error
    ParseError { reason: String },
}

/// Persistence error variants
#[derive(Debug)]
pub enum StateError {
    /// Reading a stored blob failed
    ReadFailed { key: String, reason: String },

    /// Writing a blob failed
    WriteFailed { key: String, reason: String },

    /// Stored bytes could not be decoded
    Corrupt { reason: String },

    /// Encoding state for storage failed
    SerializationError { reason: String },
}

/// Notification error variants
#[derive(Debug)]
pub enum NotifyError {
    /// Alert text lacks the "<title>: <body>" shape
    InvalidMessage { message: String },

    /// The request never completed
    RequestFailed { reason: String },

    /// The chat API answered with a non-success status
    Rejected { status: u16, body: String },
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::Config(e) => write!(f, "Configuration error: {}", e),
            MonitorError::State(e) => write!(f, "State error: {}", e),
            MonitorError::Notify(e) => write!(f, "Notification error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::LoadFailed { path, reason } => {
                write!(f, "Failed to load config from '{}': {}", path, reason)
            }
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
            ConfigError::MissingRequired { field } => {
                write!(f, "Missing required field: {}", field)
            }
            ConfigError::ParseError { reason } => {
                write!(f, "Failed to parse config: {}", reason)
            }
        }
    }
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::ReadFailed { key, reason } => {
                write!(f, "Failed to read '{}': {}", key, reason)
            }
            StateError::WriteFailed { key, reason } => {
                write!(f, "Failed to write '{}': {}", key, reason)
            }
            StateError::Corrupt { reason } => {
                write!(f, "Stored state is corrupt: {}", reason)
            }
            StateError::SerializationError { reason } => {
                write!(f, "Serialization error: {}", reason)
            }
        }
    }
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyError::InvalidMessage { message } => {
                write!(f, "Invalid alert message format: '{}'", message)
            }
            NotifyError::RequestFailed { reason } => {
                write!(f, "Notification request failed: {}", reason)
            }
            NotifyError::Rejected { status, body } => {
                write!(f, "Notification rejected with status {}: {}", status, body)
            }
        }
    }
}

impl std::error::Error for MonitorError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for StateError {}
impl std::error::Error for NotifyError {}

impl From<ConfigError> for MonitorError {
    fn from(err: ConfigError) -> Self {
        MonitorError::Config(err)
    }
}

impl From<StateError> for MonitorError {
    fn from(err: StateError) -> Self {
        MonitorError::State(err)
    }
}

impl From<NotifyError> for MonitorError {
    fn from(err: NotifyError) -> Self {
        MonitorError::Notify(err)
    }
}
