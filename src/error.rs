//! Error handling for the SV publisher
//!
//! This module defines the error taxonomy shared by the publisher core, the
//! cycle scheduler and the transport collaborators, plus a Result alias.
//!
//! None of these errors are fatal to the process: capacity and emptiness
//! errors are recoverable by the caller, bind failures leave the publisher
//! unconfigured, and transmit failures are logged while the scheduler keeps
//! ticking.

use thiserror::Error;

/// Main error type for publisher operations
#[derive(Error, Debug)]
pub enum SvPubError {
    /// A channel or value maximum has been reached
    #[error("Capacity exceeded: at most {max} {what} allowed")]
    CapacityExceeded { what: &'static str, max: usize },

    /// Tail removal attempted on a channel without values
    #[error("Channel '{0}' has no values to remove")]
    EmptyChannel(String),

    /// Tail removal attempted on a publisher without channels
    #[error("Publisher has no channels to remove")]
    EmptyPublisher,

    /// Operation requires `complete_setup()` first
    #[error("Publisher is not configured (complete setup first)")]
    NotConfigured,

    /// The transport could not acquire the network interface
    #[error("Failed to bind interface '{interface}': {reason}")]
    Bind { interface: String, reason: String },

    /// A broadcast could not be sent
    #[error("Transmit error: {0}")]
    Transmit(String),

    /// Channel index out of range
    #[error("No channel at index {0}")]
    NoSuchChannel(usize),

    /// Value index out of range
    #[error("No value at index {value} in channel {channel}")]
    NoSuchValue { channel: usize, value: usize },

    /// A tunable or configuration field is out of range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to channel communication with the scheduler thread
    #[error("Channel error: {0}")]
    Channel(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<SvPubError>,
    },
}

impl SvPubError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        SvPubError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a bind error for an interface
    pub fn bind(interface: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        SvPubError::Bind {
            interface: interface.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for publisher operations
pub type Result<T> = std::result::Result<T, SvPubError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
