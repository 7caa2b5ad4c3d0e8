//! Error handling for nmapflow
//!
//! Every stage has its own error enum so callers can match on the failure
//! they care about, and [`ScanError`] wraps all of them for the crate-wide
//! [`crate::Result`] alias. Messages always carry the offending raw value.

use thiserror::Error;

/// Malformed port or address specifications
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("Invalid port range: {0}")]
    InvalidPortRange(String),

    #[error("Malformed IP address: {0}")]
    MalformedAddress(String),

    #[error("Conflicting port selection: {0}")]
    ConflictingPorts(String),

    #[error("Address range too large: {0}")]
    TooLarge(String),
}

/// Invalid values handed to result entities
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("Invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("Script with identifier \"{0}\" already exists")]
    DuplicateScript(String),
}

/// Structural or value problems in an nmap XML report
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReportError {
    #[error("Cannot parse nmap XML output: {0}")]
    Malformed(String),

    #[error("Missing <{0}> element in report")]
    MissingSection(&'static str),

    #[error("Host #{0} has neither an IPv4 nor an IPv6 address")]
    MissingAddress(usize),

    #[error("Host #{0} has no <status> element")]
    MissingStatus(usize),

    #[error("Invalid {attribute} value in <{element}>: {value:?}")]
    InvalidAttribute {
        element: &'static str,
        attribute: &'static str,
        value: String,
    },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("nmap did not produce a parseable report: {0}")]
    Tool(String),
}

/// Script engine registration failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("\"{0}\" already has a parsing function")]
    ParserConflict(String),

    #[error("Invalid script name: {0:?}")]
    InvalidName(String),

    #[error("Invalid {filter} filter: {value}")]
    InvalidFilter { filter: &'static str, value: String },

    #[error("Script \"{0}\" must accept at least one port state")]
    EmptyStates(String),

    #[error(transparent)]
    Range(#[from] RangeError),
}

/// Lookup of a script output that was never produced on an entity
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("No script output for the given script: {name}")]
pub struct MissingScriptError {
    pub name: String,
}

impl MissingScriptError {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Main error type for nmapflow operations
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Range(#[from] RangeError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    MissingScript(#[from] MissingScriptError),

    #[error("Script \"{name}\" failed: {source}")]
    ScriptFailed {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Nmap error: {0}")]
    NmapError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Timeout error")]
    TimeoutError,
}

impl ScanError {
    /// True when this is a missing-script lookup for exactly `name`
    pub fn is_missing_script(&self, name: &str) -> bool {
        matches!(self, ScanError::MissingScript(missing) if missing.name == name)
    }
}

impl From<tokio::time::error::Elapsed> for ScanError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ScanError::TimeoutError
    }
}

impl From<quick_xml::DeError> for ReportError {
    fn from(e: quick_xml::DeError) -> Self {
        ReportError::Malformed(e.to_string())
    }
}
