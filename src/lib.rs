//! nmapflow - nmap results you can program against
//!
//! Expands port and target ranges, drives nmap, turns its XML report into
//! typed results and runs Rust post-processing scripts over them.

pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod scanner;
pub mod scripts;
pub mod utils;

// Re-export commonly used types
pub use config::ScannerConfig;
pub use error::{
    EngineError, MissingScriptError, ModelError, RangeError, ReportError, ScanError,
};
pub use model::{Host, HostSelector, OutputFormat, Port, PortState, ScanResult, ScriptOutput};
pub use parser::XmlParser;
pub use scanner::{BackgroundScan, NmapScanner, ScanRequest, ScanStatus};
pub use scripts::{ScriptEngine, ScriptOutcome};
pub use utils::PortSelection;

pub type Result<T> = std::result::Result<T, ScanError>;
