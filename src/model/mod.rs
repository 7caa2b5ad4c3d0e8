//! Typed scan results
//!
//! Entities validate their values on construction and only grow through
//! explicit `add_*` calls afterwards.

pub mod host;
pub mod os;
pub mod port;
pub mod result;
pub mod script;

pub use host::{Host, HostStatus, Hostname};
pub use os::{Hop, OperatingSystem, OsMatch};
pub use port::{Port, PortState, Protocol, Service};
pub use result::{HostSelector, OutputFormat, RawOutputs, ScanInfo, ScanMetadata, ScanResult};
pub use script::{ScriptMap, ScriptOutput};
