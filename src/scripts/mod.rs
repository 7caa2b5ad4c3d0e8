//! Rust post-processing scripts over ingested scan results
//!
//! Scripts are plain closures registered on a [`ScriptEngine`]:
//! - host scripts run once per matching host
//! - port scripts run once per matching port that has a detected service
//! - parsers rewrite outputs that are already present, either for one
//!   script name or for every output
//!
//! Matching scripts run in registration order and write their output under
//! their own name.

use crate::model::{Host, Port, ScriptOutput};
use crate::ScanError;

pub mod engine;
pub mod filter;
pub mod parser;

pub use engine::{ScriptEngine, ScriptRegistration};
pub use filter::{PortFilter, PortMatch, ProtocolFilter, StateSet, TargetFilter};
pub use parser::ParserSet;

/// Error type a failing script hands back
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// What a script produced for one host or port
#[derive(Debug)]
pub enum ScriptOutcome {
    Produced(ScriptOutput),
    /// Nothing to report for this entity; no output is stored
    Skipped,
    Failed(BoxError),
}

impl ScriptOutcome {
    pub fn produced(output: impl Into<ScriptOutput>) -> Self {
        ScriptOutcome::Produced(output.into())
    }

    pub fn failed(error: impl Into<BoxError>) -> Self {
        ScriptOutcome::Failed(error.into())
    }
}

impl<T: Into<ScriptOutput>> From<Option<T>> for ScriptOutcome {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(output) => ScriptOutcome::Produced(output.into()),
            None => ScriptOutcome::Skipped,
        }
    }
}

impl<T, E> From<Result<T, E>> for ScriptOutcome
where
    T: Into<ScriptOutput>,
    E: Into<BoxError>,
{
    fn from(value: Result<T, E>) -> Self {
        match value {
            Ok(output) => ScriptOutcome::Produced(output.into()),
            Err(e) => ScriptOutcome::Failed(e.into()),
        }
    }
}

pub type HostCallback = Box<dyn Fn(&Host) -> ScriptOutcome + Send + Sync>;
pub type PortCallback = Box<dyn Fn(&Host, &Port) -> ScriptOutcome + Send + Sync>;
pub type ParserCallback =
    Box<dyn Fn(&ScriptOutput) -> Result<ScriptOutput, ScanError> + Send + Sync>;
pub type GlobalParserCallback =
    Box<dyn Fn(&str, &ScriptOutput) -> Result<ScriptOutput, ScanError> + Send + Sync>;
