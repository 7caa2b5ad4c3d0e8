//! Output rewriting after scripts have run

use super::{GlobalParserCallback, ParserCallback};
use crate::error::EngineError;
use crate::model::{ScanResult, ScriptMap, ScriptOutput};
use crate::{Result, ScanError};
use log::debug;

/// Named parsers (one per script name) plus global parsers
#[derive(Default)]
pub struct ParserSet {
    named: Vec<(String, ParserCallback)>,
    global: Vec<GlobalParserCallback>,
}

impl ParserSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the parser for one script name; a name takes one parser only
    pub fn add<F>(
        &mut self,
        script: impl Into<String>,
        callback: F,
    ) -> std::result::Result<(), EngineError>
    where
        F: Fn(&ScriptOutput) -> Result<ScriptOutput> + Send + Sync + 'static,
    {
        self.insert(script.into(), Box::new(callback))
    }

    pub(crate) fn insert(
        &mut self,
        script: String,
        callback: ParserCallback,
    ) -> std::result::Result<(), EngineError> {
        if self.has_parser(&script) {
            return Err(EngineError::ParserConflict(script));
        }
        self.named.push((script, callback));
        Ok(())
    }

    /// Register a parser that sees every script output
    pub fn add_global<F>(&mut self, callback: F)
    where
        F: Fn(&str, &ScriptOutput) -> Result<ScriptOutput> + Send + Sync + 'static,
    {
        self.insert_global(Box::new(callback));
    }

    pub(crate) fn insert_global(&mut self, callback: GlobalParserCallback) {
        self.global.push(callback);
    }

    /// Script names with a dedicated parser, in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.named.iter().map(|(name, _)| name.as_str())
    }

    pub fn has_parser(&self, script: &str) -> bool {
        self.named.iter().any(|(name, _)| name == script)
    }

    pub fn len(&self) -> usize {
        self.named.len() + self.global.len()
    }

    pub fn is_empty(&self) -> bool {
        self.named.is_empty() && self.global.is_empty()
    }

    /// Rewrite every host and service script map of the result
    ///
    /// Named parsers run first, then global parsers.
    pub fn apply(&self, result: &mut ScanResult) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        for host in result.hosts_mut() {
            self.apply_to(host.scripts_mut())?;
            for port in host.ports_mut() {
                if let Some(service) = port.service_mut() {
                    self.apply_to(service.scripts_mut())?;
                }
            }
        }

        Ok(())
    }

    fn apply_to(&self, scripts: &mut ScriptMap) -> Result<()> {
        for (name, parser) in &self.named {
            rewrite(scripts, name, |output| parser(output))?;
        }

        if !self.global.is_empty() {
            let names: Vec<String> = scripts.names().map(str::to_string).collect();
            for parser in &self.global {
                for name in &names {
                    rewrite(scripts, name, |output| parser(name.as_str(), output))?;
                }
            }
        }

        Ok(())
    }
}

/// Replace the output stored under `name` with the parser's result
///
/// A missing-script failure for `name` itself means the script never ran
/// on this entity and is ignored. Every other error propagates.
fn rewrite<F>(scripts: &mut ScriptMap, name: &str, parser: F) -> Result<()>
where
    F: Fn(&ScriptOutput) -> Result<ScriptOutput>,
{
    let rewritten = match scripts.get(name) {
        Ok(output) => parser(output),
        Err(missing) => Err(ScanError::from(missing)),
    };

    match rewritten {
        Ok(output) => scripts.replace(name, output).map_err(ScanError::from),
        Err(e) if e.is_missing_script(name) => {
            debug!("No {} output to rewrite", name);
            Ok(())
        }
        Err(e) => Err(e),
    }
}
