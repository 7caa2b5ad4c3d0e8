//! Script Engine - matches registered scripts against a scan result

use super::filter::{PortMatch, TargetFilter};
use super::parser::ParserSet;
use super::{GlobalParserCallback, HostCallback, ParserCallback, PortCallback, ScriptOutcome};
use crate::error::EngineError;
use crate::model::{Host, Port, ScanResult, ScriptOutput};
use crate::{Result, ScanError};
use log::{debug, info};
use std::fmt;

struct HostScript {
    name: String,
    targets: TargetFilter,
    callback: HostCallback,
}

struct PortScript {
    name: String,
    targets: TargetFilter,
    rule: PortMatch,
    callback: PortCallback,
}

/// A registration collected ahead of engine construction
///
/// ```
/// use nmapflow::scripts::{PortFilter, PortMatch, ScriptEngine, ScriptOutcome, ScriptRegistration, TargetFilter};
///
/// let engine = ScriptEngine::from_registrations(vec![
///     ScriptRegistration::host("alive", TargetFilter::Any, |host| {
///         ScriptOutcome::produced(format!("{} is {}", host.ip(), host.state()))
///     }),
///     ScriptRegistration::port("banner", TargetFilter::Any, PortMatch::new(PortFilter::from(22)), |_, port| {
///         port.service().map(|s| s.name().to_string()).into()
///     }),
/// ])
/// .unwrap();
/// assert_eq!(engine.host_script_count(), 1);
/// ```
pub enum ScriptRegistration {
    Host {
        name: String,
        targets: TargetFilter,
        callback: HostCallback,
    },
    Port {
        name: String,
        targets: TargetFilter,
        rule: PortMatch,
        callback: PortCallback,
    },
    Parser {
        script: String,
        callback: ParserCallback,
    },
    GlobalParser(GlobalParserCallback),
}

impl ScriptRegistration {
    pub fn host<F>(name: impl Into<String>, targets: TargetFilter, callback: F) -> Self
    where
        F: Fn(&Host) -> ScriptOutcome + Send + Sync + 'static,
    {
        ScriptRegistration::Host {
            name: name.into(),
            targets,
            callback: Box::new(callback),
        }
    }

    pub fn port<F>(
        name: impl Into<String>,
        targets: TargetFilter,
        rule: PortMatch,
        callback: F,
    ) -> Self
    where
        F: Fn(&Host, &Port) -> ScriptOutcome + Send + Sync + 'static,
    {
        ScriptRegistration::Port {
            name: name.into(),
            targets,
            rule,
            callback: Box::new(callback),
        }
    }

    pub fn parser<F>(script: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&ScriptOutput) -> Result<ScriptOutput> + Send + Sync + 'static,
    {
        ScriptRegistration::Parser {
            script: script.into(),
            callback: Box::new(callback),
        }
    }

    pub fn global_parser<F>(callback: F) -> Self
    where
        F: Fn(&str, &ScriptOutput) -> Result<ScriptOutput> + Send + Sync + 'static,
    {
        ScriptRegistration::GlobalParser(Box::new(callback))
    }
}

/// Registry of host scripts, port scripts and parsers
///
/// Registration validates eagerly. Running is single-threaded and mutates
/// the result in place; callers sharing an engine or a result across
/// threads synchronize externally.
#[derive(Default)]
pub struct ScriptEngine {
    host_scripts: Vec<HostScript>,
    port_scripts: Vec<PortScript>,
    parsers: ParserSet,
}

impl ScriptEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an engine from registrations collected up front
    pub fn from_registrations<I>(registrations: I) -> std::result::Result<Self, EngineError>
    where
        I: IntoIterator<Item = ScriptRegistration>,
    {
        let mut engine = Self::new();
        for registration in registrations {
            match registration {
                ScriptRegistration::Host {
                    name,
                    targets,
                    callback,
                } => engine.push_host_script(name, targets, callback)?,
                ScriptRegistration::Port {
                    name,
                    targets,
                    rule,
                    callback,
                } => engine.push_port_script(name, targets, rule, callback)?,
                ScriptRegistration::Parser { script, callback } => {
                    validate_name(&script)?;
                    engine.parsers.insert(script, callback)?;
                }
                ScriptRegistration::GlobalParser(callback) => {
                    engine.parsers.insert_global(callback)
                }
            }
        }
        Ok(engine)
    }

    /// Register a script that runs once per matching host
    pub fn register_host_script<F>(
        &mut self,
        name: impl Into<String>,
        targets: TargetFilter,
        callback: F,
    ) -> std::result::Result<&mut Self, EngineError>
    where
        F: Fn(&Host) -> ScriptOutcome + Send + Sync + 'static,
    {
        self.push_host_script(name.into(), targets, Box::new(callback))?;
        Ok(self)
    }

    /// Register a script that runs once per matching port with a service
    pub fn register_port_script<F>(
        &mut self,
        name: impl Into<String>,
        targets: TargetFilter,
        rule: PortMatch,
        callback: F,
    ) -> std::result::Result<&mut Self, EngineError>
    where
        F: Fn(&Host, &Port) -> ScriptOutcome + Send + Sync + 'static,
    {
        self.push_port_script(name.into(), targets, rule, Box::new(callback))?;
        Ok(self)
    }

    /// Register the rewrite function for one script's output
    pub fn register_parser<F>(
        &mut self,
        script: impl Into<String>,
        callback: F,
    ) -> std::result::Result<&mut Self, EngineError>
    where
        F: Fn(&ScriptOutput) -> Result<ScriptOutput> + Send + Sync + 'static,
    {
        let script = script.into();
        validate_name(&script)?;
        self.parsers.add(script, callback)?;
        Ok(self)
    }

    /// Register a rewrite function applied to every script output
    pub fn register_global_parser<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&str, &ScriptOutput) -> Result<ScriptOutput> + Send + Sync + 'static,
    {
        self.parsers.add_global(callback);
        self
    }

    fn push_host_script(
        &mut self,
        name: String,
        targets: TargetFilter,
        callback: HostCallback,
    ) -> std::result::Result<(), EngineError> {
        validate_name(&name)?;
        debug!("Registered host script {}", name);
        self.host_scripts.push(HostScript {
            name,
            targets,
            callback,
        });
        Ok(())
    }

    fn push_port_script(
        &mut self,
        name: String,
        targets: TargetFilter,
        rule: PortMatch,
        callback: PortCallback,
    ) -> std::result::Result<(), EngineError> {
        validate_name(&name)?;
        if rule.states.is_empty() {
            return Err(EngineError::EmptyStates(name));
        }
        debug!("Registered port script {}", name);
        self.port_scripts.push(PortScript {
            name,
            targets,
            rule,
            callback,
        });
        Ok(())
    }

    pub fn host_script_count(&self) -> usize {
        self.host_scripts.len()
    }

    pub fn port_script_count(&self) -> usize {
        self.port_scripts.len()
    }

    pub fn parsers(&self) -> &ParserSet {
        &self.parsers
    }

    pub fn is_empty(&self) -> bool {
        self.host_scripts.is_empty() && self.port_scripts.is_empty() && self.parsers.is_empty()
    }

    /// Run every matching script over `result`, then apply the parsers
    ///
    /// Hosts are visited in report order; per host the host scripts run
    /// first, then the port scripts port by port. A failing script aborts
    /// the run.
    pub fn run(&self, result: &mut ScanResult) -> Result<()> {
        info!(
            "Running {} host scripts and {} port scripts over {} hosts",
            self.host_scripts.len(),
            self.port_scripts.len(),
            result.len()
        );

        for index in 0..result.len() {
            self.run_host_scripts(result, index)?;
            self.run_port_scripts(result, index)?;
        }

        self.parsers.apply(result)
    }

    fn run_host_scripts(&self, result: &mut ScanResult, index: usize) -> Result<()> {
        for script in &self.host_scripts {
            let outcome = {
                let host = &result.hosts()[index];
                if !script.targets.matches(host) {
                    continue;
                }
                debug!("Running host script {} on {}", script.name, host.ip());
                (script.callback)(host)
            };

            if let Some(output) = settle(&script.name, outcome)? {
                result.hosts_mut()[index].add_script(script.name.clone(), output)?;
            }
        }
        Ok(())
    }

    fn run_port_scripts(&self, result: &mut ScanResult, index: usize) -> Result<()> {
        if self.port_scripts.is_empty() {
            return Ok(());
        }

        let port_count = result.hosts()[index].ports().len();
        for port_index in 0..port_count {
            for script in &self.port_scripts {
                let outcome = {
                    let host = &result.hosts()[index];
                    let port = &host.ports()[port_index];
                    if !script.targets.matches(host) || !script.rule.matches(port) {
                        continue;
                    }
                    if port.service().is_none() {
                        debug!(
                            "Skipping port script {} on {}:{} (no service)",
                            script.name,
                            host.ip(),
                            port.number()
                        );
                        continue;
                    }
                    debug!(
                        "Running port script {} on {}:{}",
                        script.name,
                        host.ip(),
                        port.number()
                    );
                    (script.callback)(host, port)
                };

                if let Some(output) = settle(&script.name, outcome)? {
                    let port = &mut result.hosts_mut()[index].ports_mut()[port_index];
                    if let Some(service) = port.service_mut() {
                        service.add_script(script.name.clone(), output)?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptEngine")
            .field(
                "host_scripts",
                &self.host_scripts.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            )
            .field(
                "port_scripts",
                &self.port_scripts.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            )
            .field("parsers", &self.parsers.names().collect::<Vec<_>>())
            .finish()
    }
}

fn validate_name(name: &str) -> std::result::Result<(), EngineError> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(EngineError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn settle(name: &str, outcome: ScriptOutcome) -> Result<Option<ScriptOutput>> {
    match outcome {
        ScriptOutcome::Produced(output) => Ok(Some(output)),
        ScriptOutcome::Skipped => {
            debug!("Script {} skipped", name);
            Ok(None)
        }
        ScriptOutcome::Failed(source) => Err(ScanError::ScriptFailed {
            name: name.to_string(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HostStatus, PortState, Protocol, ScanMetadata, Service};
    use crate::scripts::filter::PortFilter;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn result() -> ScanResult {
        let mut result = ScanResult::new(ScanMetadata::default());
        let mut host = Host::new(Some("10.0.0.1".to_string()), None, HostStatus::default()).unwrap();
        host.add_port(
            Port::new(Protocol::Tcp, 22, PortState::Open)
                .unwrap()
                .with_service(Service::new("ssh")),
        );
        host.add_port(
            Port::new(Protocol::Tcp, 23, PortState::Closed)
                .unwrap()
                .with_service(Service::new("telnet")),
        );
        result.add_host(host);
        result
    }

    #[test]
    fn test_invalid_names_rejected() {
        let mut engine = ScriptEngine::new();
        assert!(matches!(
            engine.register_host_script("", TargetFilter::Any, |_| ScriptOutcome::Skipped),
            Err(EngineError::InvalidName(_))
        ));
        assert!(engine
            .register_host_script("two words", TargetFilter::Any, |_| ScriptOutcome::Skipped)
            .is_err());
    }

    #[test]
    fn test_empty_state_set_rejected() {
        let mut engine = ScriptEngine::new();
        let rule = PortMatch::new(PortFilter::Any).with_states(crate::scripts::StateSet::new([]));
        let err = engine
            .register_port_script("probe", TargetFilter::Any, rule, |_, _| ScriptOutcome::Skipped)
            .unwrap_err();
        assert_eq!(err, EngineError::EmptyStates("probe".to_string()));
    }

    #[test]
    fn test_port_script_respects_state() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut engine = ScriptEngine::new();
        engine
            .register_port_script("count", TargetFilter::Any, PortMatch::default(), move |_, port| {
                seen.fetch_add(1, Ordering::SeqCst);
                ScriptOutcome::produced(port.number().to_string())
            })
            .unwrap();

        let mut result = result();
        engine.run(&mut result).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let host = result.get_at(0).unwrap();
        let ssh = host.port(22, &Protocol::Tcp).unwrap().service().unwrap();
        assert_eq!(ssh.get_script("count").unwrap().as_text(), Some("22"));
        let telnet = host.port(23, &Protocol::Tcp).unwrap().service().unwrap();
        assert!(telnet.get_script("count").is_err());
    }

    #[test]
    fn test_skipped_writes_nothing() {
        let mut engine = ScriptEngine::new();
        engine
            .register_host_script("quiet", TargetFilter::Any, |_| ScriptOutcome::Skipped)
            .unwrap();
        let mut result = result();
        engine.run(&mut result).unwrap();
        assert!(result.get_at(0).unwrap().scripts().is_empty());
    }

    #[test]
    fn test_failure_propagates_with_name() {
        let mut engine = ScriptEngine::new();
        engine
            .register_host_script("boom", TargetFilter::Any, |_| ScriptOutcome::failed("exploded"))
            .unwrap();
        let err = engine.run(&mut result()).unwrap_err();
        match err {
            ScanError::ScriptFailed { name, source } => {
                assert_eq!(name, "boom");
                assert_eq!(source.to_string(), "exploded");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_registration_order_is_run_order() {
        let mut engine = ScriptEngine::new();
        engine
            .register_host_script("first", TargetFilter::Any, |_| ScriptOutcome::produced("1"))
            .unwrap()
            .register_host_script("second", TargetFilter::Any, |host| {
                host.get_script("first").map(|o| format!("after {}", o)).into()
            })
            .unwrap();
        let mut result = result();
        engine.run(&mut result).unwrap();
        let host = result.get_at(0).unwrap();
        assert_eq!(host.get_script("second").unwrap().as_text(), Some("after 1"));
    }
}
