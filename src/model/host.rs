//! Scanned hosts

use crate::error::{MissingScriptError, ModelError};
use crate::model::os::{Hop, OperatingSystem};
use crate::model::port::{Port, Protocol};
use crate::model::script::{ScriptMap, ScriptOutput};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A hostname and the record type nmap reported it from (`user`, `PTR`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hostname {
    pub name: String,
    pub kind: Option<String>,
}

/// Host reachability as reported in `<status>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HostStatus {
    pub state: String,
    pub reason: Option<String>,
    pub reason_ttl: Option<u32>,
}

/// A host from the report, identified by its IPv4 and/or IPv6 address
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Host {
    ipv4: Option<String>,
    ipv6: Option<String>,
    mac: Option<String>,
    vendor: Option<String>,
    status: HostStatus,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    hostnames: Vec<Hostname>,
    ports: Vec<Port>,
    os_matches: Vec<OperatingSystem>,
    fingerprint: Option<String>,
    trace: Vec<Hop>,
    scripts: ScriptMap,
}

impl Host {
    /// Create a host; at least one of the two addresses is required
    pub fn new(
        ipv4: Option<String>,
        ipv6: Option<String>,
        status: HostStatus,
    ) -> Result<Self, ModelError> {
        if ipv4.is_none() && ipv6.is_none() {
            return Err(ModelError::InvalidValue {
                field: "host address",
                value: "none".to_string(),
            });
        }

        Ok(Self {
            ipv4,
            ipv6,
            mac: None,
            vendor: None,
            status,
            start_time: None,
            end_time: None,
            hostnames: Vec::new(),
            ports: Vec::new(),
            os_matches: Vec::new(),
            fingerprint: None,
            trace: Vec::new(),
            scripts: ScriptMap::new(),
        })
    }

    pub fn with_times(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start_time = start;
        self.end_time = end;
        self
    }

    pub fn with_mac(mut self, mac: Option<String>, vendor: Option<String>) -> Self {
        self.mac = mac;
        self.vendor = vendor;
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: Option<String>) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    /// Record a hostname; a repeated name keeps its first position and takes the new type
    pub fn add_hostname(&mut self, name: impl Into<String>, kind: Option<String>) {
        let name = name.into();
        match self.hostnames.iter_mut().find(|h| h.name == name) {
            Some(existing) => existing.kind = kind,
            None => self.hostnames.push(Hostname { name, kind }),
        }
    }

    pub fn add_port(&mut self, port: Port) {
        self.ports.push(port);
    }

    pub fn add_os(&mut self, os: OperatingSystem) {
        self.os_matches.push(os);
    }

    pub fn add_hop(&mut self, hop: Hop) {
        self.trace.push(hop);
    }

    /// Attach a host-level script output; each name may only be added once
    pub fn add_script(
        &mut self,
        name: impl Into<String>,
        output: impl Into<ScriptOutput>,
    ) -> Result<(), ModelError> {
        self.scripts.insert(name, output)
    }

    pub fn get_script(&self, name: &str) -> Result<&ScriptOutput, MissingScriptError> {
        self.scripts.get(name)
    }

    pub fn scripts(&self) -> &ScriptMap {
        &self.scripts
    }

    pub(crate) fn scripts_mut(&mut self) -> &mut ScriptMap {
        &mut self.scripts
    }

    pub fn ipv4(&self) -> Option<&str> {
        self.ipv4.as_deref()
    }

    pub fn ipv6(&self) -> Option<&str> {
        self.ipv6.as_deref()
    }

    /// Primary address, IPv4 preferred
    pub fn ip(&self) -> &str {
        self.ipv4
            .as_deref()
            .or(self.ipv6.as_deref())
            .unwrap_or_default()
    }

    pub fn mac(&self) -> Option<&str> {
        self.mac.as_deref()
    }

    pub fn vendor(&self) -> Option<&str> {
        self.vendor.as_deref()
    }

    pub fn status(&self) -> &HostStatus {
        &self.status
    }

    pub fn state(&self) -> &str {
        &self.status.state
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    pub fn hostnames(&self) -> impl Iterator<Item = &str> {
        self.hostnames.iter().map(|h| h.name.as_str())
    }

    pub fn hostnames_with_type(&self) -> &[Hostname] {
        &self.hostnames
    }

    pub fn has_hostname(&self, name: &str) -> bool {
        self.hostnames.iter().any(|h| h.name == name)
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub(crate) fn ports_mut(&mut self) -> &mut [Port] {
        &mut self.ports
    }

    pub fn tcp_ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(|p| *p.protocol() == Protocol::Tcp)
    }

    pub fn udp_ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(|p| *p.protocol() == Protocol::Udp)
    }

    pub fn port(&self, number: u16, protocol: &Protocol) -> Option<&Port> {
        self.ports
            .iter()
            .find(|p| p.number() == number && p.protocol() == protocol)
    }

    pub fn os_matches(&self) -> &[OperatingSystem] {
        &self.os_matches
    }

    /// The OS guess with the highest accuracy; the first one wins ties
    pub fn most_accurate_os(&self) -> Option<&OperatingSystem> {
        self.os_matches.iter().fold(None, |best, os| match best {
            Some(current) if current.accuracy() >= os.accuracy() => Some(current),
            _ => Some(os),
        })
    }

    pub fn traceroute(&self) -> &[Hop] {
        &self.trace
    }

    /// True if `value` is this host's IPv4, IPv6 or one of its hostnames
    pub fn matches(&self, value: &str) -> bool {
        self.ipv4.as_deref() == Some(value)
            || self.ipv6.as_deref() == Some(value)
            || self.has_hostname(value)
    }
}

impl PartialEq<str> for Host {
    fn eq(&self, other: &str) -> bool {
        self.matches(other)
    }
}

impl PartialEq<&str> for Host {
    fn eq(&self, other: &&str) -> bool {
        self.matches(other)
    }
}
