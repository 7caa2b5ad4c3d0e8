//! Top-level scan result

use crate::error::{ModelError, RangeError};
use crate::model::host::Host;
use crate::utils::targets::{classify, expand_target, TargetKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// One `<scaninfo>` record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanInfo {
    pub scan_type: Option<String>,
    pub num_services: Option<u32>,
    pub services: Option<String>,
}

impl ScanInfo {
    /// Expand the `services` attribute into individual ports
    pub fn services_list(&self) -> Result<Vec<u16>, RangeError> {
        match &self.services {
            Some(services) => crate::utils::ports::parse_ports(services),
            None => Ok(Vec::new()),
        }
    }
}

/// Scan-wide metadata from the report root and run statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanMetadata {
    pub scanner: Option<String>,
    pub arguments: Option<String>,
    pub version: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub elapsed: Option<f64>,
    pub summary: Option<String>,
    pub exit_status: Option<String>,
    pub hosts_up: Option<u32>,
    pub hosts_down: Option<u32>,
    pub hosts_total: Option<u32>,
    /// Keyed by protocol (`tcp`, `udp`, ...)
    pub scan_info: BTreeMap<String, ScanInfo>,
    pub verbose: Option<u32>,
    pub debug: Option<u32>,
}

/// Raw output formats nmap can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OutputFormat {
    Xml,
    Normal,
    Grep,
}

impl FromStr for OutputFormat {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xml" => Ok(OutputFormat::Xml),
            "normal" => Ok(OutputFormat::Normal),
            "grep" => Ok(OutputFormat::Grep),
            _ => Err(ModelError::InvalidValue {
                field: "output format",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Xml => write!(f, "xml"),
            OutputFormat::Normal => write!(f, "normal"),
            OutputFormat::Grep => write!(f, "grep"),
        }
    }
}

/// Captured raw nmap output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawOutputs {
    pub xml: Option<String>,
    pub normal: Option<String>,
    pub grep: Option<String>,
}

/// How to pick hosts out of a result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostSelector {
    ByPosition(usize),
    /// A single address, hostname or range token
    ByAddressOrHostname(String),
    ByMany(Vec<String>),
}

/// The ingested report: metadata plus hosts in report order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanResult {
    metadata: ScanMetadata,
    hosts: Vec<Host>,
    #[serde(skip)]
    outputs: RawOutputs,
    tolerant_errors: Option<String>,
}

impl ScanResult {
    pub fn new(metadata: ScanMetadata) -> Self {
        Self {
            metadata,
            ..Default::default()
        }
    }

    pub(crate) fn add_host(&mut self, host: Host) {
        self.hosts.push(host);
    }

    pub(crate) fn set_outputs(&mut self, outputs: RawOutputs) {
        self.outputs = outputs;
    }

    pub(crate) fn set_tolerant_errors(&mut self, errors: Option<String>) {
        self.tolerant_errors = errors.filter(|e| !e.trim().is_empty());
    }

    pub(crate) fn hosts_mut(&mut self) -> &mut [Host] {
        &mut self.hosts
    }

    pub fn metadata(&self) -> &ScanMetadata {
        &self.metadata
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Host> {
        self.hosts.iter()
    }

    pub fn get_at(&self, index: usize) -> Option<&Host> {
        self.hosts.get(index)
    }

    /// Hosts matching the selector, in report order
    ///
    /// Range, CIDR and partial tokens are expanded before matching; other
    /// tokens match an IPv4, IPv6 or hostname exactly.
    pub fn find(&self, selector: &HostSelector) -> Result<Vec<&Host>, RangeError> {
        let tokens: Vec<&str> = match selector {
            HostSelector::ByPosition(index) => return Ok(self.get_at(*index).into_iter().collect()),
            HostSelector::ByAddressOrHostname(token) => token.split_whitespace().collect(),
            HostSelector::ByMany(tokens) => tokens.iter().map(String::as_str).collect(),
        };

        let mut wanted = HashSet::new();
        for token in tokens {
            match classify(token) {
                TargetKind::Single | TargetKind::Hostname => {
                    wanted.insert(token.to_string());
                }
                _ => wanted.extend(expand_target(token)?),
            }
        }

        Ok(self
            .hosts
            .iter()
            .filter(|host| wanted.iter().any(|value| host.matches(value)))
            .collect())
    }

    /// True if some host has this IPv4, IPv6 or hostname
    pub fn contains(&self, value: &str) -> bool {
        self.hosts.iter().any(|host| host.matches(value))
    }

    pub fn get_output(&self, format: OutputFormat) -> Option<&str> {
        match format {
            OutputFormat::Xml => self.outputs.xml.as_deref(),
            OutputFormat::Normal => self.outputs.normal.as_deref(),
            OutputFormat::Grep => self.outputs.grep.as_deref(),
        }
    }

    /// nmap stderr text captured alongside a successfully parsed report
    pub fn tolerant_errors(&self) -> Option<&str> {
        self.tolerant_errors.as_deref()
    }
}

impl<'a> IntoIterator for &'a ScanResult {
    type Item = &'a Host;
    type IntoIter = std::slice::Iter<'a, Host>;

    fn into_iter(self) -> Self::IntoIter {
        self.hosts.iter()
    }
}
