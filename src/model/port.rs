//! Ports and the services bound to them

use crate::error::{MissingScriptError, ModelError};
use crate::model::script::{ScriptMap, ScriptOutput};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Transport protocol of a port
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
    Sctp,
    Ip,
    Other(String),
}

impl Protocol {
    pub fn as_str(&self) -> &str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Sctp => "sctp",
            Protocol::Ip => "ip",
            Protocol::Other(token) => token,
        }
    }
}

impl From<&str> for Protocol {
    fn from(token: &str) -> Self {
        match token.to_ascii_lowercase().as_str() {
            "tcp" => Protocol::Tcp,
            "udp" => Protocol::Udp,
            "sctp" => Protocol::Sctp,
            "ip" => Protocol::Ip,
            other => Protocol::Other(other.to_string()),
        }
    }
}

impl Serialize for Protocol {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Port state as reported by nmap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PortState {
    #[serde(rename = "open")]
    Open,
    #[serde(rename = "closed")]
    Closed,
    #[serde(rename = "filtered")]
    Filtered,
    #[serde(rename = "open|filtered")]
    OpenFiltered,
    #[serde(rename = "closed|filtered")]
    ClosedFiltered,
    #[serde(rename = "unfiltered")]
    Unfiltered,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortState::Open => write!(f, "open"),
            PortState::Closed => write!(f, "closed"),
            PortState::Filtered => write!(f, "filtered"),
            PortState::OpenFiltered => write!(f, "open|filtered"),
            PortState::ClosedFiltered => write!(f, "closed|filtered"),
            PortState::Unfiltered => write!(f, "unfiltered"),
        }
    }
}

impl FromStr for PortState {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(PortState::Open),
            "closed" => Ok(PortState::Closed),
            "filtered" => Ok(PortState::Filtered),
            "open|filtered" => Ok(PortState::OpenFiltered),
            "closed|filtered" => Ok(PortState::ClosedFiltered),
            "unfiltered" => Ok(PortState::Unfiltered),
            _ => Err(ModelError::InvalidValue {
                field: "port state",
                value: s.to_string(),
            }),
        }
    }
}

/// Service detected on a port
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Service {
    name: String,
    product: Option<String>,
    version: Option<String>,
    extra_info: Option<String>,
    tunnel: Option<String>,
    method: Option<String>,
    confidence: Option<f32>,
    cpes: Vec<String>,
    scripts: ScriptMap,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            product: None,
            version: None,
            extra_info: None,
            tunnel: None,
            method: None,
            confidence: None,
            cpes: Vec::new(),
            scripts: ScriptMap::new(),
        }
    }

    pub fn with_product(mut self, product: Option<String>) -> Self {
        self.product = product;
        self
    }

    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }

    pub fn with_extra_info(mut self, extra_info: Option<String>) -> Self {
        self.extra_info = extra_info;
        self
    }

    pub fn with_tunnel(mut self, tunnel: Option<String>) -> Self {
        self.tunnel = tunnel;
        self
    }

    pub fn with_method(mut self, method: Option<String>) -> Self {
        self.method = method;
        self
    }

    /// Detection confidence on nmap's 0-10 scale
    pub fn with_confidence(mut self, confidence: f32) -> Result<Self, ModelError> {
        if !(0.0..=10.0).contains(&confidence) {
            return Err(ModelError::InvalidValue {
                field: "service confidence",
                value: confidence.to_string(),
            });
        }
        self.confidence = Some(confidence);
        Ok(self)
    }

    pub fn add_cpe(&mut self, cpe: impl Into<String>) {
        self.cpes.push(cpe.into());
    }

    /// Attach a script output; each name may only be added once
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

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn product(&self) -> Option<&str> {
        self.product.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn extra_info(&self) -> Option<&str> {
        self.extra_info.as_deref()
    }

    pub fn tunnel(&self) -> Option<&str> {
        self.tunnel.as_deref()
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    pub fn confidence(&self) -> Option<f32> {
        self.confidence
    }

    pub fn cpes(&self) -> &[String] {
        &self.cpes
    }

    pub fn scripts(&self) -> &ScriptMap {
        &self.scripts
    }

    pub(crate) fn scripts_mut(&mut self) -> &mut ScriptMap {
        &mut self.scripts
    }
}

/// A scanned port on a host
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Port {
    protocol: Protocol,
    number: u16,
    state: PortState,
    reason: Option<String>,
    reason_ttl: Option<u32>,
    service: Option<Service>,
}

impl Port {
    /// Build a port, rejecting numbers outside 1-65535
    pub fn new(protocol: Protocol, number: u32, state: PortState) -> Result<Self, ModelError> {
        if !crate::utils::valid_port(number) {
            return Err(ModelError::InvalidValue {
                field: "port number",
                value: number.to_string(),
            });
        }

        Ok(Self {
            protocol,
            number: number as u16,
            state,
            reason: None,
            reason_ttl: None,
            service: None,
        })
    }

    pub fn with_reason(mut self, reason: Option<String>, reason_ttl: Option<u32>) -> Self {
        self.reason = reason;
        self.reason_ttl = reason_ttl;
        self
    }

    pub fn with_service(mut self, service: Service) -> Self {
        self.service = Some(service);
        self
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    pub fn number(&self) -> u16 {
        self.number
    }

    pub fn state(&self) -> PortState {
        self.state
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn reason_ttl(&self) -> Option<u32> {
        self.reason_ttl
    }

    pub fn service(&self) -> Option<&Service> {
        self.service.as_ref()
    }

    pub(crate) fn service_mut(&mut self) -> Option<&mut Service> {
        self.service.as_mut()
    }
}

impl PartialEq<u16> for Port {
    fn eq(&self, other: &u16) -> bool {
        self.number == *other
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {}", self.number, self.protocol, self.state)
    }
}
