//! Port selection for an nmap invocation
//!
//! A selection is either protocol-tagged (`T:` and/or `U:` port lists),
//! malleable (a bare list nmap applies to whichever scan types run) or a
//! `--top-ports N` request. The three forms are mutually exclusive and
//! conflicts are rejected at the call that introduces them.

use crate::error::RangeError;
use crate::utils::ports::{parse_ports, ports_to_str};
use serde::{Deserialize, Serialize};

/// Anything that can describe a set of ports
pub trait AsPortSpec {
    /// Canonical nmap port syntax, or `-` for every port
    fn to_port_spec(&self) -> Result<String, RangeError>;
}

impl AsPortSpec for str {
    fn to_port_spec(&self) -> Result<String, RangeError> {
        let trimmed = self.trim();
        if matches!(trimmed, "all" | "*" | "-") {
            return Ok("-".to_string());
        }
        let ports = parse_ports(trimmed)?;
        if ports.is_empty() {
            return Err(RangeError::InvalidPort(format!("{:?} selects no ports", self)));
        }
        ports_to_str(&ports)
    }
}

impl AsPortSpec for &str {
    fn to_port_spec(&self) -> Result<String, RangeError> {
        (**self).to_port_spec()
    }
}

impl AsPortSpec for String {
    fn to_port_spec(&self) -> Result<String, RangeError> {
        self.as_str().to_port_spec()
    }
}

impl AsPortSpec for u16 {
    fn to_port_spec(&self) -> Result<String, RangeError> {
        ports_to_str(&[*self])
    }
}

impl AsPortSpec for [u16] {
    fn to_port_spec(&self) -> Result<String, RangeError> {
        if self.is_empty() {
            return Err(RangeError::InvalidPort("empty port list".to_string()));
        }
        ports_to_str(self)
    }
}

impl AsPortSpec for Vec<u16> {
    fn to_port_spec(&self) -> Result<String, RangeError> {
        self.as_slice().to_port_spec()
    }
}

impl<const N: usize> AsPortSpec for [u16; N] {
    fn to_port_spec(&self) -> Result<String, RangeError> {
        self.as_slice().to_port_spec()
    }
}

/// Ports requested for a scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSelection {
    tcp: Option<String>,
    udp: Option<String>,
    top: Option<u32>,
    malleable: Option<String>,
}

impl PortSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add TCP ports; fails if TCP ports or a top-N request are already set
    pub fn with_tcp<P: AsPortSpec + ?Sized>(mut self, ports: &P) -> Result<Self, RangeError> {
        if self.tcp.is_some() {
            return Err(RangeError::ConflictingPorts("TCP ports already specified".to_string()));
        }
        self.ensure_not_top("TCP ports")?;
        self.ensure_not_malleable("TCP ports")?;
        self.tcp = Some(ports.to_port_spec()?);
        Ok(self)
    }

    /// Add UDP ports; fails if UDP ports or a top-N request are already set
    pub fn with_udp<P: AsPortSpec + ?Sized>(mut self, ports: &P) -> Result<Self, RangeError> {
        if self.udp.is_some() {
            return Err(RangeError::ConflictingPorts("UDP ports already specified".to_string()));
        }
        self.ensure_not_top("UDP ports")?;
        self.ensure_not_malleable("UDP ports")?;
        self.udp = Some(ports.to_port_spec()?);
        Ok(self)
    }

    /// Request nmap's N most common ports
    pub fn with_top_ports(mut self, count: u32) -> Result<Self, RangeError> {
        if count == 0 || count > 65535 {
            return Err(RangeError::InvalidPort(format!("top ports count {}", count)));
        }
        if self.tcp.is_some() || self.udp.is_some() {
            return Err(RangeError::ConflictingPorts(format!(
                "--top-ports {} cannot be combined with TCP/UDP ports",
                count
            )));
        }
        if self.malleable.is_some() {
            return Err(RangeError::ConflictingPorts(format!(
                "--top-ports {} cannot be combined with a port list",
                count
            )));
        }
        self.top = Some(count);
        Ok(self)
    }

    /// Ports without a protocol tag
    pub fn with_ports<P: AsPortSpec + ?Sized>(mut self, ports: &P) -> Result<Self, RangeError> {
        if self.malleable.is_some() {
            return Err(RangeError::ConflictingPorts("port list already specified".to_string()));
        }
        if self.tcp.is_some() || self.udp.is_some() {
            return Err(RangeError::ConflictingPorts(
                "a bare port list cannot be combined with TCP/UDP ports".to_string(),
            ));
        }
        self.ensure_not_top("a port list")?;
        self.malleable = Some(ports.to_port_spec()?);
        Ok(self)
    }

    fn ensure_not_top(&self, what: &str) -> Result<(), RangeError> {
        match self.top {
            Some(count) => Err(RangeError::ConflictingPorts(format!(
                "{} cannot be combined with --top-ports {}",
                what, count
            ))),
            None => Ok(()),
        }
    }

    fn ensure_not_malleable(&self, what: &str) -> Result<(), RangeError> {
        match &self.malleable {
            Some(ports) => Err(RangeError::ConflictingPorts(format!(
                "{} cannot be combined with the bare port list {}",
                what, ports
            ))),
            None => Ok(()),
        }
    }

    pub fn tcp(&self) -> Option<&str> {
        self.tcp.as_deref()
    }

    pub fn udp(&self) -> Option<&str> {
        self.udp.as_deref()
    }

    pub fn top_ports(&self) -> Option<u32> {
        self.top
    }

    pub fn malleable(&self) -> Option<&str> {
        self.malleable.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.tcp.is_none() && self.udp.is_none() && self.top.is_none() && self.malleable.is_none()
    }

    /// Render as nmap arguments
    ///
    /// ```
    /// use nmapflow::utils::port_spec::PortSelection;
    ///
    /// let selection = PortSelection::new().with_tcp("80,443").unwrap().with_udp(&53u16).unwrap();
    /// assert_eq!(selection.to_nmap_args(), vec!["-p", "T:80,443,U:53"]);
    /// ```
    pub fn to_nmap_args(&self) -> Vec<String> {
        if let Some(count) = self.top {
            return vec!["--top-ports".to_string(), count.to_string()];
        }

        if let Some(ports) = &self.malleable {
            return vec!["-p".to_string(), ports.clone()];
        }

        let mut parts = Vec::new();
        if let Some(tcp) = &self.tcp {
            parts.push(format!("T:{}", tcp));
        }
        if let Some(udp) = &self.udp {
            parts.push(format!("U:{}", udp));
        }

        if parts.is_empty() {
            Vec::new()
        } else {
            vec!["-p".to_string(), parts.join(",")]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_ports_conflicts_with_tcp() {
        let err = PortSelection::new()
            .with_top_ports(100)
            .unwrap()
            .with_tcp("80")
            .unwrap_err();
        assert!(matches!(err, RangeError::ConflictingPorts(_)));

        let err = PortSelection::new()
            .with_tcp("80")
            .unwrap()
            .with_top_ports(100)
            .unwrap_err();
        assert!(matches!(err, RangeError::ConflictingPorts(_)));
    }

    #[test]
    fn test_duplicate_protocol_rejected() {
        let err = PortSelection::new()
            .with_udp("53")
            .unwrap()
            .with_udp("161")
            .unwrap_err();
        assert!(matches!(err, RangeError::ConflictingPorts(_)));
    }

    #[test]
    fn test_render_protocol_tagged() {
        let selection = PortSelection::new()
            .with_tcp(&[22u16, 80, 81, 82])
            .unwrap()
            .with_udp("53")
            .unwrap();
        assert_eq!(selection.to_nmap_args(), vec!["-p", "T:22,80-82,U:53"]);
    }

    #[test]
    fn test_render_top_and_malleable() {
        let top = PortSelection::new().with_top_ports(1000).unwrap();
        assert_eq!(top.to_nmap_args(), vec!["--top-ports", "1000"]);

        let bare = PortSelection::new().with_ports("all").unwrap();
        assert_eq!(bare.to_nmap_args(), vec!["-p", "-"]);
    }

    #[test]
    fn test_invalid_ports_rejected_before_render() {
        assert!(PortSelection::new().with_tcp("0-10").is_err());
        assert!(PortSelection::new().with_top_ports(0).is_err());
        assert!(PortSelection::new().with_ports(&Vec::<u16>::new()).is_err());
    }

    #[test]
    fn test_empty_selection_renders_nothing() {
        let selection = PortSelection::new();
        assert!(selection.is_empty());
        assert!(selection.to_nmap_args().is_empty());
    }
}
