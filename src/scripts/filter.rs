//! Match predicates for registered scripts

use crate::error::EngineError;
use crate::model::{Host, Port, PortState, Protocol};
use crate::utils::ports::parse_ports;
use crate::utils::targets::targets_to_list;
use std::collections::{BTreeSet, HashSet};
use std::str::FromStr;

/// Hosts a script applies to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TargetFilter {
    #[default]
    Any,
    Only(HashSet<String>),
}

impl TargetFilter {
    /// `*` for every host, otherwise a target list in nmap syntax
    pub fn parse(targets: &str) -> Result<Self, EngineError> {
        if targets.trim() == "*" {
            return Ok(TargetFilter::Any);
        }

        let resolved = targets_to_list(targets)?;
        if resolved.is_empty() {
            return Err(EngineError::InvalidFilter {
                filter: "target",
                value: targets.to_string(),
            });
        }
        Ok(TargetFilter::Only(resolved.into_iter().collect()))
    }

    /// Build from several target specifications
    pub fn from_list<S: AsRef<str>>(targets: &[S]) -> Result<Self, EngineError> {
        let joined = targets
            .iter()
            .map(|t| t.as_ref())
            .collect::<Vec<_>>()
            .join(" ");
        Self::parse(&joined)
    }

    pub fn matches(&self, host: &Host) -> bool {
        match self {
            TargetFilter::Any => true,
            TargetFilter::Only(targets) => {
                host.ipv4().map_or(false, |ip| targets.contains(ip))
                    || host.ipv6().map_or(false, |ip| targets.contains(ip))
                    || host.hostnames().any(|name| targets.contains(name))
            }
        }
    }
}

/// Port numbers a port script applies to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PortFilter {
    #[default]
    Any,
    Only(BTreeSet<u16>),
}

impl PortFilter {
    /// `*` for every port, otherwise nmap port syntax
    pub fn parse(ports: &str) -> Result<Self, EngineError> {
        if ports.trim() == "*" {
            return Ok(PortFilter::Any);
        }

        let parsed = parse_ports(ports)?;
        if parsed.is_empty() {
            return Err(EngineError::InvalidFilter {
                filter: "port",
                value: ports.to_string(),
            });
        }
        Ok(PortFilter::Only(parsed.into_iter().collect()))
    }

    pub fn matches(&self, number: u16) -> bool {
        match self {
            PortFilter::Any => true,
            PortFilter::Only(ports) => ports.contains(&number),
        }
    }
}

impl From<u16> for PortFilter {
    fn from(port: u16) -> Self {
        PortFilter::Only(BTreeSet::from([port]))
    }
}

/// Transport a port script applies to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProtocolFilter {
    #[default]
    Any,
    Tcp,
    Udp,
}

impl ProtocolFilter {
    pub fn matches(&self, protocol: &Protocol) -> bool {
        match self {
            ProtocolFilter::Any => true,
            ProtocolFilter::Tcp => *protocol == Protocol::Tcp,
            ProtocolFilter::Udp => *protocol == Protocol::Udp,
        }
    }
}

impl FromStr for ProtocolFilter {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "*" => Ok(ProtocolFilter::Any),
            "tcp" => Ok(ProtocolFilter::Tcp),
            "udp" => Ok(ProtocolFilter::Udp),
            _ => Err(EngineError::InvalidFilter {
                filter: "protocol",
                value: s.to_string(),
            }),
        }
    }
}

/// Port states a port script accepts; `{open}` unless told otherwise
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSet(BTreeSet<PortState>);

impl StateSet {
    pub fn new<I: IntoIterator<Item = PortState>>(states: I) -> Self {
        Self(states.into_iter().collect())
    }

    /// Comma-separated state tokens, e.g. `open,filtered`
    pub fn parse(states: &str) -> Result<Self, EngineError> {
        states
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|token| {
                token.parse::<PortState>().map_err(|_| EngineError::InvalidFilter {
                    filter: "state",
                    value: token.to_string(),
                })
            })
            .collect::<Result<BTreeSet<_>, _>>()
            .map(Self)
    }

    pub fn contains(&self, state: PortState) -> bool {
        self.0.contains(&state)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for StateSet {
    fn default() -> Self {
        Self::new([PortState::Open])
    }
}

/// Everything a port script is matched on besides its targets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortMatch {
    pub ports: PortFilter,
    pub protocol: ProtocolFilter,
    pub states: StateSet,
}

impl PortMatch {
    pub fn new(ports: PortFilter) -> Self {
        Self {
            ports,
            ..Default::default()
        }
    }

    pub fn with_protocol(mut self, protocol: ProtocolFilter) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_states(mut self, states: StateSet) -> Self {
        self.states = states;
        self
    }

    pub fn matches(&self, port: &Port) -> bool {
        self.protocol.matches(port.protocol())
            && self.ports.matches(port.number())
            && self.states.contains(port.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HostStatus;

    fn host(ip: &str, name: &str) -> Host {
        let mut host = Host::new(Some(ip.to_string()), None, HostStatus::default()).unwrap();
        host.add_hostname(name, None);
        host
    }

    #[test]
    fn test_target_filter() {
        let filter = TargetFilter::parse("10.0.0.0/30 web").unwrap();
        assert!(filter.matches(&host("10.0.0.2", "x")));
        assert!(filter.matches(&host("192.168.0.1", "web")));
        assert!(!filter.matches(&host("10.0.0.9", "db")));
        assert!(TargetFilter::parse("*").unwrap().matches(&host("1.1.1.1", "a")));
    }

    #[test]
    fn test_target_filter_rejects_bad_range() {
        assert!(matches!(
            TargetFilter::parse("10.0.0.9-10.0.0.1"),
            Err(EngineError::Range(_))
        ));
        assert!(TargetFilter::parse("   ").is_err());
    }

    #[test]
    fn test_port_filter() {
        let filter = PortFilter::parse("80,443,8000-8010").unwrap();
        assert!(filter.matches(8005));
        assert!(!filter.matches(22));
        assert!(PortFilter::parse("*").unwrap().matches(22));
        assert!(PortFilter::parse("0").is_err());
    }

    #[test]
    fn test_protocol_filter() {
        assert_eq!("TCP".parse::<ProtocolFilter>().unwrap(), ProtocolFilter::Tcp);
        assert!("icmp".parse::<ProtocolFilter>().is_err());
        assert!(ProtocolFilter::Any.matches(&Protocol::Sctp));
        assert!(!ProtocolFilter::Udp.matches(&Protocol::Tcp));
    }

    #[test]
    fn test_state_set() {
        assert!(StateSet::default().contains(PortState::Open));
        assert!(!StateSet::default().contains(PortState::Filtered));
        let states = StateSet::parse("open, filtered").unwrap();
        assert!(states.contains(PortState::Filtered));
        assert!(StateSet::parse("ajar").is_err());
        assert!(StateSet::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_port_match() {
        let rule = PortMatch::new(PortFilter::from(80)).with_protocol(ProtocolFilter::Tcp);
        let open = Port::new(Protocol::Tcp, 80, PortState::Open).unwrap();
        let closed = Port::new(Protocol::Tcp, 80, PortState::Closed).unwrap();
        let udp = Port::new(Protocol::Udp, 80, PortState::Open).unwrap();
        assert!(rule.matches(&open));
        assert!(!rule.matches(&closed));
        assert!(!rule.matches(&udp));
    }
}
