//! Target specification parsing
//!
//! Expands the four nmap target shapes into concrete IPv4 address strings:
//! single addresses, `addr1-addr2` walks, `addr/prefix` blocks and partial
//! octet ranges such as `10.0-3.5.1-2`. Anything else is treated as a
//! hostname and passed through unresolved.

use crate::error::RangeError;
use ipnetwork::Ipv4Network;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::net::Ipv4Addr;

/// Largest number of addresses a single token may expand to
pub const MAX_EXPANSION: u64 = 1 << 24;

const OCTET: &str = r"(?:[0-9]|[1-9][0-9]|1[0-9]{2}|2[0-4][0-9]|25[0-5])";
const PREFIX: &str = r"(?:[0-9]|[12][0-9]|3[0-2])";

static SINGLE_IP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^{o}\.{o}\.{o}\.{o}$", o = OCTET)).expect("valid address regex")
});

static IP_RANGE: Lazy<Regex> = Lazy::new(|| {
    let ip = format!(r"{o}\.{o}\.{o}\.{o}", o = OCTET);
    Regex::new(&format!(r"^{ip}-{ip}$", ip = ip)).expect("valid range regex")
});

static CIDR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^{o}\.{o}\.{o}\.{o}/{p}$", o = OCTET, p = PREFIX))
        .expect("valid cidr regex")
});

static PARTIAL: Lazy<Regex> = Lazy::new(|| {
    let part = format!(r"{o}(?:-{o})?", o = OCTET);
    Regex::new(&format!(r"^{p}\.{p}\.{p}\.{p}$", p = part)).expect("valid partial regex")
});

/// Shape of a single whitespace-separated target token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Single,
    Range,
    Network,
    Partial,
    Hostname,
}

/// Classify a token, most specific shape first
pub fn classify(token: &str) -> TargetKind {
    if SINGLE_IP.is_match(token) {
        TargetKind::Single
    } else if IP_RANGE.is_match(token) {
        TargetKind::Range
    } else if CIDR.is_match(token) {
        TargetKind::Network
    } else if PARTIAL.is_match(token) {
        TargetKind::Partial
    } else {
        TargetKind::Hostname
    }
}

/// Strict dotted-quad check: four octets, each 0-255, no leading zeros
pub fn valid_ip(ip: &str) -> bool {
    SINGLE_IP.is_match(ip)
}

fn to_addr(ip: &str) -> Result<Ipv4Addr, RangeError> {
    if !valid_ip(ip) {
        return Err(RangeError::MalformedAddress(ip.to_string()));
    }
    ip.parse()
        .map_err(|_| RangeError::MalformedAddress(ip.to_string()))
}

/// Every address from `start` to `end` inclusive, in ascending order
///
/// The four octets are walked as a big-endian base-256 counter, so
/// `192.168.1.255` is followed by `192.168.2.0`.
pub fn ip_range(start: &str, end: &str) -> Result<Vec<String>, RangeError> {
    let first = u32::from(to_addr(start)?);
    let last = u32::from(to_addr(end)?);

    if first > last {
        return Err(RangeError::MalformedAddress(format!(
            "{}-{} (start is greater than end)",
            start, end
        )));
    }

    let count = (last - first) as u64 + 1;
    if count > MAX_EXPANSION {
        return Err(RangeError::TooLarge(format!("{}-{} ({} addresses)", start, end, count)));
    }

    Ok((first..=last).map(|n| Ipv4Addr::from(n).to_string()).collect())
}

/// Expand a partial range such as `10.0-3.5.1-2`
///
/// Every octet is a literal or an inclusive sub-range and the result is
/// the Cartesian product across all four positions.
pub fn partial_ip_range(spec: &str) -> Result<Vec<String>, RangeError> {
    let octets: Vec<&str> = spec.split('.').collect();
    if octets.len() != 4 {
        return Err(RangeError::MalformedAddress(spec.to_string()));
    }

    let mut bounds = Vec::with_capacity(4);
    let mut count: u64 = 1;
    for octet in &octets {
        let (low, high) = parse_octet_range(octet, spec)?;
        count *= (high - low) as u64 + 1;
        bounds.push((low, high));
    }

    if count > MAX_EXPANSION {
        return Err(RangeError::TooLarge(format!("{} ({} addresses)", spec, count)));
    }

    let mut addresses = Vec::with_capacity(count as usize);
    for a in bounds[0].0..=bounds[0].1 {
        for b in bounds[1].0..=bounds[1].1 {
            for c in bounds[2].0..=bounds[2].1 {
                for d in bounds[3].0..=bounds[3].1 {
                    addresses.push(format!("{}.{}.{}.{}", a, b, c, d));
                }
            }
        }
    }

    Ok(addresses)
}

fn parse_octet_range(octet: &str, spec: &str) -> Result<(u8, u8), RangeError> {
    let malformed = || RangeError::MalformedAddress(format!("{} (bad octet {})", spec, octet));

    let parse = |raw: &str| -> Result<u8, RangeError> {
        let value: u32 = raw.parse().map_err(|_| malformed())?;
        u8::try_from(value).map_err(|_| malformed())
    };

    match octet.split_once('-') {
        Some((low, high)) => {
            let (low, high) = (parse(low)?, parse(high)?);
            if low > high {
                return Err(malformed());
            }
            Ok((low, high))
        }
        None => {
            let value = parse(octet)?;
            Ok((value, value))
        }
    }
}

/// Every address of an `addr/prefix` block except the network address
///
/// The broadcast address is kept, so `192.168.1.0/30` yields `.1`, `.2`
/// and `.3`, and a `/32` yields nothing. Host bits set in `addr` are masked
/// off before expansion.
pub fn dispatch_network(network: &str) -> Result<Vec<String>, RangeError> {
    let (addr, prefix) = network
        .split_once('/')
        .ok_or_else(|| RangeError::MalformedAddress(network.to_string()))?;

    let addr = to_addr(addr)?;
    let prefix: u8 = prefix
        .parse()
        .map_err(|_| RangeError::MalformedAddress(format!("{} (bad prefix)", network)))?;

    let block = Ipv4Network::new(addr, prefix)
        .map_err(|e| RangeError::MalformedAddress(format!("{} ({})", network, e)))?;

    let first = u32::from(block.network());
    let last = u32::from(block.broadcast());
    let count = (last - first) as u64;
    if count > MAX_EXPANSION {
        return Err(RangeError::TooLarge(format!("{} ({} addresses)", network, count)));
    }

    if first == last {
        return Ok(Vec::new());
    }

    Ok((first + 1..=last).map(|n| Ipv4Addr::from(n).to_string()).collect())
}

/// Expand a single token according to its shape
pub fn expand_target(token: &str) -> Result<Vec<String>, RangeError> {
    match classify(token) {
        TargetKind::Single | TargetKind::Hostname => Ok(vec![token.to_string()]),
        TargetKind::Range => {
            let (start, end) = token
                .split_once('-')
                .ok_or_else(|| RangeError::MalformedAddress(token.to_string()))?;
            ip_range(start, end)
        }
        TargetKind::Network => dispatch_network(token),
        TargetKind::Partial => partial_ip_range(token),
    }
}

/// Expand a whitespace-separated target list into unique targets
///
/// Hostnames are passed through unresolved. Duplicates are removed; the
/// first occurrence decides the position of an address in the output.
pub fn targets_to_list(targets: &str) -> Result<Vec<String>, RangeError> {
    let mut seen = HashSet::new();
    let mut expanded = Vec::new();

    for token in targets.split_whitespace() {
        let addresses = expand_target(token)?;
        debug!("Target {} expanded to {} entries", token, addresses.len());
        for address in addresses {
            if seen.insert(address.clone()) {
                expanded.push(address);
            }
        }
    }

    Ok(expanded)
}

/// Validate every token of a target list without keeping the expansion
pub fn validate_targets<S: AsRef<str>>(targets: &[S]) -> Result<(), RangeError> {
    for target in targets {
        for token in target.as_ref().split_whitespace() {
            match classify(token) {
                TargetKind::Single | TargetKind::Hostname => {}
                _ => {
                    expand_target(token)?;
                }
            }
        }
    }
    Ok(())
}
