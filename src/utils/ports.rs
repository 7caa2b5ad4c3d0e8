//! Port range parsing and rendering
//!
//! Converts between nmap port syntax (`"22,80,8000-8010"`) and sorted,
//! deduplicated port lists. Rendering always produces the shortest form:
//! consecutive runs collapse to `start-end`, singletons stay as they are.

use crate::error::RangeError;
use std::collections::BTreeSet;

/// Lowest valid port number
pub const MIN_PORT: u32 = 1;
/// Highest valid port number
pub const MAX_PORT: u32 = 65535;

/// Check whether a raw value is a usable port (1-65535)
pub fn valid_port(port: u32) -> bool {
    (MIN_PORT..=MAX_PORT).contains(&port)
}

/// Parse an nmap port specification into a sorted, unique port list
///
/// Each comma-separated term is either a single port or an inclusive
/// `start-end` range. Whitespace is ignored and empty terms are skipped.
///
/// ```
/// use nmapflow::utils::ports::parse_ports;
///
/// assert_eq!(parse_ports("80, 81-83").unwrap(), vec![80, 81, 82, 83]);
/// ```
pub fn parse_ports(spec: &str) -> Result<Vec<u16>, RangeError> {
    let cleaned: String = spec.chars().filter(|c| !c.is_whitespace()).collect();
    let mut ports = BTreeSet::new();

    for term in cleaned.split(',') {
        if term.is_empty() {
            continue;
        }

        match term.split_once('-') {
            Some((start, end)) => {
                let start = parse_bound(start, term, "starting")?;
                let end = parse_bound(end, term, "ending")?;

                if start > end {
                    return Err(RangeError::InvalidPortRange(format!(
                        "{} (start {} is greater than end {})",
                        term, start, end
                    )));
                }

                ports.extend(start..=end);
            }
            None => {
                let port: u32 = term
                    .parse()
                    .map_err(|_| RangeError::InvalidPort(term.to_string()))?;
                if !valid_port(port) {
                    return Err(RangeError::InvalidPort(format!("{} is not a valid port", term)));
                }
                ports.insert(port as u16);
            }
        }
    }

    Ok(ports.into_iter().collect())
}

fn parse_bound(raw: &str, term: &str, which: &str) -> Result<u16, RangeError> {
    if raw.is_empty() {
        return Err(RangeError::InvalidPortRange(format!(
            "{} ({} port not specified)",
            term, which
        )));
    }

    let port: u32 = raw.parse().map_err(|_| {
        RangeError::InvalidPortRange(format!("{} (invalid {} port {})", term, which, raw))
    })?;

    if !valid_port(port) {
        return Err(RangeError::InvalidPort(format!("{} is not a valid port", raw)));
    }

    Ok(port as u16)
}

/// Flatten a list of mixed specifications (`"80"`, `"8000-8002"`) into unique ports
pub fn extend_port_list<S: AsRef<str>>(items: &[S]) -> Result<Vec<u16>, RangeError> {
    let mut ports = BTreeSet::new();
    for item in items {
        ports.extend(parse_ports(item.as_ref())?);
    }
    Ok(ports.into_iter().collect())
}

/// Render ports in the shortest canonical nmap syntax
///
/// Input order and duplicates do not matter; the output is ascending.
/// Port 0 is rejected.
///
/// ```
/// use nmapflow::utils::ports::ports_to_str;
///
/// assert_eq!(ports_to_str(&[443, 80, 81, 82, 22]).unwrap(), "22,80-82,443");
/// ```
pub fn ports_to_str(ports: &[u16]) -> Result<String, RangeError> {
    if let Some(bad) = ports.iter().find(|&&p| !valid_port(p as u32)) {
        return Err(RangeError::InvalidPort(format!("{} is not a valid port", bad)));
    }

    let sorted: BTreeSet<u16> = ports.iter().copied().collect();
    let mut parts = Vec::new();
    let mut iter = sorted.into_iter().peekable();

    while let Some(start) = iter.next() {
        let mut end = start;
        while let Some(&next) = iter.peek() {
            if next as u32 != end as u32 + 1 {
                break;
            }
            end = next;
            iter.next();
        }

        if start == end {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{}-{}", start, end));
        }
    }

    Ok(parts.join(","))
}
