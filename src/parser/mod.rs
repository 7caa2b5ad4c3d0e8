//! nmap XML report ingestion
//!
//! Deserializes the report into the wire layout from [`schema`] and then
//! builds the typed [`ScanResult`]. Any structural problem fails the whole
//! document; optional sections simply default to empty.

mod schema;

use crate::error::ReportError;
use crate::model::{
    Hop, Host, HostStatus, OperatingSystem, OsMatch, Port, PortState, Protocol, ScanInfo,
    ScanMetadata, ScanResult, Service,
};
use chrono::{DateTime, TimeZone, Utc};
use log::{debug, info, warn};
use std::path::Path;
use std::str::FromStr;

/// Parser for nmap's `-oX` output
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlParser;

impl XmlParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a report held in memory
    pub fn parse_str(&self, xml: &str) -> Result<ScanResult, ReportError> {
        let run: schema::NmapRun = quick_xml::de::from_str(xml)?;
        build_result(run)
    }

    /// Parse a report from disk
    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<ScanResult, ReportError> {
        let path = path.as_ref();
        let xml = std::fs::read_to_string(path).map_err(|e| {
            ReportError::Malformed(format!("cannot read {}: {}", path.display(), e))
        })?;
        self.parse_str(&xml)
    }
}

fn build_result(run: schema::NmapRun) -> Result<ScanResult, ReportError> {
    let runstats = run.runstats.ok_or(ReportError::MissingSection("runstats"))?;
    let finished = runstats
        .finished
        .ok_or(ReportError::MissingSection("finished"))?;
    let counts = runstats.hosts.ok_or(ReportError::MissingSection("hosts"))?;

    let mut metadata = ScanMetadata {
        scanner: run.scanner,
        arguments: run.args,
        version: run.version,
        start: opt_timestamp("nmaprun", "start", run.start)?,
        end: opt_timestamp("finished", "time", finished.time)?,
        elapsed: opt_number("finished", "elapsed", finished.elapsed)?,
        summary: finished.summary,
        exit_status: finished.exit,
        hosts_up: opt_number("hosts", "up", counts.up)?,
        hosts_down: opt_number("hosts", "down", counts.down)?,
        hosts_total: opt_number("hosts", "total", counts.total)?,
        verbose: opt_number("verbose", "level", run.verbose.and_then(|v| v.level))?,
        debug: opt_number("debugging", "level", run.debugging.and_then(|d| d.level))?,
        ..Default::default()
    };

    for record in run.scan_info {
        let protocol = record.protocol.unwrap_or_else(|| "unknown".to_string());
        metadata.scan_info.insert(
            protocol,
            ScanInfo {
                scan_type: record.scan_type,
                num_services: opt_number("scaninfo", "numservices", record.num_services)?,
                services: record.services,
            },
        );
    }

    let mut result = ScanResult::new(metadata);
    for (index, wire) in run.hosts.into_iter().enumerate() {
        let host = build_host(index, wire)?;
        debug!("Ingested host {} with {} ports", host.ip(), host.ports().len());
        result.add_host(host);
    }

    info!("Ingested {} hosts from nmap report", result.len());
    Ok(result)
}

fn build_host(index: usize, wire: schema::Host) -> Result<Host, ReportError> {
    let status = wire.status.ok_or(ReportError::MissingStatus(index))?;
    let status = HostStatus {
        state: status.state.unwrap_or_default(),
        reason: status.reason,
        reason_ttl: opt_number("status", "reason_ttl", status.reason_ttl)?,
    };

    let mut ipv4 = None;
    let mut ipv6 = None;
    let mut mac = None;
    let mut vendor = None;
    for address in wire.addresses {
        match address.addr_type.as_deref() {
            Some("ipv4") => ipv4 = Some(address.addr),
            Some("ipv6") => ipv6 = Some(address.addr),
            Some("mac") => {
                mac = Some(address.addr);
                vendor = address.vendor;
            }
            other => debug!("Ignoring address {} of type {:?}", address.addr, other),
        }
    }

    if ipv4.is_none() && ipv6.is_none() {
        return Err(ReportError::MissingAddress(index));
    }

    let fingerprint = wire
        .os
        .as_ref()
        .and_then(|os| os.fingerprint.as_ref())
        .map(|f| f.fingerprint.clone());

    let mut host = Host::new(ipv4, ipv6, status)?
        .with_times(
            opt_timestamp("host", "starttime", wire.start_time)?,
            opt_timestamp("host", "endtime", wire.end_time)?,
        )
        .with_mac(mac, vendor)
        .with_fingerprint(fingerprint);

    if let Some(hostnames) = wire.hostnames {
        for hostname in hostnames.hostnames {
            host.add_hostname(hostname.name, hostname.kind);
        }
    }

    if let Some(ports) = wire.ports {
        for port in ports.ports {
            host.add_port(build_port(port)?);
        }
    }

    if let Some(os) = wire.os {
        for guess in os.matches {
            host.add_os(build_os(guess)?);
        }
    }

    if let Some(trace) = wire.trace {
        for hop in trace.hops {
            host.add_hop(build_hop(hop)?);
        }
    }

    if let Some(hostscript) = wire.hostscript {
        for script in hostscript.scripts {
            host.add_script(script.id, script.output)?;
        }
    }

    Ok(host)
}

fn build_port(wire: schema::Port) -> Result<Port, ReportError> {
    let port_id: u32 = number("port", "portid", &wire.port_id)?;
    let state = wire.state.ok_or(ReportError::MissingSection("state"))?;
    let port_state = PortState::from_str(&state.state).map_err(|_| ReportError::InvalidAttribute {
        element: "state",
        attribute: "state",
        value: state.state.clone(),
    })?;

    let mut port = Port::new(Protocol::from(wire.protocol.as_str()), port_id, port_state)?
        .with_reason(
            state.reason,
            opt_number("state", "reason_ttl", state.reason_ttl)?,
        );

    match wire.service {
        Some(service) => {
            let mut service = build_service(service)?;
            for script in wire.scripts {
                service.add_script(script.id, script.output)?;
            }
            port = port.with_service(service);
        }
        None if !wire.scripts.is_empty() => {
            warn!(
                "Dropping {} script outputs of port {}/{} without a service",
                wire.scripts.len(),
                port_id,
                wire.protocol
            );
        }
        None => {}
    }

    Ok(port)
}

fn build_service(wire: schema::Service) -> Result<Service, ReportError> {
    let mut service = Service::new(wire.name)
        .with_product(wire.product)
        .with_version(wire.version)
        .with_extra_info(wire.extra_info)
        .with_tunnel(wire.tunnel)
        .with_method(wire.method);

    if let Some(conf) = opt_number::<f32>("service", "conf", wire.conf)? {
        service = service.with_confidence(conf)?;
    }

    for cpe in wire.cpes {
        service.add_cpe(cpe);
    }

    Ok(service)
}

fn build_os(wire: schema::OsMatch) -> Result<OperatingSystem, ReportError> {
    let accuracy: f32 = number("osmatch", "accuracy", &wire.accuracy)?;
    let mut os = OperatingSystem::new(wire.name, accuracy)?;

    for class in wire.classes {
        os.add_match(OsMatch {
            os_type: class.os_type,
            vendor: class.vendor,
            family: class.family,
            generation: class.generation,
            cpes: class.cpes,
        });
    }

    Ok(os)
}

fn build_hop(wire: schema::Hop) -> Result<Hop, ReportError> {
    let ttl = wire.ttl.ok_or_else(|| ReportError::InvalidAttribute {
        element: "hop",
        attribute: "ttl",
        value: String::new(),
    })?;

    Ok(Hop {
        ttl: Some(number("hop", "ttl", &ttl)?),
        ip: wire.ip,
        rtt: opt_number("hop", "rtt", wire.rtt)?,
        host: wire.host,
    })
}

fn number<T: FromStr>(
    element: &'static str,
    attribute: &'static str,
    raw: &str,
) -> Result<T, ReportError> {
    raw.trim().parse().map_err(|_| ReportError::InvalidAttribute {
        element,
        attribute,
        value: raw.to_string(),
    })
}

fn opt_number<T: FromStr>(
    element: &'static str,
    attribute: &'static str,
    raw: Option<String>,
) -> Result<Option<T>, ReportError> {
    raw.map(|value| number(element, attribute, &value)).transpose()
}

fn opt_timestamp(
    element: &'static str,
    attribute: &'static str,
    raw: Option<String>,
) -> Result<Option<DateTime<Utc>>, ReportError> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    let seconds: i64 = number(element, attribute, &raw)?;
    Utc.timestamp_opt(seconds, 0)
        .single()
        .map(Some)
        .ok_or(ReportError::InvalidAttribute {
            element,
            attribute,
            value: raw,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"<?xml version="1.0"?>
<nmaprun scanner="nmap" args="nmap -sV 10.0.0.1" start="1700000000" version="7.94">
  <host starttime="1700000001" endtime="1700000009">
    <status state="up" reason="arp-response" reason_ttl="0"/>
    <address addr="10.0.0.1" addrtype="ipv4"/>
  </host>
  <runstats>
    <finished time="1700000010" elapsed="10.02" summary="done" exit="success"/>
    <hosts up="1" down="0" total="1"/>
  </runstats>
</nmaprun>"#;

    #[test]
    fn test_minimal_report() {
        let result = XmlParser::new().parse_str(MINIMAL).unwrap();
        assert_eq!(result.len(), 1);
        let meta = result.metadata();
        assert_eq!(meta.scanner.as_deref(), Some("nmap"));
        assert_eq!(meta.elapsed, Some(10.02));
        assert_eq!(meta.hosts_up, Some(1));
        assert_eq!(meta.start.unwrap().timestamp(), 1_700_000_000);
        assert_eq!(result.get_at(0).unwrap().state(), "up");
    }

    #[test]
    fn test_missing_runstats() {
        let xml = r#"<nmaprun scanner="nmap"></nmaprun>"#;
        assert_eq!(
            XmlParser::new().parse_str(xml).unwrap_err(),
            ReportError::MissingSection("runstats")
        );
    }

    #[test]
    fn test_malformed_number_names_attribute() {
        let xml = MINIMAL.replace(r#"elapsed="10.02""#, r#"elapsed="ten""#);
        let err = XmlParser::new().parse_str(&xml).unwrap_err();
        assert_eq!(
            err,
            ReportError::InvalidAttribute {
                element: "finished",
                attribute: "elapsed",
                value: "ten".to_string(),
            }
        );
    }

    #[test]
    fn test_not_xml() {
        assert!(matches!(
            XmlParser::new().parse_str("Starting Nmap 7.94"),
            Err(ReportError::Malformed(_))
        ));
    }
}
