//! Wire layout of the nmap XML report
//!
//! Mirrors only the elements nmapflow reads. Attributes stay raw strings
//! here; numeric coercion happens while building the typed entities so a
//! bad value can be reported together with the element it came from.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct NmapRun {
    #[serde(rename = "@scanner")]
    pub scanner: Option<String>,
    #[serde(rename = "@args")]
    pub args: Option<String>,
    #[serde(rename = "@start")]
    pub start: Option<String>,
    #[serde(rename = "@version")]
    pub version: Option<String>,

    #[serde(rename = "scaninfo", default)]
    pub scan_info: Vec<ScanInfo>,
    pub verbose: Option<Level>,
    pub debugging: Option<Level>,

    #[serde(rename = "host", default)]
    pub hosts: Vec<Host>,

    pub runstats: Option<RunStats>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScanInfo {
    #[serde(rename = "@type")]
    pub scan_type: Option<String>,
    #[serde(rename = "@protocol")]
    pub protocol: Option<String>,
    #[serde(rename = "@numservices")]
    pub num_services: Option<String>,
    #[serde(rename = "@services")]
    pub services: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Level {
    #[serde(rename = "@level")]
    pub level: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RunStats {
    pub finished: Option<Finished>,
    pub hosts: Option<HostCounts>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Finished {
    #[serde(rename = "@time")]
    pub time: Option<String>,
    #[serde(rename = "@elapsed")]
    pub elapsed: Option<String>,
    #[serde(rename = "@summary")]
    pub summary: Option<String>,
    #[serde(rename = "@exit")]
    pub exit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HostCounts {
    #[serde(rename = "@up")]
    pub up: Option<String>,
    #[serde(rename = "@down")]
    pub down: Option<String>,
    #[serde(rename = "@total")]
    pub total: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Host {
    #[serde(rename = "@starttime")]
    pub start_time: Option<String>,
    #[serde(rename = "@endtime")]
    pub end_time: Option<String>,

    pub status: Option<Status>,
    #[serde(rename = "address", default)]
    pub addresses: Vec<Address>,
    pub hostnames: Option<Hostnames>,
    pub ports: Option<Ports>,
    pub os: Option<Os>,
    pub trace: Option<Trace>,
    pub hostscript: Option<HostScript>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Status {
    #[serde(rename = "@state")]
    pub state: Option<String>,
    #[serde(rename = "@reason")]
    pub reason: Option<String>,
    #[serde(rename = "@reason_ttl")]
    pub reason_ttl: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Address {
    #[serde(rename = "@addr")]
    pub addr: String,
    #[serde(rename = "@addrtype")]
    pub addr_type: Option<String>,
    #[serde(rename = "@vendor")]
    pub vendor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Hostnames {
    #[serde(rename = "hostname", default)]
    pub hostnames: Vec<Hostname>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Hostname {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Ports {
    #[serde(rename = "port", default)]
    pub ports: Vec<Port>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Port {
    #[serde(rename = "@protocol")]
    pub protocol: String,
    #[serde(rename = "@portid")]
    pub port_id: String,

    pub state: Option<PortState>,
    pub service: Option<Service>,
    #[serde(rename = "script", default)]
    pub scripts: Vec<Script>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PortState {
    #[serde(rename = "@state")]
    pub state: String,
    #[serde(rename = "@reason")]
    pub reason: Option<String>,
    #[serde(rename = "@reason_ttl")]
    pub reason_ttl: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Service {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@product")]
    pub product: Option<String>,
    #[serde(rename = "@version")]
    pub version: Option<String>,
    #[serde(rename = "@extrainfo")]
    pub extra_info: Option<String>,
    #[serde(rename = "@tunnel")]
    pub tunnel: Option<String>,
    #[serde(rename = "@method")]
    pub method: Option<String>,
    #[serde(rename = "@conf")]
    pub conf: Option<String>,
    #[serde(rename = "cpe", default)]
    pub cpes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Script {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@output", default)]
    pub output: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Os {
    #[serde(rename = "osmatch", default)]
    pub matches: Vec<OsMatch>,
    #[serde(rename = "osfingerprint")]
    pub fingerprint: Option<OsFingerprint>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OsMatch {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@accuracy")]
    pub accuracy: String,
    #[serde(rename = "osclass", default)]
    pub classes: Vec<OsClass>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OsClass {
    #[serde(rename = "@type")]
    pub os_type: Option<String>,
    #[serde(rename = "@vendor")]
    pub vendor: Option<String>,
    #[serde(rename = "@osfamily")]
    pub family: Option<String>,
    #[serde(rename = "@osgen")]
    pub generation: Option<String>,
    #[serde(rename = "cpe", default)]
    pub cpes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OsFingerprint {
    #[serde(rename = "@fingerprint")]
    pub fingerprint: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Trace {
    #[serde(rename = "hop", default)]
    pub hops: Vec<Hop>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Hop {
    #[serde(rename = "@ttl")]
    pub ttl: Option<String>,
    #[serde(rename = "@ipaddr")]
    pub ip: Option<String>,
    #[serde(rename = "@rtt")]
    pub rtt: Option<String>,
    #[serde(rename = "@host")]
    pub host: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HostScript {
    #[serde(rename = "script", default)]
    pub scripts: Vec<Script>,
}
