//! Integration tests for nmap XML report ingestion

use nmapflow::{
    model::{HostSelector, PortState, Protocol},
    parser::XmlParser,
    ReportError, ScanResult,
};
use std::io::Write;

const FIXTURE: &str = include_str!("fixtures/scan.xml");

fn fixture() -> ScanResult {
    XmlParser::new().parse_str(FIXTURE).unwrap()
}

#[test]
fn test_metadata() {
    let result = fixture();
    let meta = result.metadata();

    assert_eq!(meta.scanner.as_deref(), Some("nmap"));
    assert_eq!(meta.version.as_deref(), Some("7.94"));
    assert_eq!(meta.start.unwrap().timestamp(), 1_700_000_000);
    assert_eq!(meta.end.unwrap().timestamp(), 1_700_000_050);
    assert_eq!(meta.elapsed, Some(50.12));
    assert_eq!(meta.exit_status.as_deref(), Some("success"));
    assert_eq!(meta.hosts_up, Some(2));
    assert_eq!(meta.hosts_down, Some(0));
    assert_eq!(meta.hosts_total, Some(2));
    assert_eq!(meta.verbose, Some(0));
    assert!(meta.summary.as_deref().unwrap().contains("2 hosts up"));

    let tcp = &meta.scan_info["tcp"];
    assert_eq!(tcp.scan_type.as_deref(), Some("syn"));
    assert_eq!(tcp.num_services, Some(4));
    assert_eq!(tcp.services_list().unwrap(), vec![22, 80, 3306, 8080]);
    assert_eq!(meta.scan_info["udp"].services_list().unwrap(), vec![53]);
}

#[test]
fn test_hosts_in_report_order() {
    let result = fixture();
    let ips: Vec<&str> = result.iter().map(|h| h.ip()).collect();
    assert_eq!(ips, vec!["192.168.1.10", "192.168.1.20"]);
}

#[test]
fn test_host_details() {
    let result = fixture();
    let web = result.get_at(0).unwrap();

    assert_eq!(web.state(), "up");
    assert_eq!(web.status().reason.as_deref(), Some("arp-response"));
    assert_eq!(web.mac(), Some("52:54:00:12:34:56"));
    assert_eq!(web.vendor(), Some("QEMU virtual NIC"));
    assert_eq!(web.start_time().unwrap().timestamp(), 1_700_000_001);
    assert!(web.fingerprint().unwrap().starts_with("OS:SCAN"));

    // repeated name keeps one entry with the later type
    let names: Vec<&str> = web.hostnames().collect();
    assert_eq!(names, vec!["web.lan", "www.lan"]);
    assert_eq!(web.hostnames_with_type()[0].kind.as_deref(), Some("PTR"));
}

#[test]
fn test_ports_and_services() {
    let result = fixture();
    let web = result.get_at(0).unwrap();

    assert_eq!(web.ports().len(), 3);
    assert_eq!(web.tcp_ports().count(), 2);
    assert_eq!(web.udp_ports().count(), 1);

    let ssh = web.port(22, &Protocol::Tcp).unwrap();
    assert_eq!(ssh.state(), PortState::Open);
    assert_eq!(ssh.reason(), Some("syn-ack"));
    assert_eq!(ssh.reason_ttl(), Some(64));

    let service = ssh.service().unwrap();
    assert_eq!(service.name(), "ssh");
    assert_eq!(service.product(), Some("OpenSSH"));
    assert_eq!(service.version(), Some("8.9p1 Ubuntu 3ubuntu0.4"));
    assert_eq!(service.method(), Some("probed"));
    assert_eq!(service.confidence(), Some(10.0));
    assert_eq!(service.cpes().len(), 2);

    let hostkey = service.get_script("ssh-hostkey").unwrap().as_text().unwrap();
    assert!(hostkey.contains("ED25519"));
    assert!(hostkey.contains('\n'));

    assert!(web.port(53, &Protocol::Tcp).is_none());
    assert_eq!(web.port(53, &Protocol::Udp).unwrap().service().unwrap().name(), "domain");

    let db = result.get_at(1).unwrap();
    let mysql = db.port(3306, &Protocol::Tcp).unwrap();
    assert_eq!(mysql.state(), PortState::Closed);
    assert_eq!(mysql.service().unwrap().confidence(), Some(3.0));
    assert!(db.port(8080, &Protocol::Tcp).unwrap().service().is_none());
}

#[test]
fn test_scripts() {
    let result = fixture();
    let web = result.get_at(0).unwrap();

    assert_eq!(
        web.get_script("clock-skew").unwrap().as_text(),
        Some("mean: 0s, deviation: 0s, median: 0s")
    );
    let missing = web.get_script("smb-os-discovery").unwrap_err();
    assert_eq!(missing.name, "smb-os-discovery");

    let http = web.port(80, &Protocol::Tcp).unwrap().service().unwrap();
    let names: Vec<&str> = http.scripts().names().collect();
    assert_eq!(names, vec!["http-server-header", "http-title"]);
}

#[test]
fn test_os_and_traceroute() {
    let result = fixture();
    let web = result.get_at(0).unwrap();

    assert_eq!(web.os_matches().len(), 2);
    let best = web.most_accurate_os().unwrap();
    assert_eq!(best.name(), "Linux 5.0 - 5.14");
    assert_eq!(best.accuracy(), 98.0);
    assert_eq!(best.matches()[0].generation.as_deref(), Some("5.X"));
    assert_eq!(web.os_matches()[1].matches().len(), 2);

    let hops = web.traceroute();
    assert_eq!(hops.len(), 2);
    assert_eq!(hops[0].ttl, Some(1));
    assert_eq!(hops[0].host.as_deref(), Some("gateway.lan"));
    assert_eq!(hops[1].rtt, Some(0.61));
    assert_eq!(hops[1].host, None);

    let db = result.get_at(1).unwrap();
    assert!(db.most_accurate_os().is_none());
    assert!(db.traceroute().is_empty());
}

#[test]
fn test_find_hosts() {
    let result = fixture();

    let found = result
        .find(&HostSelector::ByAddressOrHostname("192.168.1.0/24".to_string()))
        .unwrap();
    assert_eq!(found.len(), 2);

    let found = result
        .find(&HostSelector::ByMany(vec!["db.lan".to_string(), "10.0.0.1".to_string()]))
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].ip(), "192.168.1.20");

    assert_eq!(result.find(&HostSelector::ByPosition(5)).unwrap().len(), 0);
    assert!(result
        .find(&HostSelector::ByAddressOrHostname("192.168.1.9-192.168.1.1".to_string()))
        .is_err());

    assert!(result.contains("www.lan"));
    assert!(!result.contains("192.168.1.30"));
}

#[test]
fn test_json_serialization() {
    let result = fixture();
    let json = serde_json::to_value(&result).unwrap();

    let port = &json["hosts"][0]["ports"][1];
    assert_eq!(port["protocol"], "tcp");
    assert_eq!(port["state"], "open");
    assert_eq!(port["service"]["scripts"]["http-title"], "Welcome to nginx!");
}

#[test]
fn test_missing_address_fails_document() {
    let xml = FIXTURE.replace(
        r#"<address addr="192.168.1.20" addrtype="ipv4"/>"#,
        r#"<address addr="aa:bb:cc:dd:ee:ff" addrtype="mac"/>"#,
    );
    assert_eq!(
        XmlParser::new().parse_str(&xml).unwrap_err(),
        ReportError::MissingAddress(1)
    );
}

#[test]
fn test_missing_status_fails_document() {
    let xml = FIXTURE.replace(
        r#"<status state="up" reason="echo-reply" reason_ttl="63"/>"#,
        "",
    );
    assert_eq!(
        XmlParser::new().parse_str(&xml).unwrap_err(),
        ReportError::MissingStatus(1)
    );
}

#[test]
fn test_bad_port_state() {
    let xml = FIXTURE.replace(r#"state="filtered""#, r#"state="ajar""#);
    assert!(matches!(
        XmlParser::new().parse_str(&xml),
        Err(ReportError::InvalidAttribute { element: "state", .. })
    ));
}

#[test]
fn test_parse_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(FIXTURE.as_bytes()).unwrap();

    let result = XmlParser::new().parse_file(file.path()).unwrap();
    assert_eq!(result.len(), 2);

    assert!(matches!(
        XmlParser::new().parse_file("/nonexistent/report.xml"),
        Err(ReportError::Malformed(_))
    ));
}
