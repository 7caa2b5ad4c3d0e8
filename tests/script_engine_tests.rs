//! Integration tests for the script engine over an ingested report

use nmapflow::{
    model::{PortState, Protocol, ScanResult, ScriptOutput},
    parser::XmlParser,
    scripts::{PortFilter, PortMatch, ProtocolFilter, ScriptEngine, ScriptOutcome, StateSet, TargetFilter},
    MissingScriptError, ModelError, ScanError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn fixture() -> ScanResult {
    XmlParser::new()
        .parse_str(include_str!("fixtures/scan.xml"))
        .unwrap()
}

fn http_rule() -> PortMatch {
    PortMatch::new(PortFilter::from(80)).with_protocol(ProtocolFilter::Tcp)
}

#[test]
fn test_port_script_runs_on_every_matching_host() {
    let mut engine = ScriptEngine::new();
    engine
        .register_port_script("http-product", TargetFilter::Any, http_rule(), |host, port| {
            let product = port.service().and_then(|s| s.product()).unwrap_or("unknown");
            ScriptOutcome::produced(format!("{} runs {}", host.ip(), product))
        })
        .unwrap();

    let mut result = fixture();
    engine.run(&mut result).unwrap();

    let outputs: Vec<String> = result
        .iter()
        .map(|host| {
            let service = host.port(80, &Protocol::Tcp).unwrap().service().unwrap();
            service.get_script("http-product").unwrap().to_string()
        })
        .collect();
    assert_eq!(
        outputs,
        vec!["192.168.1.10 runs nginx", "192.168.1.20 runs Apache httpd"]
    );

    // ssh port untouched
    let ssh = result.get_at(0).unwrap().port(22, &Protocol::Tcp).unwrap();
    assert!(ssh.service().unwrap().get_script("http-product").is_err());
}

#[test]
fn test_host_script_respects_target_filter() {
    let mut engine = ScriptEngine::new();
    engine
        .register_host_script("owner", TargetFilter::parse("db.lan").unwrap(), |_| {
            ScriptOutcome::produced("dba team")
        })
        .unwrap();

    let mut result = fixture();
    engine.run(&mut result).unwrap();

    assert!(result.get_at(0).unwrap().get_script("owner").is_err());
    assert_eq!(
        result.get_at(1).unwrap().get_script("owner").unwrap().as_text(),
        Some("dba team")
    );
}

#[test]
fn test_ports_without_service_are_never_offered() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);

    let mut engine = ScriptEngine::new();
    engine
        .register_port_script(
            "probe",
            TargetFilter::Any,
            PortMatch::default().with_states(StateSet::new([PortState::Filtered])),
            move |_, _| {
                seen.fetch_add(1, Ordering::SeqCst);
                ScriptOutcome::produced("filtered")
            },
        )
        .unwrap();

    let mut result = fixture();
    engine.run(&mut result).unwrap();
    // 8080 is the only filtered port and it has no service
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_closed_ports_need_explicit_state() {
    let mut engine = ScriptEngine::new();
    engine
        .register_port_script(
            "mysql-note",
            TargetFilter::Any,
            PortMatch::new(PortFilter::from(3306)).with_states(StateSet::parse("closed").unwrap()),
            |_, _| ScriptOutcome::produced("down"),
        )
        .unwrap();

    let mut result = fixture();
    engine.run(&mut result).unwrap();

    let mysql = result.get_at(1).unwrap().port(3306, &Protocol::Tcp).unwrap();
    assert_eq!(
        mysql.service().unwrap().get_script("mysql-note").unwrap().as_text(),
        Some("down")
    );
}

#[test]
fn test_skipped_writes_nothing() {
    let mut engine = ScriptEngine::new();
    engine
        .register_port_script("nginx-only", TargetFilter::Any, http_rule(), |_, port| {
            port.service()
                .filter(|s| s.product() == Some("nginx"))
                .map(|_| "nginx")
                .into()
        })
        .unwrap();

    let mut result = fixture();
    engine.run(&mut result).unwrap();

    let apache = result.get_at(1).unwrap().port(80, &Protocol::Tcp).unwrap();
    assert!(apache.service().unwrap().get_script("nginx-only").is_err());
    let nginx = result.get_at(0).unwrap().port(80, &Protocol::Tcp).unwrap();
    assert!(nginx.service().unwrap().get_script("nginx-only").is_ok());
}

#[test]
fn test_script_failure_surfaces_with_name() {
    let mut engine = ScriptEngine::new();
    engine
        .register_host_script("lookup", TargetFilter::Any, |host| {
            ScriptOutcome::failed(format!("whois refused for {}", host.ip()))
        })
        .unwrap();

    let mut result = fixture();
    match engine.run(&mut result) {
        Err(ScanError::ScriptFailed { name, source }) => {
            assert_eq!(name, "lookup");
            assert!(source.to_string().contains("192.168.1.10"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_duplicate_script_on_service() {
    let mut engine = ScriptEngine::new();
    engine
        .register_port_script("http-title", TargetFilter::Any, http_rule(), |_, _| {
            ScriptOutcome::produced("again")
        })
        .unwrap();

    let mut result = fixture();
    assert!(matches!(
        engine.run(&mut result),
        Err(ScanError::Model(ModelError::DuplicateScript(ref name))) if name == "http-title"
    ));
}

fn with_http_enum(engine: &mut ScriptEngine) {
    engine
        .register_port_script("http-enum", TargetFilter::Any, http_rule(), |_, _| {
            ScriptOutcome::produced("/admin\n/login")
        })
        .unwrap();
}

#[test]
fn test_parser_rewrites_output() {
    let mut engine = ScriptEngine::new();
    with_http_enum(&mut engine);
    engine
        .register_parser("http-enum", |output| {
            let paths: Vec<&str> = output.as_text().unwrap_or_default().lines().collect();
            Ok(ScriptOutput::Structured(serde_json::json!(paths)))
        })
        .unwrap();

    let mut result = fixture();
    engine.run(&mut result).unwrap();

    for host in &result {
        let service = host.port(80, &Protocol::Tcp).unwrap().service().unwrap();
        assert_eq!(
            service.get_script("http-enum").unwrap().as_structured(),
            Some(&serde_json::json!(["/admin", "/login"]))
        );
    }
}

#[test]
fn test_parser_missing_own_output_is_ignored() {
    let mut engine = ScriptEngine::new();
    with_http_enum(&mut engine);
    engine
        .register_parser("http-enum", |_| Err(MissingScriptError::new("http-enum").into()))
        .unwrap();

    let mut result = fixture();
    engine.run(&mut result).unwrap();

    let service = result.get_at(0).unwrap().port(80, &Protocol::Tcp).unwrap().service().unwrap();
    assert_eq!(
        service.get_script("http-enum").unwrap().as_text(),
        Some("/admin\n/login")
    );
}

#[test]
fn test_parser_missing_other_output_propagates() {
    let mut engine = ScriptEngine::new();
    with_http_enum(&mut engine);
    engine
        .register_parser("http-enum", |_| Err(MissingScriptError::new("http-headers").into()))
        .unwrap();

    let mut result = fixture();
    let err = engine.run(&mut result).unwrap_err();
    assert!(err.is_missing_script("http-headers"));
}

#[test]
fn test_named_parsers_run_before_global() {
    let mut engine = ScriptEngine::new();
    engine
        .register_parser("http-title", |_| Ok("renamed".into()))
        .unwrap();
    engine.register_global_parser(|name, output| {
        Ok(match output.as_text() {
            Some(text) => format!("[{}] {}", name, text).into(),
            None => output.clone(),
        })
    });

    let mut result = fixture();
    engine.run(&mut result).unwrap();

    let web = result.get_at(0).unwrap();
    let http = web.port(80, &Protocol::Tcp).unwrap().service().unwrap();
    assert_eq!(
        http.get_script("http-title").unwrap().as_text(),
        Some("[http-title] renamed")
    );
    assert!(web
        .get_script("clock-skew")
        .unwrap()
        .as_text()
        .unwrap()
        .starts_with("[clock-skew] mean"));
}
