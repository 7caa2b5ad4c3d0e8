use anyhow::{bail, Context};
use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::*;
use log::LevelFilter;
use std::path::PathBuf;

use nmapflow::{
    config::ScannerConfig,
    model::{Host, PortState, ScanResult},
    parser::XmlParser,
    scanner::{NmapScanner, ScanRequest},
    utils::{extend_port_list, ports_to_str, targets_to_list, PortSelection},
};

fn cli() -> Command {
    Command::new("nmapflow")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Drive nmap and work with its results as typed data")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Debug logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("no-color")
                .long("no-color")
                .help("Disable colored output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Scanner configuration file (default: ~/.nmapflow.toml)")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .subcommand(
            Command::new("scan")
                .about("Run nmap and print the ingested result")
                .arg(
                    Arg::new("targets")
                        .value_name("TARGET")
                        .help("Addresses, hostnames, ranges or CIDR blocks")
                        .required(true)
                        .num_args(1..),
                )
                .arg(
                    Arg::new("ports")
                        .short('p')
                        .long("ports")
                        .value_name("SPEC")
                        .help("Ports for every scan type, e.g. 22,80,8000-8100")
                        .conflicts_with_all(["tcp", "udp", "top-ports"]),
                )
                .arg(
                    Arg::new("tcp")
                        .long("tcp")
                        .value_name("SPEC")
                        .help("TCP ports")
                        .conflicts_with("top-ports"),
                )
                .arg(
                    Arg::new("udp")
                        .long("udp")
                        .value_name("SPEC")
                        .help("UDP ports")
                        .conflicts_with("top-ports"),
                )
                .arg(
                    Arg::new("top-ports")
                        .long("top-ports")
                        .value_name("N")
                        .help("Scan the N most common ports")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    Arg::new("args")
                        .short('a')
                        .long("args")
                        .value_name("ARGS")
                        .help("Extra nmap arguments, quoted as one string")
                        .allow_hyphen_values(true),
                )
                .arg(json_flag())
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .help("Print the nmap command without running it")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("parse")
                .about("Ingest an existing nmap XML report")
                .arg(
                    Arg::new("file")
                        .value_name("FILE")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(json_flag()),
        )
        .subcommand(
            Command::new("expand")
                .about("Expand a port or target specification")
                .subcommand_required(true)
                .subcommand(
                    Command::new("ports")
                        .about("Expand and re-collapse a port specification")
                        .arg(Arg::new("spec").value_name("SPEC").required(true).num_args(1..)),
                )
                .subcommand(
                    Command::new("targets")
                        .about("List every address a target specification covers")
                        .arg(Arg::new("spec").value_name("SPEC").required(true).num_args(1..)),
                ),
        )
}

fn json_flag() -> Arg {
    Arg::new("json")
        .long("json")
        .help("Print the result as JSON")
        .action(ArgAction::SetTrue)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();

    let level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    if matches.get_flag("no-color") {
        colored::control::set_override(false);
    }

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => ScannerConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ScannerConfig::load_default_config(),
    };

    match matches.subcommand() {
        Some(("scan", sub)) => run_scan(config, sub).await,
        Some(("parse", sub)) => run_parse(sub),
        Some(("expand", sub)) => run_expand(sub),
        _ => unreachable!("subcommand is required"),
    }
}

async fn run_scan(config: ScannerConfig, matches: &ArgMatches) -> anyhow::Result<()> {
    let targets: Vec<String> = matches
        .get_many::<String>("targets")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    let mut request = ScanRequest::new(targets);
    if let Some(ports) = port_selection(matches)? {
        request = request.with_ports(ports);
    }
    if let Some(args) = matches.get_one::<String>("args") {
        request = request.with_arguments(args.as_str());
    }

    let scanner = NmapScanner::new(config)?;

    if matches.get_flag("dry-run") {
        let argv = scanner.dry_run(&request)?;
        println!("{}", argv.join(" "));
        return Ok(());
    }

    let result = scanner.scan(&request, None).await?;
    if let Some(errors) = result.tolerant_errors() {
        eprintln!("{} {}", "[!] nmap:".bright_yellow(), errors);
    }
    print_result(&result, matches.get_flag("json"))
}

fn port_selection(matches: &ArgMatches) -> anyhow::Result<Option<PortSelection>> {
    let mut selection = PortSelection::new();

    if let Some(count) = matches.get_one::<u32>("top-ports") {
        selection = selection.with_top_ports(*count)?;
    }
    if let Some(ports) = matches.get_one::<String>("ports") {
        selection = selection.with_ports(ports.as_str())?;
    }
    if let Some(tcp) = matches.get_one::<String>("tcp") {
        selection = selection.with_tcp(tcp.as_str())?;
    }
    if let Some(udp) = matches.get_one::<String>("udp") {
        selection = selection.with_udp(udp.as_str())?;
    }

    Ok((!selection.is_empty()).then_some(selection))
}

fn run_parse(matches: &ArgMatches) -> anyhow::Result<()> {
    let Some(path) = matches.get_one::<PathBuf>("file") else {
        bail!("no report file given");
    };

    let result = XmlParser::new()
        .parse_file(path)
        .with_context(|| format!("parsing {}", path.display()))?;
    print_result(&result, matches.get_flag("json"))
}

fn run_expand(matches: &ArgMatches) -> anyhow::Result<()> {
    match matches.subcommand() {
        Some(("ports", sub)) => {
            let specs: Vec<&String> = sub.get_many::<String>("spec").into_iter().flatten().collect();
            let ports = extend_port_list(&specs)?;
            println!("{} {}", "[~] Ports:".bright_blue(), ports.len().to_string().bright_cyan());
            println!("{}", ports_to_str(&ports)?);
        }
        Some(("targets", sub)) => {
            let specs: Vec<&str> = sub
                .get_many::<String>("spec")
                .into_iter()
                .flatten()
                .map(String::as_str)
                .collect();
            let targets = targets_to_list(&specs.join(" "))?;
            println!("{} {}", "[~] Targets:".bright_blue(), targets.len().to_string().bright_cyan());
            for target in targets {
                println!("{}", target);
            }
        }
        _ => unreachable!("subcommand is required"),
    }
    Ok(())
}

fn print_result(result: &ScanResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    let meta = result.metadata();
    if let Some(args) = &meta.arguments {
        println!("{} {}", "[~] Command:".bright_blue(), args);
    }

    for host in result {
        print_host(host);
    }

    println!(
        "\n{} {} hosts ({} up) in {:.2}s",
        "[✓]".bright_green(),
        meta.hosts_total.unwrap_or(result.len() as u32).to_string().bright_cyan(),
        meta.hosts_up.unwrap_or_default(),
        meta.elapsed.unwrap_or_default()
    );
    Ok(())
}

fn print_host(host: &Host) {
    let names: Vec<&str> = host.hostnames().collect();
    if names.is_empty() {
        println!("\nNmap scan report for {}", host.ip().bright_cyan());
    } else {
        println!("\nNmap scan report for {} ({})", names.join(", ").bright_cyan(), host.ip());
    }
    println!("Host is {}.", host.state());

    for (name, output) in host.scripts().iter() {
        println!("| {}: {}", name.bright_magenta(), output);
    }

    if host.ports().is_empty() {
        return;
    }

    println!(
        "{:<10} {:<16} {}",
        "PORT".bright_white().bold(),
        "STATE".bright_white().bold(),
        "SERVICE".bright_white().bold()
    );
    for port in host.ports() {
        let state = port.state().to_string();
        let state = match port.state() {
            PortState::Open => state.bright_green(),
            PortState::Closed => state.bright_red(),
            PortState::Filtered | PortState::OpenFiltered => state.bright_yellow(),
            _ => state.white(),
        };

        let service = port.service();
        let mut description = service.map(|s| s.name().to_string()).unwrap_or_default();
        if let Some(product) = service.and_then(|s| s.product()) {
            description.push(' ');
            description.push_str(product);
        }
        if let Some(version) = service.and_then(|s| s.version()) {
            description.push(' ');
            description.push_str(version);
        }

        println!(
            "{:<10} {:<16} {}",
            format!("{}/{}", port.number(), port.protocol()).bright_white(),
            state,
            description.bright_yellow()
        );

        if let Some(service) = service {
            for (name, output) in service.scripts().iter() {
                println!("| {}: {}", name.bright_magenta(), output);
            }
        }
    }

    if let Some(os) = host.most_accurate_os() {
        println!("OS: {} ({}%)", os.name().bright_cyan(), os.accuracy());
    }
}
