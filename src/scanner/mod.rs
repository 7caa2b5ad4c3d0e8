//! nmap invocation front-end
//!
//! Renders a [`ScanRequest`] into an nmap command line, runs the external
//! binary and hands its XML report to the ingestion layer. Multi-format
//! captures are written into a temporary directory that lives exactly as
//! long as the scan call.

pub mod background;
pub mod status;

use crate::config::ScannerConfig;
use crate::error::ReportError;
use crate::model::{OutputFormat, RawOutputs, ScanResult};
use crate::parser::XmlParser;
use crate::scripts::ScriptEngine;
use crate::utils::port_spec::PortSelection;
use crate::utils::targets::validate_targets;
use crate::{Result, ScanError};
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;

pub use background::BackgroundScan;
pub use status::ScanStatus;

/// Arguments the front-end manages itself and never accepts from callers
pub const RESERVED_ARGS: [&str; 6] = ["--resume", "-oX", "-oN", "-oA", "-oG", "-oS"];

/// One scan invocation: what to scan and what to keep
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanRequest {
    targets: Vec<String>,
    ports: Option<PortSelection>,
    arguments: Option<String>,
    outputs: BTreeSet<OutputFormat>,
}

impl ScanRequest {
    /// Each target may itself hold several whitespace-separated tokens
    pub fn new<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_ports(mut self, ports: PortSelection) -> Self {
        self.ports = Some(ports);
        self
    }

    /// Extra nmap arguments as one shell-like string
    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.arguments = Some(arguments.into());
        self
    }

    /// Keep the raw text of `format` on the result
    pub fn with_output(mut self, format: OutputFormat) -> Self {
        self.outputs.insert(format);
        self
    }

    pub fn with_all_outputs(mut self) -> Self {
        self.outputs
            .extend([OutputFormat::Xml, OutputFormat::Normal, OutputFormat::Grep]);
        self
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn ports(&self) -> Option<&PortSelection> {
        self.ports.as_ref()
    }

    pub fn arguments(&self) -> Option<&str> {
        self.arguments.as_deref()
    }

    pub fn outputs(&self) -> &BTreeSet<OutputFormat> {
        &self.outputs
    }
}

/// Where the XML report of a finished run is read from
#[derive(Debug)]
pub(crate) enum ReportSource {
    Stdout,
    /// `-oA` capture; the directory is removed when this value drops
    Files {
        _dir: TempDir,
        base: PathBuf,
        formats: BTreeSet<OutputFormat>,
    },
    /// A resumed scan appends to its original report
    Resumed(PathBuf),
}

impl ReportSource {
    fn xml_path(&self) -> Option<PathBuf> {
        match self {
            ReportSource::Stdout => None,
            ReportSource::Files { base, .. } => Some(base.with_extension("xml")),
            ReportSource::Resumed(path) => Some(path.clone()),
        }
    }
}

/// Both output streams of a finished nmap process
#[derive(Debug, Default)]
pub(crate) struct Capture {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl From<std::process::Output> for Capture {
    fn from(output: std::process::Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// Re-usable nmap runner
#[derive(Debug, Clone, Default)]
pub struct NmapScanner {
    config: ScannerConfig,
    parser: XmlParser,
}

impl NmapScanner {
    pub fn new(config: ScannerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            parser: XmlParser::new(),
        })
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Render the argv for `request`
    ///
    /// `output_base` is the `-oA` file prefix and must be given when the
    /// request keeps raw outputs.
    pub fn build_command(
        &self,
        request: &ScanRequest,
        output_base: Option<&Path>,
    ) -> Result<Vec<String>> {
        if request.targets.iter().all(|t| t.trim().is_empty()) {
            return Err(ScanError::InvalidArgument("No targets specified".to_string()));
        }
        validate_targets(&request.targets)?;

        let mut argv = vec![self.config.nmap_path.clone()];

        if let Some(ports) = &request.ports {
            argv.extend(ports.to_nmap_args());
        }

        argv.extend(self.arguments_for(request.arguments.as_deref().unwrap_or(""))?);

        if request.outputs.is_empty() {
            argv.extend(["-oX".to_string(), "-".to_string()]);
        } else {
            let base = output_base.ok_or_else(|| {
                ScanError::InvalidArgument("Raw outputs need an output location".to_string())
            })?;
            argv.extend(["-oA".to_string(), base.display().to_string()]);
        }

        for target in &request.targets {
            argv.extend(target.split_whitespace().map(str::to_string));
        }

        Ok(argv)
    }

    /// Validate `request` and return the command it would run
    pub fn dry_run(&self, request: &ScanRequest) -> Result<Vec<String>> {
        let base = self.temp_root().join("nmapflow-dry-run");
        let argv = self.build_command(request, Some(&base))?;
        info!("Dry run: {}", argv.join(" "));
        Ok(argv)
    }

    /// Run a scan and ingest its report
    ///
    /// The optional engine runs over the result before it is returned.
    pub async fn scan(
        &self,
        request: &ScanRequest,
        engine: Option<&ScriptEngine>,
    ) -> Result<ScanResult> {
        let (argv, source) = self.prepare(request)?;
        let capture = self.execute(&argv).await?;
        self.ingest(capture, &source, engine)
    }

    /// Same as [`NmapScanner::scan`], blocking the calling thread
    ///
    /// Not bounded by the configured timeout.
    pub fn scan_blocking(
        &self,
        request: &ScanRequest,
        engine: Option<&ScriptEngine>,
    ) -> Result<ScanResult> {
        let (argv, source) = self.prepare(request)?;
        let (program, args) = split_program(&argv)?;
        info!("Running {}", argv.join(" "));

        let output = std::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| spawn_error(program, e))?;
        debug!("nmap exited with {}", output.status);

        self.ingest(output.into(), &source, engine)
    }

    /// Run nmap with a complete argument string
    ///
    /// A leading `nmap` is ignored; the report is always read from stdout.
    pub async fn raw(&self, arguments: &str, engine: Option<&ScriptEngine>) -> Result<ScanResult> {
        let argv = self.raw_command(arguments)?;
        let capture = self.execute(&argv).await?;
        self.ingest(capture, &ReportSource::Stdout, engine)
    }

    /// Continue an interrupted scan from its XML report
    pub async fn resume<P: AsRef<Path>>(
        &self,
        xml_path: P,
        engine: Option<&ScriptEngine>,
    ) -> Result<ScanResult> {
        let path = xml_path.as_ref();
        if !path.is_file() {
            return Err(ScanError::InvalidArgument(format!(
                "Cannot resume from {}: no such report",
                path.display()
            )));
        }

        let argv = vec![
            self.config.nmap_path.clone(),
            "--resume".to_string(),
            path.display().to_string(),
        ];
        let capture = self.execute(&argv).await?;
        self.ingest(capture, &ReportSource::Resumed(path.to_path_buf()), engine)
    }

    pub(crate) fn raw_command(&self, arguments: &str) -> Result<Vec<String>> {
        let trimmed = arguments.trim();
        let trimmed = trimmed.strip_prefix("nmap ").unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(ScanError::InvalidArgument("No nmap arguments given".to_string()));
        }

        let mut argv = vec![self.config.nmap_path.clone()];
        argv.extend(self.arguments_for(trimmed)?);
        argv.extend(["-oX".to_string(), "-".to_string()]);
        Ok(argv)
    }

    fn arguments_for(&self, arguments: &str) -> Result<Vec<String>> {
        let mut args = self.config.default_args.clone();
        args.extend(split_arguments(arguments)?);
        check_arguments(&args)?;
        Ok(args)
    }

    fn prepare(&self, request: &ScanRequest) -> Result<(Vec<String>, ReportSource)> {
        if request.outputs.is_empty() {
            return Ok((self.build_command(request, None)?, ReportSource::Stdout));
        }

        let dir = tempfile::Builder::new()
            .prefix("nmapflow-")
            .tempdir_in(self.temp_root())?;
        let base = dir.path().join("scan");
        let argv = self.build_command(request, Some(&base))?;

        Ok((
            argv,
            ReportSource::Files {
                _dir: dir,
                base,
                formats: request.outputs.clone(),
            },
        ))
    }

    fn temp_root(&self) -> PathBuf {
        self.config
            .temp_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    async fn execute(&self, argv: &[String]) -> Result<Capture> {
        let (program, args) = split_program(argv)?;
        info!("Running {}", argv.join(" "));

        let mut command = tokio::process::Command::new(program);
        command.args(args).stdin(Stdio::null()).kill_on_drop(true);

        let output = tokio::time::timeout(self.config.timeout_duration(), command.output())
            .await?
            .map_err(|e| spawn_error(program, e))?;
        debug!("nmap exited with {}", output.status);

        Ok(output.into())
    }

    /// Turn captured streams into a result
    pub(crate) fn ingest(
        &self,
        capture: Capture,
        source: &ReportSource,
        engine: Option<&ScriptEngine>,
    ) -> Result<ScanResult> {
        let stderr = String::from_utf8_lossy(&capture.stderr).trim().to_string();

        if capture.stdout.iter().all(u8::is_ascii_whitespace) {
            return Err(ScanError::NmapError(if stderr.is_empty() {
                "No output given from nmap".to_string()
            } else {
                stderr
            }));
        }

        let parsed = match source.xml_path() {
            Some(path) => self.parser.parse_file(path),
            None => self.parser.parse_str(&String::from_utf8_lossy(&capture.stdout)),
        };

        let mut result = match parsed {
            Ok(result) => result,
            Err(e) if !stderr.is_empty() => {
                debug!("Report unusable ({}), surfacing nmap stderr", e);
                return Err(ReportError::Tool(stderr).into());
            }
            Err(e) => return Err(e.into()),
        };

        if !stderr.is_empty() {
            warn!("nmap reported errors: {}", stderr);
            result.set_tolerant_errors(Some(stderr));
        }

        if let ReportSource::Files { base, formats, .. } = source {
            result.set_outputs(read_outputs(base, formats)?);
        }

        if let Some(engine) = engine {
            engine.run(&mut result)?;
        }

        Ok(result)
    }
}

/// File extension nmap uses for each `-oA` output
fn extension(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Xml => "xml",
        OutputFormat::Normal => "nmap",
        OutputFormat::Grep => "gnmap",
    }
}

fn read_outputs(base: &Path, formats: &BTreeSet<OutputFormat>) -> Result<RawOutputs> {
    let mut outputs = RawOutputs::default();
    for &format in formats {
        let text = std::fs::read_to_string(base.with_extension(extension(format)))?;
        match format {
            OutputFormat::Xml => outputs.xml = Some(text),
            OutputFormat::Normal => outputs.normal = Some(text),
            OutputFormat::Grep => outputs.grep = Some(text),
        }
    }
    Ok(outputs)
}

fn split_program(argv: &[String]) -> Result<(&String, &[String])> {
    argv.split_first()
        .ok_or_else(|| ScanError::InvalidArgument("Empty command".to_string()))
}

fn spawn_error(program: &str, e: std::io::Error) -> ScanError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ScanError::NmapError(format!("nmap was not found at {}", program))
    } else {
        ScanError::IoError(e)
    }
}

/// Reject arguments the front-end controls itself
pub fn check_arguments<S: AsRef<str>>(args: &[S]) -> Result<()> {
    for arg in args {
        let arg = arg.as_ref();
        if let Some(reserved) = RESERVED_ARGS.iter().find(|r| arg.starts_with(*r)) {
            return Err(ScanError::InvalidArgument(format!(
                "Cannot use {} as an nmap argument: {}",
                reserved, arg
            )));
        }
    }
    Ok(())
}

/// Split an argument string into words with POSIX shell quoting rules
pub fn split_arguments(arguments: &str) -> Result<Vec<String>> {
    shlex::split(arguments).ok_or_else(|| {
        ScanError::InvalidArgument(format!("Unbalanced quote in arguments: {}", arguments))
    })
}
