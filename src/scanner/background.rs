//! Scans running in the background with progress polling

use super::status::ScanStatus;
use super::{spawn_error, split_program, Capture, NmapScanner, ReportSource, ScanRequest};
use crate::model::ScanResult;
use crate::scripts::ScriptEngine;
use crate::{Result, ScanError};
use log::{debug, info, warn};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout};
use tokio::task::JoinHandle;

/// Bytes taken from stdout per status poll
const STATUS_CHUNK: usize = 256;

impl NmapScanner {
    /// Start a scan without waiting for it
    ///
    /// With `with_status` nmap reports progress every configured status
    /// interval; see [`BackgroundScan::poll_status`].
    pub async fn scan_background(
        &self,
        request: &ScanRequest,
        with_status: bool,
    ) -> Result<BackgroundScan> {
        let (mut argv, source) = self.prepare(request)?;
        if with_status {
            argv.insert(1, self.config.status_interval.clone());
            argv.insert(1, "--stats-every".to_string());
        }

        let (program, args) = split_program(&argv)?;
        info!("Starting background scan: {}", argv.join(" "));

        let mut child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(program, e))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take().map(|mut pipe| {
            tokio::spawn(async move {
                let mut buffer = Vec::new();
                pipe.read_to_end(&mut buffer).await?;
                Ok::<_, std::io::Error>(buffer)
            })
        });

        Ok(BackgroundScan {
            scanner: self.clone(),
            child,
            stdout,
            stderr,
            captured: Capture::default(),
            source,
            with_status,
            waited: false,
            timeout: self.config.timeout_duration(),
        })
    }
}

/// Handle to a running nmap process
///
/// Stdout is consumed incrementally by [`BackgroundScan::poll_status`] and
/// the rest of it by [`BackgroundScan::wait`]; the report handed to
/// ingestion is the concatenation of every chunk read. Stderr is drained
/// concurrently so nmap never blocks on it.
#[derive(Debug)]
pub struct BackgroundScan {
    scanner: NmapScanner,
    child: Child,
    stdout: Option<ChildStdout>,
    stderr: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    captured: Capture,
    source: ReportSource,
    with_status: bool,
    waited: bool,
    timeout: Duration,
}

impl BackgroundScan {
    /// Latest progress record, or `None` until nmap has printed one
    ///
    /// Reads at most one chunk of stdout and waits for it if nmap has not
    /// written anything yet.
    pub async fn poll_status(&mut self) -> Result<Option<ScanStatus>> {
        if !self.with_status {
            return Err(ScanError::InvalidArgument(
                "Status was not requested for this scan".to_string(),
            ));
        }

        if !self.waited {
            self.read_chunk().await?;
        }

        // multi-format scans write progress into the XML file instead
        if let Some(path) = self.source.xml_path() {
            return match tokio::fs::read_to_string(&path).await {
                Ok(xml) => Ok(ScanStatus::from_output(&xml)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            };
        }

        Ok(ScanStatus::from_output(&String::from_utf8_lossy(
            &self.captured.stdout,
        )))
    }

    async fn read_chunk(&mut self) -> Result<()> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(());
        };

        let mut chunk = [0u8; STATUS_CHUNK];
        let read = stdout.read(&mut chunk).await?;
        if read == 0 {
            self.stdout = None;
        } else {
            self.captured.stdout.extend_from_slice(&chunk[..read]);
        }
        Ok(())
    }

    pub fn is_finished(&mut self) -> Result<bool> {
        Ok(self.waited || self.child.try_wait()?.is_some())
    }

    /// Block until nmap exits, capturing whatever output is left
    ///
    /// Bounded by the scanner timeout; on timeout the process is killed.
    pub async fn wait(&mut self) -> Result<()> {
        if self.waited {
            return Ok(());
        }

        match tokio::time::timeout(self.timeout, self.drain()).await {
            Ok(drained) => drained?,
            Err(elapsed) => {
                warn!("Background scan timed out, killing nmap");
                if let Err(e) = self.child.start_kill() {
                    debug!("Failed to kill nmap: {}", e);
                }
                return Err(elapsed.into());
            }
        }

        self.waited = true;
        Ok(())
    }

    async fn drain(&mut self) -> Result<()> {
        if let Some(mut stdout) = self.stdout.take() {
            stdout.read_to_end(&mut self.captured.stdout).await?;
        }

        if let Some(task) = self.stderr.take() {
            self.captured.stderr = task
                .await
                .map_err(|e| ScanError::NmapError(format!("stderr reader failed: {}", e)))??;
        }

        let status = self.child.wait().await?;
        debug!("Background nmap exited with {}", status);
        Ok(())
    }

    /// Wait for the scan and ingest its report
    pub async fn result(mut self, engine: Option<&ScriptEngine>) -> Result<ScanResult> {
        self.wait().await?;
        let capture = std::mem::take(&mut self.captured);
        self.scanner.ingest(capture, &self.source, engine)
    }
}
