//! Transcoding engine binding
//!
//! The engine is an opaque external step: it receives ordered input files, a
//! filter graph, an explicit duration bound and a bitrate, and either writes
//! the output file or fails with diagnostic text. `FfmpegEngine` runs the
//! `ffmpeg` binary as a child process.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Lines of stderr kept as the failure diagnostic
const DIAGNOSTIC_TAIL_LINES: usize = 20;

/// Everything one engine run needs
#[derive(Debug, Clone, PartialEq)]
pub struct EngineInvocation {
    /// Input files in graph input order
    pub inputs: Vec<PathBuf>,
    /// Rendered filter graph
    pub filter_graph: String,
    /// Graph label mapped to the output file
    pub output_label: String,
    /// Output is truncated at this many seconds
    pub duration_bound_seconds: u64,
    /// Encoder bitrate, e.g. `128k`
    pub bitrate: String,
    pub output: PathBuf,
}

/// Engine failure as reported by the binding
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start engine: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("engine exited with {status}: {diagnostic}")]
    Failed { status: String, diagnostic: String },
}

/// Executes one invocation; no retries
#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    async fn run(&self, invocation: &EngineInvocation) -> Result<(), EngineError>;
}

/// `ffmpeg` child-process engine
pub struct FfmpegEngine {
    binary: PathBuf,
}

impl FfmpegEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Command-line arguments for an invocation
    pub fn command_args(invocation: &EngineInvocation) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-y".into()];
        for input in &invocation.inputs {
            args.push("-i".into());
            args.push(input.clone().into_os_string());
        }
        args.push("-filter_complex".into());
        args.push(invocation.filter_graph.clone().into());
        args.push("-map".into());
        args.push(format!("[{}]", invocation.output_label).into());
        args.push("-t".into());
        args.push(invocation.duration_bound_seconds.to_string().into());
        args.push("-b:a".into());
        args.push(invocation.bitrate.clone().into());
        args.push(invocation.output.clone().into_os_string());
        args
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    async fn run(&self, invocation: &EngineInvocation) -> Result<(), EngineError> {
        let args = Self::command_args(invocation);
        debug!(binary = %self.binary.display(), args = ?args, "Invoking ffmpeg");

        // kill_on_drop: a cancelled request must not leave ffmpeg writing
        // into a path the resource scope has already released. The kill is
        // not awaited; startup sweeps anything created after the unlink.
        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if output.status.success() {
            return Ok(());
        }

        Err(EngineError::Failed {
            status: output.status.to_string(),
            diagnostic: diagnostic_tail(&String::from_utf8_lossy(&output.stderr)),
        })
    }
}

/// Last non-empty lines of engine stderr
pub fn diagnostic_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect();
    let start = lines.len().saturating_sub(DIAGNOSTIC_TAIL_LINES);
    lines[start..].join("\n")
}
