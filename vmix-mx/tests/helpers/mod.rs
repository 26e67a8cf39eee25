//! Test doubles for the mix pipeline
//!
//! `FakeFetcher` serves canned payloads per URL; `FakeEngine` stands in for
//! ffmpeg. Neither touches the network or spawns processes.

#![allow(dead_code)]

use async_trait::async_trait;
use reqwest::Url;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use vmix_common::ServiceConfig;
use vmix_mx::mix::{
    EngineError, EngineInvocation, MixService, ResourceFetcher, TranscodeEngine,
};
use vmix_mx::MixError;

pub const VOICE_URL: &str = "https://cdn.test/voice.webm";
pub const MUSIC_URL: &str = "https://cdn.test/music.mp3";
pub const SOUNDSCAPE_URL: &str = "https://cdn.test/rain.mp3";
pub const MIXED_BYTES: &[u8] = b"ID3\x04fake-mp3-frames";

enum Canned {
    Payload(Vec<u8>),
    Failure { cause: String, delay: Duration },
}

/// Serves canned payloads; counts calls and records scratch-dir contents on failure
pub struct FakeFetcher {
    responses: Mutex<HashMap<String, Canned>>,
    calls: AtomicUsize,
    observe_dir: Option<PathBuf>,
    files_seen_at_failure: Mutex<Option<usize>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            observe_dir: None,
            files_seen_at_failure: Mutex::new(None),
        }
    }

    /// Serve all three standard URLs successfully
    pub fn with_all_sources() -> Self {
        Self::new()
            .serve(VOICE_URL, b"voice-bytes")
            .serve(MUSIC_URL, b"music-bytes")
            .serve(SOUNDSCAPE_URL, b"soundscape-bytes")
    }

    pub fn serve(self, url: &str, payload: &[u8]) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Canned::Payload(payload.to_vec()));
        self
    }

    /// Fail `url` after `delay`, letting other fetches finish first
    pub fn fail(self, url: &str, cause: &str, delay: Duration) -> Self {
        self.responses.lock().unwrap().insert(
            url.to_string(),
            Canned::Failure {
                cause: cause.to_string(),
                delay,
            },
        );
        self
    }

    pub fn observing(mut self, dir: &Path) -> Self {
        self.observe_dir = Some(dir.to_path_buf());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn files_seen_at_failure(&self) -> Option<usize> {
        *self.files_seen_at_failure.lock().unwrap()
    }
}

#[async_trait]
impl ResourceFetcher for FakeFetcher {
    async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>, MixError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let canned = {
            let responses = self.responses.lock().unwrap();
            match responses.get(url.as_str()) {
                Some(Canned::Payload(bytes)) => Ok(bytes.clone()),
                Some(Canned::Failure { cause, delay }) => Err((cause.clone(), *delay)),
                None => Err(("HTTP 404 Not Found".to_string(), Duration::ZERO)),
            }
        };

        match canned {
            Ok(bytes) => Ok(bytes),
            Err((cause, delay)) => {
                tokio::time::sleep(delay).await;
                if let Some(dir) = &self.observe_dir {
                    *self.files_seen_at_failure.lock().unwrap() = Some(count_files(dir));
                }
                Err(MixError::FetchFailed {
                    url: url.to_string(),
                    cause,
                })
            }
        }
    }
}

pub enum EngineBehavior {
    /// Write `MIXED_BYTES` and succeed
    Succeed,
    /// Write a partial file, then fail with this diagnostic
    FailAfterPartialWrite(String),
    /// Never finish (for cancellation tests)
    Hang,
}

/// Stand-in for ffmpeg
pub struct FakeEngine {
    behavior: EngineBehavior,
    invocations: Mutex<Vec<EngineInvocation>>,
}

impl FakeEngine {
    pub fn new(behavior: EngineBehavior) -> Self {
        Self {
            behavior,
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn invocations(&self) -> Vec<EngineInvocation> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranscodeEngine for FakeEngine {
    async fn run(&self, invocation: &EngineInvocation) -> Result<(), EngineError> {
        self.invocations.lock().unwrap().push(invocation.clone());
        for input in &invocation.inputs {
            assert!(input.exists(), "engine input {} missing", input.display());
        }

        match &self.behavior {
            EngineBehavior::Succeed => {
                std::fs::write(&invocation.output, MIXED_BYTES)?;
                Ok(())
            }
            EngineBehavior::FailAfterPartialWrite(diagnostic) => {
                std::fs::write(&invocation.output, b"ID3")?;
                Err(EngineError::Failed {
                    status: "exit status: 1".to_string(),
                    diagnostic: diagnostic.clone(),
                })
            }
            EngineBehavior::Hang => {
                std::fs::write(&invocation.output, b"ID3")?;
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

/// Service wired to fakes, writing into a fresh scratch directory
pub struct Harness {
    pub scratch: TempDir,
    pub fetcher: Arc<FakeFetcher>,
    pub engine: Arc<FakeEngine>,
    pub service: MixService,
}

impl Harness {
    pub fn new(fetcher: FakeFetcher, behavior: EngineBehavior) -> Self {
        let scratch = TempDir::new().unwrap();
        Self::in_dir(scratch, fetcher, behavior)
    }

    /// Use a scratch dir created by the caller (so the fetcher can observe it)
    pub fn in_dir(scratch: TempDir, fetcher: FakeFetcher, behavior: EngineBehavior) -> Self {
        let config = ServiceConfig {
            scratch_dir: scratch.path().to_path_buf(),
            ..ServiceConfig::default()
        };
        let fetcher = Arc::new(fetcher);
        let engine = Arc::new(FakeEngine::new(behavior));
        let service = MixService::new(fetcher.clone(), engine.clone(), &config);

        Self {
            scratch,
            fetcher,
            engine,
            service,
        }
    }

    pub fn scratch_files(&self) -> usize {
        count_files(self.scratch.path())
    }
}

pub fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

pub fn url(raw: &str) -> Url {
    Url::parse(raw).unwrap()
}
