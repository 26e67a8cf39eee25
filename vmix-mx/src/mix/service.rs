//! Mix pipeline driver
//!
//! One call to `MixService::mix` handles one request end to end:
//! plan → fetch every bound source → execute → read output. All temporary
//! resources live in a per-request `ResourceScope` that is released before
//! returning, whatever the outcome. If the future is dropped mid-flight the
//! scope's `Drop` releases whatever was registered.

use futures::future::try_join_all;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use vmix_common::ServiceConfig;

use super::engine::TranscodeEngine;
use super::executor::MixExecutor;
use super::fetcher::{fetch_into_scope, ResourceFetcher};
use super::plan::{build_plan, MixPlan};
use super::request::MixRequest;
use super::resources::ResourceScope;
use crate::error::MixError;

/// Per-process mix service, shared by all requests
pub struct MixService {
    fetcher: Arc<dyn ResourceFetcher>,
    executor: MixExecutor,
    scratch_dir: PathBuf,
}

impl MixService {
    pub fn new(
        fetcher: Arc<dyn ResourceFetcher>,
        engine: Arc<dyn TranscodeEngine>,
        config: &ServiceConfig,
    ) -> Self {
        Self {
            fetcher,
            executor: MixExecutor::new(
                engine,
                config.output_bitrate.clone(),
                config.unbounded_duration_seconds,
            ),
            scratch_dir: config.scratch_dir.clone(),
        }
    }

    /// Produce the mixed audio for one request
    pub async fn mix(&self, request: &MixRequest) -> Result<Vec<u8>, MixError> {
        let plan = build_plan(request)?;
        info!(
            bindings = plan.bindings().len(),
            target = ?plan.target_duration(),
            "Built mix plan"
        );

        let scope = ResourceScope::new(&self.scratch_dir);
        let result = self.run(&scope, &plan).await;

        let report = scope.release_all();
        if report.failed > 0 {
            warn!(
                released = report.released,
                failed = report.failed,
                "Some temporary resources could not be released"
            );
        } else {
            debug!(released = report.released, "Released temporary resources");
        }

        result
    }

    async fn run(&self, scope: &ResourceScope, plan: &MixPlan) -> Result<Vec<u8>, MixError> {
        // Fetches are independent; the first failure drops the rest
        let inputs = try_join_all(
            plan.bindings()
                .iter()
                .map(|binding| fetch_into_scope(self.fetcher.as_ref(), scope, binding)),
        )
        .await?;

        let output = self.executor.execute(scope, plan, &inputs).await?;
        let bytes = tokio::fs::read(output.path()).await?;

        info!(bytes = bytes.len(), "Mix complete");
        Ok(bytes)
    }
}
