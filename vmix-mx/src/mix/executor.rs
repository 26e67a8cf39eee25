//! Mix execution
//!
//! Turns a plan plus its fetched inputs into one output resource by invoking
//! the transcoding engine exactly once. The output is registered with the
//! request scope before the engine starts, so anything the engine writes is
//! released even when it fails halfway.

use std::sync::Arc;
use tracing::{info, warn};
use vmix_common::human_time::format_duration;

use super::engine::{EngineError, EngineInvocation, TranscodeEngine};
use super::plan::{MixPlan, TargetDuration};
use super::resources::{ResourceRole, ResourceScope, TemporaryResource};
use crate::error::MixError;

/// Extension of the encoded output
pub const OUTPUT_EXTENSION: &str = ".mp3";

pub struct MixExecutor {
    engine: Arc<dyn TranscodeEngine>,
    output_bitrate: String,
    unbounded_duration_seconds: u64,
}

impl MixExecutor {
    pub fn new(
        engine: Arc<dyn TranscodeEngine>,
        output_bitrate: impl Into<String>,
        unbounded_duration_seconds: u64,
    ) -> Self {
        Self {
            engine,
            output_bitrate: output_bitrate.into(),
            unbounded_duration_seconds,
        }
    }

    /// Run the plan. `inputs` must line up with `plan.bindings()`.
    pub async fn execute(
        &self,
        scope: &ResourceScope,
        plan: &MixPlan,
        inputs: &[TemporaryResource],
    ) -> Result<TemporaryResource, MixError> {
        check_inputs(plan, inputs)?;

        let output = scope.register(ResourceRole::Output, OUTPUT_EXTENSION);
        let duration_bound_seconds = plan
            .target_duration()
            .bound_seconds(self.unbounded_duration_seconds);

        let invocation = EngineInvocation {
            inputs: inputs.iter().map(|r| r.path().to_path_buf()).collect(),
            filter_graph: plan.graph().to_string(),
            output_label: plan.output_label().to_string(),
            duration_bound_seconds,
            bitrate: self.output_bitrate.clone(),
            output: output.path().to_path_buf(),
        };

        info!(
            inputs = invocation.inputs.len(),
            bound = %format_duration(duration_bound_seconds),
            unbounded = plan.target_duration() == TargetDuration::Unbounded,
            graph = %invocation.filter_graph,
            "Running transcoding engine"
        );

        self.engine.run(&invocation).await.map_err(|e| {
            warn!(error = %e, "Transcoding engine failed");
            match e {
                EngineError::Spawn(io) => {
                    MixError::TranscodeFailed(format!("could not start engine: {}", io))
                }
                EngineError::Failed { diagnostic, .. } if !diagnostic.is_empty() => {
                    MixError::TranscodeFailed(diagnostic)
                }
                EngineError::Failed { status, .. } => {
                    MixError::TranscodeFailed(format!("engine exited with {}", status))
                }
            }
        })?;

        let byte_length = match tokio::fs::metadata(output.path()).await {
            Ok(metadata) => metadata.len(),
            Err(_) => {
                return Err(MixError::TranscodeFailed(
                    "engine reported success but produced no output".to_string(),
                ))
            }
        };
        if byte_length == 0 {
            return Err(MixError::TranscodeFailed(
                "engine produced an empty output".to_string(),
            ));
        }

        Ok(TemporaryResource {
            handle: output,
            byte_length,
        })
    }
}

fn check_inputs(plan: &MixPlan, inputs: &[TemporaryResource]) -> Result<(), MixError> {
    if inputs.len() != plan.bindings().len() {
        return Err(MixError::Internal(format!(
            "plan has {} bindings but {} inputs were supplied",
            plan.bindings().len(),
            inputs.len()
        )));
    }
    for (binding, input) in plan.bindings().iter().zip(inputs) {
        if input.role() != ResourceRole::Input(binding.role) {
            return Err(MixError::Internal(format!(
                "input {} is {} but binding expects {}",
                binding.input_index,
                input.role(),
                binding.role
            )));
        }
    }
    Ok(())
}
