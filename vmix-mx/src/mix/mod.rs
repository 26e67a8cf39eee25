//! Mix plan construction and execution

pub mod engine;
pub mod executor;
pub mod fetcher;
pub mod plan;
pub mod request;
pub mod resources;
pub mod service;

pub use engine::{EngineError, EngineInvocation, FfmpegEngine, TranscodeEngine};
pub use executor::MixExecutor;
pub use fetcher::{HttpFetcher, ResourceFetcher};
pub use plan::{build_plan, MixPlan, TargetDuration, TrackBinding, TrackRole};
pub use request::{MixRequest, MixRequestBody, Volume};
pub use resources::{
    sweep_scratch_dir, ReleaseReport, ResourceRole, ResourceScope, TemporaryResource,
};
pub use service::MixService;
