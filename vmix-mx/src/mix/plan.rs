//! Mix plan construction
//!
//! Pure function from a validated `MixRequest` to an immutable `MixPlan`:
//! the ordered track bindings, the processing graph connecting them, and the
//! resolved target duration. No I/O happens here.
//!
//! Bindings are assigned in fixed role order (voice, music, soundscape) and
//! receive contiguous input indices. The engine receives its inputs in the same
//! order, so graph input `[i:a]` always refers to `bindings[i]`.

use reqwest::Url;
use std::fmt;

use super::request::{MixRequest, Volume};
use crate::error::MixError;

/// Label of the single mix-down output
pub const OUTPUT_LABEL: &str = "out";

/// Role of one source track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackRole {
    Voice,
    Music,
    Soundscape,
}

impl TrackRole {
    /// Graph label of this role's volume leg. Fixed per role so labels never
    /// shift when optional tracks are absent.
    pub fn label(self) -> &'static str {
        match self {
            TrackRole::Voice => "v",
            TrackRole::Music => "m",
            TrackRole::Soundscape => "s",
        }
    }

    /// File-type hint for the downloaded source
    pub fn file_extension_hint(self) -> &'static str {
        match self {
            TrackRole::Voice => ".webm",
            TrackRole::Music | TrackRole::Soundscape => ".mp3",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrackRole::Voice => "voice",
            TrackRole::Music => "music",
            TrackRole::Soundscape => "soundscape",
        }
    }
}

impl fmt::Display for TrackRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One present source bound to an engine input position
#[derive(Debug, Clone, PartialEq)]
pub struct TrackBinding {
    pub role: TrackRole,
    /// 0-based position among present sources
    pub input_index: usize,
    pub volume: Volume,
    pub source: Url,
    pub file_extension_hint: &'static str,
}

/// Output duration policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetDuration {
    /// Run until the longest leg ends
    Unbounded,
    /// Truncate output at this many seconds
    Bounded(u64),
}

impl TargetDuration {
    /// Seconds to hand to an engine that needs an explicit bound
    pub fn bound_seconds(self, unbounded_sentinel: u64) -> u64 {
        match self {
            TargetDuration::Unbounded => unbounded_sentinel,
            TargetDuration::Bounded(seconds) => seconds,
        }
    }
}

/// Volume-scaling stage for one binding
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeLeg {
    pub input_index: usize,
    pub volume: Volume,
    pub label: &'static str,
}

/// How long the mix-down stage runs relative to its inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixDurationPolicy {
    Longest,
}

impl MixDurationPolicy {
    fn as_str(self) -> &'static str {
        match self {
            MixDurationPolicy::Longest => "longest",
        }
    }
}

/// N-way summing stage over every leg
#[derive(Debug, Clone, PartialEq)]
pub struct MixDown {
    /// Leg labels in binding order
    pub inputs: Vec<&'static str>,
    pub duration: MixDurationPolicy,
    pub output: &'static str,
}

/// Processing graph: one volume leg per binding, then a single mix-down.
///
/// `Display` renders ffmpeg filter-graph syntax.
#[derive(Debug, Clone, PartialEq)]
pub struct MixGraph {
    pub legs: Vec<VolumeLeg>,
    pub mixdown: MixDown,
}

impl fmt::Display for MixGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for leg in &self.legs {
            write!(f, "[{}:a]volume={}[{}];", leg.input_index, leg.volume, leg.label)?;
        }
        for input in &self.mixdown.inputs {
            write!(f, "[{}]", input)?;
        }
        write!(
            f,
            "amix=inputs={}:duration={}[{}]",
            self.mixdown.inputs.len(),
            self.mixdown.duration.as_str(),
            self.mixdown.output
        )
    }
}

/// Resolved, immutable description of one mix
#[derive(Debug, Clone, PartialEq)]
pub struct MixPlan {
    bindings: Vec<TrackBinding>,
    target_duration: TargetDuration,
    graph: MixGraph,
}

impl MixPlan {
    pub fn bindings(&self) -> &[TrackBinding] {
        &self.bindings
    }

    pub fn target_duration(&self) -> TargetDuration {
        self.target_duration
    }

    pub fn graph(&self) -> &MixGraph {
        &self.graph
    }

    pub fn output_label(&self) -> &'static str {
        self.graph.mixdown.output
    }
}

/// Build the mix plan for a request
pub fn build_plan(request: &MixRequest) -> Result<MixPlan, MixError> {
    let tracks = [
        (TrackRole::Voice, Some(&request.voice_source), request.voice_volume),
        (TrackRole::Music, request.music_source.as_ref(), request.music_volume),
        (
            TrackRole::Soundscape,
            request.soundscape_source.as_ref(),
            request.soundscape_volume,
        ),
    ];

    let bindings: Vec<TrackBinding> = tracks
        .into_iter()
        .filter_map(|(role, source, volume)| source.map(|url| (role, url.clone(), volume)))
        .enumerate()
        .map(|(input_index, (role, source, volume))| TrackBinding {
            role,
            input_index,
            volume,
            source,
            file_extension_hint: role.file_extension_hint(),
        })
        .collect();

    let legs: Vec<VolumeLeg> = bindings
        .iter()
        .map(|binding| VolumeLeg {
            input_index: binding.input_index,
            volume: binding.volume,
            label: binding.role.label(),
        })
        .collect();

    let mixdown = MixDown {
        inputs: legs.iter().map(|leg| leg.label).collect(),
        duration: MixDurationPolicy::Longest,
        output: OUTPUT_LABEL,
    };

    let target_duration =
        resolve_target_duration(request.base_duration_seconds, request.extension_minutes)?;

    Ok(MixPlan {
        bindings,
        target_duration,
        graph: MixGraph { legs, mixdown },
    })
}

/// `base + extension*60` when positive, otherwise unbounded
pub fn resolve_target_duration(
    base_duration_seconds: u64,
    extension_minutes: u64,
) -> Result<TargetDuration, MixError> {
    let total = extension_minutes
        .checked_mul(60)
        .and_then(|extension| extension.checked_add(base_duration_seconds))
        .ok_or_else(|| MixError::InvalidRequest("total duration is too large".to_string()))?;

    Ok(if total > 0 {
        TargetDuration::Bounded(total)
    } else {
        TargetDuration::Unbounded
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(name: &str) -> Url {
        Url::parse(&format!("https://cdn.test/{}", name)).unwrap()
    }

    fn volume(percent: f64) -> Volume {
        Volume::from_percent(percent).unwrap()
    }

    fn indices(plan: &MixPlan) -> Vec<usize> {
        plan.bindings().iter().map(|b| b.input_index).collect()
    }

    #[test]
    fn test_voice_only_plan() {
        let plan = build_plan(&MixRequest::new(url("v.webm"))).unwrap();

        assert_eq!(plan.bindings().len(), 1);
        assert_eq!(plan.bindings()[0].role, TrackRole::Voice);
        assert_eq!(plan.bindings()[0].input_index, 0);
        assert_eq!(plan.bindings()[0].file_extension_hint, ".webm");
        assert_eq!(plan.graph().legs.len(), 1);
        assert_eq!(plan.graph().mixdown.inputs, vec!["v"]);
        assert_eq!(plan.target_duration(), TargetDuration::Unbounded);
        assert_eq!(
            plan.graph().to_string(),
            "[0:a]volume=0.7[v];[v]amix=inputs=1:duration=longest[out]"
        );
    }

    #[test]
    fn test_voice_and_music_scenario() {
        let mut request = MixRequest::new(url("v.webm")).with_music(url("m.mp3"));
        request.voice_volume = volume(50.0);
        request.music_volume = volume(20.0);
        request.base_duration_seconds = 0;
        request.extension_minutes = 1;

        let plan = build_plan(&request).unwrap();

        let summary: Vec<(TrackRole, usize, f64)> = plan
            .bindings()
            .iter()
            .map(|b| (b.role, b.input_index, b.volume.fraction()))
            .collect();
        assert_eq!(
            summary,
            vec![(TrackRole::Voice, 0, 0.5), (TrackRole::Music, 1, 0.2)]
        );
        assert_eq!(plan.target_duration(), TargetDuration::Bounded(60));
        assert_eq!(plan.graph().mixdown.inputs.len(), 2);
        assert_eq!(
            plan.graph().to_string(),
            "[0:a]volume=0.5[v];[1:a]volume=0.2[m];[v][m]amix=inputs=2:duration=longest[out]"
        );
    }

    #[test]
    fn test_indices_contiguous_without_music() {
        let request = MixRequest::new(url("v.webm")).with_soundscape(url("s.mp3"));
        let plan = build_plan(&request).unwrap();

        assert_eq!(indices(&plan), vec![0, 1]);
        assert_eq!(plan.bindings()[1].role, TrackRole::Soundscape);
        assert_eq!(
            plan.graph().to_string(),
            "[0:a]volume=0.7[v];[1:a]volume=0.3[s];[v][s]amix=inputs=2:duration=longest[out]"
        );
    }

    #[test]
    fn test_binding_count_for_every_presence_combination() {
        for (music, soundscape) in [(false, false), (true, false), (false, true), (true, true)] {
            let mut request = MixRequest::new(url("v.webm"));
            if music {
                request = request.with_music(url("m.mp3"));
            }
            if soundscape {
                request = request.with_soundscape(url("s.mp3"));
            }

            let plan = build_plan(&request).unwrap();
            let expected = 1 + music as usize + soundscape as usize;

            assert_eq!(plan.bindings().len(), expected);
            assert_eq!(indices(&plan), (0..expected).collect::<Vec<_>>());
            assert_eq!(plan.graph().legs.len(), expected);
            assert_eq!(plan.graph().mixdown.inputs.len(), expected);
            assert_eq!(plan.output_label(), OUTPUT_LABEL);

            // Labels unique per role
            let labels: std::collections::HashSet<_> =
                plan.graph().mixdown.inputs.iter().collect();
            assert_eq!(labels.len(), expected);
        }
    }

    #[test]
    fn test_full_plan_order() {
        let request = MixRequest::new(url("v.webm"))
            .with_soundscape(url("s.mp3"))
            .with_music(url("m.mp3"));
        let plan = build_plan(&request).unwrap();

        let roles: Vec<TrackRole> = plan.bindings().iter().map(|b| b.role).collect();
        assert_eq!(
            roles,
            vec![TrackRole::Voice, TrackRole::Music, TrackRole::Soundscape]
        );
        assert_eq!(plan.bindings()[1].source, url("m.mp3"));
        assert_eq!(plan.graph().mixdown.inputs, vec!["v", "m", "s"]);
    }

    #[test]
    fn test_zero_volume_keeps_track() {
        let mut request = MixRequest::new(url("v.webm")).with_music(url("m.mp3"));
        request.music_volume = volume(0.0);

        let plan = build_plan(&request).unwrap();
        assert_eq!(plan.bindings().len(), 2);
        assert!(plan.graph().to_string().contains("[1:a]volume=0[m]"));
    }

    #[test]
    fn test_target_duration_resolution() {
        assert_eq!(resolve_target_duration(0, 0).unwrap(), TargetDuration::Unbounded);
        assert_eq!(resolve_target_duration(90, 0).unwrap(), TargetDuration::Bounded(90));
        assert_eq!(resolve_target_duration(0, 2).unwrap(), TargetDuration::Bounded(120));
        assert_eq!(resolve_target_duration(30, 1).unwrap(), TargetDuration::Bounded(90));
        assert!(matches!(
            resolve_target_duration(u64::MAX, 1),
            Err(MixError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_bound_seconds() {
        assert_eq!(TargetDuration::Unbounded.bound_seconds(21600), 21600);
        assert_eq!(TargetDuration::Bounded(60).bound_seconds(21600), 60);
    }
}
