//! Mix request parsing and validation
//!
//! `MixRequestBody` is the wire shape of `POST /mix`. `MixRequest` is the
//! validated, immutable form the plan builder consumes. Volumes arrive as
//! percentages and are stored as fractions.

use reqwest::Url;
use serde::Deserialize;
use std::fmt;

use crate::error::MixError;

pub const DEFAULT_VOICE_VOLUME_PERCENT: f64 = 70.0;
pub const DEFAULT_MUSIC_VOLUME_PERCENT: f64 = 40.0;
pub const DEFAULT_SOUNDSCAPE_VOLUME_PERCENT: f64 = 30.0;

/// Volume as a fraction in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Volume(f64);

impl Volume {
    /// Convert a percentage (0-100) to a volume. Out-of-range values are rejected, never clamped.
    pub fn from_percent(percent: f64) -> Result<Self, MixError> {
        if !percent.is_finite() {
            return Err(MixError::InvalidRequest(format!(
                "volume must be a finite number, got {}",
                percent
            )));
        }
        if !(0.0..=100.0).contains(&percent) {
            return Err(MixError::InvalidRequest(format!(
                "volume must be between 0 and 100 percent, got {}",
                percent
            )));
        }
        Ok(Volume(percent / 100.0))
    }

    pub fn fraction(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated mix parameters
#[derive(Debug, Clone, PartialEq)]
pub struct MixRequest {
    pub voice_source: Url,
    pub music_source: Option<Url>,
    pub soundscape_source: Option<Url>,
    pub voice_volume: Volume,
    pub music_volume: Volume,
    pub soundscape_volume: Volume,
    /// 0 means "no cap, use the longest input"
    pub base_duration_seconds: u64,
    pub extension_minutes: u64,
}

impl MixRequest {
    /// Voice-only request with default volumes and no duration cap
    pub fn new(voice_source: Url) -> Self {
        Self {
            voice_source,
            music_source: None,
            soundscape_source: None,
            voice_volume: Volume(DEFAULT_VOICE_VOLUME_PERCENT / 100.0),
            music_volume: Volume(DEFAULT_MUSIC_VOLUME_PERCENT / 100.0),
            soundscape_volume: Volume(DEFAULT_SOUNDSCAPE_VOLUME_PERCENT / 100.0),
            base_duration_seconds: 0,
            extension_minutes: 0,
        }
    }

    pub fn with_music(mut self, source: Url) -> Self {
        self.music_source = Some(source);
        self
    }

    pub fn with_soundscape(mut self, source: Url) -> Self {
        self.soundscape_source = Some(source);
        self
    }
}

/// Number that may arrive as a JSON number or a numeric string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NumericField {
    Number(f64),
    Text(String),
}

impl NumericField {
    fn to_f64(&self, field: &str) -> Result<f64, MixError> {
        match self {
            NumericField::Number(n) => Ok(*n),
            NumericField::Text(s) => s.trim().parse::<f64>().map_err(|_| {
                MixError::InvalidRequest(format!("{} must be numeric, got {:?}", field, s))
            }),
        }
    }
}

/// `POST /mix` request body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MixRequestBody {
    pub voice_url: Option<String>,
    pub music_url: Option<String>,
    pub soundscape_url: Option<String>,
    pub voice_volume: Option<NumericField>,
    pub music_volume: Option<NumericField>,
    pub soundscape_volume: Option<NumericField>,
    pub duration: Option<NumericField>,
    pub extension_minutes: Option<NumericField>,
}

impl TryFrom<MixRequestBody> for MixRequest {
    type Error = MixError;

    fn try_from(body: MixRequestBody) -> Result<Self, Self::Error> {
        let voice_source = match body.voice_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => parse_source_url("voice_url", url)?,
            _ => {
                return Err(MixError::InvalidRequest(
                    "voice_url is required".to_string(),
                ))
            }
        };

        Ok(MixRequest {
            voice_source,
            music_source: optional_source_url("music_url", body.music_url.as_deref())?,
            soundscape_source: optional_source_url(
                "soundscape_url",
                body.soundscape_url.as_deref(),
            )?,
            voice_volume: volume_field(
                "voice_volume",
                body.voice_volume.as_ref(),
                DEFAULT_VOICE_VOLUME_PERCENT,
            )?,
            music_volume: volume_field(
                "music_volume",
                body.music_volume.as_ref(),
                DEFAULT_MUSIC_VOLUME_PERCENT,
            )?,
            soundscape_volume: volume_field(
                "soundscape_volume",
                body.soundscape_volume.as_ref(),
                DEFAULT_SOUNDSCAPE_VOLUME_PERCENT,
            )?,
            base_duration_seconds: whole_number_field("duration", body.duration.as_ref())?,
            extension_minutes: whole_number_field(
                "extension_minutes",
                body.extension_minutes.as_ref(),
            )?,
        })
    }
}

fn parse_source_url(field: &str, raw: &str) -> Result<Url, MixError> {
    let url = Url::parse(raw)
        .map_err(|e| MixError::InvalidRequest(format!("{} is not a valid URL: {}", field, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(MixError::InvalidRequest(format!(
            "{} must use http or https, got {}",
            field, other
        ))),
    }
}

/// Absent, null and empty-string URLs all mean "track not present"
fn optional_source_url(field: &str, raw: Option<&str>) -> Result<Option<Url>, MixError> {
    match raw.map(str::trim) {
        Some(url) if !url.is_empty() => parse_source_url(field, url).map(Some),
        _ => Ok(None),
    }
}

fn volume_field(
    field: &str,
    value: Option<&NumericField>,
    default_percent: f64,
) -> Result<Volume, MixError> {
    let percent = match value {
        Some(v) => v.to_f64(field)?,
        None => default_percent,
    };
    Volume::from_percent(percent)
        .map_err(|e| MixError::InvalidRequest(format!("{}: {}", field, strip_prefix(e))))
}

fn whole_number_field(field: &str, value: Option<&NumericField>) -> Result<u64, MixError> {
    let Some(value) = value else {
        return Ok(0);
    };
    let n = value.to_f64(field)?;
    if !n.is_finite() || n < 0.0 || n.fract() != 0.0 || n > u32::MAX as f64 {
        return Err(MixError::InvalidRequest(format!(
            "{} must be a non-negative whole number, got {}",
            field, n
        )));
    }
    Ok(n as u64)
}

fn strip_prefix(err: MixError) -> String {
    match err {
        MixError::InvalidRequest(msg) => msg,
        other => other.to_string(),
    }
}
