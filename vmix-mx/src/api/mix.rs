//! Mix endpoint
//!
//! POST /mix takes a JSON body naming the voice source (required), optional
//! music and soundscape sources, percentage volumes and duration controls, and
//! answers with the mixed MP3.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::header,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use tracing::{error, info};

use crate::{
    error::{ApiResult, MixError},
    mix::{MixRequest, MixRequestBody},
    AppState,
};

/// Media type of a successful response
pub const AUDIO_MEDIA_TYPE: &str = "audio/mpeg";

/// POST /mix
pub async fn mix(
    State(state): State<AppState>,
    payload: Result<Json<MixRequestBody>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(body) = payload.map_err(|rejection| {
        MixError::InvalidRequest(format!("malformed request body: {}", rejection.body_text()))
    })?;
    let request = MixRequest::try_from(body)?;

    info!(
        voice = %request.voice_source,
        music = request.music_source.is_some(),
        soundscape = request.soundscape_source.is_some(),
        "Mix requested"
    );

    match state.mixer.mix(&request).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, AUDIO_MEDIA_TYPE)], bytes).into_response()),
        Err(e) => {
            error!(kind = e.kind(), error = %e, "Mix failed");
            *state.last_error.write().await = Some(e.to_string());
            Err(e.into())
        }
    }
}

/// Build mix routes
pub fn mix_routes() -> Router<AppState> {
    Router::new().route("/mix", post(mix))
}
