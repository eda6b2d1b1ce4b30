//! Text and voice chat endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiState, MAX_UPLOAD_BYTES};
use crate::Error;
use crate::assistant::Answer;

/// Build the chat router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/chat_text", post(chat_text))
        .route("/chat_voice", post(chat_voice))
        .route("/audio/{filename}", get(get_audio))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Text query
#[derive(Debug, Deserialize)]
pub struct TextQueryRequest {
    pub query_text: String,
}

async fn chat_text(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<TextQueryRequest>,
) -> Result<Json<Answer>, ApiError> {
    if request.query_text.trim().is_empty() {
        return Err(ApiError::bad_request("Empty query"));
    }

    tracing::info!(query = %request.query_text, "text chat request");
    let answer = state.assistant.answer(&request.query_text).await?;
    Ok(Json(answer))
}

/// Voice chat response
#[derive(Debug, Serialize)]
pub struct VoiceChatResponse {
    pub user_query_text: String,
    pub response_text: String,
    /// Null when speech synthesis is unavailable or failed
    pub response_audio_url: Option<String>,
}

/// Transcribe a spoken question, answer it and speak the answer
async fn chat_voice(
    State(state): State<Arc<ApiState>>,
    mut multipart: Multipart,
) -> Result<Json<VoiceChatResponse>, ApiError> {
    let mut audio = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("audio_file") {
            audio = Some(field.bytes().await?);
            break;
        }
    }

    let audio = audio
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing audio_file"))?;
    tracing::info!(bytes = audio.len(), "voice chat request");

    let capabilities = state.assistant.capabilities();
    let transcriber = capabilities
        .transcriber
        .as_ref()
        .ok_or(Error::Unavailable("speech recognition model"))?;

    let user_query_text = transcriber.transcribe(&audio).await?;
    if user_query_text.is_empty() {
        return Err(ApiError::bad_request("No speech recognized in audio"));
    }

    let answer = state.assistant.answer(&user_query_text).await?;
    let response_audio_url = speak(&state, &answer.response_text).await;

    Ok(Json(VoiceChatResponse {
        user_query_text,
        response_text: answer.response_text,
        response_audio_url,
    }))
}

/// Synthesize `text` and return the URL it can be fetched from
async fn speak(state: &ApiState, text: &str) -> Option<String> {
    let synthesizer = state.assistant.capabilities().synthesizer.as_ref()?;

    let wav = match synthesizer.synthesize(text).await {
        Ok(wav) => wav,
        Err(e) => {
            tracing::warn!(error = %e, "speech synthesis failed, replying with text only");
            return None;
        }
    };

    match state.audio.save(&wav, "wav").await {
        Ok(filename) => Some(format!("/api/v1/audio/{filename}")),
        Err(e) => {
            tracing::warn!(error = %e, "failed to store synthesized speech");
            None
        }
    }
}

/// Serve a generated audio file
async fn get_audio(
    State(state): State<Arc<ApiState>>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let path = state.audio.resolve(&filename)?;
    let bytes = tokio::fs::read(&path).await.map_err(Error::Io)?;

    Ok((
        [
            (header::CONTENT_TYPE, "audio/wav".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={filename}"),
            ),
        ],
        bytes,
    )
        .into_response())
}
