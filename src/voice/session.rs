//! Hands-free listen session
//!
//! One session runs per connected client. The loop alternates between
//! checking for a control message and running one capture cycle:
//!
//! ```text
//!   ┌──────────── poll control (10ms) ◄──────────────┐
//!   │                  │                             │
//!   │       Paused ────┴──── Listening               │
//!   │         │                  │                   │
//!   │     sleep 500ms     capture → transcribe       │
//!   │         │           → match → (detected?)      │
//!   │         │                  │                   │
//!   │         └──────────┬───────┘                   │
//!   │                    └── sleep 100ms ────────────┘
//! ```
//!
//! A detection moves the session to `Paused` until the client resumes it.
//! Nothing inside a cycle ends the loop; only closing either channel does.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::{AudioFrame, FrameSource, Outcome, Transcribe, WakeDecision, WakeWordProfile};
use crate::db::Embed;
use crate::knowledge::cosine_similarity;

/// Timing and capture parameters of a session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    /// Length of each captured frame
    pub frame_duration: Duration,
    /// Capture sample rate
    pub sample_rate: u32,
    /// How long to wait for a control message each cycle
    pub control_poll: Duration,
    /// Idle time per cycle while paused
    pub paused_sleep: Duration,
    /// Delay after each listening cycle
    pub cycle_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_duration: Duration::from_secs(4),
            sample_rate: super::SAMPLE_RATE,
            control_poll: Duration::from_millis(10),
            paused_sleep: Duration::from_millis(500),
            cycle_delay: Duration::from_millis(100),
        }
    }
}

/// Whether the session is capturing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenState {
    Listening,
    Paused,
}

/// Client request to change the listen state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ControlAction {
    PauseListening,
    ResumeListening,
}

impl ControlAction {
    /// Parse a raw control payload
    ///
    /// # Errors
    ///
    /// Returns error if the payload is not a known action
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// Message sent from the session to the client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Informational message
    Log { message: String },
    /// Something the client should surface
    Error { message: String },
    /// The wake phrase was heard; the session is now paused
    WakeWordDetected {
        message: String,
        transcript: String,
        decision: WakeDecision,
    },
}

impl SessionEvent {
    /// Informational event
    pub fn log(message: impl Into<String>) -> Self {
        Self::Log {
            message: message.into(),
        }
    }

    /// Error event
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// What one cycle did
#[derive(Debug, Clone, PartialEq)]
pub enum CycleReport {
    /// Session is paused; nothing was captured
    Paused,
    /// No speech recognizer loaded
    Skipped,
    /// Capture or transcription produced no text
    NoSpeech,
    /// Speech was heard but did not match
    Heard {
        transcript: String,
        decision: WakeDecision,
    },
    /// The wake phrase matched
    Detected {
        transcript: String,
        decision: WakeDecision,
    },
}

/// State and capabilities of one listen session
pub struct ListenSession {
    state: ListenState,
    last_match_score: Option<f32>,
    profile: Arc<WakeWordProfile>,
    wake_embedding: Option<Vec<f32>>,
    source: Arc<dyn FrameSource>,
    transcriber: Option<Arc<dyn Transcribe>>,
    embedder: Option<Arc<dyn Embed>>,
    config: SessionConfig,
}

impl ListenSession {
    /// Create a session in the `Listening` state
    #[must_use]
    pub fn new(
        profile: Arc<WakeWordProfile>,
        source: Arc<dyn FrameSource>,
        transcriber: Option<Arc<dyn Transcribe>>,
        embedder: Option<Arc<dyn Embed>>,
    ) -> Self {
        let wake_embedding = profile.embedding().map(<[f32]>::to_vec);

        Self {
            state: ListenState::Listening,
            last_match_score: None,
            profile,
            wake_embedding,
            source,
            transcriber,
            embedder,
            config: SessionConfig::default(),
        }
    }

    /// Override timing and capture parameters
    #[must_use]
    pub const fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> ListenState {
        self.state
    }

    /// Embedding similarity computed for the most recent transcript
    #[must_use]
    pub const fn last_match_score(&self) -> Option<f32> {
        self.last_match_score
    }

    /// Run until the client goes away
    ///
    /// `control` carries raw text from the client; `events` carries messages
    /// back. The loop ends when `control` is closed or `events` has no
    /// receiver.
    pub async fn run(
        mut self,
        mut control: mpsc::Receiver<String>,
        events: mpsc::Sender<SessionEvent>,
    ) {
        tracing::info!(phrase = %self.profile.phrase(), "listen session started");

        if !self.announce(&events).await {
            return;
        }

        loop {
            match tokio::time::timeout(self.config.control_poll, control.recv()).await {
                Ok(Some(raw)) => {
                    if let Some(ack) = self.handle_control(&raw) {
                        if events.send(ack).await.is_err() {
                            break;
                        }
                    }
                }
                Ok(None) => break,
                Err(_) => {}
            }

            if events.is_closed() {
                break;
            }

            let report = self.run_cycle(&events).await;
            tracing::trace!(?report, "cycle complete");

            if events.is_closed() {
                break;
            }

            if report != CycleReport::Paused {
                tokio::time::sleep(self.config.cycle_delay).await;
            }
        }

        tracing::info!("listen session ended");
    }

    /// Tell the client what kind of matching is available; false if it left
    async fn announce(&mut self, events: &mpsc::Sender<SessionEvent>) -> bool {
        if self.embedder.is_none() {
            return events
                .send(SessionEvent::error(
                    "Embeddings model not initialized; matching the wake word by text only",
                ))
                .await
                .is_ok();
        }

        if self.wake_embedding.is_none() {
            if let Some(embedder) = &self.embedder {
                match embedder.embed(self.profile.phrase()).await {
                    Ok(embedding) => self.wake_embedding = Some(embedding),
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to embed wake phrase");
                        return events
                            .send(SessionEvent::error(format!(
                                "Failed to create wake word embedding: {e}"
                            )))
                            .await
                            .is_ok();
                    }
                }
            }
        }

        events
            .send(SessionEvent::log(format!(
                "Wake word embedding created. Listening for '{}'...",
                self.profile.phrase()
            )))
            .await
            .is_ok()
    }

    /// Apply a raw control payload; returns the acknowledgement to send
    pub fn handle_control(&mut self, raw: &str) -> Option<SessionEvent> {
        match ControlAction::parse(raw) {
            Ok(ControlAction::PauseListening) => {
                self.state = ListenState::Paused;
                tracing::info!("listening paused");
                Some(SessionEvent::log("Listening paused"))
            }
            Ok(ControlAction::ResumeListening) => {
                self.state = ListenState::Listening;
                tracing::info!("listening resumed");
                Some(SessionEvent::log("Listening resumed"))
            }
            Err(e) => {
                tracing::warn!(error = %e, payload = %raw, "ignoring malformed control message");
                None
            }
        }
    }

    /// Run one capture cycle
    pub async fn run_cycle(&mut self, events: &mpsc::Sender<SessionEvent>) -> CycleReport {
        if self.state == ListenState::Paused {
            tokio::time::sleep(self.config.paused_sleep).await;
            return CycleReport::Paused;
        }

        let Some(transcriber) = self.transcriber.clone() else {
            return CycleReport::Skipped;
        };

        let frame = match self
            .source
            .capture_frame(self.config.frame_duration, self.config.sample_rate)
            .await
        {
            Outcome::Ok(frame) => frame,
            Outcome::Degraded { reason, .. } | Outcome::Failed(reason) => {
                // A substituted frame is silence; there is nothing to transcribe
                tracing::debug!(reason = %reason, "no usable audio this cycle");
                return CycleReport::NoSpeech;
            }
        };

        let transcript = match transcribe_frame(transcriber.as_ref(), &frame).await {
            Outcome::Ok(text) => text,
            Outcome::Degraded { value, reason } => {
                tracing::warn!(reason = %reason, "transcription degraded");
                value
            }
            Outcome::Failed(reason) => {
                tracing::warn!(reason = %reason, "transcription failed");
                return CycleReport::NoSpeech;
            }
        };

        if transcript.is_empty() {
            return CycleReport::NoSpeech;
        }

        tracing::debug!(transcript = %transcript, "heard");

        let decision = self.match_transcript(&transcript).await;
        if !decision.is_match() {
            return CycleReport::Heard {
                transcript,
                decision,
            };
        }

        tracing::info!(
            transcript = %transcript,
            decision = ?decision,
            "wake word detected"
        );

        let _ = events
            .send(SessionEvent::WakeWordDetected {
                message: format!("Wake word '{}' detected", self.profile.phrase()),
                transcript: transcript.clone(),
                decision,
            })
            .await;

        self.state = ListenState::Paused;
        CycleReport::Detected {
            transcript,
            decision,
        }
    }

    /// Text stages first; the embedding is only requested if both fail
    async fn match_transcript(&mut self, transcript: &str) -> WakeDecision {
        let decision = self.profile.evaluate_text(transcript);
        if decision.is_match() {
            return decision;
        }

        let similarity = self.similarity(transcript).await;
        if let Some(reason) = similarity.reason() {
            tracing::debug!(reason = %reason, "embedding stage degraded");
        }

        // A degraded score is reported but never matches
        let measured = similarity.is_ok();
        let score = similarity.into_value().unwrap_or(0.0);
        self.last_match_score = Some(score);
        self.profile.evaluate(transcript, measured.then_some(score))
    }

    async fn similarity(&self, transcript: &str) -> Outcome<f32> {
        let (Some(embedder), Some(wake)) = (&self.embedder, &self.wake_embedding) else {
            return Outcome::degraded(0.0, "embedding model unavailable");
        };

        match embedder.embed(transcript).await {
            Ok(embedding) => Outcome::Ok(cosine_similarity(wake, &embedding)),
            Err(e) => Outcome::degraded(0.0, e.to_string()),
        }
    }
}

/// Transcribe a frame, lower-cased and trimmed
pub async fn transcribe_frame(
    transcriber: &dyn Transcribe,
    frame: &AudioFrame,
) -> Outcome<String> {
    let wav = match frame.to_wav() {
        Ok(wav) => wav,
        Err(e) => return Outcome::failed(e.to_string()),
    };

    match transcriber.transcribe(&wav).await {
        Ok(text) => Outcome::Ok(text.trim().to_lowercase()),
        Err(e) => Outcome::failed(e.to_string()),
    }
}
