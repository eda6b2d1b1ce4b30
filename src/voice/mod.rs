//! Voice processing module
//!
//! Handles audio capture, speech recognition and synthesis, wake word
//! matching, and the hands-free listen session built from them.

mod capture;
mod outcome;
mod session;
mod stt;
mod tts;
mod wake_word;

pub use capture::{
    AudioFrame, FrameSource, MAX_GAIN, Microphone, SAMPLE_RATE, TARGET_PEAK, frame_len,
    samples_to_wav,
};
pub use outcome::Outcome;
pub use session::{
    ControlAction, CycleReport, ListenSession, ListenState, SessionConfig, SessionEvent,
    transcribe_frame,
};
pub use stt::{SpeechToText, Transcribe};
pub use tts::{Synthesize, TextToSpeech};
pub use wake_word::{
    DEFAULT_FUZZY_THRESHOLD, DEFAULT_SIMILARITY_THRESHOLD, WakeDecision, WakeWordProfile,
    normalize, similarity_ratio,
};
