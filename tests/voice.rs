//! Voice pipeline integration tests
//!
//! Drives the listen session with scripted audio and transcripts; no audio
//! hardware or model servers required.

use std::sync::Arc;
use std::time::Duration;

use friday_gateway::voice::{
    AudioFrame, CycleReport, ListenSession, ListenState, SAMPLE_RATE, SessionConfig,
    SessionEvent, WakeDecision, WakeWordProfile, samples_to_wav,
};
use tokio::sync::mpsc;

mod common;
use common::{HashEmbedder, ScriptedSource, ScriptedTranscriber};

fn fast_config() -> SessionConfig {
    SessionConfig {
        frame_duration: Duration::from_millis(10),
        sample_rate: SAMPLE_RATE,
        control_poll: Duration::from_millis(1),
        paused_sleep: Duration::from_millis(2),
        cycle_delay: Duration::from_millis(1),
    }
}

fn session_with(
    lines: &[&str],
    source: Arc<ScriptedSource>,
    with_embedder: bool,
) -> ListenSession {
    let mut profile = WakeWordProfile::new("Hey Friday");
    if with_embedder {
        profile = profile.with_embedding(HashEmbedder::vector("Hey Friday"));
    }

    ListenSession::new(
        Arc::new(profile),
        source,
        Some(Arc::new(ScriptedTranscriber::new(lines.iter().copied()))),
        with_embedder.then(|| Arc::new(HashEmbedder) as Arc<dyn friday_gateway::Embed>),
    )
    .with_config(fast_config())
}

#[tokio::test]
async fn test_substring_detection_pauses_session() {
    let source = Arc::new(ScriptedSource::default());
    let mut session = session_with(&["okay so", "Hey, Friday! what time is it"], source, false);
    let (events_tx, mut events_rx) = mpsc::channel(8);

    let first = session.run_cycle(&events_tx).await;
    assert!(matches!(first, CycleReport::Heard { decision: WakeDecision::NoMatch, .. }));
    assert_eq!(session.state(), ListenState::Listening);

    let second = session.run_cycle(&events_tx).await;
    assert_eq!(
        second,
        CycleReport::Detected {
            transcript: "hey, friday! what time is it".to_string(),
            decision: WakeDecision::SubstringMatch,
        }
    );
    assert_eq!(session.state(), ListenState::Paused);

    let event = events_rx.try_recv().unwrap();
    assert!(matches!(
        event,
        SessionEvent::WakeWordDetected { ref message, .. } if message == "Wake word 'Hey Friday' detected"
    ));

    assert_eq!(session.run_cycle(&events_tx).await, CycleReport::Paused);
}

#[tokio::test]
async fn test_fuzzy_detection() {
    let source = Arc::new(ScriptedSource::default());
    let mut session = session_with(&["hey fryday"], source, false);
    let (events_tx, _events_rx) = mpsc::channel(8);

    let report = session.run_cycle(&events_tx).await;
    assert!(matches!(
        report,
        CycleReport::Detected { decision: WakeDecision::FuzzyMatch { ratio }, .. } if ratio >= 0.82
    ));
}

#[tokio::test]
async fn test_embedding_detection() {
    let source = Arc::new(ScriptedSource::default());
    let mut session = session_with(
        &["the weather today is quite nice outside", "friday hey"],
        source,
        true,
    );
    let (events_tx, _events_rx) = mpsc::channel(8);

    let report = session.run_cycle(&events_tx).await;
    assert!(matches!(report, CycleReport::Heard { decision: WakeDecision::NoMatch, .. }));
    assert!(session.last_match_score().unwrap() < 0.6);

    let report = session.run_cycle(&events_tx).await;
    assert!(matches!(
        report,
        CycleReport::Detected { decision: WakeDecision::EmbeddingMatch { .. }, .. }
    ));
    assert!(session.last_match_score().unwrap() > 0.99);
}

#[tokio::test]
async fn test_broken_microphone_reports_no_speech() {
    let source = Arc::new(ScriptedSource::broken());
    let mut session = session_with(&["hey friday"], Arc::clone(&source), false);
    let (events_tx, _events_rx) = mpsc::channel(8);

    assert_eq!(session.run_cycle(&events_tx).await, CycleReport::NoSpeech);
    assert_eq!(source.captures(), 1);
    assert_eq!(session.state(), ListenState::Listening);
}

#[tokio::test]
async fn test_missing_transcriber_skips_capture() {
    let source = Arc::new(ScriptedSource::default());
    let mut session = ListenSession::new(
        Arc::new(WakeWordProfile::new("Hey Friday")),
        Arc::clone(&source) as Arc<dyn friday_gateway::voice::FrameSource>,
        None,
        None,
    )
    .with_config(fast_config());
    let (events_tx, _events_rx) = mpsc::channel(8);

    assert_eq!(session.run_cycle(&events_tx).await, CycleReport::Skipped);
    assert_eq!(source.captures(), 0);
}

#[tokio::test]
async fn test_run_loop_detects_then_resumes() {
    let source = Arc::new(ScriptedSource::default());
    let session = session_with(&["", "hey friday"], source, false);
    let (control_tx, control_rx) = mpsc::channel(8);
    let (events_tx, mut events_rx) = mpsc::channel(8);

    let handle = tokio::spawn(session.run(control_rx, events_tx));

    // No embedder: the client is told matching is text-only
    let first = events_rx.recv().await.unwrap();
    assert!(matches!(first, SessionEvent::Error { .. }));

    let detected = tokio::time::timeout(Duration::from_secs(5), events_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(detected, SessionEvent::WakeWordDetected { .. }));

    control_tx
        .send(r#"{"action":"resume_listening"}"#.to_string())
        .await
        .unwrap();
    let ack = tokio::time::timeout(Duration::from_secs(5), events_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ack, SessionEvent::log("Listening resumed"));

    drop(control_tx);
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_announce_with_embedder() {
    let source = Arc::new(ScriptedSource::default());
    let session = session_with(&[], source, true);
    let (control_tx, control_rx) = mpsc::channel::<String>(8);
    let (events_tx, mut events_rx) = mpsc::channel(8);

    let handle = tokio::spawn(session.run(control_rx, events_tx));

    let first = events_rx.recv().await.unwrap();
    assert_eq!(
        first,
        SessionEvent::log("Wake word embedding created. Listening for 'Hey Friday'...")
    );

    drop(control_tx);
    drop(events_rx);
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}

#[test]
fn test_event_wire_format() {
    let event = SessionEvent::WakeWordDetected {
        message: "Wake word 'Hey Friday' detected".to_string(),
        transcript: "hey friday".to_string(),
        decision: WakeDecision::SubstringMatch,
    };
    let json = serde_json::to_value(&event).unwrap();

    assert_eq!(json["type"], "wake_word_detected");
    assert_eq!(json["transcript"], "hey friday");
    assert_eq!(json["decision"]["stage"], "substring_match");

    let log = serde_json::to_value(SessionEvent::log("heartbeat")).unwrap();
    assert_eq!(log, serde_json::json!({"type": "log", "message": "heartbeat"}));
}

#[test]
fn test_normalized_frame_encodes_as_wav() {
    let mut frame = AudioFrame::new(vec![0.1, -0.1, 0.05, 0.0], SAMPLE_RATE);
    let gain = frame.normalize();
    assert!((gain - 4.0).abs() < f32::EPSILON);
    assert!((frame.peak() - 0.4).abs() < 1e-6);

    let wav = frame.to_wav().unwrap();
    let reader = hound::WavReader::new(std::io::Cursor::new(&wav)).unwrap();
    assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
    assert_eq!(reader.spec().channels, 1);

    assert_eq!(samples_to_wav(&frame.samples, SAMPLE_RATE).unwrap(), wav);
}
