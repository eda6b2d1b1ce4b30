//! Shared test utilities
//!
//! Deterministic stand-ins for the model backends so the pipeline can run
//! without servers or audio hardware.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use friday_gateway::voice::{AudioFrame, FrameSource, Outcome, Synthesize, Transcribe};
use friday_gateway::{
    Assistant, Capabilities, DocumentIndex, Embed, Error, Generate, Result, TextSplitter,
};

/// Dimension of [`HashEmbedder`] vectors
pub const HASH_DIM: usize = 64;

/// Bag-of-words embedder: each word is hashed into one of `HASH_DIM` buckets
#[derive(Debug, Default)]
pub struct HashEmbedder;

impl HashEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; HASH_DIM];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
                    (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
                });
            let bucket = usize::try_from(hash % HASH_DIM as u64).unwrap();
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm <= f32::EPSILON {
            vector[0] = 1.0;
        } else {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embed for HashEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

/// Embedder whose backend is always down
#[derive(Debug, Default)]
pub struct BrokenEmbedder;

#[async_trait]
impl Embed for BrokenEmbedder {
    async fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Err(Error::Embedding("connection refused".to_string()))
    }
}

/// Generator that answers "answer: <question>" and records every prompt
#[derive(Debug, Default)]
pub struct EchoGenerator {
    prompts: Mutex<Vec<String>>,
}

impl EchoGenerator {
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Generate for EchoGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let question = prompt
            .lines()
            .find_map(|line| line.strip_prefix("Question: "))
            .unwrap_or_default();
        Ok(format!("  answer: {question}  "))
    }
}

/// Transcriber that replays a script, then hears nothing
#[derive(Debug, Default)]
pub struct ScriptedTranscriber {
    script: Mutex<VecDeque<String>>,
}

impl ScriptedTranscriber {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(lines.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl Transcribe for ScriptedTranscriber {
    async fn transcribe(&self, wav: &[u8]) -> Result<String> {
        assert!(wav.starts_with(b"RIFF"), "transcriber expects WAV input");
        Ok(self.script.lock().unwrap().pop_front().unwrap_or_default())
    }
}

/// Synthesizer returning a tiny valid WAV
#[derive(Debug, Default)]
pub struct ToneSynthesizer;

#[async_trait]
impl Synthesize for ToneSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
        friday_gateway::voice::samples_to_wav(&[0.0, 0.25, -0.25, 0.0], 16000)
    }
}

/// Frame source yielding a quiet non-silent tone, or silence when `broken`
#[derive(Debug, Default)]
pub struct ScriptedSource {
    pub broken: bool,
    captures: Mutex<usize>,
}

impl ScriptedSource {
    pub fn broken() -> Self {
        Self {
            broken: true,
            captures: Mutex::new(0),
        }
    }

    pub fn captures(&self) -> usize {
        *self.captures.lock().unwrap()
    }
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn capture_frame(&self, duration: Duration, sample_rate: u32) -> Outcome<AudioFrame> {
        *self.captures.lock().unwrap() += 1;

        if self.broken {
            return Outcome::degraded(AudioFrame::silent(duration, sample_rate), "no device");
        }

        let len = friday_gateway::voice::frame_len(duration, sample_rate);
        let samples = (0..len)
            .map(|i| if i % 2 == 0 { 0.2 } else { -0.2 })
            .collect();
        Outcome::Ok(AudioFrame::new(samples, sample_rate))
    }
}

/// Capabilities backed by the fakes above
pub fn fake_capabilities(generator: Arc<EchoGenerator>) -> Capabilities {
    Capabilities::none()
        .with_embedder(Arc::new(HashEmbedder))
        .with_generator(generator)
}

/// An assistant over an in-memory index with small chunks
pub fn test_assistant(capabilities: Capabilities) -> Assistant {
    let splitter = TextSplitter::new(120, 20).unwrap();
    Assistant::new(capabilities, DocumentIndex::in_memory(splitter))
}

/// A short document with distinct paragraphs
pub const HANDBOOK: &str = "The office opens at nine in the morning.\n\n\
The cafeteria serves lunch between noon and two.\n\n\
Parking permits are issued by the front desk on request.\n\n\
Fire drills happen on the first Monday of every quarter.";

/// A second, unrelated document
pub const RECIPE: &str = "Whisk three eggs with a pinch of salt.\n\n\
Melt butter in a pan over medium heat.\n\n\
Pour the eggs and stir gently until set.";
