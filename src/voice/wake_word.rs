//! Wake word matching
//!
//! A transcript activates the assistant when it matches the configured phrase
//! in one of three stages, cheapest first:
//!
//! 1. the normalized phrase appears inside the normalized transcript
//! 2. the normalized strings are close enough by edit-distance ratio
//! 3. the transcript embedding is close enough to the phrase embedding
//!
//! Normalization lower-cases and drops everything outside `a-z`, so
//! "Hey, Friday!" and "heyfriday" compare equal.

use serde::Serialize;

/// Default embedding similarity needed for the third stage
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.6;

/// Default edit-distance ratio needed for the second stage
pub const DEFAULT_FUZZY_THRESHOLD: f32 = 0.82;

/// Which stage accepted (or rejected) a transcript
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum WakeDecision {
    /// Phrase found verbatim after normalization
    SubstringMatch,
    /// Phrase found by fuzzy string comparison
    FuzzyMatch { ratio: f32 },
    /// Phrase found by semantic similarity
    EmbeddingMatch { similarity: f32 },
    /// No stage accepted the transcript
    NoMatch,
}

impl WakeDecision {
    /// Whether any stage fired
    #[must_use]
    pub const fn is_match(self) -> bool {
        !matches!(self, Self::NoMatch)
    }
}

/// The wake phrase and everything needed to match against it
///
/// Built once per process and shared read-only by every listen session.
#[derive(Debug, Clone)]
pub struct WakeWordProfile {
    phrase: String,
    normalized: String,
    embedding: Option<Vec<f32>>,
    similarity_threshold: f32,
    fuzzy_threshold: f32,
}

impl WakeWordProfile {
    /// Create a profile for a phrase with default thresholds
    #[must_use]
    pub fn new(phrase: impl Into<String>) -> Self {
        let phrase = phrase.into();
        let normalized = normalize(&phrase);

        tracing::debug!(phrase = %phrase, normalized = %normalized, "wake word profile created");

        Self {
            phrase,
            normalized,
            embedding: None,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }

    /// Attach the precomputed phrase embedding
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Override the embedding similarity threshold
    #[must_use]
    pub const fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Override the fuzzy ratio threshold
    #[must_use]
    pub const fn with_fuzzy_threshold(mut self, threshold: f32) -> Self {
        self.fuzzy_threshold = threshold;
        self
    }

    /// The phrase as configured
    #[must_use]
    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    /// The phrase reduced to `a-z`
    #[must_use]
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// The phrase embedding, when one was computed at startup
    #[must_use]
    pub fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }

    /// Embedding similarity threshold
    #[must_use]
    pub const fn similarity_threshold(&self) -> f32 {
        self.similarity_threshold
    }

    /// Run only the two text stages
    ///
    /// Callers use this to decide whether an embedding is worth requesting.
    #[must_use]
    pub fn evaluate_text(&self, transcript: &str) -> WakeDecision {
        let candidate = normalize(transcript);

        if self.normalized.is_empty() || candidate.is_empty() {
            return WakeDecision::NoMatch;
        }

        if candidate.contains(&self.normalized) {
            return WakeDecision::SubstringMatch;
        }

        let ratio = similarity_ratio(&candidate, &self.normalized);
        if ratio >= self.fuzzy_threshold {
            return WakeDecision::FuzzyMatch { ratio };
        }

        WakeDecision::NoMatch
    }

    /// Run every stage, using `similarity` for the embedding stage if given
    #[must_use]
    pub fn evaluate(&self, transcript: &str, similarity: Option<f32>) -> WakeDecision {
        let decision = self.evaluate_text(transcript);
        if decision.is_match() {
            return decision;
        }

        match similarity {
            Some(similarity) if similarity >= self.similarity_threshold => {
                WakeDecision::EmbeddingMatch { similarity }
            }
            _ => WakeDecision::NoMatch,
        }
    }

    /// Boolean form of [`Self::evaluate`]
    #[must_use]
    pub fn is_wake_word(&self, transcript: &str, similarity: f32) -> bool {
        self.evaluate(transcript, Some(similarity)).is_match()
    }
}

/// Lower-case and keep only ASCII letters
#[must_use]
pub fn normalize(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .filter(char::is_ascii_lowercase)
        .collect()
}

/// Ratcliff/Obershelp similarity in `[0, 1]`
///
/// `2 * M / (|a| + |b|)` where `M` counts characters in matching blocks:
/// the longest common run, then recursively the runs left and right of it.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn similarity_ratio(a: &str, b: &str) -> f32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();

    if total == 0 {
        return 1.0;
    }

    (2 * matching_characters(&a, &b)) as f32 / total as f32
}

fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((a_lo, a_hi, b_lo, b_hi)) = pending.pop() {
        let (i, j, len) = longest_match(a, b, a_lo, a_hi, b_lo, b_hi);
        if len == 0 {
            continue;
        }

        matched += len;
        pending.push((a_lo, i, b_lo, j));
        pending.push((i + len, a_hi, j + len, b_hi));
    }

    matched
}

/// Longest common run inside `a[a_lo..a_hi]` and `b[b_lo..b_hi]`
///
/// Ties go to the run starting earliest in `a`, then earliest in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    a_lo: usize,
    a_hi: usize,
    b_lo: usize,
    b_hi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_len) = (a_lo, b_lo, 0);
    let width = b_hi - b_lo;
    let mut prev = vec![0usize; width + 1];
    let mut curr = vec![0usize; width + 1];

    for i in a_lo..a_hi {
        for j in b_lo..b_hi {
            let k = j - b_lo;
            curr[k + 1] = if a[i] == b[j] { prev[k] + 1 } else { 0 };
            if curr[k + 1] > best_len {
                best_len = curr[k + 1];
                best_i = i + 1 - best_len;
                best_j = j + 1 - best_len;
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    (best_i, best_j, best_len)
}
