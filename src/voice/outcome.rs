//! Tri-state result for capability calls that must never stop the listen loop

/// Outcome of a capture, transcription or similarity step
///
/// `Degraded` carries a usable neutral value (a silent frame, a zero score)
/// so callers keep going, while still telling "no speech" apart from
/// "recogniser broken".
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The step worked
    Ok(T),
    /// The step failed but produced a neutral stand-in value
    Degraded {
        value: T,
        reason: String,
    },
    /// The step failed and there is nothing to use
    Failed(String),
}

impl<T> Outcome<T> {
    /// Build a degraded outcome
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        Self::Degraded {
            value,
            reason: reason.into(),
        }
    }

    /// Build a failed outcome
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    /// Whether the step worked without degradation
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Failure or degradation reason, if any
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Ok(_) => None,
            Self::Degraded { reason, .. } | Self::Failed(reason) => Some(reason),
        }
    }

    /// Usable value, whether clean or degraded
    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Ok(value) | Self::Degraded { value, .. } => Some(value),
            Self::Failed(_) => None,
        }
    }

    /// Borrow the usable value
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Ok(value) | Self::Degraded { value, .. } => Some(value),
            Self::Failed(_) => None,
        }
    }
}
