mod audio;
mod dummy;

use crate::speech::SpeechAudio;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub use audio::{AudioOutput, CueLibrary, RodioSpeechHandle, RodioSpeechSink, RodioToneSink, ToneBuffer};
pub use dummy::{DummySpeechHandle, DummySpeechSink, DummyToneSink, SpeechCommand, ToneCommand};

/// Looping audio cue identifiers. Each maps to one asset file; cues without
/// an asset fall back to a synthesized pulse.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CueId {
    Theta,
    Alpha,
}

impl CueId {
    pub const ALL: [CueId; 2] = [CueId::Theta, CueId::Alpha];

    pub fn label(self) -> &'static str {
        match self {
            CueId::Theta => "theta",
            CueId::Alpha => "alpha",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            CueId::Theta => "theta.mp3",
            CueId::Alpha => "alpha.mp3",
        }
    }

    /// Pulse rate of the synthesized fallback, in Hz.
    pub fn pulse_hz(self) -> f32 {
        match self {
            CueId::Theta => 6.0,
            CueId::Alpha => 10.0,
        }
    }
}

impl fmt::Display for CueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PlaybackError {
    #[error("audio output unavailable: {details}")]
    AudioOutputUnavailable { details: String },

    #[error("cue {cue} unavailable: {details}")]
    CueUnavailable { cue: CueId, details: String },

    #[error("refusing to play malformed pcm ({samples} samples, {channels} channels, {sample_rate_hz} Hz)")]
    InvalidPcm {
        samples: usize,
        channels: u16,
        sample_rate_hz: u32,
    },
}

/// Looping tone output. At most one tone is active per sink; playback
/// problems degrade to logged silence, they never surface to the caller.
pub trait ToneSink: Send + Sync {
    /// Start looping `cue` until superseded. Replaces any active tone.
    fn play_loop(&self, cue: CueId);

    /// Fade the active tone out and stop it. No-op when nothing is playing.
    fn fade_stop(&self, fade: Duration);
}

/// A single in-flight spoken message.
pub trait SpeechHandle: Send + Sync {
    fn is_finished(&self) -> bool;

    /// Request a fade-out stop. Must be a no-op if playback already finished.
    fn fade_stop(&self, fade: Duration);
}

/// Starts spoken-message playback and hands back a cancellable handle.
pub trait SpeechSink: Send + Sync {
    type Handle: SpeechHandle + Send + 'static;

    fn begin(&self, audio: SpeechAudio) -> Result<Self::Handle, PlaybackError>;
}
