mod basic;
mod pregen;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use basic::BasicSpeechSynthesizer;
pub use pregen::PregeneratedSpeech;

/// Rendered spoken-message audio, ready for a playback sink.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SpeechAudio {
    pub sample_rate_hz: u32,
    pub channels: u16,
    pub pcm_i16: Vec<i16>,
}

impl SpeechAudio {
    /// Natural playback length of the buffer.
    pub fn duration(&self) -> Duration {
        if self.sample_rate_hz == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        let frames = self.pcm_i16.len() as u64 / u64::from(self.channels);
        Duration::from_millis(frames * 1000 / u64::from(self.sample_rate_hz))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SpeechError {
    #[error("message text is empty")]
    EmptyMessage,

    #[error("speech synthesis failed: {details}")]
    SynthesisFailed { details: String },
}

pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize(&self, text: String) -> BoxFuture<'_, Result<SpeechAudio, SpeechError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_accounts_for_channels() {
        let mono = SpeechAudio {
            sample_rate_hz: 1000,
            channels: 1,
            pcm_i16: vec![0; 500],
        };
        let stereo = SpeechAudio {
            sample_rate_hz: 1000,
            channels: 2,
            pcm_i16: vec![0; 500],
        };
        assert_eq!(mono.duration(), Duration::from_millis(500));
        assert_eq!(stereo.duration(), Duration::from_millis(250));
    }

    #[test]
    fn duration_of_malformed_audio_is_zero() {
        let audio = SpeechAudio {
            sample_rate_hz: 0,
            channels: 1,
            pcm_i16: vec![0; 500],
        };
        assert_eq!(audio.duration(), Duration::ZERO);
    }
}
