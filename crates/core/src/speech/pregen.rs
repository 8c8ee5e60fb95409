use crate::emotion::Emotion;
use crate::speech::{SpeechAudio, SpeechSynthesizer};
use std::collections::BTreeMap;

/// Message audio rendered once at startup, so a state change never waits on
/// synthesis. Mirrors how the feedback messages are fixed per emotional
/// state: the set is small and known before the pipeline starts.
#[derive(Clone, Debug, Default)]
pub struct PregeneratedSpeech {
    voices: BTreeMap<Emotion, SpeechAudio>,
}

impl PregeneratedSpeech {
    /// Renders every configured message. A message that fails to synthesize
    /// is logged and stays silent; the rest remain playable.
    pub async fn prepare<S>(synth: &S, messages: &BTreeMap<Emotion, String>) -> Self
    where
        S: SpeechSynthesizer + ?Sized,
    {
        let mut voices = BTreeMap::new();
        for (&emotion, text) in messages {
            match synth.synthesize(text.clone()).await {
                Ok(audio) => {
                    tracing::debug!(
                        emotion = %emotion,
                        duration_ms = audio.duration().as_millis() as u64,
                        "pre-rendered message audio"
                    );
                    voices.insert(emotion, audio);
                }
                Err(e) => {
                    tracing::warn!(
                        emotion = %emotion,
                        error = %e,
                        "failed to pre-render message, it will stay silent"
                    );
                }
            }
        }
        Self { voices }
    }

    pub fn get(&self, emotion: Emotion) -> Option<&SpeechAudio> {
        self.voices.get(&emotion)
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }
}
