mod slot;

use crate::config::{DEFAULT_FADE_MS, DEFAULT_SPEECH_COOLDOWN_SECS};
use crate::emotion::{Emotion, StateChange};
use crate::playback::{CueId, SpeechSink, ToneSink};
use crate::speech::PregeneratedSpeech;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub use slot::{SpeechJoinTimeout, SpeechSlot, SPEECH_POLL_INTERVAL};

/// Audio-feedback tuning: which states carry a tone and a message, how long
/// fades run, and how often a message may be spoken.
#[derive(Clone, Debug, PartialEq)]
pub struct FeedbackConfig {
    pub speech_cooldown: Duration,
    pub fade: Duration,
    pub tone_cues: BTreeMap<Emotion, CueId>,
    pub messages: BTreeMap<Emotion, String>,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            speech_cooldown: Duration::from_secs(DEFAULT_SPEECH_COOLDOWN_SECS),
            fade: Duration::from_millis(DEFAULT_FADE_MS),
            tone_cues: BTreeMap::from([
                (Emotion::Angry, CueId::Theta),
                (Emotion::Fear, CueId::Theta),
                (Emotion::Sad, CueId::Alpha),
                (Emotion::Disgust, CueId::Alpha),
            ]),
            messages: BTreeMap::from([
                (Emotion::Angry, "Take a deep breath!".to_owned()),
                (Emotion::Disgust, "Stay positive!".to_owned()),
                (Emotion::Fear, "You're strong!".to_owned()),
                (Emotion::Sad, "Smile, it's a new day!".to_owned()),
            ]),
        }
    }
}

impl FeedbackConfig {
    /// Message carried by `emotion`, only when it also maps to a tone cue.
    pub fn caption(&self, emotion: Emotion) -> Option<&str> {
        if !self.tone_cues.contains_key(&emotion) {
            return None;
        }
        self.messages.get(&emotion).map(String::as_str)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum FeedbackError {
    #[error("feedback shutdown timed out after {waited:?}")]
    ShutdownTimeout { waited: Duration },
}

/// Maps committed state changes to tone and speech commands.
///
/// Owns at most one active tone loop and at most one speech task. Every
/// transition tears the previous tone down first; speech additionally sits
/// behind its own cooldown, distinct from the emotion dwell cooldown.
pub struct FeedbackController<T, S>
where
    T: ToneSink,
    S: SpeechSink,
{
    config: FeedbackConfig,
    tone: T,
    speech: S,
    voices: PregeneratedSpeech,
    slot: SpeechSlot,
}

impl<T, S> FeedbackController<T, S>
where
    T: ToneSink,
    S: SpeechSink,
{
    pub fn new(config: FeedbackConfig, tone: T, speech: S, voices: PregeneratedSpeech) -> Self {
        Self {
            config,
            tone,
            speech,
            voices,
            slot: SpeechSlot::new(),
        }
    }

    pub fn config(&self) -> &FeedbackConfig {
        &self.config
    }

    pub fn caption_for(&self, emotion: Emotion) -> Option<&str> {
        self.config.caption(emotion)
    }

    /// React to one committed state change. May block briefly (bounded by
    /// the speech poll interval) while a previous speech task is joined.
    pub async fn on_state_change(&mut self, event: &StateChange, now: Instant) {
        // A new target always supersedes the running tone first, so two
        // loops never overlap.
        self.tone.fade_stop(self.config.fade);

        let cue = event.to.and_then(|e| self.config.tone_cues.get(&e).copied());
        let (Some(target), Some(cue)) = (event.to, cue) else {
            self.idle().await;
            return;
        };

        self.tone.play_loop(cue);

        if !self.slot.cooldown_elapsed(now, self.config.speech_cooldown) {
            // The message is suppressed, the tone still switches. Any
            // message already playing keeps running out.
            tracing::debug!(emotion = %target, "speech cooldown active, tone only");
            return;
        }

        if let Err(e) = self.slot.cancel_and_join().await {
            tracing::warn!(error = %e, "previous speech task had to be aborted");
        }

        let Some(audio) = self.voices.get(target) else {
            tracing::warn!(emotion = %target, "no pre-rendered message for state, staying silent");
            return;
        };

        match self.speech.begin(audio.clone()) {
            Ok(handle) => self.slot.start(handle, self.config.fade),
            Err(e) => {
                tracing::warn!(emotion = %target, error = %e, "speech playback unavailable");
            }
        }
    }

    /// Tear both feedback resources down unconditionally. A speech task that
    /// refuses to exit is fatal here, unlike in steady-state operation.
    pub async fn shutdown(&mut self) -> Result<(), FeedbackError> {
        self.tone.fade_stop(self.config.fade);
        self.slot
            .cancel_and_join()
            .await
            .map_err(|e| FeedbackError::ShutdownTimeout { waited: e.waited })
    }

    async fn idle(&mut self) {
        if let Err(e) = self.slot.cancel_and_join().await {
            tracing::warn!(error = %e, "speech task had to be aborted while idling");
        }
    }
}
