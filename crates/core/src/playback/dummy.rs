use crate::playback::{CueId, PlaybackError, SpeechHandle, SpeechSink, ToneSink};
use crate::speech::SpeechAudio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToneCommand {
    Play(CueId),
    FadeStop(Duration),
}

/// Silent tone sink that records the command stream for assertions.
#[derive(Clone, Default)]
pub struct DummyToneSink {
    log: Arc<Mutex<Vec<ToneCommand>>>,
}

impl DummyToneSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<ToneCommand> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, command: ToneCommand) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command);
    }
}

impl ToneSink for DummyToneSink {
    fn play_loop(&self, cue: CueId) {
        self.push(ToneCommand::Play(cue));
    }

    fn fade_stop(&self, fade: Duration) {
        self.push(ToneCommand::FadeStop(fade));
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpeechCommand {
    Begin,
    FadeStop(Duration),
}

/// Silent speech sink whose handles "play" for the audio's natural duration
/// (or a fixed override) without touching an audio device.
#[derive(Clone, Default)]
pub struct DummySpeechSink {
    play_for: Option<Duration>,
    log: Arc<Mutex<Vec<SpeechCommand>>>,
}

impl DummySpeechSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_play_duration(play_for: Duration) -> Self {
        Self {
            play_for: Some(play_for),
            log: Arc::default(),
        }
    }

    pub fn commands(&self) -> Vec<SpeechCommand> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn begun(&self) -> usize {
        self.commands()
            .iter()
            .filter(|c| matches!(c, SpeechCommand::Begin))
            .count()
    }

    fn push(&self, command: SpeechCommand) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command);
    }
}

impl SpeechSink for DummySpeechSink {
    type Handle = DummySpeechHandle;

    fn begin(&self, audio: SpeechAudio) -> Result<DummySpeechHandle, PlaybackError> {
        let play_for = self.play_for.unwrap_or_else(|| audio.duration());
        self.push(SpeechCommand::Begin);
        Ok(DummySpeechHandle {
            ends_at: Instant::now() + play_for,
            stopped: Arc::new(AtomicBool::new(false)),
            log: Arc::clone(&self.log),
        })
    }
}

pub struct DummySpeechHandle {
    ends_at: Instant,
    stopped: Arc<AtomicBool>,
    log: Arc<Mutex<Vec<SpeechCommand>>>,
}

impl SpeechHandle for DummySpeechHandle {
    fn is_finished(&self) -> bool {
        self.stopped.load(Ordering::Relaxed) || Instant::now() >= self.ends_at
    }

    fn fade_stop(&self, fade: Duration) {
        // Converges with natural completion: either way the handle reads
        // finished afterwards.
        self.stopped.store(true, Ordering::Relaxed);
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SpeechCommand::FadeStop(fade));
    }
}
