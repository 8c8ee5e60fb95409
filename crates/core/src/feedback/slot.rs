use crate::playback::SpeechHandle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// How often the watcher re-checks playback and the stop flag. Bounds the
/// latency from "stop requested" to "old speech fading".
pub const SPEECH_POLL_INTERVAL: Duration = Duration::from_millis(100);

const JOIN_GRACE: Duration = Duration::from_millis(250);

#[derive(thiserror::Error, Debug)]
#[error("speech task did not exit within {waited:?}")]
pub struct SpeechJoinTimeout {
    pub waited: Duration,
}

struct SlotShared {
    stop: AtomicBool,
    last_spoken_at: Mutex<Option<Instant>>,
}

/// Single-slot supervisor for the one outstanding speech task.
///
/// The stop flag and the cooldown clock are the only state shared with the
/// watcher task. `&mut self` on the state-changing methods serializes every
/// start against a pending cancel-and-join, so two watchers can never race
/// on the slot.
pub struct SpeechSlot {
    shared: Arc<SlotShared>,
    task: Option<JoinHandle<()>>,
}

impl SpeechSlot {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SlotShared {
                stop: AtomicBool::new(false),
                last_spoken_at: Mutex::new(None),
            }),
            task: None,
        }
    }

    /// True when at least `cooldown` has passed since the last message
    /// stopped, or nothing was ever spoken.
    pub fn cooldown_elapsed(&self, now: Instant, cooldown: Duration) -> bool {
        let guard = self
            .shared
            .last_spoken_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match *guard {
            None => true,
            Some(at) => now.duration_since(at) >= cooldown,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cancel the running watcher (if any) and wait for it to exit. The
    /// watcher observes the flag within one poll tick and exits right after
    /// requesting the fade, so the wait is bounded; a watcher overrunning
    /// that bound is aborted and the slot reclaimed.
    pub async fn cancel_and_join(&mut self) -> Result<(), SpeechJoinTimeout> {
        let Some(mut task) = self.task.take() else {
            return Ok(());
        };
        self.shared.stop.store(true, Ordering::Relaxed);

        let bound = SPEECH_POLL_INTERVAL + JOIN_GRACE;
        let result = tokio::time::timeout(bound, &mut task).await;
        self.shared.stop.store(false, Ordering::Relaxed);

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(join_err)) => {
                // A panicked watcher still frees the slot.
                tracing::warn!(error = %join_err, "speech task ended abnormally");
                Ok(())
            }
            Err(_) => {
                task.abort();
                Err(SpeechJoinTimeout { waited: bound })
            }
        }
    }

    /// Install a fresh watcher for `handle`. The slot must be empty; callers
    /// go through [`SpeechSlot::cancel_and_join`] first.
    pub fn start<H>(&mut self, handle: H, fade: Duration)
    where
        H: SpeechHandle + 'static,
    {
        debug_assert!(!self.is_running(), "speech slot already occupied");
        self.shared.stop.store(false, Ordering::Relaxed);
        let shared = Arc::clone(&self.shared);
        self.task = Some(tokio::spawn(watch_playback(handle, shared, fade)));
    }
}

impl Default for SpeechSlot {
    fn default() -> Self {
        Self::new()
    }
}

async fn watch_playback<H: SpeechHandle>(handle: H, shared: Arc<SlotShared>, fade: Duration) {
    loop {
        if shared.stop.load(Ordering::Relaxed) {
            // The fade itself runs on the sink's side; exiting now keeps the
            // join bounded by the poll tick.
            handle.fade_stop(fade);
            break;
        }
        if handle.is_finished() {
            break;
        }
        tokio::time::sleep(SPEECH_POLL_INTERVAL).await;
    }

    // Natural completion and cancellation converge here, so the speech
    // cooldown clock always advances.
    let mut guard = shared
        .last_spoken_at
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    *guard = Some(Instant::now());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{DummySpeechSink, SpeechCommand, SpeechSink};
    use crate::speech::SpeechAudio;

    fn beep() -> SpeechAudio {
        SpeechAudio {
            sample_rate_hz: 1000,
            channels: 1,
            pcm_i16: vec![0; 30],
        }
    }

    #[tokio::test]
    async fn natural_completion_frees_the_slot_and_arms_the_cooldown() {
        let sink = DummySpeechSink::with_play_duration(Duration::from_millis(20));
        let mut slot = SpeechSlot::new();
        assert!(slot.cooldown_elapsed(Instant::now(), Duration::from_secs(5)));

        slot.start(sink.begin(beep()).expect("begins"), Duration::from_millis(10));
        assert!(slot.is_running());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!slot.is_running());
        assert!(!slot.cooldown_elapsed(Instant::now(), Duration::from_secs(5)));
        assert!(slot.cooldown_elapsed(
            Instant::now() + Duration::from_secs(6),
            Duration::from_secs(5)
        ));
    }

    #[tokio::test]
    async fn cancel_and_join_stops_a_long_message_within_the_bound() {
        let sink = DummySpeechSink::with_play_duration(Duration::from_secs(60));
        let mut slot = SpeechSlot::new();
        slot.start(sink.begin(beep()).expect("begins"), Duration::from_millis(10));

        let started = Instant::now();
        slot.cancel_and_join().await.expect("joins in time");
        assert!(started.elapsed() < SPEECH_POLL_INTERVAL + JOIN_GRACE);
        assert!(!slot.is_running());
        assert!(sink
            .commands()
            .contains(&SpeechCommand::FadeStop(Duration::from_millis(10))));
    }

    #[tokio::test]
    async fn cancel_and_join_on_an_empty_slot_is_a_no_op() {
        let mut slot = SpeechSlot::new();
        slot.cancel_and_join().await.expect("nothing to join");
    }

    #[tokio::test]
    async fn cancelling_an_already_finished_message_is_benign() {
        let sink = DummySpeechSink::with_play_duration(Duration::from_millis(1));
        let mut slot = SpeechSlot::new();
        slot.start(sink.begin(beep()).expect("begins"), Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!slot.is_running());
        slot.cancel_and_join().await.expect("benign");
    }
}
