use crate::config::{ConfidenceThreshold, EmaAlpha, DEFAULT_EMOTION_COOLDOWN_SECS};
use crate::emotion::{ClassScores, Emotion, Sample, StateChange};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StabilizerConfig {
    pub threshold: ConfidenceThreshold,
    pub alpha: EmaAlpha,
    pub cooldown: Duration,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            threshold: ConfidenceThreshold::default(),
            alpha: EmaAlpha::default(),
            cooldown: Duration::from_secs(DEFAULT_EMOTION_COOLDOWN_SECS),
        }
    }
}

/// Per-class accumulators smoothing the raw classifier output.
///
/// The update is a one-sided leaky integrator, not a weighted average: each
/// qualifying sample pushes the winning class toward its fresh confidence and
/// decays every other class geometrically toward zero. That biases the leader
/// toward the most recently confident class rather than a long-run frequency.
/// The dwell cooldown below depends on this decay shape; do not "fix" it into
/// a symmetric average.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmaState {
    scores: ClassScores,
}

impl EmaState {
    fn absorb(&mut self, winner: Emotion, confidence: f32, alpha: f32) {
        for class in Emotion::ALL {
            let prev = self.scores.get(class);
            let next = if class == winner {
                (1.0 - alpha) * prev + alpha * confidence
            } else {
                (1.0 - alpha) * prev
            };
            // Guard against float drift pushing an accumulator out of range.
            self.scores.set(class, next.clamp(0.0, 100.0));
        }
    }

    fn leader(&self) -> (Emotion, f32) {
        self.scores.dominant()
    }

    pub fn score(&self, class: Emotion) -> f32 {
        self.scores.get(class)
    }
}

/// The committed, debounced view of the signal.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StabilizerState {
    pub current: Option<Emotion>,
    pub previous: Option<Emotion>,
    pub confidence: f32,
    last_change_at: Option<Instant>,
}

/// Turns a jittery per-frame classification stream into a stable emotional
/// state, emitting at most one [`StateChange`] per observed sample.
#[derive(Clone, Debug, Default)]
pub struct EmotionStabilizer {
    config: StabilizerConfig,
    ema: EmaState,
    state: StabilizerState,
}

impl EmotionStabilizer {
    pub fn new(config: StabilizerConfig) -> Self {
        Self {
            config,
            ema: EmaState::default(),
            state: StabilizerState::default(),
        }
    }

    pub fn current(&self) -> Option<Emotion> {
        self.state.current
    }

    pub fn confidence(&self) -> f32 {
        self.state.confidence
    }

    pub fn state(&self) -> &StabilizerState {
        &self.state
    }

    pub fn ema(&self) -> &EmaState {
        &self.ema
    }

    /// Feed one classifier sample. Returns the committed transition, if any.
    pub fn observe(&mut self, sample: &Sample, now: Instant) -> Option<StateChange> {
        if sample.face.is_none() {
            return self.idle_on_face_loss(now);
        }

        let (dominant, confidence) = sample.scores.dominant();
        if confidence < self.config.threshold.value() {
            // Low-confidence evidence is rejected outright rather than
            // allowed to dilute the averages.
            return None;
        }

        self.ema.absorb(dominant, confidence, self.config.alpha.value());
        let (leader, leader_score) = self.ema.leader();

        if Some(leader) == self.state.current {
            // A stable emotion resets its own dwell clock every qualifying
            // sample, so a competitor must outlast a full quiet window.
            self.state.last_change_at = Some(now);
            self.state.confidence = leader_score;
            return None;
        }

        if !self.dwell_elapsed(now) {
            return None;
        }

        let from = self.state.current;
        self.state.previous = from;
        self.state.current = Some(leader);
        self.state.confidence = leader_score;
        self.state.last_change_at = Some(now);

        tracing::debug!(
            from = ?from.map(Emotion::label),
            to = %leader,
            confidence = leader_score,
            "committing emotional state change"
        );

        Some(StateChange {
            from,
            to: Some(leader),
            confidence: leader_score,
            at: now,
        })
    }

    fn dwell_elapsed(&self, now: Instant) -> bool {
        if self.state.current.is_none() {
            // The idle state carries no dwell claim; the first qualifying
            // leader commits immediately.
            return true;
        }
        match self.state.last_change_at {
            None => true,
            Some(at) => now.duration_since(at) >= self.config.cooldown,
        }
    }

    /// Face loss idles the visible state without touching the accumulators,
    /// so a brief dropout does not penalize the leading class.
    fn idle_on_face_loss(&mut self, now: Instant) -> Option<StateChange> {
        let from = self.state.current.take()?;
        self.state.previous = None;
        self.state.confidence = 0.0;

        tracing::debug!(from = %from, "face lost, idling emotional state");

        Some(StateChange {
            from: Some(from),
            to: None,
            confidence: 0.0,
            at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::FaceBox;

    fn face() -> Option<FaceBox> {
        Some(FaceBox {
            x: 10,
            y: 10,
            w: 80,
            h: 80,
        })
    }

    fn sample(class: Emotion, confidence: f32) -> Sample {
        Sample {
            scores: ClassScores::default().with(class, confidence),
            face: face(),
        }
    }

    fn stabilizer(cooldown: Duration) -> EmotionStabilizer {
        EmotionStabilizer::new(StabilizerConfig {
            cooldown,
            ..StabilizerConfig::default()
        })
    }

    #[test]
    fn low_confidence_samples_leave_everything_untouched() {
        let mut stab = stabilizer(Duration::from_secs(3));
        let t0 = Instant::now();

        for i in 0..10 {
            let event = stab.observe(&sample(Emotion::Angry, 49.9), t0 + Duration::from_secs(i));
            assert_eq!(event, None);
        }

        assert_eq!(stab.current(), None);
        for class in Emotion::ALL {
            assert_eq!(stab.ema().score(class), 0.0);
        }
    }

    #[test]
    fn first_qualifying_sample_commits_immediately() {
        let mut stab = stabilizer(Duration::from_secs(3));
        let t0 = Instant::now();

        let event = stab.observe(&sample(Emotion::Angry, 60.0), t0).expect("commits");
        assert_eq!(event.from, None);
        assert_eq!(event.to, Some(Emotion::Angry));
        assert_eq!(event.confidence, stab.ema().score(Emotion::Angry));
        assert_eq!(event.at, t0);
        assert_eq!(stab.current(), Some(Emotion::Angry));
    }

    #[test]
    fn repeated_class_emits_no_further_events_and_ema_converges() {
        let mut stab = stabilizer(Duration::from_secs(3));
        let t0 = Instant::now();

        assert!(stab.observe(&sample(Emotion::Angry, 60.0), t0).is_some());

        let mut prev = stab.ema().score(Emotion::Angry);
        for i in 1..5 {
            let now = t0 + Duration::from_secs(3 * i);
            assert_eq!(stab.observe(&sample(Emotion::Angry, 60.0), now), None);
            let next = stab.ema().score(Emotion::Angry);
            // Monotone climb toward the steady confidence.
            assert!(next > prev);
            assert!(next <= 60.0);
            prev = next;
        }
        assert!(prev > 59.0);
    }

    #[test]
    fn non_winning_classes_decay_toward_zero() {
        let mut stab = stabilizer(Duration::from_secs(3));
        let t0 = Instant::now();

        stab.observe(&sample(Emotion::Sad, 80.0), t0);
        let sad_before = stab.ema().score(Emotion::Sad);

        // Happy wins the next samples; sad must strictly decay.
        stab.observe(&sample(Emotion::Happy, 80.0), t0 + Duration::from_secs(3));
        let sad_mid = stab.ema().score(Emotion::Sad);
        stab.observe(&sample(Emotion::Happy, 80.0), t0 + Duration::from_secs(6));
        let sad_after = stab.ema().score(Emotion::Sad);

        assert!(sad_mid < sad_before);
        assert!(sad_after < sad_mid);
        assert!(sad_after > 0.0);
    }

    #[test]
    fn leader_change_is_suppressed_inside_the_cooldown() {
        let mut stab = stabilizer(Duration::from_secs(3));
        let t0 = Instant::now();

        stab.observe(&sample(Emotion::Angry, 60.0), t0);

        // Strong competing evidence, but inside the dwell window. With the
        // default alpha one sample is enough to flip the accumulators, so
        // only the cooldown holds the visible state.
        let event = stab.observe(&sample(Emotion::Happy, 95.0), t0 + Duration::from_secs(1));
        assert_eq!(event, None);
        assert_eq!(stab.current(), Some(Emotion::Angry));
        assert!(stab.ema().score(Emotion::Happy) > stab.ema().score(Emotion::Angry));
    }

    #[test]
    fn leader_change_commits_once_the_cooldown_elapses() {
        let mut stab = stabilizer(Duration::from_secs(3));
        let t0 = Instant::now();

        stab.observe(&sample(Emotion::Angry, 60.0), t0);
        stab.observe(&sample(Emotion::Happy, 95.0), t0 + Duration::from_secs(1));

        let event = stab
            .observe(&sample(Emotion::Happy, 95.0), t0 + Duration::from_secs(3))
            .expect("commits after cooldown");
        assert_eq!(event.from, Some(Emotion::Angry));
        assert_eq!(event.to, Some(Emotion::Happy));
        assert_eq!(stab.state().previous, Some(Emotion::Angry));
    }

    #[test]
    fn stable_emotion_slides_its_own_dwell_window() {
        let mut stab = stabilizer(Duration::from_secs(3));
        let t0 = Instant::now();

        stab.observe(&sample(Emotion::Angry, 60.0), t0);
        // Angry keeps confirming itself at t0+2; the dwell clock now reads
        // from t0+2, not t0.
        stab.observe(&sample(Emotion::Angry, 60.0), t0 + Duration::from_secs(2));

        // At t0+4 only 2s have passed since the last confirmation.
        let event = stab.observe(&sample(Emotion::Happy, 95.0), t0 + Duration::from_secs(4));
        assert_eq!(event, None);
        assert_eq!(stab.current(), Some(Emotion::Angry));

        let event = stab.observe(&sample(Emotion::Happy, 95.0), t0 + Duration::from_secs(5));
        assert!(event.is_some());
    }

    #[test]
    fn face_loss_emits_one_idle_event_and_is_then_idempotent() {
        let mut stab = stabilizer(Duration::from_secs(3));
        let t0 = Instant::now();

        stab.observe(&sample(Emotion::Angry, 60.0), t0);
        let ema_before = stab.ema().score(Emotion::Angry);

        let event = stab
            .observe(&Sample::no_face(), t0 + Duration::from_secs(1))
            .expect("first no-face idles");
        assert_eq!(event.from, Some(Emotion::Angry));
        assert_eq!(event.to, None);
        assert_eq!(event.confidence, 0.0);

        assert_eq!(stab.observe(&Sample::no_face(), t0 + Duration::from_secs(2)), None);
        assert_eq!(stab.observe(&Sample::no_face(), t0 + Duration::from_secs(3)), None);

        // The accumulators survive the dropout untouched.
        assert_eq!(stab.ema().score(Emotion::Angry), ema_before);
        assert_eq!(stab.current(), None);
    }

    #[test]
    fn face_loss_before_any_commit_emits_nothing() {
        let mut stab = stabilizer(Duration::from_secs(3));
        assert_eq!(stab.observe(&Sample::no_face(), Instant::now()), None);
    }

    #[test]
    fn reacquisition_after_face_loss_commits_immediately() {
        let mut stab = stabilizer(Duration::from_secs(3));
        let t0 = Instant::now();

        stab.observe(&sample(Emotion::Angry, 60.0), t0);
        stab.observe(&Sample::no_face(), t0 + Duration::from_millis(100));

        // Angry still dominates the accumulators, so the face coming back
        // recommits from idle without waiting out a cooldown.
        let event = stab
            .observe(&sample(Emotion::Angry, 60.0), t0 + Duration::from_millis(200))
            .expect("recommits from idle");
        assert_eq!(event.from, None);
        assert_eq!(event.to, Some(Emotion::Angry));
    }

    #[test]
    fn ema_stays_clamped_to_percent_range() {
        let mut stab = stabilizer(Duration::from_secs(3));
        let t0 = Instant::now();

        for i in 0..50 {
            stab.observe(&sample(Emotion::Happy, 100.0), t0 + Duration::from_secs(3 * i));
        }

        for class in Emotion::ALL {
            let score = stab.ema().score(class);
            assert!((0.0..=100.0).contains(&score));
        }
    }

    #[test]
    fn scenario_five_angry_samples_emit_a_single_event() {
        let mut stab = stabilizer(Duration::from_secs(3));
        let t0 = Instant::now();

        let mut events = Vec::new();
        for i in 0..5 {
            if let Some(e) = stab.observe(&sample(Emotion::Angry, 60.0), t0 + Duration::from_secs(3 * i))
            {
                events.push(e);
            }
        }

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].from, None);
        assert_eq!(events[0].to, Some(Emotion::Angry));
        assert!(stab.ema().score(Emotion::Angry) > 59.0);
        assert!(stab.ema().score(Emotion::Angry) <= 60.0);
    }
}
