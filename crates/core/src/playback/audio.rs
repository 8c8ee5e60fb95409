use crate::playback::{CueId, PlaybackError, SpeechHandle, SpeechSink, ToneSink};
use crate::speech::SpeechAudio;
use rodio::source::Source;
use rodio::{OutputStream, OutputStreamBuilder, Sink};
use std::collections::BTreeMap;
use std::f32::consts::PI;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const FADE_TICK: Duration = Duration::from_millis(50);
const SYNTH_SAMPLE_RATE_HZ: u32 = 22_050;
const SYNTH_LOOP_SECS: u32 = 2;
const SYNTH_CARRIER_HZ: f32 = 220.0;
const SYNTH_GAIN: f32 = 0.4;

/// A minimal, poison-tolerant, lazy initializer for a single value.
///
/// Rationale: [`rodio::OutputStream`] must be kept alive for the duration of
/// playback. Opening a new stream per cue or message drops the previous
/// stream mid-playback and truncates audio, so one shared stream is cached
/// here and reused by every sink.
struct LazyInit<T> {
    value: Mutex<Option<T>>,
}

impl<T> LazyInit<T> {
    fn new() -> Self {
        Self {
            value: Mutex::new(None),
        }
    }

    fn get_or_try_init_with<R, E>(
        &self,
        init: impl FnOnce() -> Result<T, E>,
        f: impl FnOnce(&T) -> R,
        invariant_err: impl FnOnce() -> E,
    ) -> Result<R, E> {
        let mut guard = match self.value.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("output stream cache lock was poisoned; recovering and continuing");
                poisoned.into_inner()
            }
        };

        // NOTE: `init` is used at most once (only when the cache is empty).
        if guard.is_none() {
            *guard = Some(init()?);
        }

        match guard.as_ref() {
            Some(v) => Ok(f(v)),
            None => Err(invariant_err()),
        }
    }
}

/// Shared handle to the process-wide audio output. Tone and speech sinks
/// clone an `Arc<AudioOutput>` so they mix into the same stream.
pub struct AudioOutput {
    disabled: AtomicBool,
    stream: LazyInit<OutputStream>,
    open_attempts: AtomicUsize,
}

impl AudioOutput {
    pub fn new() -> Self {
        Self {
            disabled: AtomicBool::new(false),
            stream: LazyInit::new(),
            open_attempts: AtomicUsize::new(0),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }

    fn open_stream(&self) -> Result<OutputStream, PlaybackError> {
        let attempt = self.open_attempts.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(attempt, "opening audio output stream");
        OutputStreamBuilder::open_default_stream().map_err(|e| {
            PlaybackError::AudioOutputUnavailable {
                details: e.to_string(),
            }
        })
    }

    fn connect_sink(&self) -> Result<Sink, PlaybackError> {
        if self.is_disabled() {
            return Err(PlaybackError::AudioOutputUnavailable {
                details: "audio output disabled after earlier failure".to_owned(),
            });
        }

        let result = self.stream.get_or_try_init_with(
            || self.open_stream(),
            |stream| Sink::connect_new(stream.mixer()),
            || PlaybackError::AudioOutputUnavailable {
                details: "internal error: output stream cache invariant violated".to_owned(),
            },
        );

        if let Err(PlaybackError::AudioOutputUnavailable { details }) = &result {
            // A host with no output device will never produce one mid-run;
            // stop retrying and let feedback degrade to silence.
            if details.contains("NoDevice") {
                self.disabled.store(true, Ordering::Relaxed);
            }
        }

        result
    }
}

impl Default for AudioOutput {
    fn default() -> Self {
        Self::new()
    }
}

/// Decoded, loop-ready cue audio.
#[derive(Clone, Debug, PartialEq)]
pub struct ToneBuffer {
    pub sample_rate_hz: u32,
    pub channels: u16,
    pub pcm_i16: Vec<i16>,
}

/// All cue loops, decoded once at startup.
pub struct CueLibrary {
    buffers: BTreeMap<CueId, ToneBuffer>,
}

impl CueLibrary {
    /// Loads every cue asset from `dir`. A cue that fails to load degrades
    /// to the synthesized pulse instead of blocking startup.
    pub fn from_dir(dir: &Path) -> Self {
        let mut buffers = BTreeMap::new();
        for cue in CueId::ALL {
            let path = dir.join(cue.file_name());
            match load_cue_file(cue, &path) {
                Ok(buffer) => {
                    tracing::debug!(cue = %cue, path = %path.display(), "loaded cue asset");
                    buffers.insert(cue, buffer);
                }
                Err(e) => {
                    tracing::warn!(
                        cue = %cue,
                        path = %path.display(),
                        error = %e,
                        "cue asset unavailable, using synthesized pulse"
                    );
                    buffers.insert(cue, synthesize_pulse(cue));
                }
            }
        }
        Self { buffers }
    }

    pub fn synthesized() -> Self {
        Self {
            buffers: CueId::ALL
                .into_iter()
                .map(|cue| (cue, synthesize_pulse(cue)))
                .collect(),
        }
    }

    fn get(&self, cue: CueId) -> Option<&ToneBuffer> {
        self.buffers.get(&cue)
    }
}

fn load_cue_file(cue: CueId, path: &Path) -> Result<ToneBuffer, PlaybackError> {
    let file = File::open(path).map_err(|e| PlaybackError::CueUnavailable {
        cue,
        details: e.to_string(),
    })?;
    let decoder =
        rodio::Decoder::new(BufReader::new(file)).map_err(|e| PlaybackError::CueUnavailable {
            cue,
            details: e.to_string(),
        })?;

    let sample_rate_hz = decoder.sample_rate();
    let channels = decoder.channels();
    let pcm_i16: Vec<i16> = decoder
        .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect();

    if pcm_i16.is_empty() {
        return Err(PlaybackError::CueUnavailable {
            cue,
            details: "decoded to zero samples".to_owned(),
        });
    }

    Ok(ToneBuffer {
        sample_rate_hz,
        channels,
        pcm_i16,
    })
}

/// Carrier sine amplitude-modulated at the cue's pulse rate. The loop spans
/// whole pulse and carrier periods, so repeating it is seam-free.
fn synthesize_pulse(cue: CueId) -> ToneBuffer {
    let total = SYNTH_SAMPLE_RATE_HZ * SYNTH_LOOP_SECS;
    let mut pcm_i16 = Vec::with_capacity(total as usize);
    for i in 0..total {
        let t = i as f32 / SYNTH_SAMPLE_RATE_HZ as f32;
        let carrier = (2.0 * PI * SYNTH_CARRIER_HZ * t).sin();
        let envelope = 0.5 * (1.0 - (2.0 * PI * cue.pulse_hz() * t).cos());
        pcm_i16.push((carrier * envelope * SYNTH_GAIN * i16::MAX as f32) as i16);
    }
    ToneBuffer {
        sample_rate_hz: SYNTH_SAMPLE_RATE_HZ,
        channels: 1,
        pcm_i16,
    }
}

async fn fade_out(sink: Arc<Sink>, fade: Duration) {
    let steps = (fade.as_millis() / FADE_TICK.as_millis()).max(1) as u32;
    let start = sink.volume();
    for step in 1..=steps {
        sink.set_volume(start * (1.0 - step as f32 / steps as f32));
        tokio::time::sleep(FADE_TICK).await;
    }
    sink.stop();
}

/// Tone output backed by a rodio sink per cue, one active at a time.
#[derive(Clone)]
pub struct RodioToneSink {
    output: Arc<AudioOutput>,
    cues: Arc<CueLibrary>,
    active: Arc<Mutex<Option<Arc<Sink>>>>,
}

impl RodioToneSink {
    pub fn new(output: Arc<AudioOutput>, cues: CueLibrary) -> Self {
        Self {
            output,
            cues: Arc::new(cues),
            active: Arc::new(Mutex::new(None)),
        }
    }

    fn swap_active(&self, next: Option<Arc<Sink>>) -> Option<Arc<Sink>> {
        let mut guard = self
            .active
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }
}

impl ToneSink for RodioToneSink {
    fn play_loop(&self, cue: CueId) {
        let Some(buffer) = self.cues.get(cue) else {
            tracing::warn!(cue = %cue, "no audio for cue, tone stays silent");
            return;
        };

        let sink = match self.output.connect_sink() {
            Ok(sink) => sink,
            Err(e) => {
                tracing::warn!(cue = %cue, error = %e, "tone playback unavailable");
                return;
            }
        };

        sink.append(
            PcmSource::new(buffer.pcm_i16.clone(), buffer.sample_rate_hz, buffer.channels)
                .repeat_infinite(),
        );

        if let Some(previous) = self.swap_active(Some(Arc::new(sink))) {
            // Callers fade before playing; anything still here would overlap
            // the new loop, so cut it immediately.
            previous.stop();
        }
    }

    fn fade_stop(&self, fade: Duration) {
        if let Some(sink) = self.swap_active(None) {
            tokio::spawn(fade_out(sink, fade));
        }
    }
}

/// Spoken-message output backed by one rodio sink per message.
#[derive(Clone)]
pub struct RodioSpeechSink {
    output: Arc<AudioOutput>,
}

impl RodioSpeechSink {
    pub fn new(output: Arc<AudioOutput>) -> Self {
        Self { output }
    }
}

impl SpeechSink for RodioSpeechSink {
    type Handle = RodioSpeechHandle;

    fn begin(&self, audio: SpeechAudio) -> Result<RodioSpeechHandle, PlaybackError> {
        if audio.sample_rate_hz == 0
            || audio.channels == 0
            || audio.pcm_i16.is_empty()
            || audio.pcm_i16.len() % usize::from(audio.channels) != 0
        {
            return Err(PlaybackError::InvalidPcm {
                samples: audio.pcm_i16.len(),
                channels: audio.channels,
                sample_rate_hz: audio.sample_rate_hz,
            });
        }

        let sink = self.output.connect_sink()?;
        sink.append(PcmSource::new(
            audio.pcm_i16,
            audio.sample_rate_hz,
            audio.channels,
        ));

        Ok(RodioSpeechHandle {
            sink: Arc::new(sink),
        })
    }
}

pub struct RodioSpeechHandle {
    sink: Arc<Sink>,
}

impl SpeechHandle for RodioSpeechHandle {
    fn is_finished(&self) -> bool {
        self.sink.empty()
    }

    fn fade_stop(&self, fade: Duration) {
        // Fading a sink that already drained just stops an empty queue.
        tokio::spawn(fade_out(Arc::clone(&self.sink), fade));
    }
}

struct PcmSource {
    samples: std::vec::IntoIter<i16>,
    sample_rate: u32,
    channels: u16,
}

impl PcmSource {
    fn new(samples: Vec<i16>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: samples.into_iter(),
            sample_rate,
            channels,
        }
    }
}

impl Iterator for PcmSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        self.samples.next().map(|s| s as f32 / i16::MAX as f32)
    }
}

impl Source for PcmSource {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
