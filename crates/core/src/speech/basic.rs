use crate::speech::{SpeechAudio, SpeechError, SpeechSynthesizer};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::f32::consts::PI;

const SAMPLE_RATE_HZ: u32 = 22_050;
const WORD_MS: u64 = 180;
const GAP_MS: u64 = 70;
const RAMP_MS: u64 = 10;
const BASE_FREQ_HZ: f32 = 340.0;
const GAIN: f32 = 0.5;

/// Placeholder voice: one tone burst per word, pitched by word length.
///
/// Stands in for a real synthesizer while keeping message timing realistic
/// enough to exercise cancellation and cooldown behavior end to end.
#[derive(Clone)]
pub struct BasicSpeechSynthesizer;

impl BasicSpeechSynthesizer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BasicSpeechSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechSynthesizer for BasicSpeechSynthesizer {
    fn synthesize(&self, text: String) -> BoxFuture<'_, Result<SpeechAudio, SpeechError>> {
        async move {
            let words: Vec<&str> = text.split_whitespace().collect();
            if words.is_empty() {
                return Err(SpeechError::EmptyMessage);
            }

            let mut pcm_i16 = Vec::new();
            for word in &words {
                let freq = BASE_FREQ_HZ + 20.0 * word.chars().count() as f32;
                push_burst(&mut pcm_i16, freq, WORD_MS);
                push_silence(&mut pcm_i16, GAP_MS);
            }

            Ok(SpeechAudio {
                sample_rate_hz: SAMPLE_RATE_HZ,
                channels: 1,
                pcm_i16,
            })
        }
        .boxed()
    }
}

fn push_burst(pcm: &mut Vec<i16>, freq: f32, ms: u64) {
    let samples = (u64::from(SAMPLE_RATE_HZ) * ms / 1000) as usize;
    let ramp = (u64::from(SAMPLE_RATE_HZ) * RAMP_MS / 1000) as usize;
    for i in 0..samples {
        let t = i as f32 / SAMPLE_RATE_HZ as f32;
        // Short attack/release ramps keep word boundaries click-free.
        let gain = if i < ramp {
            i as f32 / ramp as f32
        } else if i + ramp > samples {
            (samples - i) as f32 / ramp as f32
        } else {
            1.0
        };
        let s = (2.0 * PI * freq * t).sin() * gain * GAIN;
        pcm.push((s * i16::MAX as f32) as i16);
    }
}

fn push_silence(pcm: &mut Vec<i16>, ms: u64) {
    let samples = (u64::from(SAMPLE_RATE_HZ) * ms / 1000) as usize;
    pcm.extend(std::iter::repeat(0).take(samples));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_text_is_rejected() {
        let synth = BasicSpeechSynthesizer::new();
        let err = synth.synthesize("   ".to_owned()).await.expect_err("empty");
        assert!(matches!(err, SpeechError::EmptyMessage));
    }

    #[tokio::test]
    async fn duration_scales_with_word_count() {
        let synth = BasicSpeechSynthesizer::new();
        let one = synth.synthesize("breathe".to_owned()).await.expect("one word");
        let three = synth
            .synthesize("take a breath".to_owned())
            .await
            .expect("three words");

        let rate = u64::from(SAMPLE_RATE_HZ);
        let per_word = (rate * WORD_MS / 1000 + rate * GAP_MS / 1000) as usize;
        assert_eq!(one.pcm_i16.len(), per_word);
        assert_eq!(three.pcm_i16.len(), 3 * per_word);
    }

    #[tokio::test]
    async fn bursts_carry_signal() {
        let synth = BasicSpeechSynthesizer::new();
        let audio = synth.synthesize("smile".to_owned()).await.expect("renders");
        assert_eq!(audio.channels, 1);
        assert_eq!(audio.sample_rate_hz, SAMPLE_RATE_HZ);
        assert!(audio.pcm_i16.iter().any(|&s| s != 0));
    }
}
