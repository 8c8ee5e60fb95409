use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 50.0;
pub const DEFAULT_EMA_ALPHA: f32 = 0.7;
pub const DEFAULT_EMOTION_COOLDOWN_SECS: u64 = 3;
pub const DEFAULT_SPEECH_COOLDOWN_SECS: u64 = 5;
pub const DEFAULT_FADE_MS: u64 = 1000;
pub const DEFAULT_FRAME_STRIDE: usize = 5;
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 33;
pub const ENV_CUE_DIR: &str = "EMOTION_CUE_DIR";

/// Minimum per-frame confidence a classification must carry to count as
/// evidence at all. Percent, `0..=100`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceThreshold(f32);

impl ConfidenceThreshold {
    pub fn new(percent: f32) -> Result<Self, ConfigError> {
        if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
            return Err(ConfigError::ThresholdOutOfRange(percent));
        }
        Ok(Self(percent))
    }

    pub fn value(&self) -> f32 {
        self.0
    }
}

impl Default for ConfidenceThreshold {
    fn default() -> Self {
        Self(DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

/// Smoothing factor of the per-class averages. Must lie in `(0, 1]`; higher
/// values weight fresh evidence more heavily.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmaAlpha(f32);

impl EmaAlpha {
    pub fn new(alpha: f32) -> Result<Self, ConfigError> {
        if !alpha.is_finite() || !(alpha > 0.0 && alpha <= 1.0) {
            return Err(ConfigError::AlphaOutOfRange(alpha));
        }
        Ok(Self(alpha))
    }

    pub fn value(&self) -> f32 {
        self.0
    }
}

impl Default for EmaAlpha {
    fn default() -> Self {
        Self(DEFAULT_EMA_ALPHA)
    }
}

/// Minimum wall-clock gap between two state commits (or two spoken messages).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CooldownWindow {
    pub secs: u64,
}

impl CooldownWindow {
    pub fn from_secs(secs: u64) -> Result<Self, ConfigError> {
        if secs == 0 {
            return Err(ConfigError::ZeroCooldown);
        }
        Ok(Self { secs })
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.secs)
    }
}

/// Fade-out length applied when a tone or spoken message is superseded.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FadeDuration {
    pub ms: u64,
}

impl FadeDuration {
    pub fn from_millis(ms: u64) -> Result<Self, ConfigError> {
        if ms == 0 {
            return Err(ConfigError::ZeroFade);
        }
        Ok(Self { ms })
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.ms)
    }
}

impl Default for FadeDuration {
    fn default() -> Self {
        Self { ms: DEFAULT_FADE_MS }
    }
}

/// Fully resolved runtime configuration assembled by the CLI.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub script: PathBuf,
    pub frame_stride: usize,
    pub frame_interval: Duration,
    pub confidence_threshold: ConfidenceThreshold,
    pub ema_alpha: EmaAlpha,
    pub emotion_cooldown: CooldownWindow,
    pub speech_cooldown: CooldownWindow,
    pub fade: FadeDuration,
    pub cue_dir: Option<PathBuf>,
    pub mute: bool,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("confidence threshold must be within 0..=100, got {0}")]
    ThresholdOutOfRange(f32),
    #[error("ema alpha must be within (0, 1], got {0}")]
    AlphaOutOfRange(f32),
    #[error("cooldown must be > 0 seconds")]
    ZeroCooldown,
    #[error("fade must be > 0 ms")]
    ZeroFade,
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: std::collections::BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn resolve_optional_string(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Option<String> {
    match cli_value {
        Some(v) => Some(v),
        None => env.var(env_key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_rejects_out_of_range() {
        assert!(ConfidenceThreshold::new(-0.1).is_err());
        assert!(ConfidenceThreshold::new(100.1).is_err());
        assert!(ConfidenceThreshold::new(f32::NAN).is_err());
        assert_eq!(
            ConfidenceThreshold::new(50.0).expect("valid").value(),
            50.0
        );
    }

    #[test]
    fn alpha_rejects_zero_and_above_one() {
        assert!(EmaAlpha::new(0.0).is_err());
        assert!(EmaAlpha::new(1.01).is_err());
        assert_eq!(EmaAlpha::new(1.0).expect("valid").value(), 1.0);
        assert_eq!(EmaAlpha::new(0.7).expect("valid").value(), 0.7);
    }

    #[test]
    fn cooldown_and_fade_reject_zero() {
        assert_eq!(
            CooldownWindow::from_secs(0),
            Err(ConfigError::ZeroCooldown)
        );
        assert_eq!(FadeDuration::from_millis(0), Err(ConfigError::ZeroFade));
        assert_eq!(
            CooldownWindow::from_secs(3).expect("valid").duration(),
            Duration::from_secs(3)
        );
        assert_eq!(
            FadeDuration::from_millis(1000).expect("valid").duration(),
            Duration::from_millis(1000)
        );
    }

    #[test]
    fn resolve_optional_string_cli_takes_precedence() {
        let env = MapEnv::default().with_var(ENV_CUE_DIR, "/env/cues");
        let v = resolve_optional_string(Some("/cli/cues".to_owned()), ENV_CUE_DIR, &env);
        assert_eq!(v.as_deref(), Some("/cli/cues"));
    }

    #[test]
    fn resolve_optional_string_env_used_when_cli_missing() {
        let env = MapEnv::default().with_var(ENV_CUE_DIR, "/env/cues");
        let v = resolve_optional_string(None, ENV_CUE_DIR, &env);
        assert_eq!(v.as_deref(), Some("/env/cues"));
    }

    #[test]
    fn resolve_optional_string_none_when_both_missing() {
        let env = MapEnv::default();
        assert_eq!(resolve_optional_string(None, ENV_CUE_DIR, &env), None);
    }
}
