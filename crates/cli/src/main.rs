#![deny(warnings)]

use anyhow::Context;
use clap::Parser;
use emotion_feedback_core::config::{
    resolve_optional_string, AppConfig, ConfidenceThreshold, CooldownWindow, EmaAlpha, Env,
    FadeDuration, StdEnv, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_EMA_ALPHA,
    DEFAULT_EMOTION_COOLDOWN_SECS, DEFAULT_FADE_MS, DEFAULT_FRAME_INTERVAL_MS,
    DEFAULT_FRAME_STRIDE, DEFAULT_SPEECH_COOLDOWN_SECS, ENV_CUE_DIR,
};
use emotion_feedback_core::feedback::{FeedbackConfig, FeedbackController};
use emotion_feedback_core::pipeline::{Pipeline, PipelineConfig};
use emotion_feedback_core::playback::{
    AudioOutput, CueLibrary, DummySpeechSink, DummyToneSink, RodioSpeechSink, RodioToneSink,
    SpeechSink, ToneSink,
};
use emotion_feedback_core::render::TracingRenderer;
use emotion_feedback_core::source::ScriptedSampleSource;
use emotion_feedback_core::speech::{BasicSpeechSynthesizer, PregeneratedSpeech};
use emotion_feedback_core::stabilizer::{EmotionStabilizer, StabilizerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "emotion-feedback")]
#[command(about = "Debounced tone and speech feedback for a noisy emotion classifier stream")]
struct Args {
    /// JSONL file of per-frame classifier samples to replay
    #[arg(long)]
    script: PathBuf,

    /// Process every Nth captured frame
    #[arg(long, default_value_t = DEFAULT_FRAME_STRIDE)]
    frame_stride: usize,

    /// Pacing between captured frames, in milliseconds
    #[arg(long, default_value_t = DEFAULT_FRAME_INTERVAL_MS)]
    frame_interval_ms: u64,

    #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
    confidence_threshold: f32,

    #[arg(long, default_value_t = DEFAULT_EMA_ALPHA)]
    ema_alpha: f32,

    #[arg(long, default_value_t = DEFAULT_EMOTION_COOLDOWN_SECS)]
    emotion_cooldown_secs: u64,

    #[arg(long, default_value_t = DEFAULT_SPEECH_COOLDOWN_SECS)]
    speech_cooldown_secs: u64,

    #[arg(long, default_value_t = DEFAULT_FADE_MS)]
    fade_ms: u64,

    /// Directory with theta.mp3 / alpha.mp3 cue loops; synthesized pulses
    /// are used when absent
    #[arg(long)]
    cue_dir: Option<String>,

    /// Replace audio output with silent sinks
    #[arg(long, default_value_t = false)]
    mute: bool,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let env = StdEnv;
    let cfg = build_config(args, &env)?;

    tracing::info!(
        script = %cfg.script.display(),
        frame_stride = cfg.frame_stride,
        emotion_cooldown_secs = cfg.emotion_cooldown.secs,
        speech_cooldown_secs = cfg.speech_cooldown.secs,
        mute = cfg.mute,
        "config loaded"
    );

    run(cfg).await
}

async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let source = ScriptedSampleSource::new(cfg.script.clone(), cfg.frame_stride, cfg.frame_interval);
    let stabilizer = EmotionStabilizer::new(StabilizerConfig {
        threshold: cfg.confidence_threshold,
        alpha: cfg.ema_alpha,
        cooldown: cfg.emotion_cooldown.duration(),
    });

    let feedback_config = FeedbackConfig {
        speech_cooldown: cfg.speech_cooldown.duration(),
        fade: cfg.fade.duration(),
        ..FeedbackConfig::default()
    };
    let synth = BasicSpeechSynthesizer::new();
    let voices = PregeneratedSpeech::prepare(&synth, &feedback_config.messages).await;
    tracing::debug!(messages = voices.len(), "pre-rendered message audio ready");

    if cfg.mute {
        let feedback = FeedbackController::new(
            feedback_config,
            DummyToneSink::new(),
            DummySpeechSink::new(),
            voices,
        );
        drive(source, stabilizer, feedback).await
    } else {
        let output = Arc::new(AudioOutput::new());
        let cues = match &cfg.cue_dir {
            Some(dir) => CueLibrary::from_dir(dir),
            None => CueLibrary::synthesized(),
        };
        let feedback = FeedbackController::new(
            feedback_config,
            RodioToneSink::new(Arc::clone(&output), cues),
            RodioSpeechSink::new(output),
            voices,
        );
        drive(source, stabilizer, feedback).await
    }
}

async fn drive<T, S>(
    source: ScriptedSampleSource,
    stabilizer: EmotionStabilizer,
    feedback: FeedbackController<T, S>,
) -> anyhow::Result<()>
where
    T: ToneSink,
    S: SpeechSink,
{
    let pipeline = Pipeline {
        source,
        stabilizer,
        feedback,
        renderer: TracingRenderer::new(),
        config: PipelineConfig::default(),
    };
    pipeline.run().await.context("pipeline failed")
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn build_config(args: Args, env: &impl Env) -> anyhow::Result<AppConfig> {
    let confidence_threshold = ConfidenceThreshold::new(args.confidence_threshold)?;
    let ema_alpha = EmaAlpha::new(args.ema_alpha)?;
    let emotion_cooldown = CooldownWindow::from_secs(args.emotion_cooldown_secs)?;
    let speech_cooldown = CooldownWindow::from_secs(args.speech_cooldown_secs)?;
    let fade = FadeDuration::from_millis(args.fade_ms)?;

    let cue_dir = resolve_optional_string(args.cue_dir, ENV_CUE_DIR, env).map(PathBuf::from);

    Ok(AppConfig {
        script: args.script,
        frame_stride: args.frame_stride.max(1),
        frame_interval: Duration::from_millis(args.frame_interval_ms),
        confidence_threshold,
        ema_alpha,
        emotion_cooldown,
        speech_cooldown,
        fade,
        cue_dir,
        mute: args.mute,
    })
}
