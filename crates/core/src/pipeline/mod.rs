use crate::emotion::Sample;
use crate::feedback::{FeedbackController, FeedbackError};
use crate::playback::{SpeechSink, ToneSink};
use crate::render::{FrameView, Renderer};
use crate::source::{SampleSource, SourceError};
use crate::stabilizer::EmotionStabilizer;
use std::time::Instant;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("sample source failed: {0}")]
    Source(#[from] SourceError),

    #[error("feedback teardown failed: {0}")]
    Feedback(#[from] FeedbackError),

    #[error("internal channel closed")]
    ChannelClosed,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PipelineConfig {
    pub channel_capacity: Option<usize>,
}

impl PipelineConfig {
    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity.unwrap_or(8).clamp(2, 32)
    }
}

/// Wires the frame stream through stabilization into feedback and rendering.
///
/// The source runs as its own task; stabilization and feedback stay on the
/// consuming task, so all stabilizer state is single-threaded and only the
/// speech watcher runs concurrently.
pub struct Pipeline<Src, T, S, R>
where
    Src: SampleSource,
    T: ToneSink,
    S: SpeechSink,
    R: Renderer,
{
    pub source: Src,
    pub stabilizer: EmotionStabilizer,
    pub feedback: FeedbackController<T, S>,
    pub renderer: R,
    pub config: PipelineConfig,
}

impl<Src, T, S, R> Pipeline<Src, T, S, R>
where
    Src: SampleSource,
    T: ToneSink,
    S: SpeechSink,
    R: Renderer,
{
    pub async fn run(mut self) -> Result<(), PipelineError> {
        let (tx, mut rx) =
            tokio::sync::mpsc::channel::<Sample>(self.config.channel_capacity());

        let source_task = tokio::spawn(self.source.start(tx));

        while let Some(sample) = rx.recv().await {
            let now = Instant::now();

            if let Some(event) = self.stabilizer.observe(&sample, now) {
                tracing::info!(
                    from = ?event.from.map(crate::emotion::Emotion::label),
                    to = ?event.to.map(crate::emotion::Emotion::label),
                    confidence = event.confidence,
                    "emotional state changed"
                );
                self.feedback.on_state_change(&event, now).await;
            }

            let view = self.frame_view(&sample);
            self.renderer.draw(&view);
        }

        // The stream ended; feedback must not outlive it.
        self.feedback.shutdown().await?;

        match source_task.await {
            Ok(result) => result?,
            Err(e) => {
                tracing::error!(error = %e, "sample source task panicked");
                return Err(PipelineError::ChannelClosed);
            }
        }

        Ok(())
    }

    fn frame_view(&self, sample: &Sample) -> FrameView {
        match (self.stabilizer.current(), sample.face) {
            (Some(emotion), Some(face)) => FrameView {
                emotion: Some(emotion),
                confidence: self.stabilizer.confidence(),
                face: Some(face),
                caption: self.feedback.caption_for(emotion).map(str::to_owned),
            },
            _ => FrameView::empty(),
        }
    }
}
