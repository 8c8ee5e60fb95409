use crate::emotion::Sample;
use crate::source::{SampleSource, SourceError};
use std::path::PathBuf;
use std::time::Duration;
use std::{future::Future, pin::Pin};

/// Replays a recorded classifier session from a JSONL file, one record per
/// captured frame.
///
/// Like a live camera loop, only every `stride`-th frame is processed; the
/// rest are paced through to keep wall-clock timing faithful to the
/// recording.
#[derive(Clone, Debug)]
pub struct ScriptedSampleSource {
    path: PathBuf,
    stride: usize,
    frame_interval: Duration,
}

impl ScriptedSampleSource {
    pub fn new(path: PathBuf, stride: usize, frame_interval: Duration) -> Self {
        Self {
            path,
            stride: stride.max(1),
            frame_interval,
        }
    }
}

impl SampleSource for ScriptedSampleSource {
    fn start(
        &self,
        tx: tokio::sync::mpsc::Sender<Sample>,
    ) -> Pin<Box<dyn Future<Output = Result<(), SourceError>> + Send + 'static>> {
        let path = self.path.clone();
        let stride = self.stride;
        let frame_interval = self.frame_interval;

        Box::pin(async move {
            let text = tokio::fs::read_to_string(&path).await?;

            let mut frame = 0_usize;
            for (idx, line) in text.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                frame += 1;
                if frame_interval > Duration::ZERO {
                    tokio::time::sleep(frame_interval).await;
                }
                if frame % stride != 0 {
                    continue;
                }

                let sample: Sample = match serde_json::from_str(line) {
                    Ok(sample) => sample,
                    Err(e) => {
                        tracing::warn!(line = idx + 1, error = %e, "skipping malformed sample record");
                        continue;
                    }
                };

                if tx.send(sample).await.is_err() {
                    return Err(SourceError::ChannelClosed);
                }
            }

            tracing::debug!(frames = frame, path = %path.display(), "script replay finished");
            Ok(())
        })
    }
}
