use crate::emotion::Sample;
use crate::source::{SampleSource, SourceError};
use std::{future::Future, pin::Pin};

/// Replays a fixed in-memory sequence, one sample per frame, no pacing.
#[derive(Clone, Debug, Default)]
pub struct DummySampleSource {
    samples: Vec<Sample>,
}

impl DummySampleSource {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }
}

impl SampleSource for DummySampleSource {
    fn start(
        &self,
        tx: tokio::sync::mpsc::Sender<Sample>,
    ) -> Pin<Box<dyn Future<Output = Result<(), SourceError>> + Send + 'static>> {
        let samples = self.samples.clone();
        Box::pin(async move {
            for sample in samples {
                if tx.send(sample).await.is_err() {
                    return Err(SourceError::ChannelClosed);
                }
            }
            Ok(())
        })
    }
}
