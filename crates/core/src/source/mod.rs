mod dummy;
mod scripted;

use crate::emotion::Sample;
use std::{future::Future, pin::Pin};

pub use dummy::DummySampleSource;
pub use scripted::ScriptedSampleSource;

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sample channel closed")]
    ChannelClosed,
}

/// Pushes one classifier observation per processed frame into the pipeline.
///
/// The returned future owns everything it needs, so the pipeline can run it
/// as a detached task for the lifetime of the stream.
pub trait SampleSource: Send + Sync {
    fn start(
        &self,
        tx: tokio::sync::mpsc::Sender<Sample>,
    ) -> Pin<Box<dyn Future<Output = Result<(), SourceError>> + Send + 'static>>;
}
