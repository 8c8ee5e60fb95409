use crate::emotion::{Emotion, FaceBox};
use std::sync::{Arc, Mutex, PoisonError};

/// What a display collaborator should draw for one frame: the committed
/// state with its box and optional caption, or nothing at all. Purely
/// informational; nothing feeds back into the pipeline.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameView {
    pub emotion: Option<Emotion>,
    pub confidence: f32,
    pub face: Option<FaceBox>,
    pub caption: Option<String>,
}

impl FrameView {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_overlay(&self) -> bool {
        self.emotion.is_some() && self.face.is_some()
    }
}

/// Overlay color per emotional state, as RGB.
pub fn overlay_color(emotion: Emotion) -> (u8, u8, u8) {
    match emotion {
        Emotion::Angry => (255, 0, 0),
        Emotion::Disgust => (128, 128, 0),
        Emotion::Fear => (128, 0, 128),
        Emotion::Happy => (0, 255, 0),
        Emotion::Sad => (0, 0, 255),
        Emotion::Surprise => (255, 255, 0),
        Emotion::Neutral => (192, 192, 192),
    }
}

pub trait Renderer: Send + Sync {
    fn draw(&self, view: &FrameView);
}

/// Renderer that narrates overlay frames into the log stream instead of a
/// window.
#[derive(Clone, Debug, Default)]
pub struct TracingRenderer;

impl TracingRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for TracingRenderer {
    fn draw(&self, view: &FrameView) {
        if let (Some(emotion), Some(face)) = (view.emotion, view.face) {
            tracing::trace!(
                emotion = %emotion,
                confidence = view.confidence,
                x = face.x,
                y = face.y,
                w = face.w,
                h = face.h,
                caption = view.caption.as_deref().unwrap_or(""),
                "overlay frame"
            );
        } else {
            tracing::trace!("nothing to draw");
        }
    }
}

/// Recording renderer for tests.
#[derive(Clone, Default)]
pub struct DummyRenderer {
    views: Arc<Mutex<Vec<FrameView>>>,
}

impl DummyRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn views(&self) -> Vec<FrameView> {
        self.views
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Renderer for DummyRenderer {
    fn draw(&self, view: &FrameView) {
        self.views
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(view.clone());
    }
}
