use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

/// Closed set of classes produced by the external classifier.
///
/// Declaration order is the canonical order used to break argmax ties.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl Emotion {
    pub const COUNT: usize = 7;

    pub const ALL: [Emotion; Emotion::COUNT] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-class confidence in percent, one slot per [`Emotion`].
///
/// Serializes as a `{"angry": 60.0, ...}` object; classes absent from the
/// input default to 0.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(from = "BTreeMap<Emotion, f32>", into = "BTreeMap<Emotion, f32>")]
pub struct ClassScores([f32; Emotion::COUNT]);

impl ClassScores {
    pub fn get(&self, class: Emotion) -> f32 {
        self.0[class.index()]
    }

    pub fn set(&mut self, class: Emotion, score: f32) {
        self.0[class.index()] = score;
    }

    pub fn with(mut self, class: Emotion, score: f32) -> Self {
        self.set(class, score);
        self
    }

    /// Highest-scoring class; ties resolve to the first class in
    /// [`Emotion::ALL`] order.
    pub fn dominant(&self) -> (Emotion, f32) {
        let mut best = Emotion::ALL[0];
        let mut best_score = self.get(best);
        for class in Emotion::ALL.into_iter().skip(1) {
            let score = self.get(class);
            if score > best_score {
                best = class;
                best_score = score;
            }
        }
        (best, best_score)
    }
}

impl From<BTreeMap<Emotion, f32>> for ClassScores {
    fn from(map: BTreeMap<Emotion, f32>) -> Self {
        let mut scores = ClassScores::default();
        for (class, score) in map {
            scores.set(class, score);
        }
        scores
    }
}

impl From<ClassScores> for BTreeMap<Emotion, f32> {
    fn from(scores: ClassScores) -> Self {
        Emotion::ALL
            .into_iter()
            .map(|class| (class, scores.get(class)))
            .collect()
    }
}

/// Face bounding box reported by the external detector.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// One classifier observation for one processed frame.
///
/// `face: None` is the no-face signal; `scores` carry no meaning then.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Sample {
    #[serde(default)]
    pub scores: ClassScores,
    pub face: Option<FaceBox>,
}

impl Sample {
    pub fn no_face() -> Self {
        Self {
            scores: ClassScores::default(),
            face: None,
        }
    }
}

/// A committed transition of the stabilized emotional state.
///
/// `to: None` means the state fell back to idle (face lost).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StateChange {
    pub from: Option<Emotion>,
    pub to: Option<Emotion>,
    pub confidence: f32,
    pub at: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dominant_breaks_ties_in_canonical_order() {
        let scores = ClassScores::default()
            .with(Emotion::Sad, 40.0)
            .with(Emotion::Fear, 40.0);

        // Fear precedes Sad in declaration order.
        assert_eq!(scores.dominant(), (Emotion::Fear, 40.0));
    }

    #[test]
    fn dominant_of_all_zero_is_first_class() {
        let (class, score) = ClassScores::default().dominant();
        assert_eq!(class, Emotion::Angry);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn sample_deserializes_sparse_score_map() {
        let sample: Sample = serde_json::from_str(
            r#"{"scores":{"happy":72.5},"face":{"x":4,"y":8,"w":100,"h":120}}"#,
        )
        .expect("valid record");

        assert_eq!(sample.scores.get(Emotion::Happy), 72.5);
        assert_eq!(sample.scores.get(Emotion::Angry), 0.0);
        assert_eq!(
            sample.face,
            Some(FaceBox {
                x: 4,
                y: 8,
                w: 100,
                h: 120
            })
        );
    }

    #[test]
    fn sample_without_scores_is_no_face() {
        let sample: Sample = serde_json::from_str(r#"{"face":null}"#).expect("valid record");
        assert_eq!(sample, Sample::no_face());
    }

    #[test]
    fn sample_roundtrips_through_json() {
        let sample = Sample {
            scores: ClassScores::default().with(Emotion::Surprise, 88.0),
            face: Some(FaceBox {
                x: 0,
                y: 0,
                w: 64,
                h: 64,
            }),
        };
        let json = serde_json::to_string(&sample).expect("serializes");
        let back: Sample = serde_json::from_str(&json).expect("parses");
        assert_eq!(back, sample);
    }
}
