use serde::{Deserialize, Serialize};

pub use costlens_core::ExtractedFields;

/// Lines transcribed by an OCR engine, in reading order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognizedText {
    pub lines: Vec<String>,
    /// Mean engine confidence (0.0–1.0) when the backend reports one.
    pub confidence: Option<f32>,
}

impl RecognizedText {
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    /// The whole transcription as one newline-separated blob.
    pub fn as_text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn is_blank(&self) -> bool {
        self.lines.iter().all(|l| l.trim().is_empty())
    }
}
