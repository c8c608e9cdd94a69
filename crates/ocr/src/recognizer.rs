use std::time::Duration;
use thiserror::Error;

use crate::types::RecognizedText;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("OCR recognition timed out after {0:?}")]
    Timeout(Duration),
    #[error("OCR engine pool is closed")]
    PoolClosed,
    #[error("no OCR engine compiled in; rebuild with the `tesseract` feature")]
    NotAvailable,
}

/// Abstraction over an OCR backend.
/// Implementations accept PNG image bytes and return the recognized lines.
/// A backend shared across threads must never mix text between requests.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image_bytes: &[u8]) -> Result<RecognizedText, OcrError>;
}

impl<T: OcrBackend + ?Sized> OcrBackend for std::sync::Arc<T> {
    fn recognize(&self, image_bytes: &[u8]) -> Result<RecognizedText, OcrError> {
        (**self).recognize(image_bytes)
    }
}

/// One loaded engine session. Holding `&mut self` while recognizing keeps a
/// session to a single request at a time. Dropping the session releases it.
pub trait OcrEngine: Send {
    fn recognize(&mut self, image_bytes: &[u8]) -> Result<RecognizedText, OcrError>;
}

/// Creates engine sessions, loading language models as needed.
pub trait EngineFactory: Send + Sync {
    type Engine: OcrEngine;

    fn create(&self) -> Result<Self::Engine, OcrError>;
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a fixed transcript for every image. Lets the pipeline run without
/// Tesseract installed.
pub struct MockRecognizer {
    pub text: String,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<RecognizedText, OcrError> {
        Ok(RecognizedText::from_text(&self.text))
    }
}

impl OcrEngine for MockRecognizer {
    fn recognize(&mut self, image_bytes: &[u8]) -> Result<RecognizedText, OcrError> {
        OcrBackend::recognize(&*self, image_bytes)
    }
}

/// Stand-in used when no real OCR engine is compiled in.
pub struct UnavailableRecognizer;

impl OcrBackend for UnavailableRecognizer {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<RecognizedText, OcrError> {
        Err(OcrError::NotAvailable)
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{EngineFactory, OcrEngine, OcrError};
    use crate::types::RecognizedText;
    use leptess::LepTess;

    /// Simplified Chinese plus Latin, so mixed lines like `实付款 ¥199.00`
    /// come back as one line.
    pub const DEFAULT_LANGUAGES: &str = "chi_sim+eng";

    pub struct TesseractFactory {
        data_path: Option<String>,
        lang: String,
    }

    impl TesseractFactory {
        pub fn new(data_path: Option<String>, lang: &str) -> Self {
            Self { data_path, lang: lang.to_string() }
        }
    }

    impl EngineFactory for TesseractFactory {
        type Engine = TesseractEngine;

        fn create(&self) -> Result<TesseractEngine, OcrError> {
            let lt = LepTess::new(self.data_path.as_deref(), &self.lang)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            tracing::debug!(lang = %self.lang, "loaded tesseract session");
            Ok(TesseractEngine { lt })
        }
    }

    pub struct TesseractEngine {
        lt: LepTess,
    }

    impl OcrEngine for TesseractEngine {
        fn recognize(&mut self, image_bytes: &[u8]) -> Result<RecognizedText, OcrError> {
            self.lt
                .set_image_from_mem(image_bytes)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            let text = self
                .lt
                .get_utf8_text()
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            let confidence = self.lt.mean_text_conf() as f32 / 100.0;
            Ok(RecognizedText::from_text(&text).with_confidence(confidence))
        }
    }
}
