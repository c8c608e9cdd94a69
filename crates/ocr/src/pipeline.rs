use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::cleanup::cleanup;
use crate::extract::Extractor;
use crate::preprocess::{self, PreprocessError};
use crate::recognizer::{OcrBackend, OcrError};
use crate::types::ExtractedFields;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("OCR recognition failed: {0}")]
    Ocr(#[from] OcrError),
}

/// The result of a single screenshot processing run.
#[derive(Debug, Clone)]
pub struct OcrResult {
    /// Recognized text after artifact cleanup.
    pub ocr_text: String,
    /// Whether the screenshot was inverted as a dark-mode capture.
    pub is_dark_mode: bool,
    pub confidence: Option<f32>,
    /// Structured fields extracted from the OCR text.
    pub extracted: ExtractedFields,
}

/// Cleanup + extraction for text that is already recognized.
pub fn extract_from_text(raw: &str, extractor: &Extractor) -> ExtractedFields {
    extractor.extract(&cleanup(raw))
}

/// Normalize → recognize → cleanup → extract, synchronously.
pub fn extract_from_image(
    image: &[u8],
    backend: &dyn OcrBackend,
    extractor: &Extractor,
) -> Result<ExtractedFields, PipelineError> {
    let bitmap = preprocess::normalize_bytes(image, None)?;
    let recognized = backend.recognize(&bitmap.to_png()?)?;
    Ok(extract_from_text(&recognized.as_text(), extractor))
}

/// Orchestrates: normalize → OCR (bounded by a timeout) → cleanup → extract.
pub struct ReceiptPipeline<R: OcrBackend> {
    recognizer: Arc<R>,
    extractor: Arc<Extractor>,
    max_dimension: Option<u32>,
    timeout: Duration,
}

impl<R: OcrBackend + 'static> ReceiptPipeline<R> {
    pub fn new(recognizer: R) -> Self {
        Self {
            recognizer: Arc::new(recognizer),
            extractor: Arc::new(Extractor::default()),
            max_dimension: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    pub fn with_max_dimension(mut self, max_dimension: Option<u32>) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn recognizer(&self) -> &R {
        &self.recognizer
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    /// Process an image file on disk.
    pub async fn process_file(&self, path: &Path) -> Result<OcrResult, PipelineError> {
        let bytes = tokio::fs::read(path).await?;
        self.process_bytes(&bytes).await
    }

    /// Process raw image bytes (screenshot upload or file read).
    pub async fn process_bytes(&self, data: &[u8]) -> Result<OcrResult, PipelineError> {
        // 1. Normalize and re-encode off the async runtime.
        let owned = data.to_vec();
        let max_dimension = self.max_dimension;
        let (is_dark_mode, png) = tokio::task::spawn_blocking(move || {
            let bitmap = preprocess::normalize_bytes(&owned, max_dimension)?;
            Ok::<_, PreprocessError>((bitmap.is_dark_mode, bitmap.to_png()?))
        })
        .await
        .map_err(|e| OcrError::Engine(format!("preprocessing task failed: {e}")))??;

        // 2. Recognize. On timeout the blocking task still runs to completion,
        //    so a leased engine is always handed back.
        let backend = Arc::clone(&self.recognizer);
        let job = tokio::task::spawn_blocking(move || backend.recognize(&png));
        let recognized = match tokio::time::timeout(self.timeout, job).await {
            Ok(Ok(result)) => result.inspect_err(|e| warn!("recognition failed: {e}"))?,
            Ok(Err(join)) => {
                return Err(OcrError::Engine(format!("recognition task failed: {join}")).into())
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "recognition timed out");
                return Err(OcrError::Timeout(self.timeout).into());
            }
        };

        if recognized.is_blank() {
            warn!("recognizer returned no text");
        }

        // 3. Cleanup and extract.
        let ocr_text = cleanup(&recognized.as_text());
        let extracted = self.extractor.extract(&ocr_text);
        info!(
            dark_mode = is_dark_mode,
            fields = extracted.field_count(),
            "screenshot processed"
        );

        Ok(OcrResult {
            ocr_text,
            is_dark_mode,
            confidence: recognized.confidence,
            extracted,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
