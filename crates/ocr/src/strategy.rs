//! Interchangeable extraction strategies.
//!
//! Every strategy returns the same [`ExtractedFields`] shape, so a caller can
//! put an external vision model in front of the local heuristic pipeline (or
//! the other way round) without either knowing about the other.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::pipeline::{PipelineError, ReceiptPipeline};
use crate::recognizer::OcrBackend;
use crate::types::ExtractedFields;

#[async_trait]
pub trait FieldSource: Send + Sync {
    fn name(&self) -> &str;

    async fn extract(&self, image: &[u8]) -> Result<ExtractedFields, PipelineError>;
}

#[async_trait]
impl<R: OcrBackend + 'static> FieldSource for ReceiptPipeline<R> {
    fn name(&self) -> &str {
        "local-ocr"
    }

    async fn extract(&self, image: &[u8]) -> Result<ExtractedFields, PipelineError> {
        Ok(self.process_bytes(image).await?.extracted)
    }
}

/// Try `primary`; if it fails or finds nothing, ask `secondary`. When both
/// succeed, fields missing from the primary result are filled from the
/// secondary one.
pub struct Fallback<A, B> {
    primary: A,
    secondary: B,
}

impl<A: FieldSource, B: FieldSource> Fallback<A, B> {
    pub fn new(primary: A, secondary: B) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl<A: FieldSource, B: FieldSource> FieldSource for Fallback<A, B> {
    fn name(&self) -> &str {
        self.primary.name()
    }

    async fn extract(&self, image: &[u8]) -> Result<ExtractedFields, PipelineError> {
        let first = match self.primary.extract(image).await {
            Ok(fields) if fields.field_count() == 3 => return Ok(fields),
            Ok(fields) => Some(fields),
            Err(e) => {
                warn!(source = self.primary.name(), "extraction failed, falling back: {e}");
                None
            }
        };

        debug!(source = self.secondary.name(), "trying secondary extraction");
        match (first, self.secondary.extract(image).await) {
            (Some(fields), Ok(more)) => Ok(fields.or(more)),
            (Some(fields), Err(e)) => {
                warn!(source = self.secondary.name(), "secondary extraction failed: {e}");
                Ok(fields)
            }
            (None, result) => result,
        }
    }
}
