#[macro_use]
mod macros;

pub mod cleanup;
pub mod config;
pub mod extract;
pub mod keywords;
pub mod pipeline;
pub mod pool;
pub mod preprocess;
pub mod recognizer;
pub mod strategy;
pub mod types;

pub use cleanup::cleanup;
pub use config::{ConfigError, OcrConfig};
pub use extract::{extract, Extractor};
pub use keywords::{Anchor, AnchorTable, KeywordError, KeywordTables};
pub use pipeline::{extract_from_image, extract_from_text, OcrResult, PipelineError, ReceiptPipeline};
pub use pool::{EngineLease, EnginePool};
pub use preprocess::{normalize, normalize_bytes, NormalizedBitmap, PreprocessError};
pub use recognizer::{EngineFactory, MockRecognizer, OcrBackend, OcrEngine, OcrError};
pub use strategy::{Fallback, FieldSource};
pub use types::{ExtractedFields, RecognizedText};
