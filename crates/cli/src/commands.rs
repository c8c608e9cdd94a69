use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use costlens_core::{CostType, Item, Money};
use costlens_ocr::{extract_from_text, Extractor, OcrBackend, OcrConfig, ReceiptPipeline};
use rust_decimal::Decimal;
use serde_json::{json, Value};

fn extractor(config: &OcrConfig) -> Result<Extractor> {
    let tables = config
        .load_keyword_tables()
        .context("Failed to load keyword tables")?;
    Ok(Extractor::new(tables))
}

#[cfg(feature = "tesseract")]
fn backend(config: &OcrConfig) -> impl OcrBackend + 'static {
    use costlens_ocr::recognizer::tesseract_backend::TesseractFactory;
    use costlens_ocr::EnginePool;

    let factory = TesseractFactory::new(config.tessdata_path.clone(), &config.languages);
    EnginePool::new(factory, config.pool_size)
}

#[cfg(not(feature = "tesseract"))]
fn backend(_config: &OcrConfig) -> impl OcrBackend + 'static {
    costlens_ocr::recognizer::UnavailableRecognizer
}

pub async fn image(config: &OcrConfig, path: &Path, show_text: bool) -> Result<Value> {
    let pipeline = ReceiptPipeline::new(backend(config))
        .with_extractor(extractor(config)?)
        .with_max_dimension(config.max_dimension)
        .with_timeout(config.timeout());

    let result = pipeline
        .process_file(path)
        .await
        .with_context(|| format!("Failed to process {}", path.display()))?;

    if show_text {
        eprintln!("{}", result.ocr_text);
    }
    tracing::debug!(confidence = ?result.confidence, "recognition confidence");
    Ok(serde_json::to_value(&result.extracted)?)
}

pub fn text(config: &OcrConfig, path: &Path) -> Result<Value> {
    let raw = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };
    let fields = extract_from_text(&raw, &extractor(config)?);
    Ok(serde_json::to_value(&fields)?)
}

pub fn cost(price: Decimal, date: NaiveDate, uses: u32, per_use: bool, today: NaiveDate) -> Value {
    let item = Item {
        id: String::new(),
        name: String::new(),
        price: Money::new(price),
        purchase_date: date,
        usage_count: uses.max(1),
        cost_type: if per_use { CostType::PerUse } else { CostType::Daily },
        category: String::new(),
        icon: String::new(),
    };
    json!({
        "price": item.price,
        "costType": item.cost_type,
        "daysHeld": item.days_held(today),
        "usageCount": item.usage_count,
        "perceivedCost": item.perceived_cost(today),
    })
}
