use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use costlens_ocr::OcrConfig;
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "costlens")]
#[command(about = "Read order screenshots and work out what your things cost per day")]
struct Cli {
    /// Engine and pipeline settings (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Keyword tables (TOML), overriding the one named in the config
    #[arg(long, global = true)]
    keywords: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run OCR on an order screenshot and print the extracted fields
    Image {
        path: PathBuf,
        /// Also print the cleaned OCR transcript to stderr
        #[arg(long)]
        show_text: bool,
    },
    /// Extract fields from already recognized text (`-` reads stdin)
    Text { path: PathBuf },
    /// Print the perceived cost of a purchase
    Cost {
        #[arg(long)]
        price: Decimal,
        /// Purchase date, YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, default_value_t = 1)]
        uses: u32,
        /// Spread the price over uses instead of days held
        #[arg(long)]
        per_use: bool,
        /// Evaluate as of this date instead of today
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => OcrConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => OcrConfig::default(),
    };
    if let Some(keywords) = cli.keywords {
        config.keywords = Some(keywords);
    }

    let output = match cli.command {
        Command::Image { path, show_text } => commands::image(&config, &path, show_text).await?,
        Command::Text { path } => commands::text(&config, &path)?,
        Command::Cost { price, date, uses, per_use, today } => {
            let today = today.unwrap_or_else(|| chrono::Local::now().date_naive());
            commands::cost(price, date, uses, per_use, today)
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
