//! Extract command - run the OCR pipeline on a single declaration.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use ecd_core::declaration::compare;
use ecd_core::models::config::EcdConfig;
use ecd_core::models::declaration::{Declaration, GoodsItem};
use ecd_core::pipeline::{CancelHandle, DocumentPipeline, DocumentResult};

use super::{load_config, load_pages};

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input file (PDF or page image)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Compare the result against an expected JSON record
    #[arg(long)]
    compare: Option<PathBuf>,

    /// Include the corrected recognized text in JSON output
    #[arg(long)]
    include_text: bool,

    /// Show the confidence report
    #[arg(long)]
    show_confidence: bool,

    /// Number of pages processed concurrently
    #[arg(short = 'j', long)]
    jobs: Option<usize>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON record with confidence and page reports
    Json,
    /// One CSV row per goods item
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub async fn run(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(jobs) = args.jobs {
        config.pipeline.workers = jobs;
    }

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));

    let result = process_document(&args.input, &config, &pb).await?;

    pb.finish_and_clear();

    let output = format_result(&result, args.format, args.include_text)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        eprintln!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if !result.issues.is_empty() {
        eprintln!("{}", style("Format issues:").yellow());
        for issue in &result.issues {
            eprintln!("  - {}: {:?} ({})", issue.field, issue.value, issue.reason);
        }
    }

    if let Some(expected_path) = &args.compare {
        report_comparison(&result, expected_path)?;
    }

    if args.show_confidence {
        print_confidence(&result);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// Rasterize and run one document, cancelling on Ctrl-C.
pub async fn process_document(
    input: &std::path::Path,
    config: &EcdConfig,
    pb: &ProgressBar,
) -> anyhow::Result<DocumentResult> {
    pb.set_message("Loading pages...");
    let pages = load_pages(input, config).await?;
    debug!("{} has {} pages", input.display(), pages.len());

    pb.set_message(format!("Recognizing {} pages...", pages.len()));
    let pipeline = DocumentPipeline::from_config(config)?;

    let (handle, token) = CancelHandle::new();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });

    let result = pipeline.process_with_cancel(pages, token).await;
    interrupt.abort();

    Ok(result?)
}

pub fn format_result(
    result: &DocumentResult,
    format: OutputFormat,
    include_text: bool,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&result.output(include_text))?),
        OutputFormat::Csv => format_csv(&result.declaration),
        OutputFormat::Text => Ok(format_text(result)),
    }
}

fn report_comparison(result: &DocumentResult, expected_path: &std::path::Path) -> anyhow::Result<()> {
    let expected: serde_json::Value = serde_json::from_str(&fs::read_to_string(expected_path)?)?;
    let actual = serde_json::to_value(&result.declaration)?;
    let report = compare(&actual, &expected);

    if report.is_match() {
        eprintln!(
            "{} All {} compared fields match",
            style("✓").green(),
            report.total()
        );
    } else {
        eprintln!(
            "{} {}/{} compared fields match",
            style("✗").red(),
            report.matches.len(),
            report.total()
        );
        for difference in &report.differences {
            eprintln!("  - {}", difference);
        }
    }

    Ok(())
}

fn print_confidence(result: &DocumentResult) {
    let confidence = &result.confidence;
    eprintln!();
    eprintln!(
        "{} Extraction confidence: {:.1}%",
        style("ℹ").blue(),
        confidence.score * 100.0
    );
    eprintln!(
        "{} Recognized characters: {}",
        style("ℹ").blue(),
        confidence.character_count
    );
    for (field, present) in &confidence.fields {
        let mark = if *present {
            style("✓").green()
        } else {
            style("✗").red()
        };
        eprintln!("  {} {}", mark, field);
    }
    if !confidence.failed_pages.is_empty() {
        eprintln!(
            "{} Pages without text: {:?}",
            style("⚠").yellow(),
            confidence.failed_pages
        );
    }
}

fn opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

fn format_csv(declaration: &Declaration) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "declaration_date",
        "exporter_name",
        "exporter_tin",
        "consignee_name",
        "destination_country",
        "total_gross_mass",
        "item_number",
        "commodity_code",
        "description",
        "packages",
        "gross_mass",
        "documents",
    ])?;

    let header = &declaration.header;
    let total_mass = header
        .total_gross_mass
        .map(|m| m.to_string())
        .unwrap_or_default();

    let empty = GoodsItem::default();
    let items: Vec<&GoodsItem> = if declaration.goods.is_empty() {
        vec![&empty]
    } else {
        declaration.goods.iter().collect()
    };

    for item in items {
        let packages = item
            .packages
            .iter()
            .map(|p| format!("{} {}", p.count.as_deref().unwrap_or("?"), p.kind))
            .collect::<Vec<_>>()
            .join("; ");
        let documents = item
            .documents
            .iter()
            .map(|d| format!("{}({})", d.doc_type, d.reference))
            .collect::<Vec<_>>()
            .join("; ");

        wtr.write_record([
            opt(&header.declaration_date),
            opt(&declaration.exporter.name),
            opt(&declaration.exporter.tin),
            opt(&declaration.consignee.name),
            opt(&header.destination_country),
            &total_mass,
            &item.item_number,
            opt(&item.commodity_code.code),
            opt(&item.description),
            &packages,
            &item.gross_mass.map(|m| m.to_string()).unwrap_or_default(),
            &documents,
        ])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

pub fn format_text(result: &DocumentResult) -> String {
    let declaration = &result.declaration;
    let header = &declaration.header;
    let missing = "-";
    let mut output = String::new();

    output.push_str(&format!("Format: {}\n", result.format));
    output.push_str(&format!(
        "Date: {}\n",
        header.declaration_date.as_deref().unwrap_or(missing)
    ));
    output.push_str(&format!(
        "Place: {}\n",
        header.declaration_place.as_deref().unwrap_or(missing)
    ));
    output.push_str(&format!(
        "Route: {} -> {}\n",
        header.dispatch_country.as_deref().unwrap_or(missing),
        header.destination_country.as_deref().unwrap_or(missing)
    ));
    if let Some(mass) = header.total_gross_mass {
        output.push_str(&format!("Gross mass: {} kg\n", mass));
    }
    output.push('\n');

    output.push_str("Exporter:\n");
    output.push_str(&format!(
        "  {}\n",
        declaration.exporter.name.as_deref().unwrap_or(missing)
    ));
    if let Some(tin) = &declaration.exporter.tin {
        output.push_str(&format!("  TIN: {}\n", tin));
    }
    output.push('\n');

    output.push_str("Consignee:\n");
    output.push_str(&format!(
        "  {}\n",
        declaration.consignee.name.as_deref().unwrap_or(missing)
    ));
    if let Some(city) = &declaration.consignee.city {
        output.push_str(&format!("  {}\n", city));
    }
    output.push('\n');

    output.push_str(&format!("Goods items: {}\n", declaration.goods.len()));
    for item in &declaration.goods {
        output.push_str(&format!(
            "  {}. {} {}\n",
            item.item_number,
            item.commodity_code.code.as_deref().unwrap_or(missing),
            item.description.as_deref().unwrap_or("")
        ));
    }

    output.push_str(&format!(
        "\nConfidence: {:.1}%\n",
        result.confidence.score * 100.0
    ));

    output
}
