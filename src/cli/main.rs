//! `whitemuse` command-line tool
//!
//! Batch-processes product photos onto a white background, measures a subject
//! against a reference object, scores label text and drives the listing copy
//! engine.

use super::progress::IndicatifProgressReporter;
use crate::{
    calibration::{display_to_image_coords, DisplayRect, ReferenceObject},
    config::{BackendType, ExecutionProvider, ModelLocation, OutputFormat, PipelineConfig, Variant},
    copy::{CopyContext, CopyEngine, CopyMode, FileProfileStore, GeneratedCopy, ProfileService},
    processor::Studio,
    services::{ImageIOService, DEFAULT_JPEG_QUALITY},
    text_evidence::{retake_guidance, score},
    tracing_config::{init_cli_tracing, spans},
    types::{ItemStatus, Point},
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, warn};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::Instrument;

/// On-device product photo studio
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "whitemuse")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Compact log output without colors
    #[arg(long, global = true)]
    pub compact_logs: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Isolate, normalize and composite photos onto white
    Process(ProcessArgs),
    /// Measure a subject against a reference object tapped in the photo
    Measure(MeasureArgs),
    /// Score brand evidence in recognized text
    Score {
        /// Recognized text
        text: String,
    },
    /// Generate listing copy and record feedback
    #[command(subcommand)]
    Copy(CopyCommand),
    /// Show inference execution providers and exit
    Providers,
}

#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Model path or URL [default: $WHITEMUSE_MODEL or models/silueta.onnx]
    #[arg(short, long)]
    pub model: Option<String>,

    /// Inference backend
    #[arg(long, value_enum, default_value_t = CliBackend::Onnx)]
    pub backend: CliBackend,

    /// Execution provider for the ONNX backend
    #[arg(long, value_enum, default_value_t = CliProvider::Auto)]
    pub provider: CliProvider,

    /// Number of threads (0 = auto-detect)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,
}

#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Input image files or directories
    #[arg(value_name = "INPUT", required = true)]
    pub input: Vec<PathBuf>,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// Enhancement strength in [0, 1]
    #[arg(short, long, default_value_t = 0.6)]
    pub strength: f32,

    /// Force one style variant (edge-priority, weak-shadow, strong-white)
    #[arg(long)]
    pub variant: Option<Variant>,

    /// Output format (png, jpeg)
    #[arg(short, long, default_value = "png")]
    pub format: OutputFormat,

    /// Also write each mask as a grayscale PNG
    #[arg(long)]
    pub save_masks: bool,

    /// Walk directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    #[command(flatten)]
    pub model: ModelArgs,
}

#[derive(Args, Debug)]
pub struct MeasureArgs {
    /// Photo containing the subject and the reference object
    pub image: PathBuf,

    /// Reference endpoints in source pixels: x1,y1,x2,y2
    #[arg(long, value_delimiter = ',', num_args = 4, required = true)]
    pub taps: Vec<f32>,

    /// Reference object (card, paper-long, paper-short, ruler)
    #[arg(long, default_value = "card")]
    pub reference: ReferenceObject,

    #[command(flatten)]
    pub model: ModelArgs,
}

#[derive(Subcommand, Debug)]
pub enum CopyCommand {
    /// Generate long and short copy as JSON
    Generate {
        /// Tone mode (auto, attack, elegant)
        #[arg(long, default_value = "auto")]
        mode: CopyMode,
        /// Item category
        #[arg(long, default_value = "item")]
        category: String,
        #[arg(long)]
        condition: Option<String>,
        #[arg(long)]
        accessories: Option<String>,
        /// Recognized label text; brand candidates are scored from it
        #[arg(long)]
        text: Option<String>,
        /// Item name the per-item seed is derived from
        #[arg(long)]
        name: Option<String>,
        /// Explicit per-item seed (overrides --name)
        #[arg(long)]
        seed: Option<u32>,
    },
    /// Record that a generated copy was used (JSON file, "-" for stdin)
    Used { copy: String },
    /// Record that an item listed with this copy sold (JSON file, "-" for stdin)
    Sold { copy: String },
    /// Remove the learning profile and start fresh
    Clear,
    /// Print the learning profile
    Show,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliBackend {
    Onnx,
    Tract,
}

impl From<CliBackend> for BackendType {
    fn from(backend: CliBackend) -> Self {
        match backend {
            CliBackend::Onnx => Self::Onnx,
            CliBackend::Tract => Self::Tract,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliProvider {
    Auto,
    Cpu,
    Cuda,
    Coreml,
}

impl From<CliProvider> for ExecutionProvider {
    fn from(provider: CliProvider) -> Self {
        match provider {
            CliProvider::Auto => Self::Auto,
            CliProvider::Cpu => Self::Cpu,
            CliProvider::Cuda => Self::Cuda,
            CliProvider::Coreml => Self::CoreMl,
        }
    }
}

/// Entry point used by the `whitemuse` binary
///
/// # Errors
/// - Any failure of the selected command
pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_cli_tracing(cli.verbose, cli.compact_logs).context("Failed to initialize tracing")?;

    match cli.command {
        Command::Process(args) => {
            process(args, cli.verbose > 0)
                .instrument(spans::command("process"))
                .await
        },
        Command::Measure(args) => measure(args).instrument(spans::command("measure")).await,
        Command::Score { text } => {
            score_text(&text);
            Ok(())
        },
        Command::Copy(command) => copy(command),
        Command::Providers => {
            show_providers();
            Ok(())
        },
    }
}

fn pipeline_config(model: &ModelArgs, strength: f32) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .backend_type(model.backend.into())
        .execution_provider(model.provider.into())
        .num_threads(model.threads)
        .strength(strength);
    if let Some(location) = &model.model {
        builder = builder.model(ModelLocation::parse(location));
    }
    builder.build().context("Invalid configuration")
}

async fn process(args: ProcessArgs, verbose: bool) -> Result<()> {
    if !(0.0..=1.0).contains(&args.strength) {
        anyhow::bail!("--strength must be within [0, 1], got {}", args.strength);
    }
    let config = pipeline_config(&args.model, args.strength)?;
    info!("Model: {}", config.model.display_name());

    let files = collect_inputs(&args.input, args.recursive)?;
    if files.is_empty() {
        warn!("No supported image files found in the provided inputs");
        return Ok(());
    }
    std::fs::create_dir_all(&args.output).with_context(|| {
        format!("Failed to create output directory: {}", args.output.display())
    })?;

    let mut studio = Studio::new(config).context("Failed to create studio session")?;
    if let Some(variant) = args.variant {
        studio.force_variant(variant);
    }

    for file in &files {
        if let Err(e) = studio.add_file(file) {
            warn!("Skipping {}: {e}", file.display());
        }
    }

    let reporter = IndicatifProgressReporter::new(studio.items().len(), verbose);
    studio.set_progress_reporter(Box::new(reporter.clone()));

    let start = Instant::now();
    let batch_span = spans::batch_processing(studio.items().len());
    let stats = studio.process_all().instrument(batch_span).await;
    reporter.finish();

    if let Some(capability) = studio.capability() {
        if !capability.is_available() {
            warn!("{capability}: photos were normalized without subject isolation");
        }
    }

    for item in studio.items() {
        let stem = Path::new(&item.name)
            .file_stem()
            .map_or_else(|| item.id.to_string(), |s| s.to_string_lossy().into_owned());
        let target = args
            .output
            .join(format!("{stem}_white.{}", args.format.extension()));
        ImageIOService::save_image(&item.after, &target, args.format, DEFAULT_JPEG_QUALITY)
            .with_context(|| format!("Failed to save {}", target.display()))?;

        if args.save_masks {
            if let Some(mask) = &item.mask {
                mask.save_png(args.output.join(format!("{stem}_mask.png")))?;
            }
        }
        if matches!(item.status, ItemStatus::Failed(_)) {
            warn!("{}: {}", item.name, item.status);
        }
    }

    info!(
        "Processed {} image(s) in {:.2}s ({} without isolation)",
        stats.items_completed,
        start.elapsed().as_secs_f64(),
        stats.items_failed
    );
    Ok(())
}

async fn measure(args: MeasureArgs) -> Result<()> {
    let config = pipeline_config(&args.model, PipelineConfig::default().enhance.strength)?;

    let mut studio = Studio::new(config)?;
    let index = studio
        .add_file(&args.image)
        .with_context(|| format!("Failed to load {}", args.image.display()))?;
    studio.process_item(index).await?;

    let item = studio
        .item(index)
        .context("Item disappeared after processing")?;
    let (source_width, source_height) = (item.source().width(), item.source().height());
    let rect = DisplayRect {
        x: 0.0,
        y: 0.0,
        width: source_width as f32,
        height: source_height as f32,
    };
    let dims = item.dimensions();
    let taps: Vec<Point> = args
        .taps
        .chunks_exact(2)
        .filter_map(|pair| match pair {
            [x, y] => display_to_image_coords(Point::new(*x, *y), rect, dims),
            _ => None,
        })
        .collect();

    let calibrator = studio.calibrator_mut();
    calibrator.set_reference(args.reference);
    calibrator.toggle();
    for tap in taps {
        calibrator.tap(tap)?;
    }

    if studio.calibrator().mm_per_px().is_none() {
        anyhow::bail!("calibration needs two distinct taps inside the displayed image");
    }
    match studio.measure_item(index)? {
        Some(size) => println!("{size}"),
        None => println!("Size unavailable: no subject mask for {}", args.image.display()),
    }
    Ok(())
}

fn score_text(text: &str) {
    let candidates = score(text);
    if candidates.is_empty() {
        println!("No brand evidence");
    }
    for candidate in &candidates {
        println!(
            "{:<16} hits {:>2}  score {:.0}%",
            candidate.brand,
            candidate.hits,
            candidate.score * 100.0
        );
    }
    if let Some(guidance) = retake_guidance(text) {
        println!("\n{guidance}");
    }
}

fn copy(command: CopyCommand) -> Result<()> {
    let store = FileProfileStore::from_env().context("Failed to locate profile directory")?;
    let profile = ProfileService::load(Box::new(store)).context("Failed to load learning profile")?;
    let mut engine = CopyEngine::new(profile);

    match command {
        CopyCommand::Generate {
            mode,
            category,
            condition,
            accessories,
            text,
            name,
            seed,
        } => {
            let mut context = CopyContext::new(category);
            if let Some(seed) = seed.or_else(|| name.as_deref().map(CopyContext::seed_from_name)) {
                context = context.with_seed(seed);
            }
            if let Some(condition) = condition {
                context = context.with_condition(condition);
            }
            if let Some(accessories) = accessories {
                context = context.with_accessories(accessories);
            }
            if let Some(text) = text {
                context = context.with_brands(score(&text)).with_ocr_text(text);
            }
            let generated = engine.generate(mode, &context);
            println!("{}", serde_json::to_string_pretty(&generated)?);
        },
        CopyCommand::Used { copy } => {
            engine.record_used(&read_copy(&copy)?)?;
            println!("Recorded use ({} total)", engine.profile().events.used);
        },
        CopyCommand::Sold { copy } => {
            engine.record_sold(&read_copy(&copy)?)?;
            println!("Recorded sale ({} total)", engine.profile().events.sold);
        },
        CopyCommand::Clear => {
            engine.clear()?;
            println!("Learning profile cleared");
        },
        CopyCommand::Show => {
            println!("{}", engine.profile().to_json()?);
        },
    }
    Ok(())
}

fn read_copy(source: &str) -> Result<GeneratedCopy> {
    let json = if source == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read copy from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(source).with_context(|| format!("Failed to read {source}"))?
    };
    serde_json::from_str(&json).context("Copy is not valid generated-copy JSON")
}

fn show_providers() {
    println!("Execution providers:");
    #[cfg(feature = "onnx")]
    for (name, available, description) in crate::backends::OnnxBackend::list_providers() {
        let mark = if available { "✅" } else { "❌" };
        println!("  onnx:{name:<8} {mark} {description}");
    }
    #[cfg(feature = "tract")]
    for (name, available, description) in crate::backends::TractBackend::list_providers() {
        let mark = if available { "✅" } else { "❌" };
        println!("  tract:{name:<7} {mark} {description}");
    }
}

fn collect_inputs(inputs: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_file() {
            if is_image_file(input) {
                files.push(input.clone());
            } else {
                warn!("Skipping unsupported file: {}", input.display());
            }
        } else if input.is_dir() {
            let walker = walkdir::WalkDir::new(input).max_depth(if recursive { usize::MAX } else { 1 });
            for entry in walker {
                let entry = entry?;
                if entry.file_type().is_file() && is_image_file(entry.path()) {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else {
            anyhow::bail!(
                "Input path does not exist or is not accessible: {}",
                input.display()
            );
        }
    }
    files.sort();
    Ok(files)
}

fn is_image_file(path: &Path) -> bool {
    ImageIOService::is_supported_format(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_process() {
        let cli = Cli::try_parse_from([
            "whitemuse",
            "process",
            "a.jpg",
            "b.png",
            "-o",
            "out",
            "--strength",
            "0.8",
            "--variant",
            "weak-shadow",
        ])
        .unwrap();
        let Command::Process(args) = cli.command else {
            panic!("expected process");
        };
        assert_eq!(args.input.len(), 2);
        assert_eq!(args.variant, Some(Variant::WeakShadow));
        assert_eq!(args.format, OutputFormat::Png);
    }

    #[test]
    fn test_parse_measure_taps() {
        let cli = Cli::try_parse_from([
            "whitemuse",
            "measure",
            "bag.jpg",
            "--taps",
            "10,20,110,20",
            "--reference",
            "ruler",
        ])
        .unwrap();
        let Command::Measure(args) = cli.command else {
            panic!("expected measure");
        };
        assert_eq!(args.taps, vec![10.0, 20.0, 110.0, 20.0]);
        assert_eq!(args.reference, ReferenceObject::Ruler);
    }

    #[test]
    fn test_parse_copy_generate() {
        let cli = Cli::try_parse_from([
            "whitemuse", "copy", "generate", "--mode", "elegant", "--seed", "7",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Copy(CopyCommand::Generate {
                mode: CopyMode::Elegant,
                seed: Some(7),
                ..
            })
        ));
    }

    #[test]
    fn test_collect_inputs_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.JPG"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::write(dir.path().join("scan.bmp"), b"").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("b.png"), b"").unwrap();

        let flat = collect_inputs(&[dir.path().to_path_buf()], false).unwrap();
        assert_eq!(flat.len(), 1);

        let deep = collect_inputs(&[dir.path().to_path_buf()], true).unwrap();
        assert_eq!(deep.len(), 2);
    }
}
