//! stickersheet: split generated sticker sheets and compose stickers back
//! into sheets.
//!
//! # Usage
//!
//! ```text
//! stickersheet split sheet.png --out-dir stickers/
//! stickersheet compose stickers/*.png --output preview.png --keep 3=old/sticker-04.png
//! ```
//!
//! Progress goes to stderr through `env_logger` (`RUST_LOG=debug` shows
//! per-stage pipeline details); reports go to stdout.

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod merge;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use stickersheet_pipeline::diagnostics::{self, SystemClock};
use stickersheet_pipeline::{
    GridLayout, PipelineConfig, PipelineError, PngCodec, RasterImage, SheetCodec,
};

use crate::merge::{KeepSpec, merge_slots};

/// Split chroma-keyed sticker sheets into transparent PNG stickers, and
/// compose stickers back into one sheet.
#[derive(Parser)]
#[command(name = "stickersheet", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Key out the background of a sheet and write one PNG per cell.
    Split(SplitArgs),
    /// Lay out sticker images on a grid and write the sheet as PNG.
    Compose(ComposeArgs),
}

/// Grid shape shared by both subcommands.
#[derive(Args)]
struct GridArgs {
    /// Number of cells across.
    #[arg(long, default_value_t = GridLayout::REFERENCE.columns(), value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    columns: u32,

    /// Number of cells down.
    #[arg(long, default_value_t = GridLayout::REFERENCE.rows(), value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    rows: u32,
}

impl GridArgs {
    fn layout(&self) -> Result<GridLayout, PipelineError> {
        GridLayout::new(self.columns, self.rows)
    }
}

#[derive(Args)]
struct SplitArgs {
    /// Path to the generated sheet (PNG, JPEG, BMP, WebP).
    sheet: PathBuf,

    /// Directory to write stickers into (created if missing).
    #[arg(short, long)]
    out_dir: PathBuf,

    #[command(flatten)]
    grid: GridArgs,

    /// Use the narrow preview thresholds instead of the final-pass ones.
    #[arg(long)]
    conservative: bool,

    /// Key color as "R,G,B".
    #[arg(long, value_name = "R,G,B")]
    key: Option<String>,

    /// File name prefix; stickers are written as PREFIX-NN.png, NN
    /// counting from 01.
    #[arg(long, default_value = "sticker")]
    prefix: String,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, the grid, key and threshold flags are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

#[derive(Args)]
struct ComposeArgs {
    /// Sticker images, filling cells in row-major order.
    slots: Vec<PathBuf>,

    /// Output sheet path (written as PNG).
    #[arg(short, long)]
    output: PathBuf,

    #[command(flatten)]
    grid: GridArgs,

    /// Place a retained sticker in a cell: INDEX=PATH, with INDEX
    /// counting from 0. Repeatable; overrides the positional sticker at
    /// that index.
    #[arg(long, value_name = "INDEX=PATH")]
    keep: Vec<KeepSpec>,

    /// Output diagnostics as JSON.
    #[arg(long)]
    json: bool,
}

/// Parse `--key "R,G,B"`.
fn parse_key(s: &str) -> Result<[u8; 3], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [r, g, b] = parts.as_slice() else {
        return Err(format!("key must be 'R,G,B', got: '{s}'"));
    };
    let channel = |name: &str, v: &str| {
        v.parse::<u8>()
            .map_err(|e| format!("invalid {name} component '{v}': {e}"))
    };
    Ok([channel("red", r)?, channel("green", g)?, channel("blue", b)?])
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual flags are ignored.
fn config_from_cli(args: &SplitArgs) -> Result<PipelineConfig, String> {
    if let Some(ref json) = args.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    let mut config = PipelineConfig {
        layout: args.grid.layout().map_err(|e| e.to_string())?,
        aggressive: !args.conservative,
        ..PipelineConfig::default()
    };
    if let Some(ref key) = args.key {
        config.chroma.key = parse_key(key).map_err(|e| format!("--key: {e}"))?;
    }
    Ok(config)
}

fn read_image(codec: &impl SheetCodec, path: &Path) -> Result<RasterImage, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    codec
        .decode(&bytes)
        .map_err(|e| format!("Error decoding {}: {e}", path.display()))
}

fn write_image(codec: &impl SheetCodec, image: &RasterImage, path: &Path) -> Result<(), String> {
    let bytes = codec
        .encode(image)
        .map_err(|e| format!("Error encoding {}: {e}", path.display()))?;
    std::fs::write(path, &bytes).map_err(|e| format!("Error writing {}: {e}", path.display()))?;
    log::debug!("wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Describe a pipeline error the way a user can act on it.
fn describe(err: &PipelineError) -> String {
    if err.is_grid_mismatch() {
        format!("{err} (incomplete or invalid result, please retry generation)")
    } else {
        err.to_string()
    }
}

fn split(args: &SplitArgs) -> Result<(), String> {
    let config = config_from_cli(args)?;
    let image_bytes = std::fs::read(&args.sheet)
        .map_err(|e| format!("Error reading {}: {e}", args.sheet.display()))?;

    log::info!(
        "Splitting {} ({} bytes) on a {} grid",
        args.sheet.display(),
        image_bytes.len(),
        config.layout,
    );
    log::debug!("Config: {config:#?}");

    let (staged, diag) = diagnostics::process_with_diagnostics(&image_bytes, &config, &SystemClock)
        .map_err(|e| format!("Pipeline error: {}", describe(&e)))?;

    std::fs::create_dir_all(&args.out_dir)
        .map_err(|e| format!("Error creating {}: {e}", args.out_dir.display()))?;

    let codec = PngCodec;
    let width = staged.slots.len().to_string().len().max(2);
    for slot in &staged.slots {
        let name = format!("{}-{:0width$}.png", args.prefix, slot.index + 1);
        write_image(&codec, &slot.image, &args.out_dir.join(name))?;
    }
    log::info!(
        "Wrote {} stickers to {}",
        staged.slots.len(),
        args.out_dir.display()
    );

    if args.json {
        let json = serde_json::to_string_pretty(&diag)
            .map_err(|e| format!("Error serializing diagnostics: {e}"))?;
        println!("{json}");
    } else {
        println!("{}", diag.report());
    }
    Ok(())
}

fn compose(args: &ComposeArgs) -> Result<(), String> {
    let layout = args.grid.layout().map_err(|e| e.to_string())?;
    let codec = PngCodec;

    let fresh = args
        .slots
        .iter()
        .map(|path| read_image(&codec, path))
        .collect::<Result<Vec<_>, _>>()?;
    let kept = args
        .keep
        .iter()
        .map(|spec| Ok((spec.index, read_image(&codec, &spec.path)?)))
        .collect::<Result<Vec<_>, String>>()?;

    log::info!(
        "Composing {} fresh and {} kept stickers on a {layout} grid",
        fresh.len(),
        kept.len(),
    );

    let slots = merge_slots(fresh, kept, layout.cell_count())?;
    let (sheet, diag) = diagnostics::compose_with_diagnostics(&slots, layout, &SystemClock)
        .map_err(|e| format!("Compose error: {}", describe(&e)))?;

    write_image(&codec, &sheet, &args.output)?;
    log::info!("Sheet written to {}", args.output.display());

    if args.json {
        let json = serde_json::to_string_pretty(&diag)
            .map_err(|e| format!("Error serializing diagnostics: {e}"))?;
        println!("{json}");
    } else {
        println!("Compose: {}", diag.summary_line());
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Command::Split(args) => split(args),
        Command::Compose(args) => compose(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}
