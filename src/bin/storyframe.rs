use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use storyframe::{
    AmbientBase, BackgroundKind, CompositingParameters, CornerRadius, DirectorySink,
    EngineConfig, ExportItem, ExportOutcome, ImageId, ImageSource, PreviewEvent,
    PreviewScheduler, Rgb8,
};

#[derive(Parser, Debug)]
#[command(name = "storyframe", version)]
struct Cli {
    /// More logging on stderr (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export full-resolution story images.
    Export(ExportArgs),
    /// Run the progressive preview for one image and write every displayed tier.
    Preview(PreviewArgs),
    /// Print the colour under a point of an image.
    PickColor(PickColorArgs),
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Input images.
    #[arg(long = "input", required = true, num_args = 1..)]
    inputs: Vec<PathBuf>,

    /// Output directory.
    #[arg(long)]
    out_dir: PathBuf,

    #[command(flatten)]
    style: StyleArgs,
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    /// Input image.
    #[arg(long)]
    input: PathBuf,

    /// Output directory for `preview_tier<k>` files.
    #[arg(long)]
    out_dir: PathBuf,

    /// How long to wait for the next tier after the last tier's delay.
    #[arg(long, default_value_t = 5000)]
    settle_ms: u64,

    #[command(flatten)]
    style: StyleArgs,
}

#[derive(Parser, Debug)]
struct PickColorArgs {
    /// Input image.
    #[arg(long)]
    input: PathBuf,

    /// Horizontal position in display coordinates.
    #[arg(long)]
    x: f64,

    /// Vertical position in display coordinates.
    #[arg(long)]
    y: f64,

    /// Displayed width; defaults to the image width.
    #[arg(long)]
    display_width: Option<f64>,

    /// Displayed height; defaults to the image height.
    #[arg(long)]
    display_height: Option<f64>,

    /// Engine config JSON.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct StyleArgs {
    /// Background treatment.
    #[arg(long, value_enum, default_value_t = BackgroundChoice::CoverBlur)]
    background: BackgroundChoice,

    /// Custom colour (`#rgb` or `#rrggbb`) for `custom-color` and a custom ambient base.
    #[arg(long)]
    color: Option<String>,

    /// Base under the ambient glow.
    #[arg(long, value_enum, default_value_t = AmbientChoice::Black)]
    ambient_base: AmbientChoice,

    /// Foreground scale, 0.5..=1.0.
    #[arg(long, default_value_t = 0.9)]
    scale: f64,

    /// Blur as a percentage of the shorter image side; defaults per background.
    #[arg(long)]
    blur_percent: Option<f64>,

    /// Corner radius tier.
    #[arg(long, value_enum, default_value_t = RadiusChoice::None)]
    radius: RadiusChoice,

    /// Engine config JSON.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackgroundChoice {
    CoverBlur,
    FlatBlack,
    FlatWhite,
    CustomColor,
    AmbientGlow,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AmbientChoice {
    Black,
    White,
    Custom,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RadiusChoice {
    None,
    Small,
    Medium,
    Large,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    match cli.cmd {
        Command::Export(args) => cmd_export(args),
        Command::Preview(args) => cmd_preview(args),
        Command::PickColor(args) => cmd_pick_color(args),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let cfg = match path {
        Some(p) => EngineConfig::from_json_path(p)?,
        None => EngineConfig::default(),
    };
    let cfg = cfg.with_env_overrides();
    cfg.validate()?;
    Ok(cfg)
}

fn build_params(style: &StyleArgs, cfg: &EngineConfig) -> anyhow::Result<CompositingParameters> {
    let background = match style.background {
        BackgroundChoice::CoverBlur => BackgroundKind::CoverBlur,
        BackgroundChoice::FlatBlack => BackgroundKind::FlatBlack,
        BackgroundChoice::FlatWhite => BackgroundKind::FlatWhite,
        BackgroundChoice::CustomColor => BackgroundKind::CustomColor,
        BackgroundChoice::AmbientGlow => BackgroundKind::AmbientGlow,
    };
    let color = style
        .color
        .as_deref()
        .map(Rgb8::from_hex)
        .transpose()
        .context("parse --color")?;

    let mut params = cfg.default_params(background);
    params.custom_color = color;
    params.ambient_custom_color = color;
    params.ambient_base = match style.ambient_base {
        AmbientChoice::Black => AmbientBase::Black,
        AmbientChoice::White => AmbientBase::White,
        AmbientChoice::Custom => AmbientBase::Custom,
    };
    params.scale = style.scale;
    if let Some(pct) = style.blur_percent {
        params.blur_percent = pct;
    }
    params.corner_radius = match style.radius {
        RadiusChoice::None => CornerRadius::None,
        RadiusChoice::Small => CornerRadius::Small,
        RadiusChoice::Medium => CornerRadius::Medium,
        RadiusChoice::Large => CornerRadius::Large,
    };
    params.validate()?;
    Ok(params)
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let cfg = load_config(args.style.config.as_deref())?;
    let params = build_params(&args.style, &cfg)?;
    let items: Vec<ExportItem> = args.inputs.iter().cloned().map(ExportItem::from_path).collect();

    let mut sink = DirectorySink::new(args.out_dir.clone());
    let report = storyframe::export_batch(&items, &params, &cfg, &mut sink)?;
    for outcome in &report.outcomes {
        match outcome {
            ExportOutcome::Written {
                name,
                filename,
                width,
                height,
            } => println!("ok   {name} -> {filename} ({width}x{height})"),
            ExportOutcome::Failed { name, error } => println!("fail {name}: {error}"),
        }
    }
    println!("{} written, {} failed", report.written(), report.failed());
    if report.all_failed() {
        bail!("no story image could be exported");
    }
    Ok(())
}

fn cmd_preview(args: PreviewArgs) -> anyhow::Result<()> {
    let cfg = load_config(args.style.config.as_deref())?;
    let params = build_params(&args.style, &cfg)?;
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create output dir '{}'", args.out_dir.display()))?;

    let scheduler = PreviewScheduler::new(cfg.scheduler_options(None))?;
    let last_tier = scheduler.tiers().len() - 1;
    let wait = scheduler
        .tiers()
        .iter()
        .map(|t| t.delay())
        .max()
        .unwrap_or_default()
        + Duration::from_millis(args.settle_ms);
    let ext = cfg.preview_format.extension();

    let (preview, events) = scheduler.open_preview();
    let image_id = ImageId::new(args.input.to_string_lossy());
    preview.update(
        Some(image_id),
        Some(ImageSource::file(args.input.clone())),
        &params,
    )?;

    loop {
        let event = events
            .recv_timeout(wait)
            .context("timed out waiting for the preview")?;
        match event {
            PreviewEvent::Displayed { tier, handle, .. } => {
                // A later, sharper tier may already have replaced and revoked this one.
                let Some(image) = scheduler.registry().resolve(&handle) else {
                    tracing::debug!(tier, "tier superseded before it was written");
                    continue;
                };
                let path = args.out_dir.join(format!("preview_tier{tier}.{ext}"));
                std::fs::write(&path, &image.bytes[..])
                    .with_context(|| format!("write '{}'", path.display()))?;
                println!("tier {tier}: {} ({}x{})", path.display(), image.width, image.height);
                if tier == last_tier {
                    return Ok(());
                }
            }
            PreviewEvent::TierFailed { tier, error, .. } => {
                tracing::warn!(tier, %error, "preview tier failed, keeping the earlier result");
                if tier == last_tier {
                    return Ok(());
                }
            }
            PreviewEvent::Failed { message, .. } => bail!(message),
            PreviewEvent::Unsupported { reason } => bail!("preview unsupported: {reason}"),
        }
    }
}

fn cmd_pick_color(args: PickColorArgs) -> anyhow::Result<()> {
    let cfg = load_config(args.config.as_deref())?;
    let image = storyframe::decode_source(&ImageSource::file(args.input), &cfg.decode_options())?;
    let dims = image.dimensions();
    let color = storyframe::pick_color(
        &image,
        args.x,
        args.y,
        args.display_width.unwrap_or(f64::from(dims.width)),
        args.display_height.unwrap_or(f64::from(dims.height)),
    )?;
    println!("{color}");
    Ok(())
}
