use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "pixmark", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Burn an annotation file into an image and write a PNG.
    Flatten(FlattenArgs),
    /// Apply one whole-image effect and write a PNG.
    Effect(EffectArgs),
}

#[derive(Parser, Debug)]
struct FlattenArgs {
    /// Source image (any format the `image` crate decodes).
    #[arg(long)]
    image: PathBuf,

    /// Annotation JSON, as written by `pixmark::serialize`.
    #[arg(long)]
    annotations: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct EffectArgs {
    /// Source image.
    #[arg(long)]
    image: PathBuf,

    /// Effect as JSON, e.g. `{"type":"blur","radius":4}`.
    #[arg(long)]
    effect: String,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Flatten(args) => cmd_flatten(args),
        Command::Effect(args) => cmd_effect(args),
    }
}

fn read_bitmap(path: &Path) -> anyhow::Result<pixmark::Bitmap> {
    let img = image::open(path).with_context(|| format!("decode image '{}'", path.display()))?;
    Ok(pixmark::Bitmap::from_rgba_image(img.to_rgba8()))
}

fn write_png(path: &Path, bitmap: &pixmark::Bitmap) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    let rgba = bitmap.to_rgba8();
    tracing::debug!(
        width = rgba.width(),
        height = rgba.height(),
        fingerprint = rgba.fingerprint(),
        "encoding png"
    );
    image::save_buffer_with_format(
        path,
        rgba.data(),
        rgba.width(),
        rgba.height(),
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", path.display()))?;
    eprintln!("wrote {}", path.display());
    Ok(())
}

fn cmd_flatten(args: FlattenArgs) -> anyhow::Result<()> {
    let source = read_bitmap(&args.image)?;
    let text = std::fs::read_to_string(&args.annotations)
        .with_context(|| format!("read annotations '{}'", args.annotations.display()))?;

    let mut editor = pixmark::Editor::new(source, pixmark::EngineOpts::from_env())?;
    editor
        .load_json(&text)
        .with_context(|| format!("parse annotations '{}'", args.annotations.display()))?;
    let flat = editor.flatten().context("flatten annotations")?;
    write_png(&args.out, &flat)
}

fn cmd_effect(args: EffectArgs) -> anyhow::Result<()> {
    let source = read_bitmap(&args.image)?;
    let effect: pixmark::ImageEffect =
        serde_json::from_str(&args.effect).with_context(|| "parse effect JSON")?;
    let out = effect
        .apply(&source)
        .with_context(|| format!("apply {}", effect.name()))?;
    write_png(&args.out, &out)
}
