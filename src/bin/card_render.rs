use std::path::PathBuf;

use anyhow::Context as _;
use card_imagegen::{ImageDescription, PackageManager, PreserveAspect, RenderSettings};
use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "card-render", version, about = "Render a card image description to PNG")]
struct Cli {
    /// Input description JSON.
    description: PathBuf,

    /// Output PNG path.
    #[arg(short, long)]
    out: PathBuf,

    /// Directory containing the packages.
    #[arg(long, default_value = ".")]
    data: PathBuf,

    /// Package that packaged images are loaded from.
    #[arg(long)]
    package: Option<String>,

    /// Package that symbols are loaded from.
    #[arg(long)]
    symbols: Option<String>,

    /// Output width; 0 keeps the natural width.
    #[arg(long, default_value_t = 0)]
    width: u32,

    /// Output height; 0 keeps the natural height.
    #[arg(long, default_value_t = 0)]
    height: u32,

    #[arg(long, value_enum, default_value_t = Aspect::Stretch)]
    aspect: Aspect,

    /// Boost the saturation of loaded images.
    #[arg(long, default_value_t = false)]
    saturate: bool,

    /// Increase log output (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Aspect {
    Stretch,
    FitLetterbox,
    FitCrop,
}

impl From<Aspect> for PreserveAspect {
    fn from(aspect: Aspect) -> Self {
        match aspect {
            Aspect::Stretch => Self::Stretch,
            Aspect::FitLetterbox => Self::FitLetterbox,
            Aspect::FitCrop => Self::FitCrop,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let json = std::fs::read_to_string(&cli.description)
        .with_context(|| format!("read description '{}'", cli.description.display()))?;
    let node = ImageDescription::from_json(&json)
        .with_context(|| format!("parse description '{}'", cli.description.display()))?
        .build();

    let packages = PackageManager::new(&cli.data);
    let package = cli
        .package
        .as_deref()
        .map(|name| packages.open_any(name))
        .transpose()?;
    let symbols = cli
        .symbols
        .as_deref()
        .map(|name| packages.open_any(name))
        .transpose()?;

    let settings = RenderSettings {
        width: cli.width,
        height: cli.height,
        preserve_aspect: cli.aspect.into(),
        saturate: cli.saturate,
    };
    let mut opt = settings.options(None, None);
    if let Some(package) = package.as_deref() {
        opt = opt.with_package(package);
    }
    if let Some(symbols) = symbols.as_deref() {
        opt = opt.with_symbol_package(symbols);
    }

    let img = node.generate(&opt).context("generate image")?;
    img.save(&cli.out)
        .with_context(|| format!("write '{}'", cli.out.display()))?;
    tracing::info!(
        width = img.width(),
        height = img.height(),
        out = %cli.out.display(),
        "rendered"
    );
    Ok(())
}
