use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use terrain_sculptor::config::SculptConfig;
use terrain_sculptor::error::SculptError;
use terrain_sculptor::export::export_preview;
use terrain_sculptor::masks::MaskSet;
use terrain_sculptor::scheduler::SculptEngine;

#[derive(Parser, Debug)]
#[command(name = "terrain_sculptor")]
#[command(about = "Sculpt a height field with walkers, paths, mountains and mask strokes")]
struct Args {
    /// Side of the square grid (overrides the config file)
    #[arg(long)]
    size: Option<usize>,

    /// Random seed (overrides the config file)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Simulated seconds to run
    #[arg(long, default_value = "30")]
    seconds: f32,

    /// Fixed tick length in seconds
    #[arg(long, default_value = "0.05")]
    dt: f32,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Brush mask images; procedural masks are used when none are given
    #[arg(long, num_args = 1..)]
    mask: Vec<PathBuf>,

    /// Run frame and timed sculptors on separate workers
    #[arg(long)]
    concurrent: bool,

    /// Write a shaded PNG preview of the final field
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Write the preview as plain grayscale instead
    #[arg(long)]
    grayscale: bool,

    #[arg(long)]
    no_walkers: bool,

    #[arg(long)]
    no_path: bool,

    #[arg(long)]
    no_mountains: bool,

    #[arg(long)]
    no_strokes: bool,
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn build_config(args: &Args) -> Result<SculptConfig, SculptError> {
    let mut config = match &args.config {
        Some(path) => SculptConfig::from_json_file(path)?,
        None => SculptConfig::default(),
    };

    if let Some(size) = args.size {
        config.grid_size = size;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if args.no_walkers {
        config.walkers.clear();
    }
    if args.no_path {
        config.path = None;
    }
    if args.no_mountains {
        config.mountains = None;
    }
    if args.no_strokes {
        config.strokes = None;
    }
    Ok(config)
}

fn run(args: Args) -> Result<(), SculptError> {
    let config = build_config(&args)?;

    let masks = if args.mask.is_empty() {
        MaskSet::procedural(config.procedural_masks, config.mask_resolution, config.seed)
    } else {
        MaskSet::load(&args.mask)?
    };

    println!("Sculpting with seed: {}", config.seed);
    println!("Grid size: {}x{}", config.grid_size, config.grid_size);

    let mut engine = SculptEngine::from_config(&config, masks)?;
    let steps = if args.concurrent {
        engine.run_concurrent(args.seconds, args.dt)
    } else {
        engine.run(args.seconds, args.dt)
    };

    let field = engine.snapshot();
    println!("Ran {} ticks ({:.2}s simulated)", steps, engine.elapsed());
    if let Some((min_h, max_h)) = field.min_max() {
        println!("Height range: {:.3} to {:.3}", min_h, max_h);
    }
    for (name, summary) in engine.stats() {
        println!("  {}: {}", name, summary);
    }

    if let Some(path) = &args.preview {
        export_preview(&field, path, !args.grayscale)?;
        println!("Preview written to {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "sculpting failed");
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}
