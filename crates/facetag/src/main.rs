use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facetag_core::{FaceRegistry, FrontalFaceDetector, OverlayRenderer, SsdConfidenceGate};
use facetag_hw::{Camera, StillImageSource};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;
mod display;
mod engine;

use config::Config;
use display::{DisplaySink, FileSink, NullSink, WindowSink};
use engine::{Engine, LoopSummary};

#[derive(Parser)]
#[command(name = "facetag", about = "Label faces in a live camera stream against a registry of known faces")]
struct Cli {
    /// Path to a TOML config file (default: $FACETAG_CONFIG, else built-in defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the live camera loop (Escape quits)
    Run {
        /// V4L2 device path, overriding the config
        #[arg(short, long)]
        device: Option<String>,
        /// Do not open a window
        #[arg(long)]
        headless: bool,
        /// With --headless, write annotated frames here
        #[arg(long, requires = "headless")]
        out_dir: Option<PathBuf>,
    },
    /// Run the pipeline over still images and write annotated copies
    Annotate {
        /// Images to process, in order
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Directory for annotated output frames
        #[arg(short, long)]
        out_dir: PathBuf,
    },
    /// Load the registry and report which entries were usable
    Registry,
    /// List V4L2 capture devices
    Devices,
}

/// Models and registry, loaded once at startup. Missing models are fatal.
struct Pipeline {
    detector: FrontalFaceDetector,
    gate: SsdConfidenceGate,
    registry: FaceRegistry,
    renderer: OverlayRenderer,
}

impl Pipeline {
    fn load(config: &Config) -> Result<Self> {
        let mut detector = load_detector(config)?;

        let gate_path = config.gate_model_path();
        let gate = SsdConfidenceGate::load(&gate_path)
            .with_context(|| format!("loading confidence gate model {gate_path}"))?;

        let registry = FaceRegistry::load(&config.registry, &mut detector);

        let renderer = load_renderer(config)?;

        Ok(Self {
            detector,
            gate,
            registry,
            renderer,
        })
    }
}

/// Labels use the configured font, else the embedded one. An unreadable
/// configured font is fatal.
fn load_renderer(config: &Config) -> Result<OverlayRenderer> {
    match (config.labels, &config.font_path) {
        (false, _) => Ok(OverlayRenderer::boxes_only()),
        (true, Some(path)) => OverlayRenderer::with_font(path)
            .with_context(|| format!("loading label font {}", path.display())),
        (true, None) => OverlayRenderer::bundled().context("loading bundled label font"),
    }
}

fn load_detector(config: &Config) -> Result<FrontalFaceDetector> {
    let path = config.detector_model_path();
    FrontalFaceDetector::load(&path, &config.detector)
        .with_context(|| format!("loading face detector model {path}"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Run {
            device,
            headless,
            out_dir,
        } => {
            if let Some(device) = device {
                config.camera_device = device;
            }
            let summary = match (headless, out_dir) {
                (false, _) => run_live(&config, &mut WindowSink::new(&config.window_title))?,
                (true, Some(dir)) => run_live(&config, &mut FileSink::new(&dir)?)?,
                (true, None) => run_live(&config, &mut NullSink)?,
            };
            println!("{}", serde_json::to_string(&summary)?);
        }
        Commands::Annotate { images, out_dir } => {
            let summary = run_annotate(&config, images, &out_dir)?;
            println!("{}", serde_json::to_string(&summary)?);
        }
        Commands::Registry => {
            let mut detector = load_detector(&config)?;
            let registry = FaceRegistry::load(&config.registry, &mut detector);
            println!(
                "{}",
                serde_json::json!({
                    "loaded": registry.names(),
                    "skipped": registry.skipped(),
                })
            );
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            }
            for device in devices {
                println!("{}", serde_json::to_string(&device)?);
            }
        }
    }

    Ok(())
}

/// Open the camera and run the loop into `sink`. The camera stream is
/// released when this returns, on success or error.
fn run_live(config: &Config, sink: &mut impl DisplaySink) -> Result<LoopSummary> {
    let Pipeline {
        detector,
        gate,
        registry,
        renderer,
    } = Pipeline::load(config)?;

    let camera = Camera::open(&config.camera_device)
        .with_context(|| format!("opening camera {}", config.camera_device))?;
    tracing::info!(
        device = %config.camera_device,
        width = camera.width,
        height = camera.height,
        fourcc = ?camera.fourcc,
        "camera opened"
    );
    let mut stream = camera.stream().context("starting camera stream")?;

    let mut engine = Engine::new(detector, gate, &registry, renderer, config.confidence_threshold);
    let summary = engine.run(&mut stream, sink, |_, _| {})?;
    Ok(summary)
}

/// Run the loop over still images, printing one JSON line per region.
fn run_annotate(config: &Config, images: Vec<PathBuf>, out_dir: &Path) -> Result<LoopSummary> {
    let Pipeline {
        detector,
        gate,
        registry,
        renderer,
    } = Pipeline::load(config)?;

    let paths = images.clone();
    let mut source = StillImageSource::new(images);
    let mut sink = FileSink::new(out_dir)?;

    let mut engine = Engine::new(detector, gate, &registry, renderer, config.confidence_threshold);
    let summary = engine.run(&mut source, &mut sink, |frame, outcomes| {
        let input = paths.get(frame.sequence as usize);
        for outcome in outcomes {
            let line = serde_json::json!({
                "input": input,
                "output": display::frame_path_in(out_dir, frame.sequence),
                "outcome": outcome,
            });
            println!("{line}");
        }
    })?;

    tracing::info!(written = sink.written(), out_dir = %out_dir.display(), "annotated frames written");
    Ok(summary)
}
