//! stanchiond - stanchion detector daemon
//!
//! Continuous mode captures from the camera, runs detection on every frame
//! and overwrites the result record after each one. Single-file mode
//! (`--file`) runs one image, writes diagnostics and exits 0 when a
//! stanchion was found, 1 otherwise.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use stanchion_vision::{
    CameraSource, CancellationToken, CaptureLoop, CropRegion, DetectionEngine, DiagnosticsWriter,
    FrameSource, ImageFileSource, ResultPublisher, VisionConfig,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Detect red/yellow stanchions and publish their geometry"
)]
struct Args {
    /// Process a single image file instead of the camera.
    #[arg(short = 'f', long = "file")]
    file: Option<PathBuf>,

    /// Directory for diagnostic images.
    #[arg(short = 'o', long = "output-dir")]
    output_dir: Option<PathBuf>,

    /// Only look for red stanchions.
    #[arg(long, conflicts_with = "yellow_only")]
    red_only: bool,

    /// Only look for yellow stanchions.
    #[arg(long)]
    yellow_only: bool,

    /// Debug logging.
    #[arg(short, long)]
    verbose: bool,

    /// Write diagnostic images every N frames.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    dump_every: Option<u64>,

    /// Color ranges file (12 integers: red then yellow).
    #[arg(long)]
    ranges: Option<PathBuf>,

    /// Result record file.
    #[arg(long)]
    result: Option<PathBuf>,

    /// Camera device, or stub://<name> for the synthetic camera.
    #[arg(long)]
    camera: Option<String>,

    /// Stop after this many frames (continuous mode).
    #[arg(long)]
    max_frames: Option<u64>,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match run(args) {
        Ok(code) => code,
        Err(err) => {
            log::error!("{:#}", err);
            ExitCode::from(1)
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    let mut cfg = load_config(&args)?;
    if args.file.is_some() {
        // still images are taken as-is, whatever their size
        cfg.detector.crop = CropRegion::Full;
    }

    let mut engine = DetectionEngine::new(cfg.load_ranges(), &cfg.detector);
    if args.red_only {
        engine.set_yellow_enabled(false);
    }
    if args.yellow_only {
        engine.set_red_enabled(false);
    }
    let mut diagnostics = DiagnosticsWriter::new(&cfg.output_dir, cfg.dump_every);

    if let Some(path) = args.file.as_deref() {
        return run_single_file(path, &mut engine, &mut diagnostics);
    }

    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        handler_token.cancel();
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let mut source = CameraSource::new(cfg.camera.clone())?;
    let mut publisher = ResultPublisher::create(&cfg.result_path)?;
    let mut capture = CaptureLoop::new(cfg.retry, cfg.health_interval);
    if let Some(max) = args.max_frames {
        capture = capture.with_max_frames(max);
    }

    log::info!(
        "stanchiond running on {} ({}x{}), Ctrl-C to stop",
        cfg.camera.device,
        cfg.camera.width,
        cfg.camera.height
    );
    let summary = capture.run(
        &mut source,
        &mut engine,
        &mut publisher,
        Some(&mut diagnostics),
        &token,
    )?;
    println!("{}", engine.result());
    log::info!(
        "processed {} frames, {} with a stanchion",
        summary.frames,
        summary.found
    );
    Ok(ExitCode::SUCCESS)
}

fn load_config(args: &Args) -> Result<VisionConfig> {
    let mut cfg = VisionConfig::load()?;
    if let Some(dir) = &args.output_dir {
        cfg.output_dir = dir.clone();
    }
    if let Some(every) = args.dump_every {
        cfg.dump_every = Some(every);
    }
    if let Some(path) = &args.ranges {
        cfg.ranges_path = path.clone();
    }
    if let Some(path) = &args.result {
        cfg.result_path = path.clone();
    }
    if let Some(device) = &args.camera {
        cfg.camera.device = device.clone();
    }
    cfg.validate()?;
    Ok(cfg)
}

fn run_single_file(
    path: &Path,
    engine: &mut DetectionEngine,
    diagnostics: &mut DiagnosticsWriter,
) -> Result<ExitCode> {
    let mut source = ImageFileSource::new(path)?;
    let frame = source.next_frame()?;
    let found = engine.filter(&frame);
    if let Some(elapsed) = engine.last_filter_time() {
        let secs = elapsed.as_secs_f64();
        let fps = if secs > 0.0 { 1.0 / secs } else { f64::INFINITY };
        println!("Filter ran in {:.4} secs ({:.1} FPS)", secs, fps);
    }

    let base = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame".to_string());
    diagnostics.dump(&base, engine.stage_images());

    println!("{}", engine.result());
    Ok(if found.is_found() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
