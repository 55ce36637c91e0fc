use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::{CandidatePolicy, ColorRange, Kernel, SelectionPolicy, TargetColor};
use crate::pipeline::CropRegion;

const DEFAULT_RANGES_PATH: &str = "values.txt";
const DEFAULT_RESULT_PATH: &str = "/dev/shm/stanchion.dat";
const DEFAULT_OUTPUT_DIR: &str = "/dev/shm";
const DEFAULT_CAMERA: &str = "/dev/video0";
const DEFAULT_CAMERA_WIDTH: u32 = 320;
const DEFAULT_CAMERA_HEIGHT: u32 = 240;
const DEFAULT_CAMERA_FPS: u32 = 30;
const DEFAULT_RETRY_INITIAL_MS: u64 = 100;
const DEFAULT_RETRY_MAX_MS: u64 = 2_000;
const DEFAULT_HEALTH_LOG_SECS: u64 = 5;

/// Values per color in the ranges file.
const RANGE_VALUES: usize = 6;

/// Small numeric knobs of the detection pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tunables {
    /// Douglas–Peucker tolerance in pixels.
    pub poly_epsilon: f64,
    pub erode_kernel: Kernel,
    pub dilate_kernel: Kernel,
    /// Upper end of the extra low hue band searched for red.
    pub red_wrap_hue: u8,
}

impl Default for Tunables {
    fn default() -> Self {
        let erode = Kernel::square(3);
        Self {
            poly_epsilon: 6.0,
            erode_kernel: erode,
            dilate_kernel: erode.grown(2),
            red_wrap_hue: 10,
        }
    }
}

impl Tunables {
    fn validate(&self) -> Result<()> {
        if !self.poly_epsilon.is_finite() || self.poly_epsilon <= 0.0 {
            return Err(anyhow!("poly_epsilon must be a positive number"));
        }
        let (e, d) = (self.erode_kernel, self.dilate_kernel);
        if e.width == 0 || e.height == 0 {
            return Err(anyhow!("erode kernel must be at least 1x1"));
        }
        if d.width > Kernel::MAX_SIDE || d.height > Kernel::MAX_SIDE {
            return Err(anyhow!(
                "dilate kernel {}x{} exceeds {} pixels per side",
                d.width,
                d.height,
                Kernel::MAX_SIDE
            ));
        }
        if d.width < e.width || d.height < e.height {
            return Err(anyhow!(
                "dilate kernel {}x{} must not be smaller than erode kernel {}x{}",
                d.width,
                d.height,
                e.width,
                e.height
            ));
        }
        Ok(())
    }
}

/// Color ranges plus the per-color enable flags.
///
/// Loaded once at startup. Only the enable flags change afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorRangeConfig {
    pub red: ColorRange,
    pub yellow: ColorRange,
    pub red_enabled: bool,
    pub yellow_enabled: bool,
}

impl Default for ColorRangeConfig {
    fn default() -> Self {
        Self::new(ColorRange::default(), ColorRange::default())
    }
}

impl ColorRangeConfig {
    pub fn new(red: ColorRange, yellow: ColorRange) -> Self {
        Self {
            red,
            yellow,
            red_enabled: true,
            yellow_enabled: true,
        }
    }

    /// Reads the ranges file. A missing or malformed file is not fatal:
    /// whatever cannot be read falls back to the unset range, which matches
    /// nothing.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let cfg = Self::parse(&text);
                log::info!(
                    "loaded color ranges from {}: red {:?}..{:?} yellow {:?}..{:?}",
                    path.display(),
                    cfg.red.lower,
                    cfg.red.upper,
                    cfg.yellow.lower,
                    cfg.yellow.upper
                );
                cfg
            }
            Err(err) => {
                log::warn!(
                    "cannot read color ranges {}: {}; detection disabled until fixed",
                    path.display(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Parses twelve whitespace separated integers: six for red, then six
    /// for yellow, each ordered `lower0 upper0 lower1 upper1 lower2 upper2`.
    ///
    /// Parsing stops at the first token that is not an integer. Values are
    /// clamped to 0..=255.
    pub fn parse(text: &str) -> Self {
        let values: Vec<u8> = text
            .split_whitespace()
            .map_while(|tok| tok.parse::<i64>().ok())
            .map(|v| v.clamp(0, 255) as u8)
            .collect();
        if values.len() < 2 * RANGE_VALUES {
            log::warn!(
                "color ranges file holds {} of {} values; missing colors match nothing",
                values.len(),
                2 * RANGE_VALUES
            );
        }
        let red = range_at(&values, 0);
        let yellow = range_at(&values, RANGE_VALUES);
        Self::new(red, yellow)
    }

    pub fn range(&self, color: TargetColor) -> &ColorRange {
        match color {
            TargetColor::Red => &self.red,
            TargetColor::Yellow => &self.yellow,
        }
    }

    pub fn is_enabled(&self, color: TargetColor) -> bool {
        match color {
            TargetColor::Red => self.red_enabled,
            TargetColor::Yellow => self.yellow_enabled,
        }
    }

    pub fn set_enabled(&mut self, color: TargetColor, enable: bool) {
        match color {
            TargetColor::Red => self.red_enabled = enable,
            TargetColor::Yellow => self.yellow_enabled = enable,
        }
    }
}

fn range_at(values: &[u8], start: usize) -> ColorRange {
    values
        .get(start..start + RANGE_VALUES)
        .and_then(|chunk| <[u8; RANGE_VALUES]>::try_from(chunk).ok())
        .map(ColorRange::from_interleaved)
        .unwrap_or_default()
}

/// Everything the detection engine needs besides the color ranges.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    pub crop: CropRegion,
    /// Box blur kernel size; values below 3 disable the blur.
    pub blur: Option<u32>,
    pub policy: CandidatePolicy,
    pub selection: SelectionPolicy,
    pub tunables: Tunables,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            crop: CropRegion::default(),
            blur: None,
            policy: CandidatePolicy::default(),
            selection: SelectionPolicy::default(),
            tunables: Tunables::default(),
        }
    }
}

impl DetectorSettings {
    fn validate(&self) -> Result<()> {
        self.tunables.validate()?;
        let p = &self.policy;
        if p.min_ratio_pct > p.max_ratio_pct {
            return Err(anyhow!(
                "min_ratio_pct {} exceeds max_ratio_pct {}",
                p.min_ratio_pct,
                p.max_ratio_pct
            ));
        }
        if p.min_vertices > p.max_vertices {
            return Err(anyhow!(
                "min_vertices {} exceeds max_vertices {}",
                p.min_vertices,
                p.max_vertices
            ));
        }
        if p.max_center_offset <= 0 {
            return Err(anyhow!("max_center_offset must be greater than zero"));
        }
        let priority = &self.selection.priority;
        if priority.is_empty() {
            return Err(anyhow!("selection priority must name at least one color"));
        }
        if priority
            .iter()
            .enumerate()
            .any(|(i, c)| priority[..i].contains(c))
        {
            return Err(anyhow!("selection priority lists a color twice"));
        }
        if let CropRegion::Fixed(roi) = self.crop {
            if roi.width == 0 || roi.height == 0 {
                return Err(anyhow!("crop region must be non-empty"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Default)]
struct VisionConfigFile {
    ranges_path: Option<PathBuf>,
    result_path: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    dump_every: Option<u64>,
    camera: Option<CameraConfigFile>,
    detector: Option<DetectorSettings>,
    retry: Option<RetryConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct RetryConfigFile {
    initial_ms: Option<u64>,
    max_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub ranges_path: PathBuf,
    pub result_path: PathBuf,
    pub output_dir: PathBuf,
    /// Write diagnostics every N frames.
    pub dump_every: Option<u64>,
    pub camera: CameraSettings,
    pub detector: DetectorSettings,
    pub retry: RetrySettings,
    pub health_interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraSettings {
    /// Device path, or `stub://<name>` for the synthetic source.
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for VisionConfig {
    fn default() -> Self {
        // Every file field is optional, so the empty file always converts.
        Self::from_file(VisionConfigFile::default())
    }
}

impl VisionConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("STANCHION_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: VisionConfigFile) -> Self {
        let camera = CameraSettings {
            device: file
                .camera
                .as_ref()
                .and_then(|camera| camera.device.clone())
                .unwrap_or_else(|| DEFAULT_CAMERA.to_string()),
            width: file
                .camera
                .as_ref()
                .and_then(|camera| camera.width)
                .unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: file
                .camera
                .as_ref()
                .and_then(|camera| camera.height)
                .unwrap_or(DEFAULT_CAMERA_HEIGHT),
            target_fps: file
                .camera
                .as_ref()
                .and_then(|camera| camera.target_fps)
                .unwrap_or(DEFAULT_CAMERA_FPS),
        };
        let retry = RetrySettings {
            initial: Duration::from_millis(
                file.retry
                    .as_ref()
                    .and_then(|retry| retry.initial_ms)
                    .unwrap_or(DEFAULT_RETRY_INITIAL_MS),
            ),
            max: Duration::from_millis(
                file.retry
                    .and_then(|retry| retry.max_ms)
                    .unwrap_or(DEFAULT_RETRY_MAX_MS),
            ),
        };
        Self {
            ranges_path: file
                .ranges_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RANGES_PATH)),
            result_path: file
                .result_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULT_PATH)),
            output_dir: file
                .output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            dump_every: file.dump_every,
            camera,
            detector: file.detector.unwrap_or_default(),
            retry,
            health_interval: Duration::from_secs(DEFAULT_HEALTH_LOG_SECS),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("STANCHION_RANGES_PATH") {
            if !path.trim().is_empty() {
                self.ranges_path = PathBuf::from(path);
            }
        }
        if let Ok(path) = std::env::var("STANCHION_RESULT_PATH") {
            if !path.trim().is_empty() {
                self.result_path = PathBuf::from(path);
            }
        }
        if let Ok(device) = std::env::var("STANCHION_CAMERA") {
            if !device.trim().is_empty() {
                self.camera.device = device;
            }
        }
        if let Ok(dir) = std::env::var("STANCHION_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.output_dir = PathBuf::from(dir);
            }
        }
        if let Ok(every) = std::env::var("STANCHION_DUMP_EVERY") {
            let frames: u64 = every
                .trim()
                .parse()
                .map_err(|_| anyhow!("STANCHION_DUMP_EVERY must be an integer frame count"))?;
            self.dump_every = Some(frames);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!(
                "camera frame size must be non-zero, got {}x{}",
                self.camera.width,
                self.camera.height
            ));
        }
        if self.camera.target_fps == 0 {
            return Err(anyhow!("camera target_fps must be greater than zero"));
        }
        if self.dump_every == Some(0) {
            return Err(anyhow!("dump_every must be greater than zero"));
        }
        if self.retry.initial.is_zero() {
            return Err(anyhow!("retry initial delay must be greater than zero"));
        }
        if self.retry.max < self.retry.initial {
            return Err(anyhow!("retry max delay must not be below the initial delay"));
        }
        self.detector.validate()?;
        if !self.detector.crop.fits(self.camera.width, self.camera.height) {
            return Err(anyhow!(
                "crop {:?} does not fit a {}x{} camera frame",
                self.detector.crop,
                self.camera.width,
                self.camera.height
            ));
        }
        Ok(())
    }

    /// Loads the color ranges named by `ranges_path`.
    pub fn load_ranges(&self) -> ColorRangeConfig {
        ColorRangeConfig::load(&self.ranges_path)
    }
}

fn read_config_file(path: &Path) -> Result<VisionConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
