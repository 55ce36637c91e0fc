//! Camera frame source.
//!
//! Device paths go to V4L2 when the `ingest-v4l2` feature is enabled.
//! `stub://` names select a synthetic camera that renders a yellow
//! stanchion drifting across a gray scene with random speckle.

use anyhow::Result;
#[cfg(not(feature = "ingest-v4l2"))]
use anyhow::anyhow;
use rand::Rng;

use super::{FrameSource, SourceStats};
use crate::config::CameraSettings;
use crate::frame::{BgrFrame, Roi};

pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "ingest-v4l2")]
    Device(device::DeviceCamera),
}

impl CameraSource {
    pub fn new(settings: CameraSettings) -> Result<Self> {
        if settings.device.starts_with("stub://") {
            return Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(settings)),
            });
        }
        #[cfg(feature = "ingest-v4l2")]
        {
            Ok(Self {
                backend: CameraBackend::Device(device::DeviceCamera::new(settings)),
            })
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        {
            Err(anyhow!(
                "camera {} requires the ingest-v4l2 feature",
                settings.device
            ))
        }
    }
}

impl FrameSource for CameraSource {
    fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.connect(),
        }
    }

    fn next_frame(&mut self) -> Result<BgrFrame> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.next_frame(),
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(_) => true,
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.is_healthy(),
        }
    }

    fn stats(&self) -> SourceStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.stats(),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic camera (stub://)
// ----------------------------------------------------------------------------

const SCENE_BGR: [u8; 3] = [96, 96, 96];
const STANCHION_BGR: [u8; 3] = [0, 215, 235];
const SPECKLE_PER_FRAME: usize = 40;

struct SyntheticCamera {
    settings: CameraSettings,
    frame_count: u64,
}

impl SyntheticCamera {
    fn new(settings: CameraSettings) -> Self {
        Self {
            settings,
            frame_count: 0,
        }
    }

    fn connect(&mut self) -> Result<()> {
        log::info!(
            "CameraSource: connected to {} (synthetic, {}x{})",
            self.settings.device,
            self.settings.width,
            self.settings.height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<BgrFrame> {
        self.frame_count += 1;
        let (w, h) = (self.settings.width, self.settings.height);
        let mut frame = BgrFrame::filled(w, h, SCENE_BGR);

        // Sweeps +-30 px around the center over a 120 frame period.
        let phase = (self.frame_count % 120) as i64;
        let drift = if phase < 60 { phase - 30 } else { 90 - phase };
        let pole_w = (w / 16).max(16);
        let pole_h = (h * 3 / 8).max(48);
        let x = (w as i64 / 2 + drift - pole_w as i64 / 2).max(0) as u32;
        let y = h / 6;
        frame.fill_rect(Roi::new(x, y, pole_w, pole_h), STANCHION_BGR);

        if w > 0 && h > 0 {
            let mut rng = rand::thread_rng();
            for _ in 0..SPECKLE_PER_FRAME {
                let (sx, sy) = (rng.gen_range(0..w), rng.gen_range(0..h));
                frame.put_pixel(sx, sy, rng.gen());
            }
        }
        Ok(frame)
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            errors: 0,
            name: self.settings.device.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// V4L2 device through libv4l
// ----------------------------------------------------------------------------

#[cfg(feature = "ingest-v4l2")]
mod device {
    use anyhow::{anyhow, Context, Result};
    use ouroboros::self_referencing;
    use std::time::{Duration, Instant};

    use super::super::normalize::{normalize_to_bgr, PixelFormat};
    use super::super::SourceStats;
    use crate::config::CameraSettings;
    use crate::frame::BgrFrame;

    pub(super) struct DeviceCamera {
        settings: CameraSettings,
        state: Option<DeviceState>,
        frame_count: u64,
        errors: u64,
        last_frame_at: Option<Instant>,
        last_error: Option<String>,
        active_width: u32,
        active_height: u32,
        active_format: PixelFormat,
    }

    #[self_referencing]
    struct DeviceState {
        device: v4l::Device,
        #[borrows(mut device)]
        #[covariant]
        stream: v4l::prelude::MmapStream<'this, v4l::Device>,
    }

    fn pixel_format(fourcc: &v4l::FourCC) -> Option<PixelFormat> {
        match &fourcc.repr {
            b"BGR3" => Some(PixelFormat::Bgr24),
            b"RGB3" => Some(PixelFormat::Rgb24),
            b"NV12" => Some(PixelFormat::Nv12),
            b"YUYV" => Some(PixelFormat::Yuyv),
            _ => None,
        }
    }

    impl DeviceCamera {
        pub(super) fn new(settings: CameraSettings) -> Self {
            Self {
                active_width: settings.width,
                active_height: settings.height,
                active_format: PixelFormat::Bgr24,
                settings,
                state: None,
                frame_count: 0,
                errors: 0,
                last_frame_at: None,
                last_error: None,
            }
        }

        pub(super) fn connect(&mut self) -> Result<()> {
            use v4l::buffer::Type;
            use v4l::video::Capture;

            // Drop any previous stream before reopening the node.
            self.state = None;

            let mut device = v4l::Device::with_path(&self.settings.device)
                .with_context(|| format!("open v4l2 device {}", self.settings.device))?;
            let mut format = device.format().context("read v4l2 format")?;
            format.width = self.settings.width;
            format.height = self.settings.height;
            format.fourcc = v4l::FourCC::new(b"BGR3");

            let format = match device.set_format(&format) {
                Ok(format) => format,
                Err(err) => {
                    log::warn!(
                        "CameraSource: failed to set format on {}: {}",
                        self.settings.device,
                        err
                    );
                    device
                        .format()
                        .context("read v4l2 format after set failure")?
                }
            };
            let active_format = pixel_format(&format.fourcc).ok_or_else(|| {
                anyhow!(
                    "unsupported v4l2 pixel format {} on {}",
                    format.fourcc,
                    self.settings.device
                )
            })?;

            if self.settings.target_fps > 0 {
                let params = v4l::video::capture::Parameters::with_fps(self.settings.target_fps);
                if let Err(err) = device.set_params(&params) {
                    log::warn!(
                        "CameraSource: failed to set fps on {}: {}",
                        self.settings.device,
                        err
                    );
                }
            }

            self.active_width = format.width;
            self.active_height = format.height;
            self.active_format = active_format;
            self.last_error = None;

            let state = DeviceStateBuilder {
                device,
                stream_builder: |device| {
                    v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                        .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
                },
            }
            .try_build()
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                err
            })?;
            self.state = Some(state);

            log::info!(
                "CameraSource: connected to {} ({}x{} {:?})",
                self.settings.device,
                self.active_width,
                self.active_height,
                self.active_format
            );
            Ok(())
        }

        pub(super) fn next_frame(&mut self) -> Result<BgrFrame> {
            use v4l::io::traits::CaptureStream;

            let state = self.state.as_mut().context("v4l2 device not connected")?;
            let captured = state
                .with_mut(|fields| fields.stream.next().map(|(buf, _meta)| buf.to_vec()));
            let raw = match captured {
                Ok(raw) => raw,
                Err(err) => {
                    self.errors += 1;
                    self.last_error = Some(err.to_string());
                    // Force a reconnect on the next attempt.
                    self.state = None;
                    return Err(anyhow::Error::new(err).context("capture v4l2 frame"));
                }
            };

            let bgr = normalize_to_bgr(
                &raw,
                self.active_width,
                self.active_height,
                self.active_format,
            )
            .map_err(|err| {
                self.errors += 1;
                err
            })?;
            self.frame_count += 1;
            self.last_frame_at = Some(Instant::now());
            BgrFrame::new(bgr, self.active_width, self.active_height)
        }

        pub(super) fn is_healthy(&self) -> bool {
            if self.last_error.is_some() {
                return false;
            }
            let Some(last_frame_at) = self.last_frame_at else {
                return true;
            };
            last_frame_at.elapsed() <= self.health_grace()
        }

        pub(super) fn stats(&self) -> SourceStats {
            SourceStats {
                frames_captured: self.frame_count,
                errors: self.errors,
                name: self.settings.device.clone(),
            }
        }

        fn health_grace(&self) -> Duration {
            let base_ms = if self.settings.target_fps == 0 {
                2_000
            } else {
                (1000 / self.settings.target_fps).saturating_mul(6)
            };
            Duration::from_millis(base_ms.max(2_000) as u64)
        }
    }
}
