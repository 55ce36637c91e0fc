//! Per-frame detection: segmentation, morphology, contours and candidate
//! selection across the configured colors.

use std::time::{Duration, Instant};

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::config::{ColorRangeConfig, DetectorSettings, Tunables};
use crate::detect::candidate::{Candidate, CandidateEvaluator};
use crate::detect::color::{self, HsvImage};
use crate::detect::contour;
use crate::detect::morphology;
use crate::detect::result::{Detection, DetectionResult, Found, TargetColor};
use crate::frame::BgrFrame;
use crate::pipeline::Preprocess;

/// How colors are combined once each has produced its tallest candidate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Stop at the first color (in priority order) with any candidate.
    #[default]
    FirstMatch,
    /// Try every enabled color and keep the tallest box; the earlier
    /// color wins a tie.
    TallestAcrossColors,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionPolicy {
    pub priority: Vec<TargetColor>,
    pub mode: SelectionMode,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            priority: vec![TargetColor::Yellow, TargetColor::Red],
            mode: SelectionMode::FirstMatch,
        }
    }
}

/// Intermediate buffers from the last `filter` call. Each stage owns its
/// own buffer. The masks belong to the winning color, or to the last color
/// tried when nothing was found.
#[derive(Clone, Debug, Default)]
pub struct StageImages {
    pub cropped: BgrFrame,
    pub hsv: HsvImage,
    pub mask: GrayImage,
    pub opened: GrayImage,
}

struct ColorPass {
    color: TargetColor,
    mask: GrayImage,
    opened: GrayImage,
    best: Option<Candidate>,
}

/// Finds at most one stanchion per frame and keeps the latest result.
pub struct DetectionEngine {
    ranges: ColorRangeConfig,
    tunables: Tunables,
    evaluator: CandidateEvaluator,
    selection: SelectionPolicy,
    preprocess: Preprocess,
    result: DetectionResult,
    stages: StageImages,
    last_filter_time: Option<Duration>,
}

impl DetectionEngine {
    pub fn new(ranges: ColorRangeConfig, settings: &DetectorSettings) -> Self {
        Self {
            ranges,
            tunables: settings.tunables.clone(),
            evaluator: CandidateEvaluator::new(settings.policy.clone()),
            selection: settings.selection.clone(),
            preprocess: Preprocess::from_settings(settings.crop, settings.blur),
            result: DetectionResult::default(),
            stages: StageImages::default(),
            last_filter_time: None,
        }
    }

    /// Runs the full pipeline on one frame and returns the color found.
    ///
    /// Never fails: an empty frame, or one without matching pixels, simply
    /// reports `Found::None` with zeroed geometry.
    pub fn filter(&mut self, frame: &BgrFrame) -> Found {
        let started = Instant::now();
        self.result.begin_frame();

        let cropped = self.preprocess.run(frame.clone());
        let hsv = HsvImage::from_bgr(&cropped);

        let mut winner: Option<ColorPass> = None;
        let mut last_tried: Option<ColorPass> = None;
        for &color in &self.selection.priority {
            if !self.ranges.is_enabled(color) {
                continue;
            }
            let pass = self.search_color(&hsv, color);
            let Some(height) = pass.best.as_ref().map(|c| c.bbox.height) else {
                last_tried = Some(pass);
                continue;
            };
            let better = match &winner {
                None => true,
                Some(current) => current
                    .best
                    .as_ref()
                    .is_some_and(|best| height > best.bbox.height),
            };
            if better {
                winner = Some(pass);
            }
            if self.selection.mode == SelectionMode::FirstMatch {
                break;
            }
        }

        if let Some(pass) = &winner {
            if let Some(candidate) = &pass.best {
                self.result.record_hit(pass.color, &candidate.bbox);
            }
        }
        self.result.seal();

        let (mask, opened) = match winner.or(last_tried) {
            Some(pass) => (pass.mask, pass.opened),
            None => (
                GrayImage::new(cropped.width(), cropped.height()),
                GrayImage::new(cropped.width(), cropped.height()),
            ),
        };
        self.stages = StageImages {
            cropped,
            hsv,
            mask,
            opened,
        };
        self.last_filter_time = Some(started.elapsed());

        log::debug!(
            "frame {}: found={:?} box={}x{} x_mid={} y_bottom={}",
            self.result.frame_index,
            self.result.color_found,
            self.result.box_width,
            self.result.box_height,
            self.result.x_mid,
            self.result.y_bottom
        );
        self.result.color_found
    }

    /// Tallest plausible candidate for one color; the first one seen wins a
    /// height tie.
    fn search_color(&self, hsv: &HsvImage, color: TargetColor) -> ColorPass {
        let tunables = &self.tunables;
        let mask = color::segment(hsv, color, self.ranges.range(color), tunables.red_wrap_hue);
        let opened = morphology::open(&mask, tunables.erode_kernel, tunables.dilate_kernel);

        let polygons = contour::extract_polygons(&opened, tunables.poly_epsilon);
        let total = polygons.len();
        let mut best: Option<Candidate> = None;
        for polygon in polygons {
            let Some(bbox) =
                self.evaluator
                    .is_possible_stanchion(&polygon, hsv.width(), hsv.height())
            else {
                continue;
            };
            if best.as_ref().map_or(true, |b| bbox.height > b.bbox.height) {
                best = Some(Candidate { polygon, bbox });
            }
        }
        log::trace!(
            "{}: {} polygons, best height {:?}",
            color.name(),
            total,
            best.as_ref().map(|c| c.bbox.height)
        );

        ColorPass {
            color,
            mask,
            opened,
            best,
        }
    }

    pub fn result(&self) -> &DetectionResult {
        &self.result
    }

    pub fn detection(&self) -> Detection {
        self.result.detection()
    }

    pub fn stage_images(&self) -> &StageImages {
        &self.stages
    }

    /// Wall time of the last `filter` call.
    pub fn last_filter_time(&self) -> Option<Duration> {
        self.last_filter_time
    }

    pub fn ranges(&self) -> &ColorRangeConfig {
        &self.ranges
    }

    pub fn tunables(&self) -> &Tunables {
        &self.tunables
    }

    /// Takes effect from the next `filter` call.
    pub fn set_red_enabled(&mut self, enable: bool) {
        self.ranges.set_enabled(TargetColor::Red, enable);
    }

    /// Takes effect from the next `filter` call.
    pub fn set_yellow_enabled(&mut self, enable: bool) {
        self.ranges.set_enabled(TargetColor::Yellow, enable);
    }

    /// Restarts the frame counter for replaying a recorded sequence.
    pub fn reset_frame_index(&mut self) {
        self.result = DetectionResult::default();
    }
}
