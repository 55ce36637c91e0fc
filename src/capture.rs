//! Continuous capture: pull a frame, detect, publish, repeat.

use anyhow::Result;
use std::io::{Seek, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RetrySettings;
use crate::detect::DetectionEngine;
use crate::diagnostics::DiagnosticsWriter;
use crate::ingest::FrameSource;
use crate::publish::ResultPublisher;

/// Longest single sleep while waiting, so cancellation is noticed promptly.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Cooperative stop flag, checked between frames.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleeps up to `total`, returning early once cancelled.
    pub fn sleep(&self, total: Duration) {
        let deadline = Instant::now() + total;
        while !self.is_cancelled() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

/// Doubling retry delay with a cap.
#[derive(Clone, Debug)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(settings: RetrySettings) -> Self {
        Self {
            initial: settings.initial,
            max: settings.max,
            current: settings.initial,
        }
    }

    /// Delay to wait now; the following call returns twice as much, up to
    /// the cap.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub frames: u64,
    pub found: u64,
    pub source_errors: u64,
    pub publish_errors: u64,
}

pub struct CaptureLoop {
    retry: RetrySettings,
    health_interval: Duration,
    max_frames: Option<u64>,
}

impl CaptureLoop {
    pub fn new(retry: RetrySettings, health_interval: Duration) -> Self {
        Self {
            retry,
            health_interval,
            max_frames: None,
        }
    }

    /// Stops after this many processed frames.
    pub fn with_max_frames(mut self, max_frames: u64) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    /// Runs until `token` is cancelled (or the frame limit is reached).
    ///
    /// Source failures never end the loop: they are logged, the source is
    /// reconnected after a backoff delay, and capture resumes. A failed
    /// publish is logged and the next frame overwrites it.
    pub fn run<S, W>(
        &self,
        source: &mut S,
        engine: &mut DetectionEngine,
        publisher: &mut ResultPublisher<W>,
        mut diagnostics: Option<&mut DiagnosticsWriter>,
        token: &CancellationToken,
    ) -> Result<LoopSummary>
    where
        S: FrameSource + ?Sized,
        W: Write + Seek,
    {
        let mut summary = LoopSummary::default();
        let mut backoff = Backoff::new(self.retry);
        let mut connected = false;
        let mut window_start = Instant::now();
        let mut window_frames = 0u64;

        while !token.is_cancelled() {
            if self.max_frames.is_some_and(|max| summary.frames >= max) {
                break;
            }

            if !connected {
                match source.connect() {
                    Ok(()) => connected = true,
                    Err(err) => {
                        summary.source_errors += 1;
                        let delay = backoff.next_delay();
                        log::warn!(
                            "frame source unavailable: {:#}; retrying in {:?}",
                            err,
                            delay
                        );
                        token.sleep(delay);
                        continue;
                    }
                }
            }

            let frame = match source.next_frame() {
                Ok(frame) => frame,
                Err(err) => {
                    summary.source_errors += 1;
                    connected = false;
                    let delay = backoff.next_delay();
                    log::warn!("frame capture failed: {:#}; reconnecting in {:?}", err, delay);
                    token.sleep(delay);
                    continue;
                }
            };
            backoff.reset();

            if engine.filter(&frame).is_found() {
                summary.found += 1;
            }
            summary.frames += 1;
            window_frames += 1;

            if let Err(err) = publisher.publish(engine.result()) {
                summary.publish_errors += 1;
                log::warn!("publish failed: {:#}", err);
            }

            if let Some(writer) = diagnostics.as_deref_mut() {
                if writer.is_due(summary.frames) {
                    writer.dump(&format!("frame{:06}", summary.frames), engine.stage_images());
                }
            }

            let elapsed = window_start.elapsed();
            if elapsed >= self.health_interval {
                let stats = source.stats();
                log::info!(
                    "{:.1} fps, {} frames, {} found, source {} healthy={} captured={} errors={}",
                    window_frames as f64 / elapsed.as_secs_f64(),
                    summary.frames,
                    summary.found,
                    stats.name,
                    source.is_healthy(),
                    stats.frames_captured,
                    stats.errors
                );
                window_start = Instant::now();
                window_frames = 0;
            }
        }

        if let Some(writer) = diagnostics {
            if summary.frames > 0 {
                writer.dump("final", engine.stage_images());
            }
        }
        log::info!(
            "capture stopped after {} frames ({} found, {} source errors)",
            summary.frames,
            summary.found,
            summary.source_errors
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColorRangeConfig, DetectorSettings};
    use crate::frame::BgrFrame;
    use crate::ingest::SourceStats;
    use anyhow::anyhow;
    use std::io::Cursor;

    struct ScriptedSource {
        connect_failures: u32,
        frame_failures: u32,
        connects: u32,
        served: u64,
    }

    impl FrameSource for ScriptedSource {
        fn connect(&mut self) -> Result<()> {
            self.connects += 1;
            if self.connect_failures > 0 {
                self.connect_failures -= 1;
                return Err(anyhow!("device busy"));
            }
            Ok(())
        }

        fn next_frame(&mut self) -> Result<BgrFrame> {
            if self.frame_failures > 0 {
                self.frame_failures -= 1;
                return Err(anyhow!("empty frame"));
            }
            self.served += 1;
            Ok(BgrFrame::filled(32, 24, [50, 50, 50]))
        }

        fn is_healthy(&self) -> bool {
            true
        }

        fn stats(&self) -> SourceStats {
            SourceStats {
                frames_captured: self.served,
                errors: 0,
                name: "scripted".to_string(),
            }
        }
    }

    fn fast_retry() -> RetrySettings {
        RetrySettings {
            initial: Duration::from_millis(1),
            max: Duration::from_millis(4),
        }
    }

    fn engine() -> DetectionEngine {
        DetectionEngine::new(ColorRangeConfig::default(), &DetectorSettings::default())
    }

    #[test]
    fn backoff_doubles_to_cap_and_resets() {
        let mut backoff = Backoff::new(RetrySettings {
            initial: Duration::from_millis(100),
            max: Duration::from_millis(2_000),
        });
        let delays: Vec<u64> = (0..7)
            .map(|_| backoff.next_delay().as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1600, 2000, 2000]);
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn cancelled_token_processes_nothing() -> Result<()> {
        let token = CancellationToken::new();
        token.cancel();
        let mut source = ScriptedSource {
            connect_failures: 0,
            frame_failures: 0,
            connects: 0,
            served: 0,
        };
        let mut publisher = ResultPublisher::new(Cursor::new(Vec::new()));
        let summary = CaptureLoop::new(fast_retry(), Duration::from_secs(5)).run(
            &mut source,
            &mut engine(),
            &mut publisher,
            None,
            &token,
        )?;
        assert_eq!(summary, LoopSummary::default());
        assert_eq!(source.connects, 0);
        Ok(())
    }

    #[test]
    fn source_failures_are_retried() -> Result<()> {
        let mut source = ScriptedSource {
            connect_failures: 2,
            frame_failures: 1,
            connects: 0,
            served: 0,
        };
        let mut engine = engine();
        let mut publisher = ResultPublisher::new(Cursor::new(Vec::new()));
        let summary = CaptureLoop::new(fast_retry(), Duration::from_secs(5))
            .with_max_frames(3)
            .run(
                &mut source,
                &mut engine,
                &mut publisher,
                None,
                &CancellationToken::new(),
            )?;
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.source_errors, 3);
        // two failed connects, one good, one reconnect after the bad frame
        assert_eq!(source.connects, 4);
        assert_eq!(publisher.published(), 3);
        assert_eq!(engine.result().frame_index, 3);
        Ok(())
    }

    #[test]
    fn token_sleep_returns_early_when_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let start = Instant::now();
        token.sleep(Duration::from_secs(10));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
