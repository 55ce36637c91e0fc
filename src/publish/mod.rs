//! Result record file shared with out-of-process readers.
//!
//! The writer overwrites the record in place: seek to the start, write all
//! bytes, flush. That is not atomic. Readers detect a torn record through
//! `frame_index != consistency_marker` and read again.

mod record;

pub use record::{ResultRecord, RECORD_LEN};

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::Duration;

use crate::detect::DetectionResult;

const RETRY_PAUSE: Duration = Duration::from_millis(1);

/// Overwrites one fixed-size record per published frame.
pub struct ResultPublisher<W = File> {
    out: W,
    published: u64,
}

impl ResultPublisher<File> {
    /// Opens or creates the record file. Existing content is left in place
    /// until the first publish overwrites it.
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("open result file {}", path.display()))?;
        log::info!("publishing results to {}", path.display());
        Ok(Self::new(file))
    }
}

impl<W: Write + Seek> ResultPublisher<W> {
    pub fn new(out: W) -> Self {
        Self { out, published: 0 }
    }

    pub fn publish(&mut self, result: &DetectionResult) -> Result<()> {
        self.publish_record(&ResultRecord::from(result))
    }

    pub fn publish_record(&mut self, record: &ResultRecord) -> Result<()> {
        self.out
            .seek(SeekFrom::Start(0))
            .context("seek result file")?;
        self.out
            .write_all(&record.to_bytes())
            .context("write result record")?;
        self.out.flush().context("flush result record")?;
        self.published += 1;
        Ok(())
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// What a single read of the record observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    Consistent(ResultRecord),
    /// Bytes from two different publishes.
    Torn(ResultRecord),
    /// Fewer than `RECORD_LEN` bytes present (nothing published yet).
    Short(usize),
}

pub struct ResultReader<R = File> {
    input: R,
}

impl ResultReader<File> {
    pub fn open(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("open result file {}", path.display()))?;
        Ok(Self::new(file))
    }

    /// Like `open`, but a file the publisher has not created yet is
    /// `Ok(None)` rather than an error.
    pub fn try_open(path: &Path) -> Result<Option<Self>> {
        match File::open(path) {
            Ok(file) => Ok(Some(Self::new(file))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(anyhow::Error::new(err)
                .context(format!("open result file {}", path.display()))),
        }
    }
}

impl<R: Read + Seek> ResultReader<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }

    pub fn read(&mut self) -> Result<ReadOutcome> {
        self.input
            .seek(SeekFrom::Start(0))
            .context("seek result file")?;
        let mut buf = [0u8; RECORD_LEN];
        let mut filled = 0;
        while filled < RECORD_LEN {
            let n = self
                .input
                .read(&mut buf[filled..])
                .context("read result record")?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled < RECORD_LEN {
            return Ok(ReadOutcome::Short(filled));
        }
        let record = ResultRecord::from_bytes(&buf);
        if record.is_consistent() {
            Ok(ReadOutcome::Consistent(record))
        } else {
            Ok(ReadOutcome::Torn(record))
        }
    }

    /// Reads until a consistent record shows up, at most `max_attempts`
    /// times. `None` when every attempt was torn or short.
    pub fn read_consistent(&mut self, max_attempts: usize) -> Result<Option<ResultRecord>> {
        for attempt in 0..max_attempts {
            match self.read()? {
                ReadOutcome::Consistent(record) => return Ok(Some(record)),
                ReadOutcome::Torn(record) => log::trace!(
                    "torn record on attempt {}: index {} marker {}",
                    attempt + 1,
                    record.frame_index,
                    record.consistency_marker
                ),
                ReadOutcome::Short(len) => {
                    log::trace!("short record on attempt {}: {} bytes", attempt + 1, len)
                }
            }
            if attempt + 1 < max_attempts {
                std::thread::sleep(RETRY_PAUSE);
            }
        }
        Ok(None)
    }

    pub fn into_inner(self) -> R {
        self.input
    }
}
