//! result_probe - poll the result record and print consistent reads.
//!
//! Reference consumer for the record written by `stanchiond`. Torn reads
//! are retried and never printed.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use stanchion_vision::{CancellationToken, ResultReader};

#[derive(Parser, Debug)]
#[command(author, version, about = "Print stanchion results as they are published")]
struct Args {
    /// Result record file.
    #[arg(long, env = "STANCHION_RESULT_PATH", default_value = "/dev/shm/stanchion.dat")]
    result: PathBuf,

    /// Poll interval in milliseconds.
    #[arg(long, default_value = "100")]
    interval_ms: u64,

    /// Read attempts per poll before giving up on a torn record.
    #[arg(long, default_value = "5")]
    attempts: usize,

    /// Print one record and exit.
    #[arg(long)]
    once: bool,

    /// Emit JSON lines instead of text.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        handler_token.cancel();
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let interval = Duration::from_millis(args.interval_ms);
    let mut reader = None;
    let mut last_index = None;

    while !token.is_cancelled() {
        if reader.is_none() {
            reader = ResultReader::try_open(&args.result)?;
        }
        let Some(open) = reader.as_mut() else {
            log::debug!("waiting for {}", args.result.display());
            token.sleep(interval);
            continue;
        };
        match open.read_consistent(args.attempts.max(1))? {
            Some(record) if last_index != Some(record.frame_index) => {
                last_index = Some(record.frame_index);
                if args.json {
                    let line = serde_json::json!({
                        "frame_index": record.frame_index,
                        "found": record.found().color().map(|c| c.name()),
                        "box_width": record.box_width,
                        "box_height": record.box_height,
                        "x_mid": record.x_mid,
                        "y_bottom": record.y_bottom,
                    });
                    println!("{}", line);
                } else {
                    println!(
                        "frame {} found={:?} w={} h={} x_mid={} y_bottom={}",
                        record.frame_index,
                        record.found(),
                        record.box_width,
                        record.box_height,
                        record.x_mid,
                        record.y_bottom
                    );
                }
                if args.once {
                    break;
                }
            }
            Some(_) => {}
            None => log::debug!("no consistent record after {} attempts", args.attempts),
        }
        token.sleep(interval);
    }
    Ok(())
}
