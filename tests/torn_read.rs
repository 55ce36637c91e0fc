use std::io::Cursor;

use anyhow::Result;
use rand::Rng;

use stanchion_vision::{ReadOutcome, ResultReader, ResultRecord, RECORD_LEN};

fn sealed(rng: &mut impl Rng, frame_index: i32) -> ResultRecord {
    ResultRecord {
        frame_index,
        color_found: rng.gen_range(0..=2),
        box_width: rng.gen_range(0..320),
        box_height: rng.gen_range(0..240),
        x_mid: rng.gen_range(0..320),
        y_bottom: rng.gen_range(0..240),
        consistency_marker: frame_index,
    }
}

/// Bytes a reader sees when it catches the file after `split` bytes of
/// `newer` have overwritten `older`.
fn mid_write(older: &ResultRecord, newer: &ResultRecord, split: usize) -> Vec<u8> {
    let mut bytes = older.to_bytes().to_vec();
    bytes[..split].copy_from_slice(&newer.to_bytes()[..split]);
    bytes
}

fn read(bytes: Vec<u8>) -> Result<ReadOutcome> {
    ResultReader::new(Cursor::new(bytes)).read()
}

#[test]
fn every_split_is_either_discarded_or_whole() -> Result<()> {
    let mut rng = rand::thread_rng();
    for _ in 0..200 {
        let index = rng.gen_range(0..i32::MAX - 1);
        let older = sealed(&mut rng, index);
        let newer = sealed(&mut rng, index + 1);

        for split in 1..RECORD_LEN {
            // new prefix over old suffix (writer caught mid-write), and the
            // reverse (reader's two halves straddling a publish)
            for (first, second) in [(&older, &newer), (&newer, &older)] {
                match read(mid_write(first, second, split))? {
                    ReadOutcome::Torn(record) => {
                        assert_ne!(record.frame_index, record.consistency_marker);
                    }
                    ReadOutcome::Consistent(record) => {
                        // only possible once every field but the marker's
                        // high bytes came from the same publish
                        assert!(split > RECORD_LEN - 4, "split {} accepted", split);
                        assert!(record == older || record == newer);
                    }
                    ReadOutcome::Short(len) => panic!("short read of {} bytes", len),
                }
            }
        }
    }
    Ok(())
}

#[test]
fn splits_before_the_marker_are_always_detected() -> Result<()> {
    let mut rng = rand::thread_rng();
    let older = sealed(&mut rng, 41);
    let newer = sealed(&mut rng, 42);
    for split in 1..=RECORD_LEN - 4 {
        assert!(
            matches!(read(mid_write(&older, &newer, split))?, ReadOutcome::Torn(_)),
            "split {} not detected",
            split
        );
    }
    Ok(())
}

#[test]
fn wraparound_of_the_frame_counter_is_detected() -> Result<()> {
    let mut rng = rand::thread_rng();
    let older = sealed(&mut rng, i32::MAX);
    let newer = sealed(&mut rng, i32::MIN);
    for split in 1..=RECORD_LEN - 4 {
        assert!(matches!(
            read(mid_write(&older, &newer, split))?,
            ReadOutcome::Torn(_)
        ));
    }
    Ok(())
}

#[test]
fn retry_loop_returns_only_consistent_records() -> Result<()> {
    let mut rng = rand::thread_rng();
    let older = sealed(&mut rng, 7);
    let newer = sealed(&mut rng, 8);

    let mut torn = ResultReader::new(Cursor::new(mid_write(&older, &newer, 12)));
    assert_eq!(torn.read_consistent(3)?, None);

    let mut whole = ResultReader::new(Cursor::new(newer.to_bytes().to_vec()));
    assert_eq!(whole.read_consistent(3)?, Some(newer));
    Ok(())
}
