use std::sync::Mutex;

use tempfile::NamedTempFile;

use stanchion_vision::config::VisionConfig;
use stanchion_vision::{CropRegion, Kernel, Roi, SelectionMode, TargetColor};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "STANCHION_CONFIG",
        "STANCHION_RANGES_PATH",
        "STANCHION_RESULT_PATH",
        "STANCHION_CAMERA",
        "STANCHION_OUTPUT_DIR",
        "STANCHION_DUMP_EVERY",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = VisionConfig::load().expect("load config");
    assert_eq!(cfg.ranges_path.to_str(), Some("values.txt"));
    assert_eq!(cfg.result_path.to_str(), Some("/dev/shm/stanchion.dat"));
    assert_eq!(cfg.output_dir.to_str(), Some("/dev/shm"));
    assert_eq!(cfg.camera.device, "/dev/video0");
    assert_eq!(cfg.dump_every, None);
    assert_eq!(cfg.retry.initial.as_millis(), 100);
    assert_eq!(cfg.retry.max.as_millis(), 2000);
    assert_eq!(
        cfg.detector.selection.priority,
        vec![TargetColor::Yellow, TargetColor::Red]
    );
    assert_eq!(cfg.detector.crop, CropRegion::BottomMargin(40));
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"{
            "ranges_path": "/etc/stanchion/values.txt",
            "result_path": "/run/stanchion.dat",
            "dump_every": 50,
            "camera": {
                "device": "/dev/video2",
                "width": 640,
                "height": 480,
                "target_fps": 15
            },
            "detector": {
                "crop": { "fixed": { "x": 0, "y": 10, "width": 640, "height": 400 } },
                "blur": 5,
                "policy": { "min_height": 30, "max_center_offset": 80 },
                "selection": { "priority": ["red", "yellow"], "mode": "tallest_across_colors" },
                "tunables": {
                    "poly_epsilon": 8.0,
                    "erode_kernel": { "width": 3, "height": 3 },
                    "dilate_kernel": { "width": 7, "height": 7 }
                }
            },
            "retry": { "initial_ms": 50, "max_ms": 1000 }
        }"#,
    );

    std::env::set_var("STANCHION_CONFIG", file.path());
    std::env::set_var("STANCHION_CAMERA", "stub://bench");
    std::env::set_var("STANCHION_DUMP_EVERY", "25");

    let cfg = VisionConfig::load().expect("load config");

    assert_eq!(cfg.ranges_path.to_str(), Some("/etc/stanchion/values.txt"));
    assert_eq!(cfg.result_path.to_str(), Some("/run/stanchion.dat"));
    assert_eq!(cfg.camera.device, "stub://bench");
    assert_eq!((cfg.camera.width, cfg.camera.height), (640, 480));
    assert_eq!(cfg.camera.target_fps, 15);
    assert_eq!(cfg.dump_every, Some(25));
    assert_eq!(cfg.detector.crop, CropRegion::Fixed(Roi::new(0, 10, 640, 400)));
    assert_eq!(cfg.detector.blur, Some(5));
    assert_eq!(cfg.detector.policy.min_height, 30);
    assert_eq!(cfg.detector.policy.max_center_offset, 80);
    // fields left out keep their defaults
    assert_eq!(cfg.detector.policy.min_width, 15);
    assert_eq!(cfg.detector.selection.mode, SelectionMode::TallestAcrossColors);
    assert_eq!(cfg.detector.tunables.dilate_kernel, Kernel::square(7));
    assert_eq!(cfg.detector.tunables.red_wrap_hue, 10);
    assert_eq!(cfg.retry.initial.as_millis(), 50);

    clear_env();
}

#[test]
fn rejects_dilate_kernel_smaller_than_erode() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"{
            "detector": {
                "tunables": {
                    "erode_kernel": { "width": 5, "height": 5 },
                    "dilate_kernel": { "width": 3, "height": 3 }
                }
            }
        }"#,
    );
    std::env::set_var("STANCHION_CONFIG", file.path());
    assert!(VisionConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_zero_frame_size_and_bad_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(r#"{ "camera": { "width": 0 } }"#);
    std::env::set_var("STANCHION_CONFIG", file.path());
    assert!(VisionConfig::load().is_err());
    std::env::remove_var("STANCHION_CONFIG");

    std::env::set_var("STANCHION_DUMP_EVERY", "often");
    assert!(VisionConfig::load().is_err());
    std::env::set_var("STANCHION_DUMP_EVERY", "0");
    assert!(VisionConfig::load().is_err());

    clear_env();
}

#[test]
fn malformed_json_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config("{ not json");
    std::env::set_var("STANCHION_CONFIG", file.path());
    assert!(VisionConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_crop_outside_camera_frame() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"{
            "camera": { "width": 320, "height": 240 },
            "detector": { "crop": { "fixed": { "x": 0, "y": 0, "width": 640, "height": 400 } } }
        }"#,
    );
    std::env::set_var("STANCHION_CONFIG", file.path());
    assert!(VisionConfig::load().is_err());

    let file = write_config(
        r#"{
            "camera": { "width": 640, "height": 480 },
            "detector": { "crop": { "bottom_margin": 60 } }
        }"#,
    );
    std::env::set_var("STANCHION_CONFIG", file.path());
    let cfg = VisionConfig::load().expect("margin fits");
    assert_eq!(cfg.detector.crop, CropRegion::BottomMargin(60));

    clear_env();
}
