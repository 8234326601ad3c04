use std::sync::Mutex;

use tempfile::NamedTempFile;

use scan_session::config::ScanConfig;
use scan_session::{BarcodeFormat, CameraFacing, RecognitionMode, TextScript};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SCAN_CONFIG",
        "SCAN_MODE",
        "SCAN_CAMERA_URL",
        "SCAN_CAMERA_FACING",
        "SCAN_TARGET_FPS",
        "SCAN_ANALYZE",
        "SCAN_BARCODE_FORMATS",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp config");
    std::io::Write::write_all(&mut file, contents.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_json_config_with_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        ".json",
        r#"{
            "mode": "text",
            "session": {
                "play_feedback": false,
                "torch_on": true
            },
            "camera": {
                "url": "stub://dock_camera",
                "target_fps": 15,
                "width": 800,
                "height": 600,
                "camera_count": 1
            },
            "recognizer": {
                "barcode_formats": ["qr_code", "ean_13"],
                "text_script": "latin"
            },
            "still_max_dimension": 1024
        }"#,
    );

    std::env::set_var("SCAN_CONFIG", file.path());
    std::env::set_var("SCAN_TARGET_FPS", "24");
    std::env::set_var("SCAN_ANALYZE", "off");

    let cfg = ScanConfig::load().expect("load config");

    assert_eq!(cfg.mode, RecognitionMode::Text);
    assert!(!cfg.session.play_feedback);
    assert!(cfg.session.vibrate_on_success);
    assert!(cfg.session.torch_on);
    assert!(!cfg.session.analyze_enabled);
    assert_eq!(cfg.camera.url, "stub://dock_camera");
    assert_eq!(cfg.camera.target_fps, 24);
    assert_eq!((cfg.camera.width, cfg.camera.height), (800, 600));
    assert_eq!(cfg.camera.camera_count, 1);
    assert_eq!(
        cfg.recognizer.barcode_formats,
        Some(vec![BarcodeFormat::QrCode, BarcodeFormat::Ean13])
    );
    assert_eq!(cfg.recognizer.text_script, TextScript::Latin);
    assert_eq!(cfg.still_max_dimension, 1024);

    let settings = cfg.session_settings();
    assert_eq!(settings.mode, RecognitionMode::Text);
    assert_eq!(settings.still_max_dimension, 1024);
    assert_eq!(cfg.synthetic_camera().target_fps, 24);

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        ".toml",
        r#"
mode = "barcode"

[session]
camera_facing = "front"

[camera]
url = "stub://lobby"
target_fps = 5
"#,
    );
    std::env::set_var("SCAN_CONFIG", file.path());
    std::env::set_var("SCAN_BARCODE_FORMATS", "code_128, itf");

    let cfg = ScanConfig::load().expect("load config");
    assert_eq!(cfg.mode, RecognitionMode::Barcode);
    assert_eq!(cfg.session.camera_facing, CameraFacing::Front);
    assert_eq!(cfg.camera.url, "stub://lobby");
    assert_eq!(cfg.camera.target_fps, 5);
    assert_eq!(
        cfg.recognizer.barcode_formats,
        Some(vec![BarcodeFormat::Code128, BarcodeFormat::Itf])
    );

    clear_env();
}

#[test]
fn defaults_apply_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();
    std::env::set_var("SCAN_MODE", "ocr");
    std::env::set_var("SCAN_CAMERA_FACING", "front");

    let cfg = ScanConfig::load().expect("load config");
    assert_eq!(cfg.mode, RecognitionMode::Text);
    assert_eq!(cfg.session.camera_facing, CameraFacing::Front);
    assert_eq!(cfg.camera.url, "stub://rear_camera");
    assert!(cfg.session.analyze_enabled);
    assert_eq!(cfg.recognizer.text_script, TextScript::Chinese);

    clear_env();
}

#[test]
fn rejects_invalid_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();

    clear_env();
    std::env::set_var("SCAN_TARGET_FPS", "0");
    assert!(ScanConfig::load().is_err());

    clear_env();
    std::env::set_var("SCAN_BARCODE_FORMATS", "qr_code,hologram");
    assert!(ScanConfig::load().is_err());

    clear_env();
    std::env::set_var("SCAN_MODE", "faces");
    assert!(ScanConfig::load().is_err());

    clear_env();
    let file = write_config(".json", "{ not json");
    std::env::set_var("SCAN_CONFIG", file.path());
    assert!(ScanConfig::load().is_err());

    clear_env();
}
