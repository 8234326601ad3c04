use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

use crate::frame::CameraFacing;
use crate::ingest::SyntheticCameraConfig;
use crate::recognize::{BarcodeFormat, RecognitionMode, RecognizerOptions, TextScript};
use crate::session::{SessionConfig, SessionSettings, DEFAULT_STILL_MAX_DIMENSION};

const DEFAULT_CAMERA_URL: &str = "stub://rear_camera";
const DEFAULT_TARGET_FPS: u32 = 10;
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_CAMERA_COUNT: usize = 2;
const DEFAULT_HIT_EVERY: u64 = 30;

#[derive(Debug, Deserialize, Default)]
struct ScanConfigFile {
    mode: Option<String>,
    session: Option<SessionConfig>,
    camera: Option<CameraConfigFile>,
    recognizer: Option<RecognizerConfigFile>,
    still_max_dimension: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    camera_count: Option<usize>,
    has_torch: Option<bool>,
    hit_every: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct RecognizerConfigFile {
    barcode_formats: Option<Vec<String>>,
    text_script: Option<TextScript>,
}

/// Host configuration for `scand`.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub mode: RecognitionMode,
    pub session: SessionConfig,
    pub camera: CameraSettings,
    pub recognizer: RecognizerOptions,
    pub still_max_dimension: u32,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub url: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
    pub camera_count: usize,
    pub has_torch: bool,
    pub hit_every: u64,
}

impl ScanConfig {
    /// Defaults, then the file named by `SCAN_CONFIG`, then `SCAN_*` overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SCAN_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ScanConfigFile) -> Result<Self> {
        let mode = match file.mode.as_deref() {
            Some(mode) => parse_mode(mode)?,
            None => RecognitionMode::default(),
        };
        let camera = file.camera.unwrap_or_default();
        let camera = CameraSettings {
            url: camera
                .url
                .unwrap_or_else(|| DEFAULT_CAMERA_URL.to_string()),
            target_fps: camera.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
            width: camera.width.unwrap_or(DEFAULT_WIDTH),
            height: camera.height.unwrap_or(DEFAULT_HEIGHT),
            camera_count: camera.camera_count.unwrap_or(DEFAULT_CAMERA_COUNT),
            has_torch: camera.has_torch.unwrap_or(true),
            hit_every: camera.hit_every.unwrap_or(DEFAULT_HIT_EVERY),
        };
        let recognizer_file = file.recognizer.unwrap_or_default();
        let barcode_formats = recognizer_file
            .barcode_formats
            .map(|names| parse_formats(&names))
            .transpose()?;
        let recognizer = RecognizerOptions {
            barcode_formats,
            text_script: recognizer_file.text_script.unwrap_or_default(),
        };
        Ok(Self {
            mode,
            session: file.session.unwrap_or_default(),
            camera,
            recognizer,
            still_max_dimension: file
                .still_max_dimension
                .unwrap_or(DEFAULT_STILL_MAX_DIMENSION),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(mode) = std::env::var("SCAN_MODE") {
            if !mode.trim().is_empty() {
                self.mode = parse_mode(&mode)?;
            }
        }
        if let Ok(url) = std::env::var("SCAN_CAMERA_URL") {
            if !url.trim().is_empty() {
                self.camera.url = url;
            }
        }
        if let Ok(facing) = std::env::var("SCAN_CAMERA_FACING") {
            if !facing.trim().is_empty() {
                self.session.camera_facing = CameraFacing::parse(&facing)
                    .ok_or_else(|| anyhow!("SCAN_CAMERA_FACING must be front or back"))?;
            }
        }
        if let Ok(fps) = std::env::var("SCAN_TARGET_FPS") {
            self.camera.target_fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("SCAN_TARGET_FPS must be an integer"))?;
        }
        if let Ok(analyze) = std::env::var("SCAN_ANALYZE") {
            self.session.analyze_enabled = parse_bool(&analyze)
                .ok_or_else(|| anyhow!("SCAN_ANALYZE must be true or false"))?;
        }
        if let Ok(formats) = std::env::var("SCAN_BARCODE_FORMATS") {
            let names = split_csv(&formats);
            if !names.is_empty() {
                self.recognizer.barcode_formats = Some(parse_formats(&names)?);
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.camera.url.trim().is_empty() {
            return Err(anyhow!("camera url must not be empty"));
        }
        if self.camera.target_fps == 0 {
            return Err(anyhow!("camera target_fps must be greater than zero"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera dimensions must be non-zero"));
        }
        if self.camera.camera_count == 0 {
            return Err(anyhow!("camera_count must be at least 1"));
        }
        if self.still_max_dimension == 0 {
            return Err(anyhow!("still_max_dimension must be greater than zero"));
        }
        if let Some(formats) = &self.recognizer.barcode_formats {
            if formats.is_empty() {
                return Err(anyhow!("barcode_formats must list at least one format"));
            }
        }
        Ok(())
    }

    /// Settings for `ScanSession::new`.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            mode: self.mode,
            config: self.session.clone(),
            recognizer_options: self.recognizer.clone(),
            still_max_dimension: self.still_max_dimension,
        }
    }

    pub fn synthetic_camera(&self) -> SyntheticCameraConfig {
        SyntheticCameraConfig {
            url: self.camera.url.clone(),
            target_fps: self.camera.target_fps,
            width: self.camera.width,
            height: self.camera.height,
            camera_count: self.camera.camera_count,
            has_torch: self.camera.has_torch,
            hit_every: self.camera.hit_every,
        }
    }
}

fn read_config_file(path: &Path) -> Result<ScanConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_mode(value: &str) -> Result<RecognitionMode> {
    RecognitionMode::parse(value).ok_or_else(|| anyhow!("unknown recognition mode '{}'", value))
}

fn parse_formats(names: &[String]) -> Result<Vec<BarcodeFormat>> {
    names
        .iter()
        .map(|name| {
            BarcodeFormat::parse(name).ok_or_else(|| anyhow!("unknown barcode format '{}'", name))
        })
        .collect()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() {
        let cfg = ScanConfig::from_file(ScanConfigFile::default()).unwrap();
        assert_eq!(cfg.mode, RecognitionMode::Barcode);
        assert_eq!(cfg.camera.url, DEFAULT_CAMERA_URL);
        assert_eq!(cfg.camera.target_fps, DEFAULT_TARGET_FPS);
        assert!(cfg.session.analyze_enabled);
        assert!(cfg.recognizer.barcode_formats.is_none());
        assert_eq!(cfg.still_max_dimension, DEFAULT_STILL_MAX_DIMENSION);
        cfg.validate().unwrap();
    }

    #[test]
    fn unknown_format_is_rejected() {
        let file = ScanConfigFile {
            recognizer: Some(RecognizerConfigFile {
                barcode_formats: Some(vec!["qr_code".into(), "hologram".into()]),
                text_script: None,
            }),
            ..ScanConfigFile::default()
        };
        assert!(ScanConfig::from_file(file).is_err());
    }

    #[test]
    fn zero_fps_fails_validation() {
        let mut cfg = ScanConfig::from_file(ScanConfigFile::default()).unwrap();
        cfg.camera.target_fps = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bools_accept_common_spellings() {
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
