use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::frame::Frame;
use crate::recognize::result::RecognitionResult;

/// Which recognizer variant is active on a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionMode {
    #[default]
    Barcode,
    Text,
}

impl RecognitionMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "barcode" | "scan" => Some(RecognitionMode::Barcode),
            "text" | "ocr" => Some(RecognitionMode::Text),
            _ => None,
        }
    }
}

/// Symbologies a barcode recognizer may be restricted to.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarcodeFormat {
    QrCode,
    DataMatrix,
    Aztec,
    Pdf417,
    Code128,
    Code39,
    Code93,
    Codabar,
    Ean13,
    Ean8,
    Itf,
    UpcA,
    UpcE,
}

impl BarcodeFormat {
    pub fn parse(value: &str) -> Option<Self> {
        let normalized: String = value
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        let format = match normalized.as_str() {
            "qrcode" | "qr" => BarcodeFormat::QrCode,
            "datamatrix" => BarcodeFormat::DataMatrix,
            "aztec" => BarcodeFormat::Aztec,
            "pdf417" => BarcodeFormat::Pdf417,
            "code128" => BarcodeFormat::Code128,
            "code39" => BarcodeFormat::Code39,
            "code93" => BarcodeFormat::Code93,
            "codabar" => BarcodeFormat::Codabar,
            "ean13" => BarcodeFormat::Ean13,
            "ean8" => BarcodeFormat::Ean8,
            "itf" => BarcodeFormat::Itf,
            "upca" => BarcodeFormat::UpcA,
            "upce" => BarcodeFormat::UpcE,
            _ => return None,
        };
        Some(format)
    }
}

/// Script the text recognizer is tuned for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextScript {
    Latin,
    #[default]
    Chinese,
    Devanagari,
    Japanese,
    Korean,
}

/// Engine options handed to the recognizer before each call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizerOptions {
    /// Restrict barcode decoding to these formats. `None` decodes every format.
    pub barcode_formats: Option<Vec<BarcodeFormat>>,
    pub text_script: TextScript,
}

impl RecognizerOptions {
    pub fn allows_format(&self, format: BarcodeFormat) -> bool {
        match &self.barcode_formats {
            Some(formats) => formats.contains(&format),
            None => true,
        }
    }
}

/// Recognition engine driven by a scan session.
///
/// Barcode and text engines are interchangeable behind this one contract; the session
/// picks the instance registered for its current `RecognitionMode`.
///
/// `recognize` is invoked on a worker thread, one call at a time per session. It may
/// block for as long as the engine needs: the session never times it out, and frames
/// that arrive meanwhile are dropped rather than queued.
pub trait Recognizer: Send {
    /// Engine identifier.
    fn name(&self) -> &'static str;

    /// The variant this engine implements.
    fn mode(&self) -> RecognitionMode;

    /// Apply the session's current options. Called before every `recognize`.
    fn configure(&mut self, _options: &RecognizerOptions) {}

    /// Recognize one frame. The pixel slice must not be retained past the call.
    fn recognize(&mut self, frame: &Frame) -> Result<RecognitionResult>;

    /// Optional warm-up hook, run when the engine becomes active.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_format_aliases() {
        assert_eq!(BarcodeFormat::parse("qr_code"), Some(BarcodeFormat::QrCode));
        assert_eq!(BarcodeFormat::parse("EAN-13"), Some(BarcodeFormat::Ean13));
        assert_eq!(BarcodeFormat::parse("upc_a"), Some(BarcodeFormat::UpcA));
        assert_eq!(BarcodeFormat::parse("hologram"), None);
    }

    #[test]
    fn options_without_filter_allow_everything() {
        let options = RecognizerOptions::default();
        assert!(options.allows_format(BarcodeFormat::Codabar));

        let filtered = RecognizerOptions {
            barcode_formats: Some(vec![BarcodeFormat::Codabar]),
            ..RecognizerOptions::default()
        };
        assert!(filtered.allows_format(BarcodeFormat::Codabar));
        assert!(!filtered.allows_format(BarcodeFormat::QrCode));
    }

    #[test]
    fn parses_modes() {
        assert_eq!(RecognitionMode::parse("Text"), Some(RecognitionMode::Text));
        assert_eq!(RecognitionMode::parse("barcode"), Some(RecognitionMode::Barcode));
        assert_eq!(RecognitionMode::parse("face"), None);
    }
}
