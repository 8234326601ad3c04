//! Marker-based stub engines.
//!
//! The stubs do not look at image content. They search the pixel buffer for ASCII markers
//! stamped in by the synthetic camera (or by tests):
//!
//! - `STUB-CODE:<format>:<value>` followed by a NUL byte decodes as one barcode.
//! - `STUB-TEXT:<text>` followed by a NUL byte decodes as one text block.

use anyhow::{anyhow, Result};

use crate::frame::Frame;
use crate::recognize::recognizer::{
    BarcodeFormat, RecognitionMode, Recognizer, RecognizerOptions, TextScript,
};
use crate::recognize::result::{
    Barcode, BoundingBox, RecognitionResult, RecognizedText, TextBlock, TextLine,
};

const CODE_MARKER: &[u8] = b"STUB-CODE:";
const TEXT_MARKER: &[u8] = b"STUB-TEXT:";
const FAIL_MARKER: &[u8] = b"STUB-FAIL";
const MARKER_BOX: u32 = 32;

/// Write a barcode marker into `pixels` at `offset`. Returns false if it does not fit.
pub fn stamp_barcode(pixels: &mut [u8], offset: usize, format: &str, value: &str) -> bool {
    let marker = format!("STUB-CODE:{}:{}\0", format, value);
    stamp(pixels, offset, marker.as_bytes())
}

/// Write a text marker into `pixels` at `offset`. Returns false if it does not fit.
pub fn stamp_text(pixels: &mut [u8], offset: usize, text: &str) -> bool {
    let marker = format!("STUB-TEXT:{}\0", text);
    stamp(pixels, offset, marker.as_bytes())
}

/// Make every stub engine fail on this frame.
pub fn stamp_failure(pixels: &mut [u8], offset: usize) -> bool {
    stamp(pixels, offset, FAIL_MARKER)
}

fn stamp(pixels: &mut [u8], offset: usize, marker: &[u8]) -> bool {
    let Some(end) = offset.checked_add(marker.len()) else {
        return false;
    };
    if end > pixels.len() {
        return false;
    }
    pixels[offset..end].copy_from_slice(marker);
    true
}

/// Payloads following `prefix`, with their byte offsets.
fn find_markers<'a>(pixels: &'a [u8], prefix: &[u8]) -> Vec<(usize, &'a [u8])> {
    let mut found = Vec::new();
    let mut i = 0;
    while i + prefix.len() <= pixels.len() {
        if &pixels[i..i + prefix.len()] == prefix {
            let start = i + prefix.len();
            let len = pixels[start..]
                .iter()
                .position(|b| *b == 0)
                .unwrap_or(pixels.len() - start);
            found.push((i, &pixels[start..start + len]));
            i = start + len;
        } else {
            i += 1;
        }
    }
    found
}

fn contains(pixels: &[u8], needle: &[u8]) -> bool {
    pixels.windows(needle.len()).any(|w| w == needle)
}

/// Box around the marker, assuming 3 bytes per pixel.
fn marker_bounds(frame: &Frame, offset: usize) -> BoundingBox {
    let width = frame.width().max(1) as usize;
    let pixel = offset / 3;
    BoundingBox {
        left: (pixel % width) as i32,
        top: (pixel / width) as i32,
        width: MARKER_BOX,
        height: MARKER_BOX,
    }
}

// ----------------------------------------------------------------------------
// Barcode
// ----------------------------------------------------------------------------

/// Stub barcode engine.
#[derive(Default)]
pub struct StubBarcodeRecognizer {
    options: RecognizerOptions,
    calls: u64,
}

impl StubBarcodeRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames this engine has been asked to decode.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl Recognizer for StubBarcodeRecognizer {
    fn name(&self) -> &'static str {
        "stub-barcode"
    }

    fn mode(&self) -> RecognitionMode {
        RecognitionMode::Barcode
    }

    fn configure(&mut self, options: &RecognizerOptions) {
        self.options = options.clone();
    }

    fn recognize(&mut self, frame: &Frame) -> Result<RecognitionResult> {
        self.calls += 1;
        let pixels = frame.pixels();
        if contains(pixels, FAIL_MARKER) {
            return Err(anyhow!("stub-barcode: decoder fault"));
        }

        let mut barcodes = Vec::new();
        for (offset, payload) in find_markers(pixels, CODE_MARKER) {
            let payload = String::from_utf8_lossy(payload);
            let Some((format, value)) = payload.split_once(':') else {
                log::trace!("stub-barcode: malformed marker at {}", offset);
                continue;
            };
            let Some(format) = BarcodeFormat::parse(format) else {
                continue;
            };
            if !self.options.allows_format(format) {
                continue;
            }
            barcodes.push(Barcode {
                raw_value: value.to_string(),
                format,
                bounds: Some(marker_bounds(frame, offset)),
            });
        }

        Ok(RecognitionResult::BarcodeHits { barcodes })
    }
}

// ----------------------------------------------------------------------------
// Text
// ----------------------------------------------------------------------------

/// Stub text engine.
#[derive(Default)]
pub struct StubTextRecognizer {
    script: TextScript,
}

impl StubTextRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self) -> TextScript {
        self.script
    }
}

impl Recognizer for StubTextRecognizer {
    fn name(&self) -> &'static str {
        "stub-text"
    }

    fn mode(&self) -> RecognitionMode {
        RecognitionMode::Text
    }

    fn configure(&mut self, options: &RecognizerOptions) {
        self.script = options.text_script;
    }

    fn recognize(&mut self, frame: &Frame) -> Result<RecognitionResult> {
        let pixels = frame.pixels();
        if contains(pixels, FAIL_MARKER) {
            return Err(anyhow!("stub-text: recognizer fault"));
        }

        let blocks = find_markers(pixels, TEXT_MARKER)
            .into_iter()
            .map(|(offset, payload)| {
                let text = String::from_utf8_lossy(payload).into_owned();
                let bounds = Some(marker_bounds(frame, offset));
                let lines = text
                    .split('\n')
                    .map(|line| TextLine {
                        text: line.to_string(),
                        bounds,
                    })
                    .collect();
                TextBlock {
                    text,
                    bounds,
                    lines,
                }
            })
            .collect();

        Ok(RecognitionResult::RecognizedText(RecognizedText::from_blocks(
            blocks,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{CameraFacing, Rotation};

    fn frame_with(pixels: Vec<u8>) -> Frame {
        Frame::new(pixels, 16, 16, Rotation::Deg0, CameraFacing::Back)
    }

    #[test]
    fn barcode_stub_decodes_markers_in_order() {
        let mut pixels = vec![0u8; 16 * 16 * 3];
        assert!(stamp_barcode(&mut pixels, 0, "qr_code", "first"));
        assert!(stamp_barcode(&mut pixels, 100, "ean13", "4006381333931"));

        let mut engine = StubBarcodeRecognizer::new();
        let result = engine.recognize(&frame_with(pixels)).unwrap();
        let values: Vec<_> = result.barcodes().iter().map(|b| b.raw_value.as_str()).collect();

        assert_eq!(values, vec!["first", "4006381333931"]);
        assert_eq!(result.barcodes()[1].format, BarcodeFormat::Ean13);
        assert_eq!(engine.calls(), 1);
    }

    #[test]
    fn barcode_stub_honors_format_filter() {
        let mut pixels = vec![0u8; 16 * 16 * 3];
        stamp_barcode(&mut pixels, 0, "qr_code", "skip-me");
        stamp_barcode(&mut pixels, 200, "codabar", "A1234B");

        let mut engine = StubBarcodeRecognizer::new();
        engine.configure(&RecognizerOptions {
            barcode_formats: Some(vec![BarcodeFormat::Codabar]),
            ..RecognizerOptions::default()
        });
        let result = engine.recognize(&frame_with(pixels)).unwrap();

        assert_eq!(result.barcodes().len(), 1);
        assert_eq!(result.barcodes()[0].raw_value, "A1234B");
    }

    #[test]
    fn blank_frame_yields_empty_result() {
        let mut engine = StubBarcodeRecognizer::new();
        let result = engine.recognize(&frame_with(vec![7u8; 64])).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn text_stub_builds_blocks() {
        let mut pixels = vec![0u8; 16 * 16 * 3];
        stamp_text(&mut pixels, 3, "hello");
        stamp_text(&mut pixels, 300, "world");

        let mut engine = StubTextRecognizer::new();
        engine.configure(&RecognizerOptions {
            text_script: TextScript::Latin,
            ..RecognizerOptions::default()
        });
        let result = engine.recognize(&frame_with(pixels)).unwrap();
        let text = result.text().unwrap();

        assert_eq!(text.text, "hello\nworld");
        assert_eq!(text.blocks.len(), 2);
        assert_eq!(text.blocks[0].bounds.unwrap().left, 1);
        assert_eq!(engine.script(), TextScript::Latin);
    }

    #[test]
    fn failure_marker_fails_both_engines() {
        let mut pixels = vec![0u8; 64];
        assert!(stamp_failure(&mut pixels, 10));

        assert!(StubBarcodeRecognizer::new()
            .recognize(&frame_with(pixels.clone()))
            .is_err());
        assert!(StubTextRecognizer::new()
            .recognize(&frame_with(pixels))
            .is_err());
    }

    #[test]
    fn stamp_rejects_overflow() {
        let mut pixels = vec![0u8; 8];
        assert!(!stamp_text(&mut pixels, 0, "too long for buffer"));
    }
}
