use serde::Serialize;

use crate::recognize::recognizer::{BarcodeFormat, RecognitionMode};

/// Axis-aligned box in frame pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

/// One decoded symbol.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Barcode {
    pub raw_value: String,
    pub format: BarcodeFormat,
    pub bounds: Option<BoundingBox>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TextLine {
    pub text: String,
    pub bounds: Option<BoundingBox>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TextBlock {
    pub text: String,
    pub bounds: Option<BoundingBox>,
    pub lines: Vec<TextLine>,
}

/// Structured output of a text recognizer.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RecognizedText {
    /// Full text, blocks joined by newlines.
    pub text: String,
    pub blocks: Vec<TextBlock>,
}

impl RecognizedText {
    pub fn from_blocks(blocks: Vec<TextBlock>) -> Self {
        let text = blocks
            .iter()
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Self { text, blocks }
    }
}

/// Result of one recognizer call.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecognitionResult {
    /// Decoded symbols in the order the engine reported them.
    BarcodeHits { barcodes: Vec<Barcode> },
    RecognizedText(RecognizedText),
}

impl RecognitionResult {
    pub fn mode(&self) -> RecognitionMode {
        match self {
            RecognitionResult::BarcodeHits { .. } => RecognitionMode::Barcode,
            RecognitionResult::RecognizedText(_) => RecognitionMode::Text,
        }
    }

    /// Empty results are still delivered but never trigger feedback.
    pub fn is_empty(&self) -> bool {
        match self {
            RecognitionResult::BarcodeHits { barcodes } => barcodes.is_empty(),
            RecognitionResult::RecognizedText(text) => text.text.is_empty(),
        }
    }

    pub fn barcodes(&self) -> &[Barcode] {
        match self {
            RecognitionResult::BarcodeHits { barcodes } => barcodes,
            RecognitionResult::RecognizedText(_) => &[],
        }
    }

    pub fn text(&self) -> Option<&RecognizedText> {
        match self {
            RecognitionResult::RecognizedText(text) => Some(text),
            RecognitionResult::BarcodeHits { .. } => None,
        }
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        match self {
            RecognitionResult::BarcodeHits { barcodes } => barcodes
                .iter()
                .map(|b| format!("{:?}:{}", b.format, b.raw_value))
                .collect::<Vec<_>>()
                .join(", "),
            RecognitionResult::RecognizedText(text) => text.text.replace('\n', " / "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emptiness_follows_payload() {
        let empty = RecognitionResult::BarcodeHits { barcodes: vec![] };
        assert!(empty.is_empty());

        let hit = RecognitionResult::BarcodeHits {
            barcodes: vec![Barcode {
                raw_value: "4006381333931".into(),
                format: BarcodeFormat::Ean13,
                bounds: None,
            }],
        };
        assert!(!hit.is_empty());
        assert_eq!(hit.summary(), "Ean13:4006381333931");

        let blank_text = RecognitionResult::RecognizedText(RecognizedText::default());
        assert!(blank_text.is_empty());
        assert_eq!(blank_text.mode(), RecognitionMode::Text);
    }

    #[test]
    fn text_joins_blocks() {
        let text = RecognizedText::from_blocks(vec![
            TextBlock {
                text: "first".into(),
                bounds: None,
                lines: vec![],
            },
            TextBlock {
                text: "second".into(),
                bounds: None,
                lines: vec![],
            },
        ]);
        assert_eq!(text.text, "first\nsecond");
    }
}
