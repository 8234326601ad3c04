mod backends;
mod recognizer;
mod registry;
mod result;

pub use backends::stub;
pub use backends::{StubBarcodeRecognizer, StubTextRecognizer};
pub use recognizer::{BarcodeFormat, RecognitionMode, Recognizer, RecognizerOptions, TextScript};
pub use registry::{RecognizerRegistry, SharedRecognizer};
pub use result::{
    Barcode, BoundingBox, RecognitionResult, RecognizedText, TextBlock, TextLine,
};
