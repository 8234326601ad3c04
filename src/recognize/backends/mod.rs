pub mod stub;

pub use stub::{StubBarcodeRecognizer, StubTextRecognizer};
