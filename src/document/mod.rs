mod ocr;
mod processor;

pub use processor::{decode_text, DocumentKind, TextExtractor};
