use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use super::ocr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Image,
    Text,
}

impl DocumentKind {
    /// Guesses the kind from a file extension; unknown extensions are text.
    pub fn from_filename(filename: &str) -> Self {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        match extension.as_deref() {
            Some("pdf") => Self::Pdf,
            Some("png" | "jpg" | "jpeg" | "webp" | "bmp" | "gif" | "tif" | "tiff") => Self::Image,
            _ => Self::Text,
        }
    }
}

/// UTF-8 decoding that drops invalid byte sequences instead of replacing them.
pub fn decode_text(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

/// Converts uploaded bytes to plain text. Extraction never fails from the
/// caller's point of view: unreadable input and empty documents both come
/// back as an empty string, and the cause is logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextExtractor;

impl TextExtractor {
    pub fn new() -> Self {
        Self
    }

    pub async fn extract(&self, bytes: Vec<u8>, kind: DocumentKind) -> String {
        let size = bytes.len();
        let text = match kind {
            DocumentKind::Text => decode_text(&bytes),
            DocumentKind::Pdf => run_blocking("pdf", move || {
                pdf_extract::extract_text_from_mem(&bytes).map_err(|e| anyhow::anyhow!("PDF parse failed: {}", e))
            })
            .await,
            DocumentKind::Image => run_blocking("ocr", move || ocr::recognize(&bytes)).await,
        };

        debug!(?kind, bytes = size, chars = text.chars().count(), "Extracted text");
        text.trim().to_string()
    }
}

/// Runs a parser on the blocking pool. Errors and panics both yield "".
async fn run_blocking<F>(stage: &'static str, job: F) -> String
where
    F: FnOnce() -> anyhow::Result<String> + Send + 'static,
{
    match tokio::task::spawn_blocking(job).await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!(stage, error = %e, "Text extraction failed");
            String::new()
        }
        Err(e) => {
            warn!(stage, error = %e, "Text extraction task panicked");
            String::new()
        }
    }
}
