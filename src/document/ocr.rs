use anyhow::{anyhow, Result};
use image::ImageFormat;
use std::io::Cursor;
use tesseract::Tesseract;

const OCR_LANGUAGE: &str = "eng";

/// Formats Leptonica decodes on its own; anything else is transcoded first.
fn natively_readable(format: ImageFormat) -> bool {
    matches!(
        format,
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Tiff | ImageFormat::Bmp | ImageFormat::Pnm
    )
}

/// Returns bytes Tesseract can read: the input itself for common formats,
/// a PNG re-encoding otherwise.
pub(crate) fn normalize_image(bytes: &[u8]) -> Result<Vec<u8>> {
    let format = image::guess_format(bytes).map_err(|e| anyhow!("Unrecognized image format: {}", e))?;
    if natively_readable(format) {
        return Ok(bytes.to_vec());
    }

    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| anyhow!("Failed to decode {:?} image: {}", format, e))?;
    let mut png = Vec::new();
    decoded
        .write_to(&mut Cursor::new(&mut png), image::ImageOutputFormat::Png)
        .map_err(|e| anyhow!("Failed to re-encode image as PNG: {}", e))?;
    Ok(png)
}

/// Blocking OCR over in-memory image bytes.
pub(crate) fn recognize(bytes: &[u8]) -> Result<String> {
    let image = normalize_image(bytes)?;

    let mut tesseract = Tesseract::new(None, Some(OCR_LANGUAGE))
        .map_err(|e| anyhow!("Failed to initialize Tesseract: {}", e))?
        .set_image_from_mem(&image)
        .map_err(|e| anyhow!("Tesseract rejected image: {}", e))?;

    tesseract
        .get_text()
        .map_err(|e| anyhow!("OCR failed: {}", e))
}
