//! Document format detection from magic bytes.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Kind of document accepted by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// Multi-page PDF
    Pdf,
    /// PNG image
    Png,
    /// JPEG image
    Jpeg,
    /// TIFF image (little or big endian)
    Tiff,
}

impl DocumentKind {
    /// MIME type used when sending the document to a service.
    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::Png => "image/png",
            DocumentKind::Jpeg => "image/jpeg",
            DocumentKind::Tiff => "image/tiff",
        }
    }

    /// Whether the document is a single raster image.
    pub fn is_image(&self) -> bool {
        !matches!(self, DocumentKind::Pdf)
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DocumentKind::Pdf => "PDF",
            DocumentKind::Png => "PNG",
            DocumentKind::Jpeg => "JPEG",
            DocumentKind::Tiff => "TIFF",
        };
        f.write_str(name)
    }
}

const PDF_MAGIC: &[u8] = b"%PDF-";
const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_MAGIC: &[u8] = b"\xff\xd8\xff";
const TIFF_LE_MAGIC: &[u8] = b"II*\x00";
const TIFF_BE_MAGIC: &[u8] = b"MM\x00*";

/// Detect the document kind of a file.
///
/// # Example
/// ```no_run
/// use compextract::detect::detect_kind_from_path;
///
/// let kind = detect_kind_from_path("patent.pdf").unwrap();
/// println!("{}", kind);
/// ```
pub fn detect_kind_from_path<P: AsRef<Path>>(path: P) -> Result<DocumentKind> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut header = Vec::with_capacity(16);
    reader.take(16).read_to_end(&mut header)?;
    detect_kind_from_bytes(&header)
}

/// Detect the document kind from the leading bytes of a file.
///
/// Returns `Error::UnknownFormat` if no known signature matches.
pub fn detect_kind_from_bytes(data: &[u8]) -> Result<DocumentKind> {
    if data.starts_with(PDF_MAGIC) {
        Ok(DocumentKind::Pdf)
    } else if data.starts_with(PNG_MAGIC) {
        Ok(DocumentKind::Png)
    } else if data.starts_with(JPEG_MAGIC) {
        Ok(DocumentKind::Jpeg)
    } else if data.starts_with(TIFF_LE_MAGIC) || data.starts_with(TIFF_BE_MAGIC) {
        Ok(DocumentKind::Tiff)
    } else {
        Err(Error::UnknownFormat)
    }
}

/// Map a file extension to a MIME type for page images.
pub fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "ppm" => Some("image/x-portable-pixmap"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}
