//! Rasterized page images.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;
use std::path::Path;

use crate::detect::{detect_kind_from_bytes, mime_from_extension};
use crate::error::{Error, Result};

/// An encoded image of one document page.
#[derive(Clone, PartialEq, Eq)]
pub struct PageImage {
    /// MIME type (e.g., "image/png")
    pub mime_type: String,

    /// Encoded image bytes
    pub data: Vec<u8>,
}

impl PageImage {
    /// Create a new page image.
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }

    /// Create a PNG page image.
    pub fn png(data: Vec<u8>) -> Self {
        Self::new(data, "image/png")
    }

    /// Create a JPEG page image.
    pub fn jpeg(data: Vec<u8>) -> Self {
        Self::new(data, "image/jpeg")
    }

    /// Load an image from disk.
    ///
    /// The MIME type comes from the file signature, falling back to the
    /// extension for formats without a known signature (e.g. PPM).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let mime_type = match detect_kind_from_bytes(&data) {
            Ok(kind) if kind.is_image() => kind.mime_type(),
            _ => path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(mime_from_extension)
                .ok_or_else(|| {
                    Error::Render(format!("Unsupported image format: {}", path.display()))
                })?,
        };
        Ok(Self::new(data, mime_type))
    }

    /// Size of the encoded image in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Base64 encoding of the image bytes.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    /// `data:` URL suitable for inline image parts of an LLM request.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

impl fmt::Debug for PageImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageImage")
            .field("mime_type", &self.mime_type)
            .field("size", &self.data.len())
            .finish()
    }
}
