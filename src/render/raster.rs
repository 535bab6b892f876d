//! Page rasterization for the vision prompts.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use crate::detect::{detect_kind_from_bytes, DocumentKind};
use crate::error::{Error, Result};
use crate::model::{DocumentSource, PageImage};

/// Default rendering resolution in DPI.
pub const DEFAULT_DPI: u32 = 150;

/// Renders every page of a document to an image.
pub trait PageRasterizer: Send + Sync {
    /// Render pages in page order; image `i` belongs to page `i + 1`.
    fn rasterize(&self, source: &DocumentSource, dpi: u32) -> Result<Vec<PageImage>>;
}

/// Rasterizer backed by poppler's `pdftoppm`.
///
/// Image inputs are passed through as a single page.
#[derive(Debug, Clone)]
pub struct PopplerRasterizer {
    program: PathBuf,
}

impl Default for PopplerRasterizer {
    fn default() -> Self {
        Self {
            program: PathBuf::from("pdftoppm"),
        }
    }
}

impl PopplerRasterizer {
    /// Create a rasterizer that runs `pdftoppm` from `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific `pdftoppm` binary.
    pub fn with_program<P: AsRef<Path>>(mut self, program: P) -> Self {
        self.program = program.as_ref().to_path_buf();
        self
    }

    fn render_pdf(&self, data: &[u8], dpi: u32) -> Result<Vec<PageImage>> {
        let dir = TempDir::new()?;
        let input = dir.path().join("input.pdf");
        fs::write(&input, data)?;
        let prefix = dir.path().join("page");

        let output = Command::new(&self.program)
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-png")
            .arg(&input)
            .arg(&prefix)
            .output()
            .map_err(|e| {
                Error::Render(format!("failed to run {}: {}", self.program.display(), e))
            })?;

        if !output.status.success() {
            return Err(Error::Render(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        // pdftoppm zero-pads page numbers to the width of the page count.
        let mut pages: Vec<(u32, PathBuf)> = fs::read_dir(dir.path())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter_map(|path| page_number(&path).map(|n| (n, path)))
            .collect();
        pages.sort_by_key(|(n, _)| *n);

        let images = pages
            .into_iter()
            .map(|(_, path)| fs::read(path).map(PageImage::png))
            .collect::<std::io::Result<Vec<_>>>()?;
        log::debug!("Rendered {} page(s) at {} dpi", images.len(), dpi);
        Ok(images)
    }
}

fn page_number(path: &Path) -> Option<u32> {
    if path.extension()? != "png" {
        return None;
    }
    path.file_stem()?
        .to_str()?
        .strip_prefix("page-")?
        .parse()
        .ok()
}

/// Read the bytes of a document source.
pub fn fetch_source(source: &DocumentSource) -> Result<Vec<u8>> {
    match source {
        DocumentSource::Path(path) => Ok(fs::read(path)?),
        #[cfg(feature = "http")]
        DocumentSource::Url(url) => {
            log::debug!("Downloading {}", url);
            let response = reqwest::blocking::get(url.as_str())?.error_for_status()?;
            Ok(response.bytes()?.to_vec())
        }
        #[cfg(not(feature = "http"))]
        DocumentSource::Url(url) => Err(Error::Render(format!(
            "cannot download {} without the http feature",
            url
        ))),
    }
}

impl PageRasterizer for PopplerRasterizer {
    fn rasterize(&self, source: &DocumentSource, dpi: u32) -> Result<Vec<PageImage>> {
        let data = fetch_source(source)?;
        match detect_kind_from_bytes(&data)? {
            DocumentKind::Pdf => self.render_pdf(&data, dpi),
            kind => Ok(vec![PageImage::new(data, kind.mime_type())]),
        }
    }
}
