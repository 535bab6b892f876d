//! Output rendering and page rasterization.

mod json;
mod raster;
mod text;

pub use json::{to_json, JsonFormat};
pub use raster::{fetch_source, PageRasterizer, PopplerRasterizer, DEFAULT_DPI};
pub use text::{format_bounds, to_text};
