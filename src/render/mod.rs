//! Rendering - landing page HTML and force plot images

pub mod canvas;
pub mod font;
pub mod force_plot;
pub mod page;

pub use force_plot::ForcePlot;
pub use page::LandingPage;

use base64::{engine::general_purpose::STANDARD, Engine as _};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("png encoding failed: {0}")]
    Encode(#[from] png::EncodingError),
}

/// Embed PNG bytes as a `data:` URI.
pub fn png_data_uri(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}
