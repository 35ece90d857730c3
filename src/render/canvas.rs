//! RGB raster canvas with PNG export

use super::font::{self, GLYPH_ADVANCE, GLYPH_HEIGHT, GLYPH_WIDTH};
use super::RenderError;

pub type Rgb = [u8; 3];

pub const WHITE: Rgb = [255, 255, 255];

/// 8-bit RGB image, row-major
#[derive(Debug, Clone)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Rgb) -> Self {
        let pixels = background
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        Self { width, height, pixels }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y * self.width + x) * 3) as usize;
        Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]])
    }

    pub fn set_pixel(&mut self, x: i64, y: i64, color: Rgb) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let i = ((y as u32 * self.width + x as u32) * 3) as usize;
        self.pixels[i..i + 3].copy_from_slice(&color);
    }

    /// Fill `[x0, x1) x [y0, y1)`, clipped to the canvas.
    pub fn fill_rect(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb) {
        let (x0, x1) = (x0.max(0), x1.min(self.width as i64));
        let (y0, y1) = (y0.max(0), y1.min(self.height as i64));
        for y in y0..y1 {
            for x in x0..x1 {
                self.set_pixel(x, y, color);
            }
        }
    }

    pub fn hline(&mut self, x0: i64, x1: i64, y: i64, color: Rgb) {
        self.fill_rect(x0.min(x1), y, x0.max(x1) + 1, y + 1, color);
    }

    pub fn vline(&mut self, x: i64, y0: i64, y1: i64, color: Rgb) {
        self.fill_rect(x, y0.min(y1), x + 1, y0.max(y1) + 1, color);
    }

    /// Draw `text` with its top-left corner at (x, y).
    pub fn draw_text(&mut self, x: i64, y: i64, text: &str, scale: u32, color: Rgb) {
        let s = scale as i64;
        for (n, c) in text.chars().enumerate() {
            let Some(rows) = font::glyph(c) else { continue };
            let origin = x + n as i64 * GLYPH_ADVANCE as i64 * s;
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if bits & (1 << (GLYPH_WIDTH - 1 - col)) != 0 {
                        let px = origin + col as i64 * s;
                        let py = y + row as i64 * s;
                        self.fill_rect(px, py, px + s, py + s, color);
                    }
                }
            }
        }
    }

    /// Draw `text` horizontally centered on `cx`.
    pub fn draw_text_centered(&mut self, cx: i64, y: i64, text: &str, scale: u32, color: Rgb) {
        let w = font::text_width(text, scale) as i64;
        self.draw_text(cx - w / 2, y, text, scale, color);
    }

    pub fn text_height(scale: u32) -> u32 {
        GLYPH_HEIGHT * scale
    }

    /// Encode as an 8-bit RGB PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>, RenderError> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, self.width, self.height);
            encoder.set_color(png::ColorType::Rgb);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(&self.pixels)?;
            writer.finish()?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgb = [0, 0, 0];

    #[test]
    fn test_fill_rect_clips() {
        let mut canvas = Canvas::new(4, 3, WHITE);
        canvas.fill_rect(-5, -5, 2, 2, BLACK);
        assert_eq!(canvas.pixel(0, 0), Some(BLACK));
        assert_eq!(canvas.pixel(1, 1), Some(BLACK));
        assert_eq!(canvas.pixel(2, 1), Some(WHITE));
        assert_eq!(canvas.pixel(0, 2), Some(WHITE));
        assert_eq!(canvas.pixel(4, 0), None);
    }

    #[test]
    fn test_draw_text_marks_pixels() {
        let mut canvas = Canvas::new(20, 10, WHITE);
        canvas.draw_text(0, 0, "1", 1, BLACK);
        // Top row of '1' is a single pixel in the middle column.
        assert_eq!(canvas.pixel(2, 0), Some(BLACK));
        assert_eq!(canvas.pixel(0, 0), Some(WHITE));
    }

    #[test]
    fn test_encode_png_signature() {
        let canvas = Canvas::new(8, 8, WHITE);
        let bytes = canvas.encode_png().unwrap();
        assert_eq!(&bytes[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }
}
