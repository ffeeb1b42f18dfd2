use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};

use crate::error::{GraphError, Result};

/// Single-channel coverage bitmap, row-major, one byte per pixel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coverage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Coverage {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, data: vec![0; width as usize * height as usize] }
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[(y * self.width + x) as usize]
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Turns label text into coverage at a pixel size.
pub trait LabelRasterizer {
    fn rasterize(&self, text: &str, px: f32) -> Coverage;
}

/// [`LabelRasterizer`] over one TrueType/OpenType font.
///
/// Text is laid out on a single line; glyph bitmaps are composed with `max`
/// so overlapping glyphs do not saturate.
pub struct FontRasterizer {
    font: fontdue::Font,
}

impl FontRasterizer {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|e| GraphError::config(format!("font load error: {e}")))?;
        Ok(Self { font })
    }
}

impl LabelRasterizer for FontRasterizer {
    fn rasterize(&self, text: &str, px: f32) -> Coverage {
        let px = px.max(1.0);
        let mut layout: Layout<()> = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings::default());
        layout.append(&[&self.font], &TextStyle::new(text, px, 0));

        let glyphs: Vec<_> = layout
            .glyphs()
            .iter()
            .filter(|g| g.char_data.rasterize() && g.width > 0 && g.height > 0)
            .map(|g| (g.key, g.x, g.y))
            .collect();
        if glyphs.is_empty() {
            return Coverage::default();
        }

        let line = layout.height().max(px).ceil() as u32;
        let mut placed = Vec::with_capacity(glyphs.len());
        let mut width = 0u32;
        let mut height = line;
        for (key, x, y) in glyphs {
            let (metrics, bitmap) = self.font.rasterize_config(key);
            let (gx, gy) = (x.max(0.0).round() as u32, y.max(0.0).round() as u32);
            width = width.max(gx + metrics.width as u32);
            height = height.max(gy + metrics.height as u32);
            placed.push((gx, gy, metrics.width as u32, bitmap));
        }

        let mut out = Coverage::new(width, height);
        for (gx, gy, gw, bitmap) in placed {
            for (row, src) in bitmap.chunks_exact(gw as usize).enumerate() {
                let start = ((gy + row as u32) * width + gx) as usize;
                for (dst, &a) in out.data[start..start + gw as usize].iter_mut().zip(src) {
                    *dst = (*dst).max(a);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_font_is_configuration_error() {
        let err = FontRasterizer::from_bytes(b"not a font").err().unwrap();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
    }

    #[test]
    fn coverage_indexing_is_row_major() {
        let mut c = Coverage::new(3, 2);
        c.data[4] = 9;
        assert_eq!(c.get(1, 1), 9);
        assert!(!c.is_empty());
        assert!(Coverage::default().is_empty());
    }
}
