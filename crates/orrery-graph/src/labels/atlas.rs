use orrery_engine::gfx::{
    FilterMode, GraphicsContext, Resource, TextureDesc, TextureFormat, TextureId,
};

use crate::error::{GraphError, Result};
use crate::texel::TexelGrid;

use super::rasterizer::{Coverage, LabelRasterizer};
use super::sdf::distance_field_u8;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AtlasConfig {
    /// Empty pixels around every packed bitmap.
    pub margin: u32,
    /// Distance-field radius as a fraction of the pixel font size.
    pub sdf_radius_factor: f32,
    /// Largest atlas side before packing fails.
    pub max_size: u32,
    /// Side of the first packing attempt.
    pub initial_size: u32,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self { margin: 2, sdf_radius_factor: 0.25, max_size: 4096, initial_size: 256 }
    }
}

/// One label to rasterize.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LabelRequest<'a> {
    pub text: &'a str,
    /// Logical pixels.
    pub font_size: f32,
    /// Pre-render a rounded background rectangle.
    pub background: bool,
}

/// Packed rectangle inside the atlas, in atlas pixels.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct LabelBox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// CPU-side atlas: RGBA8 pixels plus one box per label, in request order.
///
/// Channels: R holds the ink distance field (0.5 on the glyph edge), G the
/// background fill coverage, A is opaque.
#[derive(Debug, Clone)]
pub struct LabelAtlas {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub boxes: Vec<LabelBox>,
}

/// GPU copies of an atlas and its per-label metadata.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AtlasTextures {
    /// RGBA8, linearly filtered.
    pub atlas: TextureId,
    /// RGBA32F texel per label: `(x, y, w, h)` of its box.
    pub metadata: TextureId,
}

impl AtlasTextures {
    pub fn release(self, gfx: &mut dyn GraphicsContext) {
        gfx.release(Resource::Texture(self.atlas));
        gfx.release(Resource::Texture(self.metadata));
    }
}

struct Bitmap {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl LabelAtlas {
    /// 1×1 atlas with no boxes, bound by renderables that draw no text.
    pub fn placeholder() -> Self {
        Self { width: 1, height: 1, pixels: vec![0; 4], boxes: Vec::new() }
    }

    /// Rasterizes, distance-fields and shelf-packs every label.
    ///
    /// Zero labels yield a 1×1 atlas with no boxes.
    pub fn build(
        requests: &[LabelRequest<'_>],
        rasterizer: &dyn LabelRasterizer,
        pixel_ratio: f32,
        config: &AtlasConfig,
    ) -> Result<Self> {
        if requests.is_empty() {
            return Ok(Self::placeholder());
        }

        let bitmaps: Vec<Bitmap> = requests
            .iter()
            .map(|r| render_label(r, rasterizer, pixel_ratio, config))
            .collect();

        let sizes: Vec<(u32, u32)> = bitmaps.iter().map(|b| (b.width, b.height)).collect();
        let (width, height, boxes) = pack_shelves(&sizes, config)?;

        let mut pixels = vec![0u8; width as usize * height as usize * 4];
        for (bitmap, b) in bitmaps.iter().zip(&boxes) {
            let row_bytes = b.w as usize * 4;
            for row in 0..b.h as usize {
                let src = &bitmap.rgba[row * row_bytes..(row + 1) * row_bytes];
                let dst = ((b.y as usize + row) * width as usize + b.x as usize) * 4;
                pixels[dst..dst + row_bytes].copy_from_slice(src);
            }
        }

        log::debug!("label atlas: {} labels in {width}x{height}", boxes.len());
        Ok(Self { width, height, pixels, boxes })
    }

    /// `(x, y, w, h)` per label as RGBA32F texels on a [`TexelGrid`].
    pub fn metadata(&self) -> (TexelGrid, Vec<u8>) {
        let grid = TexelGrid::for_count(self.boxes.len());
        let mut texels = vec![[0.0f32; 4]; grid.capacity()];
        for (t, b) in texels.iter_mut().zip(&self.boxes) {
            *t = [b.x as f32, b.y as f32, b.w as f32, b.h as f32];
        }
        (grid, bytemuck::cast_slice(&texels).to_vec())
    }

    pub fn upload(&self, gfx: &mut dyn GraphicsContext) -> Result<AtlasTextures> {
        let atlas = gfx.create_texture(
            &TextureDesc::new("orrery label atlas", self.width, self.height, TextureFormat::Rgba8Unorm)
                .with_filter(FilterMode::Linear),
            Some(&self.pixels),
        )?;
        let (grid, data) = self.metadata();
        let metadata = match gfx.create_texture(
            &TextureDesc::new("orrery label boxes", grid.width, grid.height, TextureFormat::Rgba32Float),
            Some(&data),
        ) {
            Ok(t) => t,
            Err(e) => {
                gfx.release(Resource::Texture(atlas));
                return Err(e.into());
            }
        };
        Ok(AtlasTextures { atlas, metadata })
    }
}

/// Rasterizes at device resolution with symmetric padding and converts the
/// ink to a distance field.
fn render_label(
    request: &LabelRequest<'_>,
    rasterizer: &dyn LabelRasterizer,
    pixel_ratio: f32,
    config: &AtlasConfig,
) -> Bitmap {
    let px = request.font_size * pixel_ratio.max(f32::EPSILON);
    let radius = (px * config.sdf_radius_factor).max(1.0);
    let pad = radius.ceil() as u32;

    let glyphs: Coverage = rasterizer.rasterize(request.text, px);
    let width = glyphs.width + 2 * pad;
    let height = glyphs.height.max(px.ceil() as u32) + 2 * pad;
    let (w, h) = (width as usize, height as usize);

    let mut ink = vec![0u8; w * h];
    for y in 0..glyphs.height {
        for x in 0..glyphs.width {
            ink[(y + pad) as usize * w + (x + pad) as usize] = glyphs.get(x, y);
        }
    }
    let background = if request.background {
        rounded_rect(width, height, pad.max(1) as f32)
    } else {
        vec![0; w * h]
    };

    let field = distance_field_u8(&ink, w, h, radius);
    let mut rgba = Vec::with_capacity(w * h * 4);
    for (d, bg) in field.iter().zip(&background) {
        rgba.extend_from_slice(&[*d, *bg, 0, 255]);
    }
    Bitmap { width, height, rgba }
}

/// Coverage of a rectangle filling `width × height` with corner radius `r`.
fn rounded_rect(width: u32, height: u32, r: f32) -> Vec<u8> {
    let (wf, hf) = (width as f32, height as f32);
    let r = r.min(wf * 0.5).min(hf * 0.5);
    let mut out = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
            let dx = (r - px).max(px - (wf - r)).max(0.0);
            let dy = (r - py).max(py - (hf - r)).max(0.0);
            let outside = (dx * dx + dy * dy).sqrt() - r;
            out.push(((0.5 - outside).clamp(0.0, 1.0) * 255.0).round() as u8);
        }
    }
    out
}

/// Shelf packing: tallest first, left to right, new shelf on overflow.
///
/// The atlas doubles (narrower side first) until everything fits or
/// `max_size` is exceeded.
fn pack_shelves(sizes: &[(u32, u32)], config: &AtlasConfig) -> Result<(u32, u32, Vec<LabelBox>)> {
    let m = config.margin;
    let widest = sizes.iter().map(|s| s.0 + 2 * m).max().unwrap_or(1);
    let mut width = config.initial_size.max(widest).next_power_of_two();
    let mut height = config.initial_size.next_power_of_two();

    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by(|&a, &b| sizes[b].1.cmp(&sizes[a].1));

    loop {
        if width > config.max_size || height > config.max_size {
            return Err(GraphError::AtlasOverflow { max_size: config.max_size });
        }
        if let Some(boxes) = try_pack(sizes, &order, width, height, m) {
            return Ok((width, height, boxes));
        }
        if height < width {
            height *= 2;
        } else {
            width *= 2;
        }
    }
}

fn try_pack(sizes: &[(u32, u32)], order: &[usize], width: u32, height: u32, m: u32) -> Option<Vec<LabelBox>> {
    let mut boxes = vec![LabelBox::default(); sizes.len()];
    let (mut cursor_x, mut shelf_y, mut shelf_h) = (0u32, 0u32, 0u32);

    for &i in order {
        let (w, h) = sizes[i];
        let (cell_w, cell_h) = (w + 2 * m, h + 2 * m);
        if cell_w > width {
            return None;
        }
        if cursor_x + cell_w > width {
            shelf_y += shelf_h;
            cursor_x = 0;
            shelf_h = 0;
        }
        if shelf_y + cell_h > height {
            return None;
        }
        boxes[i] = LabelBox { x: cursor_x + m, y: shelf_y + m, w, h };
        cursor_x += cell_w;
        shelf_h = shelf_h.max(cell_h);
    }
    Some(boxes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use orrery_engine::gfx::HeadlessContext;

    /// Each character is a solid `px/2 × px` block.
    struct Blocks;

    impl LabelRasterizer for Blocks {
        fn rasterize(&self, text: &str, px: f32) -> Coverage {
            let cw = (px / 2.0).ceil() as u32;
            let mut c = Coverage::new(cw * text.chars().count() as u32, px.ceil() as u32);
            c.data.fill(255);
            c
        }
    }

    fn req(text: &str, font_size: f32) -> LabelRequest<'_> {
        LabelRequest { text, font_size, background: false }
    }

    fn overlaps(a: &LabelBox, b: &LabelBox, m: u32) -> bool {
        a.x < b.x + b.w + m && b.x < a.x + a.w + m && a.y < b.y + b.h + m && b.y < a.y + a.h + m
    }

    #[test]
    fn zero_labels_yield_placeholder() {
        let atlas = LabelAtlas::build(&[], &Blocks, 1.0, &AtlasConfig::default()).unwrap();
        assert_eq!((atlas.width, atlas.height), (1, 1));
        let mut gfx = HeadlessContext::new();
        let tex = atlas.upload(&mut gfx).unwrap();
        assert_eq!(gfx.texture_size(tex.atlas).unwrap(), (1, 1));
        assert_eq!(gfx.texture_size(tex.metadata).unwrap(), (1, 1));
    }

    #[test]
    fn boxes_keep_margins_and_stay_inside() {
        let labels = [req("alpha", 12.0), req("b", 20.0), req("gamma ray", 16.0), req("d", 8.0)];
        let config = AtlasConfig::default();
        let atlas = LabelAtlas::build(&labels, &Blocks, 2.0, &config).unwrap();
        for (i, a) in atlas.boxes.iter().enumerate() {
            assert!(a.x >= config.margin && a.y >= config.margin);
            assert!(a.x + a.w + config.margin <= atlas.width);
            assert!(a.y + a.h + config.margin <= atlas.height);
            for b in &atlas.boxes[i + 1..] {
                assert!(!overlaps(a, b, config.margin), "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn atlas_grows_when_shelves_overflow() {
        let labels: Vec<_> = (0..64).map(|_| req("wide label", 24.0)).collect();
        let config = AtlasConfig { initial_size: 64, ..AtlasConfig::default() };
        let atlas = LabelAtlas::build(&labels, &Blocks, 1.0, &config).unwrap();
        assert!(atlas.width > 64 || atlas.height > 64);
        assert!(atlas.width.is_power_of_two() && atlas.height.is_power_of_two());
    }

    #[test]
    fn overflow_is_resource_exhaustion() {
        let labels = [req("too wide for the atlas", 32.0)];
        let config = AtlasConfig { initial_size: 16, max_size: 64, ..AtlasConfig::default() };
        let err = LabelAtlas::build(&labels, &Blocks, 1.0, &config).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ResourceExhaustion);
    }

    #[test]
    fn ink_center_is_inside_and_padding_outside() {
        let atlas = LabelAtlas::build(&[req("x", 16.0)], &Blocks, 1.0, &AtlasConfig::default()).unwrap();
        let b = atlas.boxes[0];
        let px = |x: u32, y: u32| atlas.pixels[((y * atlas.width + x) * 4) as usize];
        assert!(px(b.x + b.w / 2, b.y + b.h / 2) > 128);
        assert!(px(b.x, b.y) < 128);
        assert_eq!(atlas.pixels[((b.y * atlas.width + b.x) * 4 + 1) as usize], 0);
    }

    #[test]
    fn background_fills_green_channel() {
        let labels = [LabelRequest { text: "x", font_size: 16.0, background: true }];
        let atlas = LabelAtlas::build(&labels, &Blocks, 1.0, &AtlasConfig::default()).unwrap();
        let b = atlas.boxes[0];
        let g = |x: u32, y: u32| atlas.pixels[((y * atlas.width + x) * 4 + 1) as usize];
        assert_eq!(g(b.x + b.w / 2, b.y + b.h / 2), 255);
        assert!(g(b.x, b.y) < 255);
    }

    #[test]
    fn metadata_lists_boxes_in_label_order() {
        let atlas = LabelAtlas::build(&[req("ab", 10.0), req("c", 30.0)], &Blocks, 1.0, &AtlasConfig::default())
            .unwrap();
        let (grid, data) = atlas.metadata();
        assert_eq!(grid, TexelGrid { width: 2, height: 1 });
        let texels: Vec<[f32; 4]> = bytemuck::pod_collect_to_vec(&data);
        let b = atlas.boxes[1];
        assert_eq!(texels[1], [b.x as f32, b.y as f32, b.w as f32, b.h as f32]);
        // Taller label is packed first.
        assert_eq!((b.x, b.y), (2, 2));
    }
}
