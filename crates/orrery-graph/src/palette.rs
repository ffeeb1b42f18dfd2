use std::collections::HashMap;

use orrery_engine::coords::ColorRgba;
use orrery_engine::gfx::{GraphicsContext, Resource, TextureDesc, TextureFormat, TextureId};

use crate::error::Result;
use crate::texel::TexelGrid;

/// Append-only color table owned by one viewport.
///
/// Colors are deduplicated on their RGBA8 value; once registered, an index
/// never changes. The GPU copy is an RGBA8 texture on a [`TexelGrid`] that is
/// re-uploaded lazily by [`Palette::sync`].
#[derive(Debug, Default)]
pub struct Palette {
    colors: Vec<[u8; 4]>,
    index: HashMap<[u8; 4], u32>,
    texture: Option<TextureId>,
    grid: Option<TexelGrid>,
    dirty: bool,
}

impl Palette {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `color`, registering it on first use.
    pub fn register(&mut self, color: ColorRgba) -> u32 {
        let rgba = color.to_rgba8();
        if let Some(&i) = self.index.get(&rgba) {
            return i;
        }
        let i = self.colors.len() as u32;
        self.colors.push(rgba);
        self.index.insert(rgba, i);
        self.dirty = true;
        i
    }

    pub fn register_all(&mut self, colors: &[ColorRgba]) -> Vec<u32> {
        colors.iter().map(|&c| self.register(c)).collect()
    }

    pub fn get(&self, index: u32) -> Option<ColorRgba> {
        self.colors
            .get(index as usize)
            .map(|&[r, g, b, a]| ColorRgba::from_rgba8(r, g, b, a))
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Uploads pending colors, creating or growing the texture as needed.
    pub fn sync(&mut self, gfx: &mut dyn GraphicsContext) -> Result<TextureId> {
        if let (Some(texture), false) = (self.texture, self.dirty) {
            return Ok(texture);
        }

        let needed = TexelGrid::for_count(self.colors.len());
        // Grow geometrically; never shrink.
        let grid = match self.grid {
            Some(g) if g.capacity() >= self.colors.len() => g,
            _ => needed,
        };
        let mut data: Vec<u8> = Vec::with_capacity(grid.capacity() * 4);
        for rgba in &self.colors {
            data.extend_from_slice(rgba);
        }
        data.resize(grid.capacity() * 4, 0);

        let texture = match self.texture {
            None => gfx.create_texture(
                &TextureDesc::new("orrery palette", grid.width, grid.height, TextureFormat::Rgba8Unorm),
                Some(&data),
            )?,
            Some(t) if Some(grid) != self.grid => {
                gfx.resize_texture(t, grid.width, grid.height, Some(&data))?;
                t
            }
            Some(t) => {
                gfx.write_texture(t, &data)?;
                t
            }
        };

        log::debug!("palette: {} colors in {}x{}", self.colors.len(), grid.width, grid.height);
        self.texture = Some(texture);
        self.grid = Some(grid);
        self.dirty = false;
        Ok(texture)
    }

    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    pub fn destroy(&mut self, gfx: &mut dyn GraphicsContext) {
        if let Some(t) = self.texture.take() {
            gfx.release(Resource::Texture(t));
        }
        self.grid = None;
        self.dirty = true;
    }
}
