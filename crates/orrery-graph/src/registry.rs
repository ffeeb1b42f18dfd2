//! Deduplicated point positions shared by every layer.

use std::collections::{HashMap, HashSet};

use glam::Vec3;
use orrery_engine::gfx::{GraphicsContext, Resource, TextureDesc, TextureFormat, TextureId};

use crate::error::{GraphError, Result};
use crate::mapping::{self, FieldLayout, FieldType, Mapping, PackObserver, PackOptions};
use crate::texel::TexelGrid;
use crate::Id;

/// Built-in point record.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PointRecord {
    pub id: Id,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub radius: f32,
}

impl PointRecord {
    pub fn new(id: Id, x: f32, y: f32, z: f32) -> Self {
        Self { id, x, y, z, radius: 0.0 }
    }
}

type Scalar<'a, R> = Box<dyn Fn(&R, usize) -> f32 + 'a>;

/// Extractors for point records. `id` defaults to the record index, `z` and
/// `radius` to 0.
pub struct PointMapping<'a, R> {
    pub id: Option<Box<dyn Fn(&R, usize) -> Id + 'a>>,
    pub x: Scalar<'a, R>,
    pub y: Scalar<'a, R>,
    pub z: Option<Scalar<'a, R>>,
    pub radius: Option<Scalar<'a, R>>,
}

impl<'a, R> PointMapping<'a, R> {
    pub fn new(x: impl Fn(&R, usize) -> f32 + 'a, y: impl Fn(&R, usize) -> f32 + 'a) -> Self {
        Self { id: None, x: Box::new(x), y: Box::new(y), z: None, radius: None }
    }

    pub fn with_id(mut self, id: impl Fn(&R, usize) -> Id + 'a) -> Self {
        self.id = Some(Box::new(id));
        self
    }

    pub fn with_z(mut self, z: impl Fn(&R, usize) -> f32 + 'a) -> Self {
        self.z = Some(Box::new(z));
        self
    }

    pub fn with_radius(mut self, radius: impl Fn(&R, usize) -> f32 + 'a) -> Self {
        self.radius = Some(Box::new(radius));
        self
    }
}

impl Default for PointMapping<'_, PointRecord> {
    fn default() -> Self {
        PointMapping::new(|p: &PointRecord, _| p.x, |p: &PointRecord, _| p.y)
            .with_id(|p, _| p.id)
            .with_z(|p, _| p.z)
            .with_radius(|p, _| p.radius)
    }
}

/// Axis-aligned bounds plus the per-axis absolute maximum ("corner").
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
    pub corner: Vec3,
}

impl Bounds {
    pub const EMPTY: Bounds = Bounds {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
        corner: Vec3::ZERO,
    };

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    pub fn include(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
        self.corner = self.corner.max(p.abs());
    }

    pub fn center(&self) -> Vec3 {
        if self.is_empty() { Vec3::ZERO } else { (self.min + self.max) * 0.5 }
    }

    pub fn size(&self) -> Vec3 {
        if self.is_empty() { Vec3::ZERO } else { self.max - self.min }
    }
}

/// Builds the id → slot map and bounds while the positions are packed.
struct IndexObserver<'r> {
    ids: &'r [Id],
    map: HashMap<Id, u32>,
    bounds: Bounds,
    positions: Vec<[f32; 4]>,
}

impl<R> PackObserver<R> for IndexObserver<'_> {
    fn on_record(&mut self, _: &R, index: usize, first_entry: usize, _: usize) {
        self.map.insert(self.ids[index], first_entry as u32);
    }
}

/// Canonical point table, immutable after [`PointRegistry::build`].
///
/// Positions live in an `Rgba32Float` texture of `(x, y, z, radius)` texels,
/// slot `i` at `(i mod width, i div width)`.
#[derive(Debug)]
pub struct PointRegistry {
    ids: HashMap<Id, u32>,
    positions: Vec<[f32; 4]>,
    bounds: Bounds,
    grid: TexelGrid,
    texture: Option<TextureId>,
}

impl PointRegistry {
    /// Resolves every record into a slot. Duplicate ids keep the first occurrence.
    pub fn build<R>(
        gfx: &mut dyn GraphicsContext,
        records: &[R],
        mapping: &PointMapping<'_, R>,
    ) -> Result<Self> {
        // Dedupe first so no duplicate slots exist.
        let mut seen = HashSet::with_capacity(records.len());
        let mut kept: Vec<(usize, &R)> = Vec::with_capacity(records.len());
        let mut ids: Vec<Id> = Vec::with_capacity(records.len());
        for (i, r) in records.iter().enumerate() {
            let id = mapping.id.as_ref().map_or(i as Id, |f| f(r, i));
            if seen.insert(id) {
                kept.push((i, r));
                ids.push(id);
            } else {
                log::debug!("duplicate point id {id} at record {i}; keeping first occurrence");
            }
        }

        // Extractors see the caller's record index, not the deduplicated one.
        let layout = FieldLayout::new().with("position", FieldType::VEC4);
        let packing: Mapping<'_, (usize, &R)> = Mapping::new().field("position", |&(i, r), _| {
            let z = mapping.z.as_ref().map_or(0.0, |f| f(r, i));
            let radius = mapping.radius.as_ref().map_or(0.0, |f| f(r, i));
            [(mapping.x)(r, i), (mapping.y)(r, i), z, radius].into()
        });

        let mut observer = IndexObserver {
            ids: &ids,
            map: HashMap::with_capacity(kept.len()),
            bounds: Bounds::EMPTY,
            positions: Vec::with_capacity(kept.len()),
        };
        let packed = mapping::pack(&kept, &layout, &packing, PackOptions::default(), &mut observer)?;

        for texel in packed.data.chunks_exact(16) {
            let p: [f32; 4] = bytemuck::pod_read_unaligned(texel);
            observer.bounds.include(Vec3::new(p[0], p[1], p[2]));
            observer.positions.push(p);
        }

        let grid = TexelGrid::for_count(kept.len());
        let mut data = packed.data;
        data.resize(grid.capacity() * 16, 0);
        let texture = gfx.create_texture(
            &TextureDesc::new("orrery point positions", grid.width, grid.height, TextureFormat::Rgba32Float),
            Some(&data),
        )?;

        log::info!(
            "point registry: {} points ({} duplicates dropped), texture {}x{}",
            kept.len(),
            records.len() - kept.len(),
            grid.width,
            grid.height
        );

        Ok(Self {
            ids: observer.map,
            positions: observer.positions,
            bounds: observer.bounds,
            grid,
            texture: Some(texture),
        })
    }

    /// Slot of a point id. Unknown ids are an error, never slot 0.
    pub fn get_index(&self, id: Id) -> Result<u32> {
        self.ids.get(&id).copied().ok_or(GraphError::UnknownPoint(id))
    }

    pub fn contains(&self, id: Id) -> bool {
        self.ids.contains_key(&id)
    }

    /// `(x, y, z, radius)` of a point.
    pub fn position(&self, id: Id) -> Result<[f32; 4]> {
        let i = self.get_index(id)?;
        Ok(self.positions[i as usize])
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn grid(&self) -> TexelGrid {
        self.grid
    }

    /// Position texture; `None` after [`destroy`](Self::destroy).
    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    pub fn destroy(&mut self, gfx: &mut dyn GraphicsContext) {
        if let Some(t) = self.texture.take() {
            gfx.release(Resource::Texture(t));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orrery_engine::gfx::HeadlessContext;

    fn points() -> Vec<PointRecord> {
        vec![
            PointRecord::new(1, 0.0, 0.0, 0.0),
            PointRecord::new(2, 10.0, 0.0, 0.0),
            PointRecord::new(3, 5.0, 5.0, 0.0),
        ]
    }

    #[test]
    fn bounds_and_corner() {
        let mut gfx = HeadlessContext::new();
        let mut pts = points();
        pts.push(PointRecord::new(4, -7.0, 1.0, 2.0));
        let reg = PointRegistry::build(&mut gfx, &pts, &PointMapping::default()).unwrap();
        let b = reg.bounds();
        assert_eq!(b.min, Vec3::new(-7.0, 0.0, 0.0));
        assert_eq!(b.max, Vec3::new(10.0, 5.0, 2.0));
        assert_eq!(b.corner, Vec3::new(10.0, 5.0, 2.0));
    }

    #[test]
    fn duplicate_ids_keep_first_slot() {
        let mut gfx = HeadlessContext::new();
        let mut pts = points();
        pts.insert(1, PointRecord::new(3, 99.0, 99.0, 0.0));
        let reg = PointRegistry::build(&mut gfx, &pts, &PointMapping::default()).unwrap();
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.get_index(3).unwrap(), 1);
        assert_eq!(reg.position(3).unwrap(), [99.0, 99.0, 0.0, 0.0]);
        assert_eq!(reg.get_index(2).unwrap(), 2);
    }

    #[test]
    fn unknown_id_is_reference_error() {
        let mut gfx = HeadlessContext::new();
        let reg = PointRegistry::build(&mut gfx, &points(), &PointMapping::default()).unwrap();
        let err = reg.get_index(42).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Reference);
    }

    #[test]
    fn texture_holds_positions_row_major() {
        let mut gfx = HeadlessContext::new();
        let reg = PointRegistry::build(&mut gfx, &points(), &PointMapping::default()).unwrap();
        assert_eq!(reg.grid(), TexelGrid { width: 2, height: 2 });
        let tex = reg.texture().unwrap();
        let data = gfx.texture_data(tex).unwrap();
        assert_eq!(data.len(), 4 * 16);
        let texel: [f32; 4] = bytemuck::pod_read_unaligned(&data[16..32]);
        assert_eq!(texel, [10.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn default_ids_are_indices() {
        let mut gfx = HeadlessContext::new();
        let mapping = PointMapping::new(|p: &(f32, f32), _| p.0, |p: &(f32, f32), _| p.1);
        let reg = PointRegistry::build(&mut gfx, &[(1.0, 2.0), (3.0, 4.0)], &mapping).unwrap();
        assert_eq!(reg.get_index(1).unwrap(), 1);
        assert_eq!(reg.position(0).unwrap(), [1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn empty_registry_is_valid() {
        let mut gfx = HeadlessContext::new();
        let mut reg = PointRegistry::build(&mut gfx, &[], &PointMapping::default()).unwrap();
        assert!(reg.is_empty() && reg.bounds().is_empty());
        reg.destroy(&mut gfx);
        assert_eq!(gfx.live_resources(), 0);
    }
}
