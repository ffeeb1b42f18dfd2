use std::collections::HashMap;

use orrery_engine::gfx::{
    BufferDesc, BufferId, BufferKind, GraphicsContext, ProgramDesc, ProgramId, Resource, TextureSlot,
};

use crate::error::Result;

use super::variants::{Geometry, VariantDescriptor};

const QUAD_TRANSFORM_WGSL: &str = include_str!("../shaders/quad_transform.wgsl");
const EDGE_TRANSFORM_WGSL: &str = include_str!("../shaders/edge_transform.wgsl");
const QUAD_WGSL: &str = include_str!("../shaders/quad.wgsl");
const EDGE_WGSL: &str = include_str!("../shaders/edge.wgsl");

/// Output words per quad instance.
pub const QUAD_CAPTURES: &[&str] = &[
    "x", "y", "z", "radius", "color", "picking", "label", "secondary", "box_x", "box_y", "box_w", "box_h",
];

/// Output words per edge piece: a quadratic curve from `p0` through control
/// `c` to `p1`. Straight edges put `c` at the midpoint.
pub const EDGE_CAPTURES: &[&str] = &[
    "x0", "y0", "z0", "width", "cx", "cy", "cz", "color", "x1", "y1", "z1", "picking", "segment", "segments",
    "reserved0", "reserved1",
];

/// Two stacked unit quads: part 0 is the shape, part 1 the attached label.
/// Each vertex is `(corner x, corner y, part)`.
const QUAD_VERTICES: [[f32; 3]; 8] = [
    [-1.0, -1.0, 0.0],
    [1.0, -1.0, 0.0],
    [1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
    [-1.0, 1.0, 1.0],
];

const QUAD_INDICES: [u16; 12] = [0, 1, 2, 0, 2, 3, 4, 5, 6, 4, 6, 7];

/// Index count drawing only part 0.
pub const SHAPE_INDICES: u32 = 6;
/// Index count drawing shape and label.
pub const LABELED_INDICES: u32 = 12;

/// Subdivisions along every edge piece.
pub const RIBBON_STEPS: u16 = 16;
/// Index count of the full ribbon strip.
pub const RIBBON_INDICES: u32 = 6 * RIBBON_STEPS as u32;

/// Strip of `RIBBON_STEPS` quads along x in `[-1, 1]`, two vertices per
/// step at y = -1 and y = 1. Vertices share the quad's `(x, y, 0)` format.
fn ribbon_strip() -> (Vec<[f32; 3]>, Vec<u16>) {
    let steps = RIBBON_STEPS;
    let vertices = (0..=steps)
        .flat_map(|i| {
            let x = 2.0 * f32::from(i) / f32::from(steps) - 1.0;
            [[x, -1.0, 0.0], [x, 1.0, 0.0]]
        })
        .collect();
    let indices = (0..steps)
        .flat_map(|i| {
            let a = 2 * i;
            [a, a + 2, a + 3, a, a + 3, a + 1]
        })
        .collect();
    (vertices, indices)
}

fn upload_geometry(
    gfx: &mut dyn GraphicsContext,
    name: &str,
    vertices: &[[f32; 3]],
    indices: &[u16],
) -> Result<(BufferId, BufferId)> {
    let vertices: &[u8] = bytemuck::cast_slice(vertices);
    let indices: &[u8] = bytemuck::cast_slice(indices);
    let vb = gfx.create_buffer(
        &BufferDesc::new(format!("orrery {name} vertices"), BufferKind::Vertex, vertices.len() as u64),
        Some(vertices),
    )?;
    match gfx.create_buffer(
        &BufferDesc::new(format!("orrery {name} indices"), BufferKind::Index, indices.len() as u64),
        Some(indices),
    ) {
        Ok(ib) => Ok((vb, ib)),
        Err(e) => {
            gfx.release(Resource::Buffer(vb));
            Err(e.into())
        }
    }
}

/// Programs and geometry shared by every renderable of a viewport.
///
/// Programs compile on first use, one render program per shape.
#[derive(Default)]
pub struct SharedResources {
    quad_transform: Option<ProgramId>,
    edge_transform: Option<ProgramId>,
    render: HashMap<(Geometry, u32), ProgramId>,
    quad: Option<(BufferId, BufferId)>,
    ribbon: Option<(BufferId, BufferId)>,
}

impl SharedResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(vertices, indices)` of the stacked quad or the edge ribbon.
    pub fn geometry(&mut self, gfx: &mut dyn GraphicsContext, geometry: Geometry) -> Result<(BufferId, BufferId)> {
        let slot = match geometry {
            Geometry::Quad => &mut self.quad,
            Geometry::Ribbon => &mut self.ribbon,
        };
        if let Some(g) = *slot {
            return Ok(g);
        }
        let buffers = match geometry {
            Geometry::Quad => upload_geometry(gfx, "quad", &QUAD_VERTICES, &QUAD_INDICES)?,
            Geometry::Ribbon => {
                let (vertices, indices) = ribbon_strip();
                upload_geometry(gfx, "ribbon", &vertices, &indices)?
            }
        };
        *slot = Some(buffers);
        Ok(buffers)
    }

    pub fn transform_program(&mut self, gfx: &mut dyn GraphicsContext, geometry: Geometry) -> Result<ProgramId> {
        let slot = match geometry {
            Geometry::Quad => &mut self.quad_transform,
            Geometry::Ribbon => &mut self.edge_transform,
        };
        if let Some(p) = *slot {
            return Ok(p);
        }
        let desc = match geometry {
            // positions, label boxes
            Geometry::Quad => ProgramDesc::transform("orrery quad transform", QUAD_TRANSFORM_WGSL, 1, QUAD_CAPTURES)
                .with_textures(&[TextureSlot::Data, TextureSlot::Data]),
            Geometry::Ribbon => ProgramDesc::transform("orrery edge transform", EDGE_TRANSFORM_WGSL, 1, EDGE_CAPTURES)
                .with_textures(&[TextureSlot::Data]),
        };
        let id = gfx.create_program(&desc)?;
        *slot = Some(id);
        Ok(id)
    }

    pub fn render_program(&mut self, gfx: &mut dyn GraphicsContext, variant: &VariantDescriptor) -> Result<ProgramId> {
        let key = (variant.geometry, variant.shape);
        if let Some(&p) = self.render.get(&key) {
            return Ok(p);
        }
        let desc = match variant.geometry {
            // palette, label atlas
            Geometry::Quad => ProgramDesc::render(
                format!("orrery {} program", variant.key),
                format!("const SHAPE: u32 = {}u;\n{QUAD_WGSL}", variant.shape),
            )
            .with_textures(&[TextureSlot::Data, TextureSlot::Sampled]),
            Geometry::Ribbon => ProgramDesc::render(
                format!("orrery {} program", variant.key),
                format!("const STYLE: u32 = {}u;\n{EDGE_WGSL}", variant.shape),
            )
            .with_textures(&[TextureSlot::Data]),
        };
        let id = gfx.create_program(&desc)?;
        self.render.insert(key, id);
        Ok(id)
    }

    pub fn destroy(&mut self, gfx: &mut dyn GraphicsContext) {
        for p in self.quad_transform.take().into_iter().chain(self.edge_transform.take()) {
            gfx.release(Resource::Program(p));
        }
        for (_, p) in self.render.drain() {
            gfx.release(Resource::Program(p));
        }
        for (vb, ib) in self.quad.take().into_iter().chain(self.ribbon.take()) {
            gfx.release(Resource::Buffer(vb));
            gfx.release(Resource::Buffer(ib));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::variants::{edge_variant, node_variant};
    use orrery_engine::gfx::HeadlessContext;

    #[test]
    fn programs_are_cached_per_shape() {
        let mut gfx = HeadlessContext::new();
        let mut shared = SharedResources::new();
        let disk = shared.render_program(&mut gfx, node_variant("disk")).unwrap();
        assert_eq!(shared.render_program(&mut gfx, node_variant("disk")).unwrap(), disk);
        assert_ne!(shared.render_program(&mut gfx, node_variant("ring")).unwrap(), disk);
        assert_ne!(shared.render_program(&mut gfx, edge_variant("straight")).unwrap(), disk);

        let t = shared.transform_program(&mut gfx, Geometry::Quad).unwrap();
        assert_eq!(shared.transform_program(&mut gfx, Geometry::Quad).unwrap(), t);

        shared.geometry(&mut gfx, Geometry::Quad).unwrap();
        let ribbon = shared.geometry(&mut gfx, Geometry::Ribbon).unwrap();
        assert_eq!(shared.geometry(&mut gfx, Geometry::Ribbon).unwrap(), ribbon);
        shared.destroy(&mut gfx);
        assert_eq!(gfx.live_resources(), 0);
    }

    #[test]
    fn ribbon_strip_spans_the_piece() {
        let (vertices, indices) = ribbon_strip();
        assert_eq!(vertices.len(), 2 * (RIBBON_STEPS as usize + 1));
        assert_eq!(indices.len() as u32, RIBBON_INDICES);
        assert_eq!(vertices[0], [-1.0, -1.0, 0.0]);
        assert_eq!(vertices[vertices.len() - 1], [1.0, 1.0, 0.0]);
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
    }
}
