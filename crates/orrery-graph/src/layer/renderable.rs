//! Instanced renderables.
//!
//! Building one runs in three steps: caller records resolve into flat entries
//! (point slots, palette indices, picking colors), the entries pack into a
//! source buffer, and a transform pass expands that buffer into draw-ready
//! instance data next to the point-position texture. Drawing is then a single
//! instanced call per pass.

use orrery_engine::coords::ColorRgba;
use orrery_engine::gfx::{
    AttributeFormat,
    BufferDesc,
    BufferId,
    BufferKind,
    DrawCallDesc,
    DrawCallId,
    FrameUniforms,
    GraphicsContext,
    Primitive,
    Resource,
    Target,
    TextureId,
    TransformDesc,
    VertexArrayId,
    VertexAttribute,
    VertexBinding,
};

use crate::error::{GraphError, Result};
use crate::labels::{AtlasConfig, AtlasTextures, LabelAtlas, LabelRasterizer, LabelRequest};
use crate::mapping::{self, FieldLayout, FieldType, FieldValue, Mapping, PackOptions, PackedBuffer, ScalarKind};
use crate::palette::Palette;
use crate::picking::{OwnerKey, PickEvent, PickKind, PickingManager};
use crate::registry::PointRegistry;
use crate::Id;

use super::records::{EdgeMapping, LabelMapping, NodeMapping, DEFAULT_EDGE_WIDTH, DEFAULT_FONT_SIZE};
use super::shared::{
    SharedResources, EDGE_CAPTURES, LABELED_INDICES, QUAD_CAPTURES, RIBBON_INDICES, SHAPE_INDICES,
};
use super::variants::{Curve, Geometry, RenderableKind, VariantDescriptor, LABEL_VARIANT};

/// Marks an absent index (label, secondary color) or an absent field offset.
pub const NONE: u32 = u32::MAX;

const PICKING: FieldType = FieldType { kind: ScalarKind::U8, components: 4 };
const SEGMENT: FieldType = FieldType { kind: ScalarKind::U32, components: 2 };

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LayerOptions {
    /// Allocate picking ids and draw into the picking pass.
    pub pickable: bool,
    pub pad_to_power_of_two: bool,
}

impl Default for LayerOptions {
    fn default() -> Self {
        Self { pickable: true, pad_to_power_of_two: false }
    }
}

/// Everything a renderable reads or allocates from while building.
pub struct BuildContext<'g> {
    pub gfx: &'g mut dyn GraphicsContext,
    pub registry: &'g PointRegistry,
    pub palette: &'g mut Palette,
    pub picking: &'g mut PickingManager,
    pub shared: &'g mut SharedResources,
    pub rasterizer: Option<&'g dyn LabelRasterizer>,
    pub atlas: &'g AtlasConfig,
    pub pixel_ratio: f32,
}

// ── resolved entries ──────────────────────────────────────────────────────

struct QuadEntry {
    point: u32,
    color: u32,
    /// Negative defers to the point radius.
    radius: f32,
    picking: [u8; 4],
    label: u32,
    secondary: u32,
}

struct EdgeEntry {
    /// Point slots from source to target; more than two only for path variants.
    path: Vec<u32>,
    color: u32,
    width: f32,
    picking: [u8; 4],
}

impl EdgeEntry {
    /// Interior points, one per spline piece. A path without any is a single
    /// piece controlled by its source, which draws straight.
    fn controls(&self) -> &[u32] {
        match self.path.len() {
            0..=2 => &self.path[..1],
            n => &self.path[1..n - 1],
        }
    }

    /// Point before each control.
    fn piece_starts(&self) -> &[u32] {
        &self.path[..self.controls().len()]
    }

    /// Point after each control.
    fn piece_ends(&self) -> &[u32] {
        &self.path[self.path.len() - self.controls().len()..]
    }
}

struct Label {
    text: String,
    font_size: f32,
    background: bool,
}

fn quad_layout() -> FieldLayout {
    FieldLayout::new()
        .with("point", FieldType::U32)
        .with("color", FieldType::U32)
        .with("radius", FieldType::F32)
        .with("picking", PICKING)
        .with("label", FieldType::U32)
        .with("secondary", FieldType::U32)
}

fn edge_layout() -> FieldLayout {
    FieldLayout::new()
        .with("source", FieldType::U32)
        .with("control", FieldType::U32)
        .with("target", FieldType::U32)
        .with("color", FieldType::U32)
        .with("width", FieldType::F32)
        .with("picking", PICKING)
        .with("segment", SEGMENT)
}

fn quad_mapping<'a>(with_radius: bool, pickable: bool) -> Mapping<'a, QuadEntry> {
    let mut m = Mapping::new()
        .field("point", |e: &QuadEntry, _| e.point.into())
        .field("color", |e: &QuadEntry, _| e.color.into())
        .field("radius", |e: &QuadEntry, _| e.radius.into())
        .field("picking", |e: &QuadEntry, _| e.picking.into())
        .field("label", |e: &QuadEntry, _| e.label.into())
        .field("secondary", |e: &QuadEntry, _| e.secondary.into());
    if !with_radius {
        m = m.drop_field("radius");
    }
    if !pickable {
        m = m.drop_field("picking");
    }
    m
}

fn edge_mapping<'a>(curve: Curve, pickable: bool) -> Mapping<'a, EdgeEntry> {
    let mut m = Mapping::new()
        .field("color", |e: &EdgeEntry, _| e.color.into())
        .field("width", |e: &EdgeEntry, _| e.width.into())
        .field("picking", |e: &EdgeEntry, _| e.picking.into());
    if curve == Curve::Spline {
        // Piece j bends around path[j + 1], between its neighbours.
        m = m
            .flatten("source", |e: &EdgeEntry, _| e.piece_starts().to_vec().into(), None)
            .flatten("control", |e: &EdgeEntry, _| e.controls().to_vec().into(), None)
            .flatten("target", |e: &EdgeEntry, _| e.piece_ends().to_vec().into(), None)
            .flatten(
                "segment",
                |e: &EdgeEntry, _| e.controls().to_vec().into(),
                Some(Box::new(|_: &EdgeEntry, i: usize, k: usize| -> FieldValue { [i as f32, k as f32].into() })),
            );
    } else {
        m = m
            .field("source", |e: &EdgeEntry, _| e.path[0].into())
            .field("target", |e: &EdgeEntry, _| e.path[e.path.len() - 1].into())
            .drop_field("control")
            .drop_field("segment");
    }
    if !pickable {
        m = m.drop_field("picking");
    }
    m
}

/// Word offset of every named field in the packed entry, then the stride
/// and logical count, in the order the transform programs read them.
fn transform_params(packed: &PackedBuffer, fields: &[&str]) -> Vec<u32> {
    let mut params = Vec::with_capacity(fields.len() + 2);
    params.push((packed.stride / 4) as u32);
    params.extend(fields.iter().map(|name| packed.field(name).map_or(NONE, |f| (f.offset / 4) as u32)));
    params.push(packed.logical_entries as u32);
    params
}

// ── renderable ────────────────────────────────────────────────────────────

/// One drawable component of a layer, bound to a shape variant.
pub struct Renderable {
    layer: String,
    variant: &'static VariantDescriptor,
    entities: usize,
    instances: u32,
    source: Option<BufferId>,
    output: Option<BufferId>,
    vertex_array: Option<VertexArrayId>,
    draw_call: Option<DrawCallId>,
    atlas: Option<AtlasTextures>,
    picking: Option<OwnerKey>,
}

impl Renderable {
    fn empty(layer: &str, variant: &'static VariantDescriptor) -> Self {
        Self {
            layer: layer.to_string(),
            variant,
            entities: 0,
            instances: 0,
            source: None,
            output: None,
            vertex_array: None,
            draw_call: None,
            atlas: None,
            picking: None,
        }
    }

    /// Node renderable for a node variant.
    pub fn nodes<R>(
        ctx: &mut BuildContext<'_>,
        layer: &str,
        variant: &'static VariantDescriptor,
        records: &[R],
        mapping: &NodeMapping<'_, R>,
        options: LayerOptions,
    ) -> Result<Self> {
        let mut ids = Vec::with_capacity(records.len());
        let mut entries = Vec::with_capacity(records.len());
        let mut labels = Vec::new();
        for (i, r) in records.iter().enumerate() {
            ids.push(mapping.id.as_ref().map_or(i as Id, |f| f(r, i)));
            let point = ctx.registry.get_index((mapping.point)(r, i))?;
            let color = mapping.color.as_ref().map_or(ColorRgba::black(), |f| f(r, i));
            let secondary = mapping.secondary.as_ref().and_then(|f| f(r, i));
            let text = if variant.labeled { mapping.label.as_ref().and_then(|f| f(r, i)) } else { None };
            let label = match text {
                Some(text) => {
                    labels.push(Label { text, font_size: DEFAULT_FONT_SIZE, background: secondary.is_some() });
                    labels.len() as u32 - 1
                }
                None => NONE,
            };
            entries.push(QuadEntry {
                point,
                color: ctx.palette.register(color),
                radius: mapping.radius.as_ref().and_then(|f| f(r, i)).unwrap_or(-1.0),
                picking: [0; 4],
                label,
                secondary: secondary.map_or(NONE, |c| ctx.palette.register(c)),
            });
        }

        let mut this = Self::empty(layer, variant);
        let built = this.build_quads(ctx, ids, &mut entries, &labels, mapping.radius.is_some(), options);
        this.finish(ctx, built)
    }

    /// Edge renderable for an edge variant. Path variants read control points.
    pub fn edges<R>(
        ctx: &mut BuildContext<'_>,
        layer: &str,
        variant: &'static VariantDescriptor,
        records: &[R],
        mapping: &EdgeMapping<'_, R>,
        options: LayerOptions,
    ) -> Result<Self> {
        let mut ids = Vec::with_capacity(records.len());
        let mut entries = Vec::with_capacity(records.len());
        for (i, r) in records.iter().enumerate() {
            ids.push(mapping.id.as_ref().map_or(i as Id, |f| f(r, i)));
            let mut path = vec![ctx.registry.get_index((mapping.source)(r, i))?];
            if variant.flattened() {
                if let Some(controls) = &mapping.control_points {
                    for id in controls(r, i) {
                        path.push(ctx.registry.get_index(id)?);
                    }
                }
            }
            path.push(ctx.registry.get_index((mapping.target)(r, i))?);
            let color = mapping.color.as_ref().map_or(ColorRgba::black(), |f| f(r, i));
            entries.push(EdgeEntry {
                path,
                color: ctx.palette.register(color),
                width: mapping.width.as_ref().map_or(DEFAULT_EDGE_WIDTH, |f| f(r, i)),
                picking: [0; 4],
            });
        }

        let mut this = Self::empty(layer, variant);
        let built = this.build_edges(ctx, ids, &mut entries, options);
        this.finish(ctx, built)
    }

    /// Free-standing labels. Never pickable.
    pub fn labels<R>(
        ctx: &mut BuildContext<'_>,
        layer: &str,
        records: &[R],
        mapping: &LabelMapping<'_, R>,
        options: LayerOptions,
    ) -> Result<Self> {
        let mut entries = Vec::with_capacity(records.len());
        let mut labels = Vec::with_capacity(records.len());
        for (i, r) in records.iter().enumerate() {
            let point = ctx.registry.get_index((mapping.point)(r, i))?;
            let color = mapping.color.as_ref().map_or(ColorRgba::black(), |f| f(r, i));
            let background = mapping.background.as_ref().and_then(|f| f(r, i));
            let font_size = mapping.font_size.as_ref().map_or(DEFAULT_FONT_SIZE, |f| f(r, i));
            labels.push(Label { text: (mapping.text)(r, i), font_size, background: background.is_some() });
            entries.push(QuadEntry {
                point,
                color: ctx.palette.register(color),
                // Labels size themselves from the font.
                radius: font_size,
                picking: [0; 4],
                label: i as u32,
                secondary: background.map_or(NONE, |c| ctx.palette.register(c)),
            });
        }

        let options = LayerOptions { pickable: false, ..options };
        let mut this = Self::empty(layer, &LABEL_VARIANT);
        let built = this.build_quads(ctx, Vec::new(), &mut entries, &labels, true, options);
        this.finish(ctx, built)
    }

    /// Keeps a finished renderable or releases whatever a failed build created.
    fn finish(mut self, ctx: &mut BuildContext<'_>, built: Result<()>) -> Result<Self> {
        match built {
            Ok(()) => {
                log::debug!(
                    "layer `{}`: {} {} ({}), {} instances",
                    self.layer,
                    self.entities,
                    self.variant.kind.as_str(),
                    self.variant.key,
                    self.instances
                );
                Ok(self)
            }
            Err(e) => {
                // Never drawn, so never hovered.
                self.destroy(ctx.gfx, ctx.picking);
                Err(e)
            }
        }
    }

    /// Picking colors for every entry, one id per entity.
    fn register_picking(&mut self, ctx: &mut BuildContext<'_>, ids: Vec<Id>) -> Result<Vec<[u8; 4]>> {
        let kind = match self.variant.kind {
            RenderableKind::Edge => PickKind::Edge,
            _ => PickKind::Node,
        };
        let (key, allocation) = ctx.picking.register(&self.layer, kind, ids)?;
        self.picking = Some(key);
        Ok((0..allocation.len()).map(|slot| allocation.color(slot).unwrap_or([0; 4])).collect())
    }

    fn build_quads(
        &mut self,
        ctx: &mut BuildContext<'_>,
        ids: Vec<Id>,
        entries: &mut [QuadEntry],
        labels: &[Label],
        with_radius: bool,
        options: LayerOptions,
    ) -> Result<()> {
        self.entities = entries.len();
        if options.pickable {
            for (e, color) in entries.iter_mut().zip(self.register_picking(ctx, ids)?) {
                e.picking = color;
            }
        }

        let atlas = if labels.is_empty() {
            LabelAtlas::placeholder()
        } else {
            let rasterizer = ctx
                .rasterizer
                .ok_or_else(|| GraphError::config(format!("layer `{}` has labels but no rasterizer is set", self.layer)))?;
            let requests: Vec<LabelRequest<'_>> = labels
                .iter()
                .map(|l| LabelRequest { text: &l.text, font_size: l.font_size, background: l.background })
                .collect();
            LabelAtlas::build(&requests, rasterizer, ctx.pixel_ratio, ctx.atlas)?
        };
        let textures = atlas.upload(ctx.gfx)?;
        self.atlas = Some(textures);

        let pack = PackOptions { pad_to_power_of_two: options.pad_to_power_of_two };
        let packed = mapping::pack(entries, &quad_layout(), &quad_mapping(with_radius, options.pickable), pack, &mut ())?;
        let params = transform_params(&packed, &["point", "color", "radius", "picking", "label", "secondary"]);

        let vertex_count = if self.variant.labeled && self.variant.kind == RenderableKind::Node {
            LABELED_INDICES
        } else {
            SHAPE_INDICES
        };
        let attributes = vec![
            attr(1, AttributeFormat::Float32x4, 0),
            attr(2, AttributeFormat::Uint32, 16),
            attr(3, AttributeFormat::Unorm8x4, 20),
            attr(4, AttributeFormat::Uint32, 24),
            attr(5, AttributeFormat::Uint32, 28),
            attr(6, AttributeFormat::Float32x4, 32),
        ];
        self.upload(ctx, &packed, params, vec![textures.metadata], attributes, textures.atlas, vertex_count)
    }

    fn build_edges(
        &mut self,
        ctx: &mut BuildContext<'_>,
        ids: Vec<Id>,
        entries: &mut [EdgeEntry],
        options: LayerOptions,
    ) -> Result<()> {
        self.entities = entries.len();
        if options.pickable {
            for (e, color) in entries.iter_mut().zip(self.register_picking(ctx, ids)?) {
                e.picking = color;
            }
        }

        let pack = PackOptions { pad_to_power_of_two: options.pad_to_power_of_two };
        let m = edge_mapping(self.variant.curve, options.pickable);
        let packed = mapping::pack(entries, &edge_layout(), &m, pack, &mut ())?;
        let mut params =
            transform_params(&packed, &["source", "control", "target", "color", "width", "picking", "segment"]);
        params.push(self.variant.curve.bend().to_bits());

        let attributes = vec![
            attr(1, AttributeFormat::Float32x4, 0),
            attr(2, AttributeFormat::Float32x3, 16),
            attr(3, AttributeFormat::Uint32, 28),
            attr(4, AttributeFormat::Float32x3, 32),
            attr(5, AttributeFormat::Unorm8x4, 44),
            attr(6, AttributeFormat::Uint32, 48),
            attr(7, AttributeFormat::Uint32, 52),
        ];
        self.upload_edges(ctx, &packed, params, attributes)
    }

    fn upload_edges(
        &mut self,
        ctx: &mut BuildContext<'_>,
        packed: &PackedBuffer,
        params: Vec<u32>,
        attributes: Vec<VertexAttribute>,
    ) -> Result<()> {
        let Some(palette) = self.prepare(ctx, packed)? else { return Ok(()) };
        self.run_transform(ctx, packed, params, Vec::new())?;
        self.create_draw(ctx, attributes, vec![palette], RIBBON_INDICES)
    }

    #[allow(clippy::too_many_arguments)]
    fn upload(
        &mut self,
        ctx: &mut BuildContext<'_>,
        packed: &PackedBuffer,
        params: Vec<u32>,
        transform_textures: Vec<TextureId>,
        attributes: Vec<VertexAttribute>,
        atlas: TextureId,
        vertex_count: u32,
    ) -> Result<()> {
        let Some(palette) = self.prepare(ctx, packed)? else { return Ok(()) };
        self.run_transform(ctx, packed, params, transform_textures)?;
        self.create_draw(ctx, attributes, vec![palette, atlas], vertex_count)
    }

    /// Syncs the palette and uploads the source buffer. `None` when there is
    /// nothing to draw.
    fn prepare(&mut self, ctx: &mut BuildContext<'_>, packed: &PackedBuffer) -> Result<Option<TextureId>> {
        let palette = ctx.palette.sync(ctx.gfx)?;
        if packed.logical_entries == 0 {
            return Ok(None);
        }
        self.instances = packed.logical_entries as u32;
        let label = format!("{} {} source", self.layer, self.variant.kind.as_str());
        self.source = Some(ctx.gfx.create_buffer(
            &BufferDesc::new(label, BufferKind::Storage, packed.data.len() as u64),
            Some(&packed.data),
        )?);
        Ok(Some(palette))
    }

    fn run_transform(
        &mut self,
        ctx: &mut BuildContext<'_>,
        packed: &PackedBuffer,
        params: Vec<u32>,
        extra_textures: Vec<TextureId>,
    ) -> Result<()> {
        let stride = self.instance_stride();
        let label = format!("{} {} instances", self.layer, self.variant.kind.as_str());
        let output = ctx
            .gfx
            .create_buffer(&BufferDesc::new(label, BufferKind::Storage, stride * packed.entries as u64), None)?;
        self.output = Some(output);

        let positions = ctx.registry.texture().ok_or(GraphError::NotLoaded)?;
        let mut textures = vec![positions];
        textures.extend(extra_textures);
        let program = ctx.shared.transform_program(ctx.gfx, self.variant.geometry)?;
        let source = self.source.ok_or(GraphError::NotLoaded)?;
        ctx.gfx.transform(&TransformDesc {
            program,
            inputs: vec![source],
            textures,
            params,
            output,
            count: self.instances,
        })?;
        Ok(())
    }

    fn create_draw(
        &mut self,
        ctx: &mut BuildContext<'_>,
        attributes: Vec<VertexAttribute>,
        textures: Vec<TextureId>,
        vertex_count: u32,
    ) -> Result<()> {
        let output = self.output.ok_or(GraphError::NotLoaded)?;
        let (vertices, indices) = ctx.shared.geometry(ctx.gfx, self.variant.geometry)?;
        let stride = self.instance_stride();
        let vertex_array = ctx.gfx.create_vertex_array(&[
            VertexBinding {
                buffer: vertices,
                stride: 12,
                per_instance: false,
                attributes: vec![attr(0, AttributeFormat::Float32x3, 0)],
            },
            VertexBinding { buffer: output, stride, per_instance: true, attributes },
        ])?;
        self.vertex_array = Some(vertex_array);

        let program = ctx.shared.render_program(ctx.gfx, self.variant)?;
        self.draw_call = Some(ctx.gfx.create_draw_call(&DrawCallDesc {
            label: format!("{} {}", self.layer, self.variant.kind.as_str()),
            program,
            vertex_array,
            primitive: Primitive::Triangles,
            index_buffer: Some(indices),
            vertex_count,
            instance_count: self.instances,
            textures,
        })?);
        Ok(())
    }

    /// Bytes per transformed instance.
    fn instance_stride(&self) -> u64 {
        let captures = match self.variant.geometry {
            Geometry::Quad => QUAD_CAPTURES,
            Geometry::Ribbon => EDGE_CAPTURES,
        };
        4 * captures.len() as u64
    }

    /// Issues this renderable's draw. Renderables with no instances draw nothing.
    pub fn draw(&self, gfx: &mut dyn GraphicsContext, target: Target, uniforms: &FrameUniforms) -> Result<()> {
        if let Some(call) = self.draw_call {
            gfx.draw(call, target, uniforms)?;
        }
        Ok(())
    }

    pub fn layer(&self) -> &str {
        &self.layer
    }

    pub fn kind(&self) -> RenderableKind {
        self.variant.kind
    }

    pub fn variant(&self) -> &'static VariantDescriptor {
        self.variant
    }

    /// Caller records this renderable was built from.
    pub fn entity_count(&self) -> usize {
        self.entities
    }

    /// Drawn instances; path edges count one per segment.
    pub fn instance_count(&self) -> u32 {
        self.instances
    }

    pub fn is_pickable(&self) -> bool {
        self.picking.is_some()
    }

    pub fn picking_key(&self) -> Option<OwnerKey> {
        self.picking
    }

    pub fn atlas(&self) -> Option<AtlasTextures> {
        self.atlas
    }

    pub fn source_buffer(&self) -> Option<BufferId> {
        self.source
    }

    pub fn draw_call(&self) -> Option<DrawCallId> {
        self.draw_call
    }

    /// Releases GPU resources and returns picking ids to the free list.
    ///
    /// Yields the `HoverOff` for an entity that was under the pointer.
    pub fn destroy(&mut self, gfx: &mut dyn GraphicsContext, picking: &mut PickingManager) -> Option<PickEvent> {
        if let Some(call) = self.draw_call.take() {
            gfx.release(Resource::DrawCall(call));
        }
        if let Some(va) = self.vertex_array.take() {
            gfx.release(Resource::VertexArray(va));
        }
        for buffer in self.output.take().into_iter().chain(self.source.take()) {
            gfx.release(Resource::Buffer(buffer));
        }
        if let Some(atlas) = self.atlas.take() {
            atlas.release(gfx);
        }
        self.instances = 0;
        self.picking.take().and_then(|key| picking.unregister(key))
    }
}

fn attr(location: u32, format: AttributeFormat, offset: u64) -> VertexAttribute {
    VertexAttribute { location, format, offset }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::Coverage;
    use crate::layer::records::{EdgeRecord, LabelRecord, NodeRecord};
    use crate::layer::variants::{edge_variant, node_variant, ARC_BEND};
    use crate::picking::{decode_pixel, rendered_pixel};
    use crate::registry::{PointMapping, PointRecord};
    use crate::ErrorKind;
    use orrery_engine::gfx::{GfxCommand, HeadlessContext};

    struct Blocks;

    impl LabelRasterizer for Blocks {
        fn rasterize(&self, text: &str, px: f32) -> Coverage {
            let mut c = Coverage::new((px / 2.0).ceil() as u32 * text.len() as u32, px.ceil() as u32);
            c.data.fill(255);
            c
        }
    }

    struct Fixture {
        gfx: HeadlessContext,
        registry: PointRegistry,
        palette: Palette,
        picking: PickingManager,
        shared: SharedResources,
        atlas: AtlasConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let mut gfx = HeadlessContext::new();
            let points = vec![
                PointRecord::new(1, 0.0, 0.0, 0.0),
                PointRecord::new(2, 10.0, 0.0, 0.0),
                PointRecord::new(3, 5.0, 5.0, 0.0),
            ];
            let registry = PointRegistry::build(&mut gfx, &points, &PointMapping::default()).unwrap();
            Self {
                gfx,
                registry,
                palette: Palette::new(),
                picking: PickingManager::default(),
                shared: SharedResources::new(),
                atlas: AtlasConfig::default(),
            }
        }

        fn ctx<'g>(&'g mut self, rasterizer: Option<&'g dyn LabelRasterizer>) -> BuildContext<'g> {
            BuildContext {
                gfx: &mut self.gfx,
                registry: &self.registry,
                palette: &mut self.palette,
                picking: &mut self.picking,
                shared: &mut self.shared,
                rasterizer,
                atlas: &self.atlas,
                pixel_ratio: 1.0,
            }
        }

        fn transforms(&self) -> Vec<u32> {
            self.gfx
                .commands()
                .iter()
                .filter_map(|c| match c {
                    GfxCommand::Transform { count, .. } => Some(*count),
                    _ => None,
                })
                .collect()
        }

        fn last_params(&self) -> Vec<u32> {
            self.gfx
                .commands()
                .iter()
                .rev()
                .find_map(|c| match c {
                    GfxCommand::Transform { params, .. } => Some(params.clone()),
                    _ => None,
                })
                .unwrap()
        }
    }

    fn nodes() -> Vec<NodeRecord> {
        (1..=3).map(|i| NodeRecord::new(10 + i, i).with_radius(1.0)).collect()
    }

    #[test]
    fn nodes_resolve_points_and_allocate_picking() {
        let mut fx = Fixture::new();
        let r = Renderable::nodes(
            &mut fx.ctx(None),
            "graph",
            node_variant("disk"),
            &nodes(),
            &NodeMapping::default(),
            LayerOptions::default(),
        )
        .unwrap();

        assert_eq!(r.instance_count(), 3);
        assert!(r.is_pickable());
        assert_eq!(fx.transforms(), vec![3]);
        let call = fx.gfx.draw_call(r.draw_call().unwrap()).unwrap();
        assert_eq!((call.instance_count, call.vertex_count), (3, SHAPE_INDICES));
        assert_eq!(call.label, "graph nodes");

        // Entry 2's picking word decodes back to node 13.
        let source = fx.gfx.buffer_data(r.source_buffer().unwrap()).unwrap();
        let stride = source.len() / 3;
        let picking: [u8; 4] = source[2 * stride + 12..2 * stride + 16].try_into().unwrap();
        let pixel = [picking[3], picking[2], picking[1], picking[0]];
        assert_eq!(pixel, rendered_pixel(fx.picking.allocation(r.picking_key().unwrap()).unwrap().id(2).unwrap()));
        let target = fx.picking.resolve(decode_pixel(pixel).unwrap()).unwrap();
        assert_eq!((target.layer.as_str(), target.kind, target.id), ("graph", PickKind::Node, 13));
    }

    #[test]
    fn dropping_radius_shrinks_entries() {
        let mut fx = Fixture::new();
        let mapping = NodeMapping::default().without_radius();
        let r = Renderable::nodes(
            &mut fx.ctx(None),
            "graph",
            node_variant("ring"),
            &nodes(),
            &mapping,
            LayerOptions::default(),
        )
        .unwrap();
        assert_eq!(fx.gfx.buffer_data(r.source_buffer().unwrap()).unwrap().len(), 3 * 20);
    }

    #[test]
    fn unknown_point_is_a_reference_error_and_leaks_nothing() {
        let mut fx = Fixture::new();
        let before = fx.gfx.live_resources();
        let available = fx.picking.available();
        let records = vec![NodeRecord::new(1, 1), NodeRecord::new(2, 99)];
        let err = Renderable::nodes(
            &mut fx.ctx(None),
            "graph",
            node_variant("disk"),
            &records,
            &NodeMapping::default(),
            LayerOptions::default(),
        )
        .err()
        .unwrap();
        assert_eq!(err.kind(), ErrorKind::Reference);
        assert_eq!(fx.gfx.live_resources(), before);
        assert_eq!(fx.picking.available(), available);
    }

    #[test]
    fn path_edges_expand_per_segment() {
        let mut fx = Fixture::new();
        let edges = vec![
            EdgeRecord::new(7, 1, 2).with_control_points(vec![3]),
            EdgeRecord::new(8, 2, 3),
            EdgeRecord::new(9, 1, 1).with_control_points(vec![2, 3]),
        ];
        let r = Renderable::edges(
            &mut fx.ctx(None),
            "graph",
            edge_variant("curved-path"),
            &edges,
            &EdgeMapping::default(),
            LayerOptions::default(),
        )
        .unwrap();
        // One piece per control point, and one for an edge without any.
        assert_eq!(r.entity_count(), 3);
        assert_eq!(r.instance_count(), 4);
        let allocation = fx.picking.allocation(r.picking_key().unwrap()).unwrap();
        assert_eq!(allocation.len(), 3);
    }

    #[test]
    fn spline_pieces_bend_around_control_points() {
        let mut fx = Fixture::new();
        // Point slots: 1 -> 0, 2 -> 1, 3 -> 2.
        let edges = vec![EdgeRecord::new(9, 1, 1).with_control_points(vec![2, 3]), EdgeRecord::new(8, 2, 3)];
        let r = Renderable::edges(
            &mut fx.ctx(None),
            "graph",
            edge_variant("curved-path"),
            &edges,
            &EdgeMapping::default(),
            LayerOptions::default(),
        )
        .unwrap();
        assert_eq!(r.instance_count(), 3);

        let params = fx.last_params();
        let words: Vec<u32> = fx
            .gfx
            .buffer_data(r.source_buffer().unwrap())
            .unwrap()
            .chunks_exact(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        let stride = params[0] as usize;
        // (source, control, target, segment, segments)
        let piece = |i: usize| {
            let at = |slot: usize, extra: usize| words[i * stride + params[slot] as usize + extra];
            (at(1, 0), at(2, 0), at(3, 0), at(7, 0), at(7, 1))
        };
        assert_eq!(piece(0), (0, 1, 2, 0, 2));
        assert_eq!(piece(1), (1, 2, 0, 1, 2));
        // No control points: controlled by its own source, so it draws straight.
        assert_eq!(piece(2), (1, 1, 2, 0, 1));
    }

    #[test]
    fn only_arcs_bend_and_only_splines_read_controls() {
        let mut fx = Fixture::new();
        let edges = vec![EdgeRecord::new(7, 1, 2).with_control_points(vec![3])];
        for (key, bend, spline) in [
            ("straight", 0.0, false),
            ("dashed", 0.0, false),
            ("gravity", ARC_BEND, false),
            ("curved-path", 0.0, true),
            ("bundled-path", 0.0, true),
        ] {
            let mut r = Renderable::edges(
                &mut fx.ctx(None),
                "graph",
                edge_variant(key),
                &edges,
                &EdgeMapping::default(),
                LayerOptions::default(),
            )
            .unwrap();
            let params = fx.last_params();
            assert_eq!(f32::from_bits(params[9]), bend, "{key}");
            assert_eq!(params[2] != NONE, spline, "{key}");
            let call = fx.gfx.draw_call(r.draw_call().unwrap()).unwrap();
            assert_eq!(call.vertex_count, RIBBON_INDICES, "{key}");
            r.destroy(&mut fx.gfx, &mut fx.picking);
        }
    }

    #[test]
    fn straight_edges_ignore_control_points() {
        let mut fx = Fixture::new();
        let edges = vec![EdgeRecord::new(7, 1, 2).with_control_points(vec![3])];
        let r = Renderable::edges(
            &mut fx.ctx(None),
            "graph",
            edge_variant("straight"),
            &edges,
            &EdgeMapping::default(),
            LayerOptions { pickable: false, ..LayerOptions::default() },
        )
        .unwrap();
        assert_eq!(r.instance_count(), 1);
        assert!(!r.is_pickable());
        // source, target, color, width
        assert_eq!(fx.gfx.buffer_data(r.source_buffer().unwrap()).unwrap().len(), 16);
    }

    #[test]
    fn labeled_nodes_need_a_rasterizer() {
        let mut fx = Fixture::new();
        let records = vec![NodeRecord::new(1, 1).with_label("alpha")];
        let err = Renderable::nodes(
            &mut fx.ctx(None),
            "graph",
            node_variant("point-label"),
            &records,
            &NodeMapping::default(),
            LayerOptions::default(),
        )
        .err()
        .unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let r = Renderable::nodes(
            &mut fx.ctx(Some(&Blocks)),
            "graph",
            node_variant("point-label"),
            &records,
            &NodeMapping::default(),
            LayerOptions::default(),
        )
        .unwrap();
        let call = fx.gfx.draw_call(r.draw_call().unwrap()).unwrap();
        assert_eq!(call.vertex_count, LABELED_INDICES);
        assert!(fx.gfx.texture_size(r.atlas().unwrap().atlas).unwrap().0 > 1);
    }

    #[test]
    fn labels_build_an_atlas_and_skip_picking() {
        let mut fx = Fixture::new();
        let records = vec![
            LabelRecord::new(1, 1, "left"),
            LabelRecord::new(2, 2, "right").with_background(ColorRgba::white()),
        ];
        let r = Renderable::labels(
            &mut fx.ctx(Some(&Blocks)),
            "graph",
            &records,
            &LabelMapping::default(),
            LayerOptions::default(),
        )
        .unwrap();
        assert_eq!(r.kind(), RenderableKind::Label);
        assert!(!r.is_pickable());
        assert_eq!(r.instance_count(), 2);
        assert_eq!(fx.palette.len(), 2);
    }

    #[test]
    fn empty_renderables_do_not_draw() {
        let mut fx = Fixture::new();
        let r = Renderable::edges(
            &mut fx.ctx(None),
            "graph",
            edge_variant("straight"),
            &Vec::<EdgeRecord>::new(),
            &EdgeMapping::default(),
            LayerOptions::default(),
        )
        .unwrap();
        assert!(r.draw_call().is_none());
        r.draw(&mut fx.gfx, Target::Screen, &FrameUniforms::default()).unwrap();
        assert!(fx.gfx.draws().is_empty());
        assert!(fx.transforms().is_empty());
    }

    #[test]
    fn destroy_returns_everything() {
        let mut fx = Fixture::new();
        let before = fx.gfx.live_resources();
        let available = fx.picking.available();
        let mut r = Renderable::nodes(
            &mut fx.ctx(None),
            "graph",
            node_variant("star"),
            &nodes(),
            &NodeMapping::default(),
            LayerOptions { pad_to_power_of_two: true, ..LayerOptions::default() },
        )
        .unwrap();
        assert_eq!(fx.picking.available(), available - 3);
        r.destroy(&mut fx.gfx, &mut fx.picking);
        fx.shared.destroy(&mut fx.gfx);
        fx.palette.destroy(&mut fx.gfx);
        assert_eq!(fx.gfx.live_resources(), before);
        assert_eq!(fx.picking.available(), available);
    }
}
