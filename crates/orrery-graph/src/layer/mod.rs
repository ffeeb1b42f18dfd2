//! Layers and their renderables.
//!
//! A layer groups at most one node, one edge and one label renderable under
//! a name. Every renderable is the same instanced-quad machinery; the
//! [`variants`] table decides shape and behavior.

mod records;
mod renderable;
mod shared;
mod variants;

pub use records::{
    EdgeMapping,
    EdgeRecord,
    Get,
    LabelMapping,
    LabelRecord,
    NodeMapping,
    NodeRecord,
    DEFAULT_EDGE_WIDTH,
    DEFAULT_FONT_SIZE,
};
pub use renderable::{BuildContext, LayerOptions, Renderable, NONE};
pub use shared::SharedResources;
pub use variants::{
    edge_variant,
    node_variant,
    Curve,
    Geometry,
    RenderableKind,
    VariantDescriptor,
    ARC_BEND,
    DEFAULT_EDGE,
    DEFAULT_NODE,
    EDGE_VARIANTS,
    LABEL_VARIANT,
    NODE_VARIANTS,
};

use orrery_engine::gfx::GraphicsContext;

use crate::picking::{PickEvent, PickingManager};

pub struct Layer {
    name: String,
    pub(crate) labels: Option<Renderable>,
    pub(crate) nodes: Option<Renderable>,
    pub(crate) edges: Option<Renderable>,
}

impl Layer {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), labels: None, nodes: None, edges: None }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> Option<&Renderable> {
        self.nodes.as_ref()
    }

    pub fn edges(&self) -> Option<&Renderable> {
        self.edges.as_ref()
    }

    pub fn labels(&self) -> Option<&Renderable> {
        self.labels.as_ref()
    }

    pub(crate) fn slot_mut(&mut self, kind: RenderableKind) -> &mut Option<Renderable> {
        match kind {
            RenderableKind::Node => &mut self.nodes,
            RenderableKind::Edge => &mut self.edges,
            RenderableKind::Label => &mut self.labels,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_none() && self.nodes.is_none() && self.edges.is_none()
    }

    /// Labels, then nodes, then edges.
    pub fn renderables(&self) -> impl Iterator<Item = &Renderable> {
        self.labels.iter().chain(&self.nodes).chain(&self.edges)
    }

    /// Renderables that draw into the picking pass.
    pub fn pickable(&self) -> impl Iterator<Item = &Renderable> {
        self.nodes.iter().chain(&self.edges).filter(|r| r.is_pickable())
    }

    /// Destroys every renderable, returning hover-offs for entities that were under the pointer.
    pub fn destroy(&mut self, gfx: &mut dyn GraphicsContext, picking: &mut PickingManager) -> Vec<PickEvent> {
        [self.labels.take(), self.nodes.take(), self.edges.take()]
            .into_iter()
            .flatten()
            .filter_map(|mut r| r.destroy(gfx, picking))
            .collect()
    }
}
