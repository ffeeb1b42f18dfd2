//! Load contract: everything needed to put a graph on screen in one call.
//!
//! Specs carry the built-in records. Each spec holds a full mapping, so a
//! caller overrides an extractor by replacing that field (for example
//! `spec.mapping.radius = None` to size nodes from their points).

use orrery_engine::coords::ColorRgba;

use crate::layer::{
    EdgeMapping,
    EdgeRecord,
    LabelMapping,
    LabelRecord,
    LayerOptions,
    NodeMapping,
    NodeRecord,
    DEFAULT_EDGE,
    DEFAULT_NODE,
};
use crate::registry::PointRecord;

pub struct NodeSpec {
    /// Key into the node variant table; unknown keys fall back to `disk`.
    pub variant: String,
    pub records: Vec<NodeRecord>,
    pub mapping: NodeMapping<'static, NodeRecord>,
    pub options: LayerOptions,
}

impl NodeSpec {
    pub fn new(records: Vec<NodeRecord>) -> Self {
        Self {
            variant: DEFAULT_NODE.to_string(),
            records,
            mapping: NodeMapping::default(),
            options: LayerOptions::default(),
        }
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = variant.into();
        self
    }

    pub fn with_options(mut self, options: LayerOptions) -> Self {
        self.options = options;
        self
    }
}

pub struct EdgeSpec {
    /// Key into the edge variant table; unknown keys fall back to `straight`.
    pub variant: String,
    pub records: Vec<EdgeRecord>,
    pub mapping: EdgeMapping<'static, EdgeRecord>,
    pub options: LayerOptions,
}

impl EdgeSpec {
    pub fn new(records: Vec<EdgeRecord>) -> Self {
        Self {
            variant: DEFAULT_EDGE.to_string(),
            records,
            mapping: EdgeMapping::default(),
            options: LayerOptions::default(),
        }
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = variant.into();
        self
    }

    pub fn with_options(mut self, options: LayerOptions) -> Self {
        self.options = options;
        self
    }
}

pub struct LabelSpec {
    pub records: Vec<LabelRecord>,
    pub mapping: LabelMapping<'static, LabelRecord>,
    pub options: LayerOptions,
}

impl LabelSpec {
    pub fn new(records: Vec<LabelRecord>) -> Self {
        Self { records, mapping: LabelMapping::default(), options: LayerOptions::default() }
    }
}

pub struct LayerSpec {
    pub name: String,
    pub nodes: Option<NodeSpec>,
    pub edges: Option<EdgeSpec>,
    pub labels: Option<LabelSpec>,
}

impl LayerSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), nodes: None, edges: None, labels: None }
    }

    pub fn with_nodes(mut self, nodes: NodeSpec) -> Self {
        self.nodes = Some(nodes);
        self
    }

    pub fn with_edges(mut self, edges: EdgeSpec) -> Self {
        self.edges = Some(edges);
        self
    }

    pub fn with_labels(mut self, labels: LabelSpec) -> Self {
        self.labels = Some(labels);
        self
    }
}

/// Shared points, layers in insertion order, and colors registered up front
/// so their palette indices follow list order.
#[derive(Default)]
pub struct LoadSpec {
    pub points: Vec<PointRecord>,
    pub layers: Vec<LayerSpec>,
    pub colors: Vec<ColorRgba>,
}

impl LoadSpec {
    pub fn new(points: Vec<PointRecord>) -> Self {
        Self { points, ..Self::default() }
    }

    pub fn with_layer(mut self, layer: LayerSpec) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn with_colors(mut self, colors: Vec<ColorRgba>) -> Self {
        self.colors = colors;
        self
    }
}
