//! Shape-variant lookup table.
//!
//! Every shape is the same instanced renderable; a variant only picks the
//! shader constant, which textures the program binds, and whether records
//! expand into path segments.

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RenderableKind {
    Node,
    Edge,
    Label,
}

impl RenderableKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderableKind::Node => "nodes",
            RenderableKind::Edge => "edges",
            RenderableKind::Label => "labels",
        }
    }
}

/// Per-instance geometry a renderable expands on the GPU.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Geometry {
    /// Screen-facing quad around a point.
    Quad,
    /// Strip following a quadratic curve between two points.
    Ribbon,
}

/// How an edge bends between its endpoints.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Curve {
    Straight,
    /// Bows to one side by a fraction of the edge length.
    Arc,
    /// Quadratic B-spline through the record's control points; records
    /// expand into one entry per control point.
    Spline,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VariantDescriptor {
    pub key: &'static str,
    pub kind: RenderableKind,
    pub geometry: Geometry,
    /// `SHAPE` constant injected into the render program.
    pub shape: u32,
    /// Binds a label atlas; nodes of this variant carry label text.
    pub labeled: bool,
    pub curve: Curve,
}

/// Sideways offset of an arc's control point, as a fraction of edge length.
pub const ARC_BEND: f32 = 0.2;

impl Curve {
    pub fn bend(self) -> f32 {
        match self {
            Curve::Arc => ARC_BEND,
            Curve::Straight | Curve::Spline => 0.0,
        }
    }
}

impl VariantDescriptor {
    /// Records expand into one entry per curve piece.
    pub fn flattened(&self) -> bool {
        self.curve == Curve::Spline
    }
}

const fn node(key: &'static str, shape: u32, labeled: bool) -> VariantDescriptor {
    VariantDescriptor { key, kind: RenderableKind::Node, geometry: Geometry::Quad, shape, labeled, curve: Curve::Straight }
}

const fn edge(key: &'static str, shape: u32, curve: Curve) -> VariantDescriptor {
    VariantDescriptor { key, kind: RenderableKind::Edge, geometry: Geometry::Ribbon, shape, labeled: false, curve }
}

pub const DEFAULT_NODE: &str = "disk";
pub const DEFAULT_EDGE: &str = "straight";

pub const NODE_VARIANTS: &[VariantDescriptor] = &[
    node("disk", 0, false),
    node("ring", 1, false),
    node("triangle", 2, false),
    node("pentagon", 3, false),
    node("octagon", 4, false),
    node("star", 5, false),
    node("cross", 6, false),
    node("plus", 7, false),
    node("point-label", 8, true),
    node("circular-label", 9, true),
    node("ring-label", 10, true),
];

pub const EDGE_VARIANTS: &[VariantDescriptor] = &[
    edge("straight", 0, Curve::Straight),
    edge("dashed", 1, Curve::Straight),
    edge("gravity", 2, Curve::Arc),
    edge("curved-path", 3, Curve::Spline),
    edge("bundled-path", 4, Curve::Spline),
];

pub static LABEL_VARIANT: VariantDescriptor = VariantDescriptor {
    key: "label",
    kind: RenderableKind::Label,
    geometry: Geometry::Quad,
    shape: 11,
    labeled: true,
    curve: Curve::Straight,
};

fn lookup(table: &'static [VariantDescriptor], key: &str, default: &str, what: &str) -> &'static VariantDescriptor {
    if let Some(v) = table.iter().find(|v| v.key == key) {
        return v;
    }
    log::warn!("unknown {what} variant `{key}`; using `{default}`");
    // The default key is always in its table.
    table.iter().find(|v| v.key == default).unwrap_or(&table[0])
}

/// Node variant for `key`, falling back to `disk`.
pub fn node_variant(key: &str) -> &'static VariantDescriptor {
    lookup(NODE_VARIANTS, key, DEFAULT_NODE, "node")
}

/// Edge variant for `key`, falling back to `straight`.
pub fn edge_variant(key: &str) -> &'static VariantDescriptor {
    lookup(EDGE_VARIANTS, key, DEFAULT_EDGE, "edge")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_keys_resolve() {
        assert_eq!(node_variant("star").shape, 5);
        assert!(node_variant("ring-label").labeled);
        assert!(edge_variant("bundled-path").flattened());
        assert_eq!(edge_variant("gravity").curve, Curve::Arc);
        assert!(!edge_variant("gravity").flattened());
        assert_eq!(edge_variant("dashed").geometry, Geometry::Ribbon);
    }

    #[test]
    fn unknown_keys_fall_back_to_defaults() {
        assert_eq!(node_variant("hexagon").key, DEFAULT_NODE);
        assert_eq!(edge_variant("").key, DEFAULT_EDGE);
    }

    #[test]
    fn shapes_are_unique_per_kind() {
        assert!(NODE_VARIANTS.iter().all(|v| v.shape != LABEL_VARIANT.shape));
        for table in [NODE_VARIANTS, EDGE_VARIANTS] {
            for (i, a) in table.iter().enumerate() {
                assert!(table[i + 1..].iter().all(|b| b.shape != a.shape && b.key != a.key));
            }
        }
    }
}
