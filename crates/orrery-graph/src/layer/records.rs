//! Built-in records and the typed extractors that read caller records.
//!
//! Optional extractors fall back to a default when `None`; the node radius is
//! the exception, where `None` drops the field and every node takes its
//! point's radius.

use orrery_engine::coords::ColorRgba;

use crate::Id;

pub type Get<'a, R, T> = Box<dyn Fn(&R, usize) -> T + 'a>;

pub const DEFAULT_EDGE_WIDTH: f32 = 1.0;
pub const DEFAULT_FONT_SIZE: f32 = 12.0;

// ── records ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub id: Id,
    pub point: Id,
    pub color: ColorRgba,
    /// `None` uses the point's radius.
    pub radius: Option<f32>,
    /// Text for label-bearing variants.
    pub label: Option<String>,
    /// Ring / label background color.
    pub secondary: Option<ColorRgba>,
}

impl NodeRecord {
    pub fn new(id: Id, point: Id) -> Self {
        Self { id, point, color: ColorRgba::black(), radius: None, label: None, secondary: None }
    }

    pub fn with_color(mut self, color: ColorRgba) -> Self {
        self.color = color;
        self
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = Some(radius);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRecord {
    pub id: Id,
    pub source: Id,
    pub target: Id,
    pub color: ColorRgba,
    pub width: f32,
    /// Intermediate point ids for path variants.
    pub control_points: Vec<Id>,
}

impl EdgeRecord {
    pub fn new(id: Id, source: Id, target: Id) -> Self {
        Self {
            id,
            source,
            target,
            color: ColorRgba::black(),
            width: DEFAULT_EDGE_WIDTH,
            control_points: Vec::new(),
        }
    }

    pub fn with_color(mut self, color: ColorRgba) -> Self {
        self.color = color;
        self
    }

    pub fn with_control_points(mut self, points: Vec<Id>) -> Self {
        self.control_points = points;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelRecord {
    pub id: Id,
    pub point: Id,
    pub text: String,
    pub font_size: f32,
    pub color: ColorRgba,
    pub background: Option<ColorRgba>,
}

impl LabelRecord {
    pub fn new(id: Id, point: Id, text: impl Into<String>) -> Self {
        Self {
            id,
            point,
            text: text.into(),
            font_size: DEFAULT_FONT_SIZE,
            color: ColorRgba::black(),
            background: None,
        }
    }

    pub fn with_background(mut self, color: ColorRgba) -> Self {
        self.background = Some(color);
        self
    }
}

// ── mappings ──────────────────────────────────────────────────────────────

pub struct NodeMapping<'a, R> {
    /// Defaults to the record index.
    pub id: Option<Get<'a, R, Id>>,
    pub point: Get<'a, R, Id>,
    /// Defaults to black.
    pub color: Option<Get<'a, R, ColorRgba>>,
    /// `None` drops the radius field; `Some(None)` per record defers to the point.
    pub radius: Option<Get<'a, R, Option<f32>>>,
    pub label: Option<Get<'a, R, Option<String>>>,
    pub secondary: Option<Get<'a, R, Option<ColorRgba>>>,
}

impl<'a, R> NodeMapping<'a, R> {
    pub fn new(point: impl Fn(&R, usize) -> Id + 'a) -> Self {
        Self { id: None, point: Box::new(point), color: None, radius: None, label: None, secondary: None }
    }

    /// Drops the radius field so nodes use their point's radius.
    pub fn without_radius(mut self) -> Self {
        self.radius = None;
        self
    }
}

impl Default for NodeMapping<'_, NodeRecord> {
    fn default() -> Self {
        Self {
            id: Some(Box::new(|n: &NodeRecord, _| n.id)),
            point: Box::new(|n: &NodeRecord, _| n.point),
            color: Some(Box::new(|n: &NodeRecord, _| n.color)),
            radius: Some(Box::new(|n: &NodeRecord, _| n.radius)),
            label: Some(Box::new(|n: &NodeRecord, _| n.label.clone())),
            secondary: Some(Box::new(|n: &NodeRecord, _| n.secondary)),
        }
    }
}

pub struct EdgeMapping<'a, R> {
    pub id: Option<Get<'a, R, Id>>,
    pub source: Get<'a, R, Id>,
    pub target: Get<'a, R, Id>,
    pub color: Option<Get<'a, R, ColorRgba>>,
    /// Defaults to [`DEFAULT_EDGE_WIDTH`].
    pub width: Option<Get<'a, R, f32>>,
    /// Intermediate point ids; only path variants read them.
    pub control_points: Option<Get<'a, R, Vec<Id>>>,
}

impl<'a, R> EdgeMapping<'a, R> {
    pub fn new(source: impl Fn(&R, usize) -> Id + 'a, target: impl Fn(&R, usize) -> Id + 'a) -> Self {
        Self {
            id: None,
            source: Box::new(source),
            target: Box::new(target),
            color: None,
            width: None,
            control_points: None,
        }
    }
}

impl Default for EdgeMapping<'_, EdgeRecord> {
    fn default() -> Self {
        Self {
            id: Some(Box::new(|e: &EdgeRecord, _| e.id)),
            source: Box::new(|e: &EdgeRecord, _| e.source),
            target: Box::new(|e: &EdgeRecord, _| e.target),
            color: Some(Box::new(|e: &EdgeRecord, _| e.color)),
            width: Some(Box::new(|e: &EdgeRecord, _| e.width)),
            control_points: Some(Box::new(|e: &EdgeRecord, _| e.control_points.clone())),
        }
    }
}

pub struct LabelMapping<'a, R> {
    pub id: Option<Get<'a, R, Id>>,
    pub point: Get<'a, R, Id>,
    pub text: Get<'a, R, String>,
    /// Logical pixels; defaults to [`DEFAULT_FONT_SIZE`].
    pub font_size: Option<Get<'a, R, f32>>,
    pub color: Option<Get<'a, R, ColorRgba>>,
    pub background: Option<Get<'a, R, Option<ColorRgba>>>,
}

impl<'a, R> LabelMapping<'a, R> {
    pub fn new(point: impl Fn(&R, usize) -> Id + 'a, text: impl Fn(&R, usize) -> String + 'a) -> Self {
        Self {
            id: None,
            point: Box::new(point),
            text: Box::new(text),
            font_size: None,
            color: None,
            background: None,
        }
    }
}

impl Default for LabelMapping<'_, LabelRecord> {
    fn default() -> Self {
        Self {
            id: Some(Box::new(|l: &LabelRecord, _| l.id)),
            point: Box::new(|l: &LabelRecord, _| l.point),
            text: Box::new(|l: &LabelRecord, _| l.text.clone()),
            font_size: Some(Box::new(|l: &LabelRecord, _| l.font_size)),
            color: Some(Box::new(|l: &LabelRecord, _| l.color)),
            background: Some(Box::new(|l: &LabelRecord, _| l.background)),
        }
    }
}
