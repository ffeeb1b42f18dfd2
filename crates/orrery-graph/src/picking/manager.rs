use std::collections::{BTreeMap, HashMap};

use orrery_engine::coords::ColorRgba;
use orrery_engine::gfx::{
    FramebufferId, GraphicsContext, Resource, Target, TextureDesc, TextureFormat, TextureId,
};

use crate::error::Result;
use crate::Id;

use super::allocator::{decode_pixel, PickingAllocation, PickingAllocator};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PickKind {
    Node,
    Edge,
}

impl PickKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PickKind::Node => "node",
            PickKind::Edge => "edge",
        }
    }
}

/// Entity under the pointer, keyed by the caller's own id.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PickTarget {
    pub layer: String,
    pub kind: PickKind,
    pub id: Id,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum PickEvent {
    HoverOn(PickTarget),
    HoverOff(PickTarget),
    Click(PickTarget),
}

/// Handle returned by [`PickingManager::register`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct OwnerKey(u32);

struct Owner {
    layer: String,
    kind: PickKind,
    ids: Vec<Id>,
    allocation: PickingAllocation,
}

struct Span {
    end: u32,
    owner: OwnerKey,
    slot_base: u32,
}

struct PickTargetTextures {
    color: TextureId,
    depth: TextureId,
    framebuffer: FramebufferId,
    size: (u32, u32),
}

enum Readback {
    Hit(OwnerKey, PickTarget),
    Empty,
    /// Target missing or stale; leave hover state alone.
    Unavailable,
}

/// Picking ids, their owners, and the off-screen picking target.
pub struct PickingManager {
    allocator: PickingAllocator,
    owners: HashMap<OwnerKey, Owner>,
    spans: BTreeMap<u32, Span>,
    next_owner: u32,
    target: Option<PickTargetTextures>,
    /// Physical size of the visible viewport.
    size: (u32, u32),
    hovered: Option<(OwnerKey, PickTarget)>,
}

impl Default for PickingManager {
    fn default() -> Self {
        Self::new(PickingAllocator::new())
    }
}

impl PickingManager {
    pub fn new(allocator: PickingAllocator) -> Self {
        Self {
            allocator,
            owners: HashMap::new(),
            spans: BTreeMap::new(),
            next_owner: 0,
            target: None,
            size: (1, 1),
            hovered: None,
        }
    }

    pub fn available(&self) -> u32 {
        self.allocator.available()
    }

    /// Allocates one picking id per entity of a renderable.
    pub fn register(
        &mut self,
        layer: &str,
        kind: PickKind,
        ids: Vec<Id>,
    ) -> Result<(OwnerKey, &PickingAllocation)> {
        let allocation = self.allocator.allocate(ids.len() as u32)?;
        let key = OwnerKey(self.next_owner);
        self.next_owner += 1;

        let mut slot_base = 0;
        for r in allocation.ranges() {
            self.spans.insert(r.start, Span { end: r.end, owner: key, slot_base });
            slot_base += r.len();
        }
        log::debug!(
            "picking: {} {} ids for layer `{layer}` ({} free)",
            ids.len(),
            kind.as_str(),
            self.allocator.available()
        );
        let owner = self
            .owners
            .entry(key)
            .or_insert(Owner { layer: layer.to_string(), kind, ids, allocation });
        Ok((key, &owner.allocation))
    }

    /// Returns an owner's ids to the free list.
    ///
    /// If one of its entities is hovered, the hover ends and the matching
    /// `HoverOff` is returned for the caller to publish.
    #[must_use]
    pub fn unregister(&mut self, key: OwnerKey) -> Option<PickEvent> {
        let owner = self.owners.remove(&key)?;
        for r in owner.allocation.ranges() {
            self.spans.remove(&r.start);
        }
        self.allocator.deallocate(&owner.allocation);
        match self.hovered.take() {
            Some((k, target)) if k == key => Some(PickEvent::HoverOff(target)),
            other => {
                self.hovered = other;
                None
            }
        }
    }

    pub fn allocation(&self, key: OwnerKey) -> Option<&PickingAllocation> {
        self.owners.get(&key).map(|o| &o.allocation)
    }

    /// Maps a decoded picking id back to its entity.
    pub fn resolve(&self, id: u32) -> Option<PickTarget> {
        self.locate(id).map(|(_, target)| target)
    }

    fn locate(&self, id: u32) -> Option<(OwnerKey, PickTarget)> {
        let (&start, span) = self.spans.range(..=id).next_back()?;
        if id >= span.end {
            return None;
        }
        let owner = self.owners.get(&span.owner)?;
        let slot = span.slot_base + (id - start);
        let entity = *owner.ids.get(slot as usize)?;
        Some((span.owner, PickTarget { layer: owner.layer.clone(), kind: owner.kind, id: entity }))
    }

    // ── off-screen target ─────────────────────────────────────────────────

    /// Records the visible size; the picking target follows on the next pass.
    pub fn resize(&mut self, physical: (u32, u32)) {
        self.size = (physical.0.max(1), physical.1.max(1));
    }

    /// Prepares and clears the picking target for a picking pass.
    pub fn begin_pass(&mut self, gfx: &mut dyn GraphicsContext) -> Result<Target> {
        let (w, h) = self.size;
        let framebuffer = match &mut self.target {
            Some(t) if t.size == self.size => t.framebuffer,
            Some(t) => {
                gfx.resize_texture(t.color, w, h, None)?;
                gfx.resize_texture(t.depth, w, h, None)?;
                t.size = self.size;
                t.framebuffer
            }
            None => {
                let color = gfx.create_texture(
                    &TextureDesc::new("orrery picking color", w, h, TextureFormat::Rgba8Unorm),
                    None,
                )?;
                let depth = gfx.create_texture(
                    &TextureDesc::new("orrery picking depth", w, h, TextureFormat::Depth32Float),
                    None,
                )?;
                let framebuffer = gfx.create_framebuffer(color, Some(depth))?;
                self.target = Some(PickTargetTextures { color, depth, framebuffer, size: self.size });
                framebuffer
            }
        };
        let target = Target::Framebuffer(framebuffer);
        gfx.clear(target, ColorRgba::transparent())?;
        Ok(target)
    }

    pub fn framebuffer(&self) -> Option<FramebufferId> {
        self.target.as_ref().map(|t| t.framebuffer)
    }

    fn read(&mut self, gfx: &mut dyn GraphicsContext, x: u32, y: u32) -> Result<Readback> {
        let Some(target) = &self.target else {
            return Ok(Readback::Unavailable);
        };
        if target.size != self.size {
            log::debug!("picking: target {:?} stale against {:?}; no pick", target.size, self.size);
            return Ok(Readback::Unavailable);
        }
        let rgba = match gfx.read_pixel(target.framebuffer, x, y) {
            Ok(rgba) => rgba,
            Err(e) if e.is_transient() => {
                log::debug!("picking: {e}; no pick");
                return Ok(Readback::Unavailable);
            }
            Err(e) => return Err(e.into()),
        };
        Ok(match decode_pixel(rgba).and_then(|id| self.locate(id)) {
            Some((key, hit)) => Readback::Hit(key, hit),
            None => Readback::Empty,
        })
    }

    /// Entity at a physical pixel, or `None` for nothing / no pick.
    pub fn pick(&mut self, gfx: &mut dyn GraphicsContext, x: u32, y: u32) -> Result<Option<PickTarget>> {
        Ok(match self.read(gfx, x, y)? {
            Readback::Hit(_, t) => Some(t),
            Readback::Empty | Readback::Unavailable => None,
        })
    }

    // ── pointer events ────────────────────────────────────────────────────

    /// Hover transitions for a pointer at a physical pixel.
    pub fn pointer_moved(&mut self, gfx: &mut dyn GraphicsContext, x: u32, y: u32) -> Result<Vec<PickEvent>> {
        let next = match self.read(gfx, x, y)? {
            Readback::Hit(key, t) => Some((key, t)),
            Readback::Empty => None,
            Readback::Unavailable => return Ok(Vec::new()),
        };
        Ok(self.set_hovered(next))
    }

    pub fn clicked(&mut self, gfx: &mut dyn GraphicsContext, x: u32, y: u32) -> Result<Option<PickEvent>> {
        Ok(self.pick(gfx, x, y)?.map(PickEvent::Click))
    }

    pub fn pointer_left(&mut self) -> Vec<PickEvent> {
        self.set_hovered(None)
    }

    pub fn hovered(&self) -> Option<&PickTarget> {
        self.hovered.as_ref().map(|(_, t)| t)
    }

    fn set_hovered(&mut self, next: Option<(OwnerKey, PickTarget)>) -> Vec<PickEvent> {
        if next == self.hovered {
            return Vec::new();
        }
        let mut events = Vec::with_capacity(2);
        if let Some((_, prev)) = self.hovered.take() {
            events.push(PickEvent::HoverOff(prev));
        }
        if let Some((_, t)) = &next {
            events.push(PickEvent::HoverOn(t.clone()));
        }
        self.hovered = next;
        events
    }

    /// Releases the picking target and every owner.
    pub fn destroy(&mut self, gfx: &mut dyn GraphicsContext) {
        let keys: Vec<OwnerKey> = self.owners.keys().copied().collect();
        for key in keys {
            if let Some(event) = self.unregister(key) {
                log::debug!("picking: dropping {event:?} on teardown");
            }
        }
        if let Some(t) = self.target.take() {
            gfx.release(Resource::Framebuffer(t.framebuffer));
            gfx.release(Resource::Texture(t.color));
            gfx.release(Resource::Texture(t.depth));
        }
        self.hovered = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orrery_engine::gfx::HeadlessContext;

    use crate::picking::rendered_pixel as shader_pixel;

    fn setup() -> (HeadlessContext, PickingManager, FramebufferId) {
        let mut gfx = HeadlessContext::new();
        let mut m = PickingManager::default();
        m.resize((8, 8));
        m.register("graph", PickKind::Node, vec![100, 200, 300]).unwrap();
        m.register("graph", PickKind::Edge, vec![7]).unwrap();
        m.begin_pass(&mut gfx).unwrap();
        let fb = m.framebuffer().unwrap();
        (gfx, m, fb)
    }

    #[test]
    fn ids_resolve_to_caller_entities() {
        let (_, m, _) = setup();
        assert_eq!(m.resolve(2).map(|t| t.id), Some(200));
        let edge = m.resolve(4).unwrap();
        assert_eq!((edge.kind, edge.id), (PickKind::Edge, 7));
        assert_eq!(m.resolve(5), None);
        assert_eq!(m.resolve(0), None);
    }

    #[test]
    fn hover_on_off_sequence() {
        let (mut gfx, mut m, fb) = setup();
        gfx.set_pixel(fb, 1, 1, shader_pixel(1)).unwrap();
        gfx.set_pixel(fb, 2, 2, shader_pixel(3)).unwrap();

        let ev = m.pointer_moved(&mut gfx, 1, 1).unwrap();
        assert!(matches!(&ev[..], [PickEvent::HoverOn(t)] if t.id == 100));
        assert!(m.pointer_moved(&mut gfx, 1, 1).unwrap().is_empty());

        let ev = m.pointer_moved(&mut gfx, 2, 2).unwrap();
        assert!(matches!(&ev[..], [PickEvent::HoverOff(a), PickEvent::HoverOn(b)] if a.id == 100 && b.id == 300));

        let ev = m.pointer_moved(&mut gfx, 0, 0).unwrap();
        assert!(matches!(&ev[..], [PickEvent::HoverOff(t)] if t.id == 300));
    }

    #[test]
    fn click_reports_entity() {
        let (mut gfx, mut m, fb) = setup();
        gfx.set_pixel(fb, 3, 3, shader_pixel(4)).unwrap();
        let ev = m.clicked(&mut gfx, 3, 3).unwrap();
        assert_eq!(
            ev,
            Some(PickEvent::Click(PickTarget { layer: "graph".into(), kind: PickKind::Edge, id: 7 }))
        );
        assert_eq!(m.clicked(&mut gfx, 0, 0).unwrap(), None);
    }

    #[test]
    fn stale_target_is_no_pick() {
        let (mut gfx, mut m, fb) = setup();
        gfx.set_pixel(fb, 1, 1, shader_pixel(1)).unwrap();
        m.resize((16, 16));
        assert_eq!(m.pick(&mut gfx, 1, 1).unwrap(), None);
        assert!(m.pointer_moved(&mut gfx, 1, 1).unwrap().is_empty());
        assert!(m.pick(&mut gfx, 20, 20).is_ok());

        m.begin_pass(&mut gfx).unwrap();
        assert_eq!(gfx.texture_size(gfx_color(&m)).unwrap(), (16, 16));
    }

    fn gfx_color(m: &PickingManager) -> TextureId {
        m.target.as_ref().map(|t| t.color).unwrap()
    }

    #[test]
    fn out_of_bounds_read_is_no_pick() {
        let (mut gfx, mut m, _) = setup();
        assert_eq!(m.pick(&mut gfx, 100, 0).unwrap(), None);
    }

    #[test]
    fn unregistering_hovered_owner_ends_hover() {
        let mut gfx = HeadlessContext::new();
        let mut m = PickingManager::default();
        m.resize((4, 4));
        let (nodes, _) = m.register("graph", PickKind::Node, vec![11, 12]).unwrap();
        m.begin_pass(&mut gfx).unwrap();
        let fb = m.framebuffer().unwrap();
        gfx.set_pixel(fb, 0, 0, shader_pixel(2)).unwrap();
        m.pointer_moved(&mut gfx, 0, 0).unwrap();

        // A second owner under the same layer and kind is not the hovered one.
        let (other, _) = m.register("graph", PickKind::Node, vec![99]).unwrap();
        assert_eq!(m.unregister(other), None);
        assert_eq!(m.hovered().map(|t| t.id), Some(12));

        let node = PickTarget { layer: "graph".into(), kind: PickKind::Node, id: 12 };
        assert_eq!(m.unregister(nodes), Some(PickEvent::HoverOff(node)));
        assert!(m.hovered().is_none());
        assert!(m.pointer_moved(&mut gfx, 0, 0).unwrap().is_empty());
    }

    #[test]
    fn unregister_frees_ids_and_hover() {
        let (mut gfx, mut m, fb) = setup();
        let before = m.available();
        gfx.set_pixel(fb, 1, 1, shader_pixel(1)).unwrap();
        m.pointer_moved(&mut gfx, 1, 1).unwrap();

        let (key, alloc) = m.register("other", PickKind::Node, vec![1, 2]).unwrap();
        assert_eq!(alloc.len(), 2);
        assert_eq!(m.unregister(key), None);
        assert_eq!(m.available(), before);
        assert!(m.hovered().is_some());

        m.destroy(&mut gfx);
        assert!(m.hovered().is_none());
        assert_eq!(gfx.live_resources(), 0);
    }
}
