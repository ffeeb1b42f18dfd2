//! One graph instance.
//!
//! A [`Viewport`] owns every piece of per-graph state: the graphics context,
//! point registry, palette, picking ids, layers, scheduler and camera. Nothing
//! here is process-global; two viewports never share ids or colors.

use std::time::Instant;

use orrery_engine::coords::{ColorRgba, Viewport as Screen};
use orrery_engine::gfx::{FrameUniforms, GraphicsContext, Target};

use crate::camera::Camera;
use crate::error::{GraphError, Result};
use crate::events::EventChannel;
use crate::labels::{AtlasConfig, LabelRasterizer};
use crate::layer::{
    edge_variant,
    node_variant,
    BuildContext,
    EdgeMapping,
    LabelMapping,
    Layer,
    LayerOptions,
    NodeMapping,
    Renderable,
    SharedResources,
};
use crate::load::{LayerSpec, LoadSpec};
use crate::palette::Palette;
use crate::picking::{PickEvent, PickTarget, PickingManager};
use crate::registry::{PointMapping, PointRegistry};
use crate::scheduler::{RenderMode, RenderScheduler, SchedulerConfig};

#[derive(Debug, Clone, PartialEq)]
pub struct ViewportConfig {
    pub scheduler: SchedulerConfig,
    pub atlas: AtlasConfig,
    pub clear_color: ColorRgba,
    /// Initial device pixel ratio; [`Viewport::resize`] replaces it.
    pub pixel_ratio: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            atlas: AtlasConfig::default(),
            clear_color: ColorRgba::white(),
            pixel_ratio: 1.0,
        }
    }
}

pub struct Viewport<G: GraphicsContext> {
    gfx: G,
    config: ViewportConfig,
    registry: Option<PointRegistry>,
    palette: Palette,
    picking: PickingManager,
    shared: SharedResources,
    /// Insertion order; passes walk it newest first.
    layers: Vec<Layer>,
    scheduler: RenderScheduler,
    camera: Camera,
    size: Screen,
    events: EventChannel<PickEvent>,
    rasterizer: Option<Box<dyn LabelRasterizer>>,
}

impl<G: GraphicsContext> Viewport<G> {
    pub fn new(gfx: G, config: ViewportConfig) -> Self {
        let size = Screen::new(1.0, 1.0, config.pixel_ratio);
        let mut picking = PickingManager::default();
        picking.resize(size.physical_size());
        Self {
            gfx,
            registry: None,
            palette: Palette::new(),
            picking,
            shared: SharedResources::new(),
            layers: Vec::new(),
            scheduler: RenderScheduler::new(config.scheduler),
            camera: Camera::default(),
            size,
            events: EventChannel::default(),
            rasterizer: None,
            config,
        }
    }

    /// Text rasterizer for label layers and label-bearing node variants.
    pub fn set_rasterizer(&mut self, rasterizer: Box<dyn LabelRasterizer>) {
        self.rasterizer = Some(rasterizer);
    }

    // ── loading ───────────────────────────────────────────────────────────

    /// Replaces the whole graph: points, colors, then every layer in order.
    ///
    /// On error nothing of the new graph stays loaded.
    pub fn load(&mut self, spec: &LoadSpec) -> Result<()> {
        self.load_points(&spec.points, &PointMapping::default())?;
        self.palette.register_all(&spec.colors);
        for layer in &spec.layers {
            if let Err(e) = self.add_layer(layer) {
                self.unload();
                return Err(e);
            }
        }
        log::info!(
            "graph loaded: {} points, {} layers, {} colors",
            spec.points.len(),
            self.layers.len(),
            self.palette.len()
        );
        Ok(())
    }

    /// Rebuilds the registry from caller records, dropping every layer, and
    /// fits the camera to the new bounds.
    pub fn load_points<R>(&mut self, records: &[R], mapping: &PointMapping<'_, R>) -> Result<()> {
        self.unload();
        let registry = PointRegistry::build(&mut self.gfx, records, mapping)?;
        self.camera = Camera::fit(&registry.bounds(), self.size);
        self.registry = Some(registry);
        self.invalidate();
        Ok(())
    }

    /// Builds a layer from its spec. Names are unique; a failed build leaves
    /// no partial layer behind.
    pub fn add_layer(&mut self, spec: &LayerSpec) -> Result<()> {
        if self.layer(&spec.name).is_some() {
            return Err(GraphError::config(format!("layer `{}` already exists", spec.name)));
        }
        self.layers.push(Layer::new(&spec.name));
        let built = self.fill_layer(spec);
        if built.is_err() {
            self.remove_layer(&spec.name);
        }
        built
    }

    fn fill_layer(&mut self, spec: &LayerSpec) -> Result<()> {
        if let Some(n) = &spec.nodes {
            self.add_nodes(&spec.name, &n.variant, &n.records, &n.mapping, n.options)?;
        }
        if let Some(e) = &spec.edges {
            self.add_edges(&spec.name, &e.variant, &e.records, &e.mapping, e.options)?;
        }
        if let Some(l) = &spec.labels {
            self.add_labels(&spec.name, &l.records, &l.mapping, l.options)?;
        }
        Ok(())
    }

    /// Sets the node renderable of `layer`, creating the layer if needed and
    /// replacing any nodes it already had.
    pub fn add_nodes<R>(
        &mut self,
        layer: &str,
        variant: &str,
        records: &[R],
        mapping: &NodeMapping<'_, R>,
        options: LayerOptions,
    ) -> Result<()> {
        let variant = node_variant(variant);
        let renderable = Renderable::nodes(&mut self.build_context()?, layer, variant, records, mapping, options)?;
        self.install(layer, renderable);
        Ok(())
    }

    pub fn add_edges<R>(
        &mut self,
        layer: &str,
        variant: &str,
        records: &[R],
        mapping: &EdgeMapping<'_, R>,
        options: LayerOptions,
    ) -> Result<()> {
        let variant = edge_variant(variant);
        let renderable = Renderable::edges(&mut self.build_context()?, layer, variant, records, mapping, options)?;
        self.install(layer, renderable);
        Ok(())
    }

    pub fn add_labels<R>(
        &mut self,
        layer: &str,
        records: &[R],
        mapping: &LabelMapping<'_, R>,
        options: LayerOptions,
    ) -> Result<()> {
        let renderable = Renderable::labels(&mut self.build_context()?, layer, records, mapping, options)?;
        self.install(layer, renderable);
        Ok(())
    }

    fn build_context(&mut self) -> Result<BuildContext<'_>> {
        let registry = self.registry.as_ref().ok_or(GraphError::NotLoaded)?;
        Ok(BuildContext {
            gfx: &mut self.gfx,
            registry,
            palette: &mut self.palette,
            picking: &mut self.picking,
            shared: &mut self.shared,
            rasterizer: self.rasterizer.as_deref(),
            atlas: &self.config.atlas,
            pixel_ratio: self.size.pixel_ratio,
        })
    }

    fn install(&mut self, name: &str, renderable: Renderable) {
        let index = match self.layers.iter().position(|l| l.name() == name) {
            Some(i) => i,
            None => {
                self.layers.push(Layer::new(name));
                self.layers.len() - 1
            }
        };
        let kind = renderable.kind();
        if let Some(mut old) = self.layers[index].slot_mut(kind).replace(renderable) {
            log::debug!("layer `{name}`: replacing {}", kind.as_str());
            let ended = old.destroy(&mut self.gfx, &mut self.picking);
            self.events.emit_all(ended);
        }
        self.invalidate();
    }

    /// Destroys a layer and returns its picking ids. False if no such layer.
    pub fn remove_layer(&mut self, name: &str) -> bool {
        let Some(index) = self.layers.iter().position(|l| l.name() == name) else {
            return false;
        };
        let mut layer = self.layers.remove(index);
        let ended = layer.destroy(&mut self.gfx, &mut self.picking);
        self.events.emit_all(ended);
        self.invalidate();
        true
    }

    /// Drops layers and registry, keeping palette and shared programs.
    fn unload(&mut self) {
        for mut layer in std::mem::take(&mut self.layers) {
            let ended = layer.destroy(&mut self.gfx, &mut self.picking);
            self.events.emit_all(ended);
        }
        if let Some(mut registry) = self.registry.take() {
            registry.destroy(&mut self.gfx);
        }
    }

    // ── rendering ─────────────────────────────────────────────────────────

    /// Restarts progressive refinement at DRAFT.
    pub fn invalidate(&mut self) {
        self.scheduler.invalidate();
    }

    pub fn wants_refresh(&self, now: Instant) -> bool {
        self.scheduler.wants_refresh(now)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Runs every pass due at `now` and returns them in the order they ran.
    pub fn frame(&mut self, now: Instant) -> Result<Vec<RenderMode>> {
        let passes = self.scheduler.poll(now);
        for &mode in &passes {
            self.pass(mode)?;
        }
        Ok(passes)
    }

    fn pass(&mut self, mode: RenderMode) -> Result<()> {
        self.palette.sync(&mut self.gfx)?;
        let uniforms = self.uniforms(mode);
        let target = match mode {
            RenderMode::Picking => self.picking.begin_pass(&mut self.gfx)?,
            // Composites over HIGH_PASS_1 of the same frame.
            RenderMode::HighPass2 => Target::Screen,
            _ => {
                self.gfx.clear(Target::Screen, self.config.clear_color)?;
                Target::Screen
            }
        };
        for layer in self.layers.iter().rev() {
            if mode.is_picking() {
                for r in layer.pickable() {
                    r.draw(&mut self.gfx, target, &uniforms)?;
                }
            } else {
                for r in layer.renderables() {
                    r.draw(&mut self.gfx, target, &uniforms)?;
                }
            }
        }
        Ok(())
    }

    fn uniforms(&self, mode: RenderMode) -> FrameUniforms {
        FrameUniforms {
            view: self.camera.view().to_cols_array_2d(),
            projection: self.camera.projection(self.size).to_cols_array_2d(),
            clear_color: self.config.clear_color.to_array(),
            viewport: [self.size.width, self.size.height],
            pixel_ratio: self.size.pixel_ratio,
            render_mode: mode.uniform(),
        }
    }

    /// New logical size and pixel ratio. Invalid or unchanged sizes are ignored.
    pub fn resize(&mut self, size: Screen) {
        if !size.is_valid() || size == self.size {
            return;
        }
        self.size = size;
        self.picking.resize(size.physical_size());
        self.invalidate();
    }

    pub fn size(&self) -> Screen {
        self.size
    }

    // ── camera ────────────────────────────────────────────────────────────

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Direct access; call [`invalidate`](Self::invalidate) after changing it.
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
        self.invalidate();
    }

    /// Frames the registry bounds.
    pub fn fit_camera(&mut self) {
        let bounds = self.registry.as_ref().map(|r| r.bounds());
        if let Some(b) = bounds {
            self.set_camera(Camera::fit(&b, self.size));
        }
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.camera.pan(self.size, dx, dy);
        self.invalidate();
    }

    pub fn zoom_at(&mut self, factor: f32, x: f32, y: f32) {
        self.camera.zoom_at(self.size, factor, x, y);
        self.invalidate();
    }

    // ── picking ───────────────────────────────────────────────────────────

    /// Pointer moved to a logical position; queues hover transitions.
    pub fn pointer_moved(&mut self, x: f32, y: f32) -> Result<()> {
        let Some((px, py)) = self.size.to_physical(x, y) else {
            self.pointer_left();
            return Ok(());
        };
        let events = self.picking.pointer_moved(&mut self.gfx, px, py)?;
        self.events.emit_all(events);
        Ok(())
    }

    /// Click at a logical position; queues and returns the click target.
    pub fn clicked(&mut self, x: f32, y: f32) -> Result<Option<PickTarget>> {
        let Some((px, py)) = self.size.to_physical(x, y) else {
            return Ok(None);
        };
        let event = self.picking.clicked(&mut self.gfx, px, py)?;
        let target = match &event {
            Some(PickEvent::Click(t)) => Some(t.clone()),
            _ => None,
        };
        self.events.emit_all(event);
        Ok(target)
    }

    pub fn pointer_left(&mut self) {
        let events = self.picking.pointer_left();
        self.events.emit_all(events);
    }

    /// Calls `listener` for every picking event as it is raised.
    pub fn subscribe(&mut self, listener: impl FnMut(&PickEvent) + 'static) {
        self.events.subscribe(listener);
    }

    /// Queued picking events, oldest first.
    pub fn drain_events(&mut self) -> Vec<PickEvent> {
        self.events.drain()
    }

    // ── accessors ─────────────────────────────────────────────────────────

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name() == name)
    }

    pub fn registry(&self) -> Option<&PointRegistry> {
        self.registry.as_ref()
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn picking(&self) -> &PickingManager {
        &self.picking
    }

    pub fn scheduler(&self) -> &RenderScheduler {
        &self.scheduler
    }

    pub fn gfx(&self) -> &G {
        &self.gfx
    }

    pub fn gfx_mut(&mut self) -> &mut G {
        &mut self.gfx
    }

    /// Cancels pending passes and releases every GPU resource. Idempotent.
    pub fn teardown(&mut self) {
        self.scheduler.cancel();
        self.unload();
        self.picking.destroy(&mut self.gfx);
        self.palette.destroy(&mut self.gfx);
        self.shared.destroy(&mut self.gfx);
    }
}

impl<G: GraphicsContext> Drop for Viewport<G> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use glam::Vec3;
    use orrery_engine::gfx::HeadlessContext;

    use crate::labels::Coverage;
    use crate::layer::{EdgeRecord, LabelRecord, NodeRecord};
    use crate::load::{EdgeSpec, LabelSpec, NodeSpec};
    use crate::picking::{rendered_pixel, PickKind};
    use crate::registry::PointRecord;
    use crate::ErrorKind;

    struct Blocks;

    impl LabelRasterizer for Blocks {
        fn rasterize(&self, text: &str, px: f32) -> Coverage {
            let mut c = Coverage::new((px / 2.0).ceil() as u32 * text.len() as u32, px.ceil() as u32);
            c.data.fill(255);
            c
        }
    }

    fn points() -> Vec<PointRecord> {
        vec![
            PointRecord::new(1, 0.0, 0.0, 0.0),
            PointRecord::new(2, 10.0, 0.0, 0.0),
            PointRecord::new(3, 5.0, 5.0, 0.0),
        ]
    }

    fn graph_layer(name: &str) -> LayerSpec {
        LayerSpec::new(name)
            .with_nodes(NodeSpec::new((1..=3).map(|i| NodeRecord::new(10 + i, i).with_radius(1.0)).collect()))
            .with_edges(EdgeSpec::new(vec![EdgeRecord::new(100, 1, 2)]))
    }

    fn viewport() -> Viewport<HeadlessContext> {
        let mut vp = Viewport::new(HeadlessContext::new(), ViewportConfig::default());
        vp.resize(Screen::new(200.0, 100.0, 1.0));
        vp
    }

    fn screen_draws(vp: &Viewport<HeadlessContext>, mode: RenderMode) -> Vec<String> {
        vp.gfx()
            .draws()
            .into_iter()
            .filter(|&(_, target, m)| target == Target::Screen && m == mode.uniform())
            .map(|(label, ..)| label.to_string())
            .collect()
    }

    #[test]
    fn three_points_one_edge_end_to_end() {
        let mut vp = viewport();
        vp.load(&LoadSpec::new(points()).with_layer(graph_layer("graph"))).unwrap();

        let bounds = vp.registry().unwrap().bounds();
        assert_eq!(bounds.min, Vec3::ZERO);
        assert_eq!(bounds.max, Vec3::new(10.0, 5.0, 0.0));

        let layer = vp.layer("graph").unwrap();
        let ids = |r: Option<&Renderable>| {
            let key = r.unwrap().picking_key().unwrap();
            vp.picking().allocation(key).unwrap().len()
        };
        assert_eq!(ids(layer.nodes()), 3);
        assert_eq!(ids(layer.edges()), 1);
        assert!(layer.labels().is_none());

        vp.gfx_mut().take_commands();
        let passes = vp.frame(Instant::now()).unwrap();
        assert_eq!(passes, vec![RenderMode::Draft, RenderMode::Picking]);
        assert_eq!(screen_draws(&vp, RenderMode::Draft), vec!["graph nodes", "graph edges"]);
        assert!(vp.gfx().draws().iter().all(|(label, ..)| !label.ends_with("labels")));
    }

    #[test]
    fn passes_follow_the_scheduler() {
        let mut vp = viewport();
        vp.load(&LoadSpec::new(points()).with_layer(graph_layer("graph"))).unwrap();
        let t0 = Instant::now();
        let config = SchedulerConfig::default();

        // A burst of invalidations collapses into one DRAFT.
        vp.invalidate();
        vp.invalidate();
        assert_eq!(vp.frame(t0).unwrap(), vec![RenderMode::Draft, RenderMode::Picking]);
        assert!(vp.frame(t0).unwrap().is_empty());

        let t1 = t0 + config.medium_delay;
        assert_eq!(vp.frame(t1).unwrap(), vec![RenderMode::Medium]);
        let t2 = t1 + config.high_delay;
        vp.gfx_mut().take_commands();
        assert_eq!(vp.frame(t2).unwrap(), vec![RenderMode::HighPass1, RenderMode::HighPass2]);
        assert_eq!(screen_draws(&vp, RenderMode::HighPass2), vec!["graph nodes", "graph edges"]);
        assert!(vp.next_deadline().is_none());
        assert!(!vp.wants_refresh(t2 + Duration::from_secs(1)));
    }

    #[test]
    fn newest_layer_draws_first_and_labels_lead() {
        let mut vp = viewport();
        vp.set_rasterizer(Box::new(Blocks));
        let labels = LabelSpec::new(vec![LabelRecord::new(1, 3, "C")]);
        let spec = LoadSpec::new(points())
            .with_layer(graph_layer("old"))
            .with_layer(graph_layer("new").with_labels(labels));
        vp.load(&spec).unwrap();

        vp.gfx_mut().take_commands();
        vp.frame(Instant::now()).unwrap();
        assert_eq!(
            screen_draws(&vp, RenderMode::Draft),
            vec!["new labels", "new nodes", "new edges", "old nodes", "old edges"]
        );

        // Labels never enter the picking pass.
        let fb = vp.picking().framebuffer().unwrap();
        let picking: Vec<_> = vp
            .gfx()
            .draws()
            .into_iter()
            .filter(|&(_, target, _)| target == Target::Framebuffer(fb))
            .map(|(label, ..)| label.to_string())
            .collect();
        assert_eq!(picking, vec!["new nodes", "new edges", "old nodes", "old edges"]);
    }

    #[test]
    fn hover_and_click_report_caller_ids() {
        let mut vp = viewport();
        vp.load(&LoadSpec::new(points()).with_layer(graph_layer("graph"))).unwrap();
        vp.frame(Instant::now()).unwrap();

        let key = vp.layer("graph").unwrap().nodes().unwrap().picking_key().unwrap();
        let id = vp.picking().allocation(key).unwrap().id(1).unwrap();
        let fb = vp.picking().framebuffer().unwrap();
        vp.gfx_mut().set_pixel(fb, 20, 30, rendered_pixel(id)).unwrap();

        let node = PickTarget { layer: "graph".to_string(), kind: PickKind::Node, id: 12 };
        vp.pointer_moved(20.5, 30.5).unwrap();
        assert_eq!(vp.drain_events(), vec![PickEvent::HoverOn(node.clone())]);

        // Same entity again: no transition.
        vp.pointer_moved(20.0, 30.0).unwrap();
        assert!(vp.drain_events().is_empty());

        assert_eq!(vp.clicked(20.0, 30.0).unwrap(), Some(node.clone()));
        vp.pointer_moved(50.0, 50.0).unwrap();
        assert_eq!(vp.drain_events(), vec![PickEvent::Click(node.clone()), PickEvent::HoverOff(node)]);
    }

    #[test]
    fn pointer_outside_clears_hover() {
        let mut vp = viewport();
        vp.load(&LoadSpec::new(points()).with_layer(graph_layer("graph"))).unwrap();
        vp.frame(Instant::now()).unwrap();
        let key = vp.layer("graph").unwrap().edges().unwrap().picking_key().unwrap();
        let id = vp.picking().allocation(key).unwrap().id(0).unwrap();
        let fb = vp.picking().framebuffer().unwrap();
        vp.gfx_mut().set_pixel(fb, 1, 1, rendered_pixel(id)).unwrap();

        vp.pointer_moved(1.0, 1.0).unwrap();
        vp.pointer_moved(500.0, 1.0).unwrap();
        let edge = PickTarget { layer: "graph".to_string(), kind: PickKind::Edge, id: 100 };
        assert_eq!(vp.drain_events(), vec![PickEvent::HoverOn(edge.clone()), PickEvent::HoverOff(edge)]);
    }

    fn hover_node(vp: &mut Viewport<HeadlessContext>, layer: &str, slot: u32) {
        let key = vp.layer(layer).unwrap().nodes().unwrap().picking_key().unwrap();
        let id = vp.picking().allocation(key).unwrap().id(slot).unwrap();
        let fb = vp.picking().framebuffer().unwrap();
        vp.gfx_mut().set_pixel(fb, 5, 5, rendered_pixel(id)).unwrap();
        vp.pointer_moved(5.0, 5.0).unwrap();
    }

    #[test]
    fn destroying_hovered_entities_ends_the_hover() {
        let mut vp = viewport();
        vp.load(&LoadSpec::new(points()).with_layer(graph_layer("g"))).unwrap();
        vp.frame(Instant::now()).unwrap();
        let node = |id| PickTarget { layer: "g".to_string(), kind: PickKind::Node, id };

        hover_node(&mut vp, "g", 0);
        assert_eq!(vp.drain_events(), vec![PickEvent::HoverOn(node(11))]);
        assert!(vp.remove_layer("g"));
        assert_eq!(vp.drain_events(), vec![PickEvent::HoverOff(node(11))]);
        vp.pointer_moved(50.0, 50.0).unwrap();
        assert!(vp.drain_events().is_empty());

        // Replacing a layer's nodes ends a hover on the old ones.
        vp.add_layer(&graph_layer("g")).unwrap();
        vp.frame(Instant::now()).unwrap();
        hover_node(&mut vp, "g", 2);
        vp.add_nodes("g", "ring", &[NodeRecord::new(21, 1)], &NodeMapping::default(), LayerOptions::default())
            .unwrap();
        assert_eq!(vp.drain_events(), vec![PickEvent::HoverOn(node(13)), PickEvent::HoverOff(node(13))]);
        assert!(vp.picking().hovered().is_none());
    }

    #[test]
    fn bad_reference_leaves_no_layer() {
        let mut vp = viewport();
        vp.load(&LoadSpec::new(points())).unwrap();
        let free = vp.picking().available();

        let bad = LayerSpec::new("bad")
            .with_nodes(NodeSpec::new(vec![NodeRecord::new(1, 1)]))
            .with_edges(EdgeSpec::new(vec![EdgeRecord::new(7, 1, 99)]));
        let err = vp.add_layer(&bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
        assert!(vp.layer("bad").is_none());
        assert_eq!(vp.picking().available(), free);
    }

    #[test]
    fn layers_need_points_and_unique_names() {
        let mut vp = viewport();
        let err = vp.add_layer(&graph_layer("graph")).unwrap_err();
        assert!(matches!(err, GraphError::NotLoaded));

        vp.load(&LoadSpec::new(points())).unwrap();
        vp.add_layer(&graph_layer("graph")).unwrap();
        let err = vp.add_layer(&graph_layer("graph")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(vp.layers().len(), 1);
    }

    #[test]
    fn remove_layer_returns_picking_ids() {
        let mut vp = viewport();
        vp.load(&LoadSpec::new(points())).unwrap();
        let free = vp.picking().available();
        vp.add_layer(&graph_layer("graph")).unwrap();
        assert_eq!(vp.picking().available(), free - 4);

        assert!(vp.remove_layer("graph"));
        assert!(!vp.remove_layer("graph"));
        assert_eq!(vp.picking().available(), free);
    }

    #[test]
    fn resize_invalidates_and_tracks_size() {
        let mut vp = viewport();
        vp.frame(Instant::now()).unwrap();
        vp.resize(Screen::new(200.0, 100.0, 1.0));
        assert!(!vp.wants_refresh(Instant::now()));
        vp.resize(Screen::new(300.0, 100.0, 2.0));
        assert!(vp.wants_refresh(Instant::now()));
        assert_eq!(vp.size().physical_size(), (600, 200));
    }

    #[test]
    fn fit_camera_undoes_navigation() {
        let mut vp = viewport();
        vp.load(&LoadSpec::new(points())).unwrap();
        let fitted = *vp.camera();
        vp.pan(20.0, -10.0);
        vp.camera_mut().half_height *= 3.0;
        assert_ne!(*vp.camera(), fitted);
        vp.frame(Instant::now()).unwrap();
        vp.fit_camera();
        assert_eq!(*vp.camera(), fitted);
        assert!(vp.wants_refresh(Instant::now()));
    }

    #[test]
    fn teardown_releases_everything() {
        let mut vp = viewport();
        vp.load(&LoadSpec::new(points()).with_layer(graph_layer("graph")).with_colors(vec![ColorRgba::white()]))
            .unwrap();
        vp.frame(Instant::now()).unwrap();
        vp.teardown();
        assert_eq!(vp.gfx().live_resources(), 0);
        assert!(vp.scheduler().next_deadline().is_none());
        assert!(vp.layers().is_empty());
    }
}
