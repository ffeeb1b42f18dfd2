//! Windowed host: a [`Viewport`] driven by the engine runtime.
//!
//! The runtime asks for frames only while the scheduler has a pass due and
//! sleeps until its next deadline otherwise. Pointer input maps onto the
//! viewport: hover and click go to picking, drag pans, the wheel zooms.
//!
//! ```rust,ignore
//! GraphHost::new(HostConfig::default())
//!     .title("social graph")
//!     .on_pick(|e| println!("{e:?}"))
//!     .run(|viewport| viewport.load(&load_spec()))?;
//! ```

use std::time::Instant;

use anyhow::Context;
use winit::dpi::LogicalSize;
use winit::window::WindowId;

use orrery_engine::core::{App, AppControl, FrameCtx};
use orrery_engine::device::GpuInit;
use orrery_engine::gfx::WgpuContext;
use orrery_engine::input::{InputState, PointerGesture};
use orrery_engine::logging::{init_logging, LoggingConfig};
use orrery_engine::window::{Runtime, RuntimeConfig};

use crate::error::{ErrorKind, Result};
use crate::labels::FontRasterizer;
use crate::picking::PickEvent;
use crate::viewport::{Viewport, ViewportConfig};

/// Zoom factor per wheel line.
const ZOOM_STEP: f32 = 1.1;
const PIXELS_PER_LINE: f32 = 40.0;

type Setup = Box<dyn FnOnce(&mut Viewport<WgpuContext>) -> Result<()>>;
type PickHandler = Box<dyn FnMut(&PickEvent)>;

#[derive(Debug, Clone, Default)]
pub struct HostConfig {
    pub runtime: RuntimeConfig,
    pub gpu: GpuInit,
    pub logging: LoggingConfig,
    pub viewport: ViewportConfig,
    /// TrueType/OpenType bytes for labels. Without it, label layers fail to build.
    pub font: Option<Vec<u8>>,
}

/// Builder for a single-window graph application.
pub struct GraphHost {
    config: HostConfig,
    handlers: Vec<PickHandler>,
}

impl GraphHost {
    pub fn new(config: HostConfig) -> Self {
        Self { config, handlers: Vec::new() }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.runtime.title = title.into();
        self
    }

    /// Initial window size in logical pixels.
    pub fn size(mut self, width: f64, height: f64) -> Self {
        self.config.runtime.initial_size = LogicalSize::new(width, height);
        self
    }

    pub fn font(mut self, bytes: Vec<u8>) -> Self {
        self.config.font = Some(bytes);
        self
    }

    /// Called for every hover-on, hover-off and click.
    pub fn on_pick(mut self, handler: impl FnMut(&PickEvent) + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Opens the window and blocks until it closes.
    ///
    /// `setup` runs once the GPU is up, before the first frame; it typically
    /// loads the graph.
    pub fn run<F>(self, setup: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut Viewport<WgpuContext>) -> Result<()> + 'static,
    {
        let HostConfig { runtime, gpu, logging, viewport, font } = self.config;
        init_logging(logging);

        let rasterizer = font
            .map(|bytes| FontRasterizer::from_bytes(&bytes))
            .transpose()
            .context("failed to load label font")?;

        let state = HostState {
            viewport_config: viewport,
            rasterizer,
            setup: Some(Box::new(setup)),
            handlers: self.handlers,
            viewport: None,
        };
        Runtime::run(runtime, gpu, state)
    }
}

/// Engine-facing side of [`GraphHost`].
struct HostState {
    viewport_config: ViewportConfig,
    rasterizer: Option<FontRasterizer>,
    setup: Option<Setup>,
    handlers: Vec<PickHandler>,
    /// Created on the first frame, once a device exists.
    viewport: Option<Viewport<WgpuContext>>,
}

impl HostState {
    fn start(&mut self, ctx: &mut FrameCtx<'_, '_>) -> Result<()> {
        let size = ctx.window.viewport();
        let config = ViewportConfig { pixel_ratio: size.pixel_ratio, ..self.viewport_config.clone() };
        let mut viewport = Viewport::new(ctx.gpu.graphics_context(), config);
        viewport.resize(size);
        if let Some(r) = self.rasterizer.take() {
            viewport.set_rasterizer(Box::new(r));
        }
        for handler in self.handlers.drain(..) {
            viewport.subscribe(handler);
        }
        if let Some(setup) = self.setup.take() {
            setup(&mut viewport)?;
        }
        self.viewport = Some(viewport);
        Ok(())
    }
}

impl App for HostState {
    fn on_input(&mut self, _window_id: WindowId, gesture: PointerGesture, _input: &InputState) -> AppControl {
        let Some(viewport) = self.viewport.as_mut() else {
            return AppControl::Continue;
        };
        let picked = match gesture {
            PointerGesture::Hover { x, y } => viewport.pointer_moved(x, y),
            PointerGesture::Click { x, y } => viewport.clicked(x, y).map(|_| ()),
            PointerGesture::Left => {
                viewport.pointer_left();
                Ok(())
            }
            PointerGesture::Drag { dx, dy } => {
                viewport.pan(dx, dy);
                Ok(())
            }
            PointerGesture::Scroll { delta, x, y } => {
                viewport.zoom_at(ZOOM_STEP.powf(delta.lines_y(PIXELS_PER_LINE)), x, y);
                Ok(())
            }
        };
        if let Err(e) = picked {
            log::warn!("picking failed: {e}");
        }
        // Subscribers already saw these.
        for event in viewport.drain_events() {
            log::debug!("pick: {event:?}");
        }
        AppControl::Continue
    }

    fn wants_redraw(&self, now: Instant) -> bool {
        self.viewport.as_ref().is_none_or(|v| v.wants_refresh(now))
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.viewport.as_ref().and_then(|v| v.next_deadline())
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if self.viewport.is_none() {
            if let Err(e) = self.start(ctx) {
                log::error!("graph setup failed: {e}");
                return AppControl::Exit;
            }
        }
        let Some(viewport) = self.viewport.as_mut() else {
            return AppControl::Continue;
        };

        viewport.resize(ctx.window.viewport());
        let now = ctx.time.now;
        if !viewport.wants_refresh(now) {
            return AppControl::Continue;
        }

        let mut result = Ok(Vec::new());
        let control = ctx.render(|frame| {
            viewport.gfx_mut().attach_surface(frame.view.clone(), frame.format);
            result = viewport.frame(now);
            viewport.gfx_mut().detach_surface();
        });

        match result {
            Ok(passes) => log::trace!("frame: {passes:?}"),
            Err(e) if e.kind() == ErrorKind::Transient => log::debug!("frame skipped: {e}"),
            Err(e) => {
                log::error!("frame failed: {e}");
                return AppControl::Exit;
            }
        }
        control
    }
}
