use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::engine::SceneEngine;
use crate::host::{ContextHandle, Host};
use crate::input::{
    describe_key_event, describe_mouse_event, describe_wheel_event, InputClasses, InputEvent,
    MouseButton, MouseEvent,
};
use crate::loader::{error_chain, AssetLoader, AssetManifest, Fetcher, LoadReport, LoadStatus};
use crate::surface::RenderSurface;

/// Where the adapter is in its startup sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Constructed, waiting for the host's init callback.
    Idle,
    /// Worker thread is fetching assets; frames are flushed empty.
    Loading,
    /// Assets are on disk and will be bound on the next frame.
    BindOnce,
    Steady,
    /// Assets could not be loaded or bound. No further frames are requested.
    Failed,
}

/// Bridges host lifecycle callbacks to the render surface.
///
/// Every callback runs on the host's main thread. The only work that leaves
/// it is the asset preload, whose result is picked up by polling in
/// [`App::on_swap_complete`].
pub struct App<H: Host, E: SceneEngine> {
    host: H,
    config: AppConfig,
    manifest: AssetManifest,
    engine: Option<E>,
    surface: Option<RenderSurface<E>>,
    context: Option<ContextHandle>,
    loader: Option<AssetLoader>,
    report: Option<LoadReport>,
    failure: Option<String>,
    phase: Phase,
    width: u32,
    height: u32,
}

impl<H: Host, E: SceneEngine> App<H, E> {
    pub fn new(mut host: H, engine: E, config: AppConfig) -> Self {
        host.request_input_events(InputClasses::MOUSE | InputClasses::WHEEL);
        host.request_filtering_input_events(InputClasses::KEYBOARD);
        let (width, height) = (config.width.max(1), config.height.max(1));
        Self {
            host,
            config,
            manifest: AssetManifest::default(),
            engine: Some(engine),
            surface: None,
            context: None,
            loader: None,
            report: None,
            failure: None,
            phase: Phase::Idle,
            width,
            height,
        }
    }

    pub fn with_manifest(mut self, manifest: AssetManifest) -> Self {
        self.manifest = manifest;
        self
    }

    /// Creates the graphics context and surface, flushes a first empty frame
    /// and starts fetching assets through `fetcher`.
    pub fn on_init(&mut self, width: u32, height: u32, fetcher: Arc<dyn Fetcher>) -> Result<()> {
        if self.phase != Phase::Idle {
            bail!("instance already initialized");
        }
        self.width = width.max(1);
        self.height = height.max(1);
        self.init_graphics()?;

        let loader = AssetLoader::spawn(
            self.manifest.clone(),
            fetcher,
            self.config.data_dir.clone(),
            (&self.config.retry).into(),
        )
        .context("failed to start asset loader")?;

        let engine = self
            .engine
            .take()
            .ok_or_else(|| anyhow!("scene engine already consumed"))?;
        let mut surface = RenderSurface::new(engine, self.config.scene.clone());
        surface.resize(self.width, self.height);
        self.surface = Some(surface);

        self.flush_context();
        self.loader = Some(loader);
        self.phase = Phase::Loading;
        info!("initialized at {}x{}, loading assets", self.width, self.height);
        Ok(())
    }

    fn init_graphics(&mut self) -> Result<()> {
        if self.context.is_some() {
            return Ok(());
        }
        let attribs = self
            .config
            .graphics
            .clone()
            .with_size(self.width, self.height);
        let context = self
            .host
            .create_context(&attribs)
            .context("failed to create graphics context")?;
        self.host
            .bind_graphics(context)
            .context("failed to bind graphics context")?;
        self.context = Some(context);
        Ok(())
    }

    fn flush_context(&mut self) {
        if let Some(context) = self.context {
            self.host.swap_buffers(context);
        }
    }

    /// Called by the host once the previously requested swap has completed.
    pub fn on_swap_complete(&mut self, result: i32) -> Result<()> {
        if result != 0 {
            warn!("buffer swap completed with error {result}");
        }
        if self.context.is_none() {
            debug!("no graphics context, frame loop paused");
            return Ok(());
        }

        self.poll_loader();
        match self.phase {
            Phase::Idle | Phase::Failed => return Ok(()),
            Phase::BindOnce => {
                self.bind_assets();
                if self.phase == Phase::Failed {
                    return Ok(());
                }
            }
            Phase::Loading | Phase::Steady => {}
        }

        if let Some(surface) = self.surface.as_mut() {
            if let Err(err) = surface.draw() {
                self.fail(format!("drawing failed: {err:#}"));
                return Ok(());
            }
        }
        self.flush_context();
        Ok(())
    }

    fn poll_loader(&mut self) {
        if self.phase != Phase::Loading {
            return;
        }
        let Some(loader) = self.loader.as_ref() else {
            return;
        };
        match loader.status() {
            LoadStatus::Pending { completed, total } => {
                debug!("assets {completed}/{total}");
            }
            LoadStatus::Complete(report) => {
                if report.retried() > 0 {
                    info!("{} asset(s) needed retries", report.retried());
                }
                self.report = Some(report);
                self.loader = None;
                self.phase = Phase::BindOnce;
            }
            LoadStatus::Failed(err) => {
                self.loader = None;
                self.fail(format!("asset loading failed: {}", error_chain(err.as_ref())));
            }
        }
    }

    fn bind_assets(&mut self) {
        let bound = match (self.surface.as_mut(), self.report.as_ref()) {
            (Some(surface), Some(report)) => surface
                .prepare()
                .and_then(|()| surface.load_assets(&report.dir)),
            _ => Err(anyhow!("assets ready before surface was created")),
        };
        if let Err(err) = bound {
            self.fail(format!("asset binding failed: {err:#}"));
            return;
        }
        self.phase = Phase::Steady;
        self.host.post_message("assets ready\n".into());
    }

    fn fail(&mut self, message: String) {
        error!("{message}");
        self.host.post_message(format!("{message}\n"));
        self.failure = Some(message);
        self.phase = Phase::Failed;
    }

    pub fn on_view_changed(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        if let Some(surface) = self.surface.as_mut() {
            surface.resize(self.width, self.height);
        }
    }

    pub fn on_focus_changed(&mut self, focus: bool) {
        debug!("focus {}", if focus { "gained" } else { "lost" });
        self.host.post_message("DidChangeFocus".into());
    }

    pub fn on_context_lost(&mut self) {
        warn!("graphics context lost");
        self.context = None;
        self.host.post_message("Lost Graphics Context\n".into());
    }

    /// Dispatches one input event. Returns whether it was handled; unknown
    /// event kinds are ignored.
    pub fn on_input(&mut self, event: &InputEvent) -> bool {
        let instance = self.host.instance_id();
        let message = match event {
            InputEvent::Undefined => return true,
            InputEvent::MouseDown(mouse) => {
                self.forward_left_button(mouse, |surface, m| surface.mouse_down(m.position));
                describe_mouse_event(instance, mouse, "Down")
            }
            InputEvent::MouseUp(mouse) => {
                self.forward_left_button(mouse, |surface, _| surface.mouse_up());
                describe_mouse_event(instance, mouse, "Up")
            }
            InputEvent::MouseMove(mouse) => {
                self.forward_left_button(mouse, |surface, m| surface.mouse_move(m.position));
                describe_mouse_event(instance, mouse, "Move")
            }
            InputEvent::MouseEnter(mouse) => describe_mouse_event(instance, mouse, "Enter"),
            InputEvent::MouseLeave(mouse) => describe_mouse_event(instance, mouse, "Leave"),
            InputEvent::ContextMenu(key) => describe_key_event(instance, key, "Context"),
            InputEvent::Wheel(wheel) => describe_wheel_event(instance, wheel),
            InputEvent::RawKeyDown(key) => describe_key_event(instance, key, "RawKeyDown"),
            InputEvent::KeyDown(key) => describe_key_event(instance, key, "Down"),
            InputEvent::KeyUp(key) => describe_key_event(instance, key, "Up"),
            InputEvent::Char(key) => describe_key_event(instance, key, "Character"),
            InputEvent::ImeCompositionStart => "IME composition start".into(),
            InputEvent::ImeCompositionUpdate => "IME composition update".into(),
            InputEvent::ImeCompositionEnd => "IME composition end".into(),
            InputEvent::ImeText => "IME text".into(),
            InputEvent::Unrecognized(code) => {
                debug!("ignoring unrecognized input event type {code}");
                return false;
            }
        };
        self.host.post_message(message);
        true
    }

    fn forward_left_button(
        &mut self,
        mouse: &MouseEvent,
        apply: impl FnOnce(&mut RenderSurface<E>, &MouseEvent),
    ) {
        if mouse.button != MouseButton::Left {
            return;
        }
        if let Some(surface) = self.surface.as_mut() {
            apply(surface, mouse);
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Message describing why the adapter entered [`Phase::Failed`].
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn load_report(&self) -> Option<&LoadReport> {
        self.report.as_ref()
    }

    pub fn viewport(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn surface(&self) -> Option<&RenderSurface<E>> {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut RenderSurface<E>> {
        self.surface.as_mut()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}
