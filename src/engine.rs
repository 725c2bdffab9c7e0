use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use log::{debug, info};

use crate::config::SceneConfig;

/// The scene-graph engine the surface renders through.
///
/// Implementations own every engine handle (device, driver, scene manager);
/// nothing is process-global. All calls happen on the thread that owns the
/// graphics context.
pub trait SceneEngine {
    /// Creates the device for a `width` x `height` target and places the
    /// default camera.
    fn prepare_scene(&mut self, width: u32, height: u32, scene: &SceneConfig) -> Result<()>;

    /// Mounts the preloaded archive under `asset_dir` and binds mesh and
    /// texture into the scene.
    fn load_assets(&mut self, asset_dir: &Path, scene: &SceneConfig) -> Result<()>;

    fn resize_viewport(&mut self, width: u32, height: u32);

    fn draw_frame(&mut self) -> Result<()>;
}

impl<E: SceneEngine + ?Sized> SceneEngine for Box<E> {
    fn prepare_scene(&mut self, width: u32, height: u32, scene: &SceneConfig) -> Result<()> {
        (**self).prepare_scene(width, height, scene)
    }

    fn load_assets(&mut self, asset_dir: &Path, scene: &SceneConfig) -> Result<()> {
        (**self).load_assets(asset_dir, scene)
    }

    fn resize_viewport(&mut self, width: u32, height: u32) {
        (**self).resize_viewport(width, height)
    }

    fn draw_frame(&mut self) -> Result<()> {
        (**self).draw_frame()
    }
}

/// Calls observed by [`RecordingEngine`], in order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Prepare { width: u32, height: u32 },
    LoadAssets { archive: PathBuf },
    Resize { width: u32, height: u32 },
    Draw,
}

/// Headless engine that validates what it is asked to load and records the
/// call sequence instead of rendering.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    calls: Vec<EngineCall>,
    viewport: (u32, u32),
    mesh: Option<String>,
    frames: u64,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Mesh bound by the last successful [`SceneEngine::load_assets`].
    pub fn mesh(&self) -> Option<&str> {
        self.mesh.as_deref()
    }
}

impl SceneEngine for RecordingEngine {
    fn prepare_scene(&mut self, width: u32, height: u32, scene: &SceneConfig) -> Result<()> {
        info!(
            "scene prepared at {width}x{height}, camera {} -> {}",
            scene.camera_position, scene.camera_target
        );
        self.viewport = (width, height);
        self.calls.push(EngineCall::Prepare { width, height });
        Ok(())
    }

    fn load_assets(&mut self, asset_dir: &Path, scene: &SceneConfig) -> Result<()> {
        let archive = asset_dir.join(&scene.archive);
        if !archive.is_file() {
            return Err(anyhow!("archive {} is missing", archive.display()));
        }
        info!(
            "bound mesh {} with texture {} from {} (lighting {})",
            scene.mesh,
            scene.texture,
            archive.display(),
            if scene.lighting { "on" } else { "off" }
        );
        self.mesh = Some(scene.mesh.clone());
        self.calls.push(EngineCall::LoadAssets { archive });
        Ok(())
    }

    fn resize_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
        self.calls.push(EngineCall::Resize { width, height });
    }

    fn draw_frame(&mut self) -> Result<()> {
        self.frames += 1;
        debug!("frame {}", self.frames);
        self.calls.push(EngineCall::Draw);
        Ok(())
    }
}
