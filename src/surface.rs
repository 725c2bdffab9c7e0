use std::path::Path;

use anyhow::{Context, Result};
use glam::{Vec2, Vec3};
use log::{debug, info};

use crate::config::SceneConfig;
use crate::engine::SceneEngine;
use crate::input::DragState;
use crate::orientation::{self, Orientation};
use crate::transform::{self, Mat4Buffer};

pub const FIELD_OF_VIEW_DEGREES: f32 = 60.0;
pub const Z_NEAR: f32 = 1.0;
pub const Z_FAR: f32 = 20.0;
pub const DEFAULT_EYE: Vec3 = Vec3::new(0.0, 0.0, 2.0);

/// Radians of rotation per pixel of pointer drag.
const DRAG_RADIANS_PER_PIXEL: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    Uninitialized,
    Ready,
}

/// Owns the viewport, the projection and the viewed object's orientation,
/// and forwards the frame lifecycle to the scene engine.
#[derive(Debug)]
pub struct RenderSurface<E> {
    engine: E,
    scene: SceneConfig,
    state: SurfaceState,
    width: u32,
    height: u32,
    projection: Mat4Buffer,
    orientation: Orientation,
    eye: Vec3,
    drag: DragState,
}

impl<E: SceneEngine> RenderSurface<E> {
    pub fn new(engine: E, scene: SceneConfig) -> Self {
        Self {
            engine,
            scene,
            state: SurfaceState::Uninitialized,
            width: 1,
            height: 1,
            projection: transform::IDENTITY,
            orientation: Orientation::IDENTITY,
            eye: DEFAULT_EYE,
            drag: DragState::new(),
        }
    }

    /// One-time engine setup. Repeated calls are no-ops.
    pub fn prepare(&mut self) -> Result<()> {
        if self.state == SurfaceState::Ready {
            return Ok(());
        }
        self.engine
            .prepare_scene(self.width, self.height, &self.scene)
            .context("failed to prepare scene")?;
        self.state = SurfaceState::Ready;
        info!("render surface ready at {}x{}", self.width, self.height);
        Ok(())
    }

    /// Binds the preloaded mesh and texture. Only valid once prepared.
    pub fn load_assets(&mut self, asset_dir: &Path) -> Result<()> {
        self.engine
            .load_assets(asset_dir, &self.scene)
            .with_context(|| format!("failed to bind assets from {}", asset_dir.display()))
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        let aspect = self.aspect();
        transform::load_identity(&mut self.projection);
        transform::perspective(
            &mut self.projection,
            FIELD_OF_VIEW_DEGREES,
            aspect,
            Z_NEAR,
            Z_FAR,
        );
        if self.state == SurfaceState::Ready {
            self.engine.resize_viewport(self.width, self.height);
        }
        debug!("viewport {}x{} (aspect {aspect})", self.width, self.height);
    }

    pub fn draw(&mut self) -> Result<()> {
        match self.state {
            SurfaceState::Ready => self.engine.draw_frame().context("frame failed"),
            SurfaceState::Uninitialized => {
                debug!("skipping frame, surface not prepared");
                Ok(())
            }
        }
    }

    /// Model-view matrix re-derived from the current orientation and eye.
    pub fn model_view(&self) -> Mat4Buffer {
        orientation::model_view(self.orientation, self.eye)
    }

    pub fn mouse_down(&mut self, position: Vec2) {
        self.drag.press(position);
    }

    pub fn mouse_up(&mut self) {
        self.drag.release();
    }

    /// Turns the object while the left button is held.
    pub fn mouse_move(&mut self, position: Vec2) {
        let Some(delta) = self.drag.drag_to(position) else {
            return;
        };
        if delta == Vec2::ZERO {
            return;
        }
        let axis = Vec3::new(delta.y, delta.x, 0.0);
        let turn = Orientation::from_axis_angle(axis, delta.length() * DRAG_RADIANS_PER_PIXEL);
        self.orientation.rotate_by(turn);
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
    }

    pub fn rotate(&mut self, delta: Orientation) {
        self.orientation.rotate_by(delta);
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    pub fn projection(&self) -> &Mat4Buffer {
        &self.projection
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}
