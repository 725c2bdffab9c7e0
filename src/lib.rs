//! Plugin-side core of the tumbler scene viewer.
//!
//! The crate owns the parts of the viewer that do not depend on a particular
//! browser runtime or 3D engine: the matrix helpers, the render-surface
//! lifecycle, input dispatch and the background asset preload. The runtime
//! and the engine plug in through the [`Host`] and [`SceneEngine`] traits, so
//! everything here runs headless under test.

pub mod app;
pub mod config;
pub mod engine;
pub mod host;
pub mod input;
pub mod loader;
pub mod orientation;
pub mod surface;
pub mod transform;

pub use app::{App, Phase};
pub use config::{AppConfig, SceneConfig};
pub use engine::{RecordingEngine, SceneEngine};
pub use host::{ContextHandle, GraphicsAttribs, Host};
pub use input::{
    EventPayload, InputEvent, KeyboardEvent, Modifiers, MouseButton, MouseEvent, WheelEvent,
};
pub use loader::{AssetLoader, AssetManifest, Fetcher, FileMount, LoadStatus, RetryPolicy};
pub use orientation::Orientation;
pub use surface::RenderSurface;
pub use transform::Mat4Buffer;
