use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use glam::{Vec2, Vec3};
use log::{debug, info};

use tumbler::host::ContextHandle;
use tumbler::input::InputClasses;
use tumbler::{
    App, AppConfig, EventPayload, FileMount, GraphicsAttribs, Host, InputEvent, MouseButton,
    MouseEvent, Orientation, Phase, RecordingEngine,
};

/// Pause between swaps while assets are still loading.
const LOADING_POLL: Duration = Duration::from_millis(5);

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let mut config = match &options.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    init_logging(&config.log_filter);

    if let Some(dir) = options.data_dir.clone() {
        config.data_dir = dir;
    }
    let (width, height) = options.size.unwrap_or((config.width, config.height));

    let mut app = App::new(ConsoleHost::new(), RecordingEngine::new(), config);
    let mount = Arc::new(FileMount::new(&options.asset_root));
    app.on_init(width, height, mount)
        .with_context(|| format!("failed to start from {}", options.asset_root.display()))?;
    app.on_view_changed(width, height);
    app.on_focus_changed(true);
    play_drag(&mut app, width, height);

    let spin = Orientation::from_axis_angle(Vec3::new(1.0, 1.0, 0.0), 0.05);
    let mut frames = 0;
    while frames < options.frames {
        if !app.host_mut().take_swap() {
            break;
        }
        app.on_swap_complete(0)?;
        match app.phase() {
            Phase::Steady => {
                frames += 1;
                if let Some(surface) = app.surface_mut() {
                    surface.rotate(spin);
                }
            }
            Phase::Loading => thread::sleep(LOADING_POLL),
            Phase::Failed => break,
            Phase::Idle | Phase::BindOnce => {}
        }
    }

    if let Some(message) = app.failure() {
        return Err(anyhow!("{message}"));
    }
    if let Some(report) = app.load_report() {
        println!(
            "Loaded {} asset(s) ({} bytes) into {}",
            report.records.len(),
            report.total_bytes(),
            report.dir.display()
        );
    }
    let surface = app
        .surface()
        .ok_or_else(|| anyhow!("render surface was never created"))?;
    println!(
        "Rendered {} frame(s) at {}x{}",
        surface.engine().frames(),
        surface.width(),
        surface.height()
    );
    println!("Model-view: {:?}", surface.model_view());
    Ok(())
}

fn init_logging(default_filter: &str) {
    let env = env_logger::Env::default().default_filter_or(default_filter);
    env_logger::Builder::from_env(env).init();
}

/// Replays a short left-button drag, as raw host codes, through the input path.
fn play_drag(app: &mut App<ConsoleHost, RecordingEngine>, width: u32, height: u32) {
    let center = Vec2::new(width as f32, height as f32) * 0.5;
    let at = |offset: Vec2| {
        EventPayload::Mouse(MouseEvent::new(MouseButton::Left, center + offset))
    };
    for (code, payload) in [
        (3, at(Vec2::ZERO)),
        (0, at(Vec2::ZERO)),
        (2, at(Vec2::new(24.0, 8.0))),
        (1, at(Vec2::new(24.0, 8.0))),
    ] {
        if !app.on_input(&InputEvent::decode(code, payload)) {
            debug!("input code {code} ignored");
        }
    }
}

/// Stands in for the browser runtime: prints posted messages and queues
/// swap completions for the driver loop.
#[derive(Debug, Default)]
struct ConsoleHost {
    next_context: u64,
    pending_swaps: usize,
}

impl ConsoleHost {
    fn new() -> Self {
        Self::default()
    }

    fn take_swap(&mut self) -> bool {
        if self.pending_swaps == 0 {
            return false;
        }
        self.pending_swaps -= 1;
        true
    }
}

impl Host for ConsoleHost {
    fn instance_id(&self) -> i64 {
        1
    }

    fn create_context(&mut self, attribs: &GraphicsAttribs) -> Result<ContextHandle> {
        self.next_context += 1;
        info!(
            "graphics context {} ({}x{}, depth {}, stencil {})",
            self.next_context, attribs.width, attribs.height, attribs.depth_size, attribs.stencil_size
        );
        Ok(ContextHandle(self.next_context))
    }

    fn bind_graphics(&mut self, context: ContextHandle) -> Result<()> {
        debug!("bound context {}", context.0);
        Ok(())
    }

    fn swap_buffers(&mut self, _context: ContextHandle) {
        self.pending_swaps += 1;
    }

    fn post_message(&mut self, message: String) {
        println!("{}", message.trim_end());
    }

    fn request_input_events(&mut self, classes: InputClasses) {
        debug!("input events requested: {:#x}", classes.bits());
    }

    fn request_filtering_input_events(&mut self, classes: InputClasses) {
        debug!("filtered input events requested: {:#x}", classes.bits());
    }
}

struct CliOptions {
    asset_root: PathBuf,
    config: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    frames: u64,
    size: Option<(u32, u32)>,
}

const USAGE: &str =
    "Usage: tumbler <asset-root> [--config FILE] [--data-dir DIR] [--frames N] [--size WxH]";

impl CliOptions {
    fn parse() -> Result<Self> {
        Self::parse_from(env::args().skip(1))
    }

    fn parse_from(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut args = args.into_iter();
        let Some(asset_root) = args.next() else {
            return Err(anyhow!(USAGE));
        };
        let mut options = Self {
            asset_root: PathBuf::from(asset_root),
            config: None,
            data_dir: None,
            frames: 60,
            size: None,
        };
        while let Some(arg) = args.next() {
            let mut value = || {
                args.next()
                    .ok_or_else(|| anyhow!("{arg} expects a value. {USAGE}"))
            };
            match arg.as_str() {
                "--config" => options.config = Some(PathBuf::from(value()?)),
                "--data-dir" => options.data_dir = Some(PathBuf::from(value()?)),
                "--frames" => {
                    let raw = value()?;
                    options.frames = raw
                        .parse()
                        .with_context(|| format!("invalid frame count {raw}"))?;
                }
                "--size" => options.size = Some(parse_size(&value()?)?),
                other => {
                    return Err(anyhow!("Unknown argument: {other}. {USAGE}"));
                }
            }
        }
        Ok(options)
    }
}

fn parse_size(raw: &str) -> Result<(u32, u32)> {
    let (width, height) = raw
        .split_once(|c: char| c == 'x' || c == 'X')
        .ok_or_else(|| anyhow!("size must look like 800x600, got {raw}"))?;
    Ok((
        width.parse().with_context(|| format!("invalid width in {raw}"))?,
        height.parse().with_context(|| format!("invalid height in {raw}"))?,
    ))
}
