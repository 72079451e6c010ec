use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use glam::DVec2;
use log::{info, warn};
use pollster::block_on;
use winit::dpi::LogicalSize;
use winit::event::{
    ElementState, Event, KeyEvent, MouseButton as WinitMouseButton, MouseScrollDelta, WindowEvent,
};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode as WinitKeyCode, PhysicalKey};
use winit::platform::run_on_demand::EventLoopExtRunOnDemand;
use winit::window::WindowBuilder;

use shadow_mapping::{
    App, CliOptions, HeadlessBackend, InputEvent, KeyCode, MouseButton, NamedKey, RenderError,
    RenderTarget, SceneConfig, ShaderLibrary, WgpuBackend,
};

/// Window size in summary mode and at startup.
const WINDOW_SIZE: (u32, u32) = (1280, 720);
/// Simulated time step between summary frames.
const SUMMARY_STEP: Duration = Duration::from_millis(16);

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let config = match &options.scene {
        Some(path) => SceneConfig::load(path)?,
        None => SceneConfig::default(),
    };
    let library = match &options.shaders {
        Some(dir) => ShaderLibrary::from_dir(dir),
        None => ShaderLibrary::embedded(),
    };
    info!("{}", library.describe());

    if options.summary_only {
        return run_headless(&config, &library, options.frames);
    }

    match run_interactive(&config, &library) {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.downcast_ref::<WindowInitError>().is_some() {
                eprintln!(
                    "{err}. Falling back to --summary-only mode (set DISPLAY or install X11 libs to enable rendering)."
                );
                run_headless(&config, &library, options.frames)
            } else {
                Err(err)
            }
        }
    }
}

fn run_headless(config: &SceneConfig, library: &ShaderLibrary, frames: u32) -> Result<()> {
    let (width, height) = WINDOW_SIZE;
    let mut backend = HeadlessBackend::new(width, height);
    let mut app = App::new(config);
    app.init(&mut backend, library)?;

    for frame in 0..frames {
        app.frame_at(&mut backend, SUMMARY_STEP * frame)
            .with_context(|| format!("frame {frame} failed"))?;
    }

    print_summary(&app, &backend);
    Ok(())
}

fn print_summary(app: &App, backend: &HeadlessBackend) {
    let scene = &app.scene;
    let shadow_map = scene.shadow_map();
    let size = shadow_map.size();
    println!(
        "Shadow map {}x{} ({})",
        size.width,
        size.height,
        if shadow_map.is_complete() {
            "complete"
        } else {
            "incomplete"
        }
    );
    for program in [
        scene.depth_program(),
        scene.material(),
        scene.depth_view_program(),
        scene.lines_program(),
    ] {
        println!(
            " - program {}: {}",
            program.label(),
            if program.is_linked() { "linked" } else { "unusable" }
        );
    }
    println!("Rendered {} frame(s)", backend.frames_rendered());
    if let Some(frame) = backend.last_frame() {
        for pass in &frame.passes {
            let target = match pass.target {
                RenderTarget::Window => "color",
                RenderTarget::Depth(_) => "depth",
            };
            println!(
                " - {target} pass {}x{}: {} draw(s)",
                pass.viewport.width,
                pass.viewport.height,
                pass.draws.len()
            );
        }
    }
    let light = scene.light.position;
    println!(
        "Light at ({:.2}, {:.2}, {:.2})",
        light.x, light.y, light.z
    );
}

fn run_interactive(config: &SceneConfig, library: &ShaderLibrary) -> Result<()> {
    let mut event_loop =
        EventLoop::new().map_err(|err| WindowInitError::from_error("event loop", err))?;
    let (width, height) = WINDOW_SIZE;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("ShadowMap")
            .with_inner_size(LogicalSize::new(width as f64, height as f64))
            .build(&event_loop)
            .map_err(|err| WindowInitError::from_error("window", err))?,
    );

    let mut backend = block_on(WgpuBackend::new(Arc::clone(&window)))?;
    let mut app = App::new(config);
    app.init(&mut backend, library)?;

    let mut last_error: Option<anyhow::Error> = None;
    event_loop
        .run_on_demand(|event, elwt| {
            elwt.set_control_flow(ControlFlow::Poll);
            match event {
                Event::WindowEvent { event, window_id } if window_id == backend.window_id() => {
                    if let WindowEvent::RedrawRequested = event {
                        if let Err(err) = redraw(&mut app, &mut backend) {
                            last_error = Some(err);
                            elwt.exit();
                        }
                        return;
                    }
                    if let WindowEvent::Resized(size) = event {
                        backend.resize(size);
                    }
                    if let Some(input) = map_window_event(&event) {
                        app.handle_event(&input);
                    }
                    if app.exit_requested() {
                        elwt.exit();
                    }
                }
                Event::AboutToWait => {
                    backend.window().request_redraw();
                }
                _ => {}
            }
        })
        .map_err(|err| anyhow!("event loop failed: {err}"))?;

    match last_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn redraw(app: &mut App, backend: &mut WgpuBackend) -> Result<()> {
    match app.frame(backend) {
        Ok(()) => {}
        Err(RenderError::Surface(err)) => match err {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                let size = backend.window().inner_size();
                backend.resize(size);
            }
            wgpu::SurfaceError::OutOfMemory => {
                return Err(anyhow!("GPU is out of memory"));
            }
            wgpu::SurfaceError::Timeout => {
                warn!("Surface timeout; retrying next frame");
            }
            other => {
                warn!("Surface unavailable ({other}); retrying next frame");
            }
        },
        Err(err) => warn!("frame dropped: {err}"),
    }
    backend.set_title(&app.title());
    app.pace();
    Ok(())
}

fn map_window_event(event: &WindowEvent) -> Option<InputEvent> {
    Some(match event {
        WindowEvent::CloseRequested => InputEvent::CloseRequested,
        WindowEvent::Resized(size) => InputEvent::Resized {
            width: size.width,
            height: size.height,
        },
        WindowEvent::CursorMoved { position, .. } => {
            InputEvent::PointerMoved(DVec2::new(position.x, position.y))
        }
        WindowEvent::MouseInput { state, button, .. } => {
            let button = map_mouse_button(*button);
            match state {
                ElementState::Pressed => InputEvent::ButtonPressed(button),
                ElementState::Released => InputEvent::ButtonReleased(button),
            }
        }
        WindowEvent::MouseWheel { delta, .. } => InputEvent::Scroll(match delta {
            MouseScrollDelta::LineDelta(_, y) => f64::from(*y),
            MouseScrollDelta::PixelDelta(position) => position.y,
        }),
        WindowEvent::KeyboardInput {
            event:
                KeyEvent {
                    physical_key: PhysicalKey::Code(code),
                    state,
                    ..
                },
            ..
        } => {
            let key = map_keycode(*code)?;
            match state {
                ElementState::Pressed => InputEvent::KeyPressed(key),
                ElementState::Released => InputEvent::KeyReleased(key),
            }
        }
        _ => return None,
    })
}

fn map_mouse_button(button: WinitMouseButton) -> MouseButton {
    match button {
        WinitMouseButton::Left => MouseButton::LEFT,
        WinitMouseButton::Right => MouseButton::RIGHT,
        WinitMouseButton::Middle => MouseButton::MIDDLE,
        WinitMouseButton::Back => MouseButton::new(3),
        WinitMouseButton::Forward => MouseButton::new(4),
        WinitMouseButton::Other(value) => MouseButton::new(value.min(u16::from(u8::MAX)) as u8),
    }
}

fn map_keycode(code: WinitKeyCode) -> Option<KeyCode> {
    use WinitKeyCode as Key;
    Some(match code {
        Key::Escape => KeyCode::Named(NamedKey::Escape),
        Key::KeyD => KeyCode::Character('D'),
        _ => return None,
    })
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}
