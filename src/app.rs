//! Application context: the scene, its camera controller, the frame pacer
//! and input state, owned together and driven by the event loop.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, info};

use crate::config::SceneConfig;
use crate::frame_timer::FrameTimer;
use crate::input::{InputEvent, InputState, KeyCode, MouseButton, NamedKey};
use crate::orbit::OrbitController;
use crate::pipeline::ShadowScene;
use crate::render::{RenderBackend, RenderError};
use crate::shader::ShaderLibrary;

/// Key toggling the shadow map view.
pub const DEPTH_VIEW_KEY: KeyCode = KeyCode::Character('D');

#[derive(Debug)]
pub struct App {
    pub scene: ShadowScene,
    pub orbit: OrbitController,
    pub timer: FrameTimer,
    pub input: InputState,
    started: Instant,
    exit_requested: bool,
}

impl App {
    pub fn new(config: &SceneConfig) -> Self {
        Self {
            scene: ShadowScene::new(config),
            orbit: OrbitController::new(),
            timer: FrameTimer::new(config.frame_cap),
            input: InputState::new(),
            started: Instant::now(),
            exit_requested: false,
        }
    }

    pub fn init<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        library: &ShaderLibrary,
    ) -> Result<()> {
        let (width, height) = backend.window_size();
        self.scene.camera.set_viewport(width, height);
        self.scene
            .init(backend, library)
            .context("failed to upload scene geometry")?;
        info!(
            "scene ready: shadow map {:?}, {} casters",
            self.scene.shadow_map().size(),
            self.scene.casters().len()
        );
        self.started = Instant::now();
        Ok(())
    }

    /// Routes one input event to the camera controller and the scene.
    pub fn handle_event(&mut self, event: &InputEvent) {
        // Auto-repeat shows up as a press of a key that is already down.
        let repeated =
            matches!(*event, InputEvent::KeyPressed(key) if self.input.is_key_down(key));
        self.input.apply(event);
        match *event {
            InputEvent::ButtonPressed(MouseButton::LEFT) => {
                let pointer = self.input.mouse_position();
                self.orbit.on_drag_start(&self.scene.camera, pointer);
            }
            InputEvent::ButtonReleased(MouseButton::LEFT) => self.orbit.on_drag_end(),
            InputEvent::PointerMoved(position)
                if self.input.is_mouse_button_down(MouseButton::LEFT) =>
            {
                self.orbit.on_drag_move(&mut self.scene.camera, position);
            }
            InputEvent::Scroll(delta) => self.orbit.on_scroll(&mut self.scene.camera, delta),
            InputEvent::KeyPressed(DEPTH_VIEW_KEY) if !repeated => {
                self.scene.toggle_depth_view();
            }
            InputEvent::KeyPressed(KeyCode::Named(NamedKey::Escape))
            | InputEvent::CloseRequested => self.exit_requested = true,
            InputEvent::Resized { width, height } => self.scene.camera.set_viewport(width, height),
            _ => {}
        }
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// Renders the frame for the current wall-clock time.
    pub fn frame<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) -> Result<(), RenderError> {
        let elapsed = self.started.elapsed();
        self.frame_at(backend, elapsed)
    }

    /// Renders the frame as it looks `elapsed` after start.
    pub fn frame_at<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        elapsed: Duration,
    ) -> Result<(), RenderError> {
        self.timer.tick();
        self.scene.animate(elapsed);
        self.scene.render(backend)?;
        debug!("frame at {:.3}s, {:.1} fps", elapsed.as_secs_f64(), self.timer.fps());
        Ok(())
    }

    /// Sleeps as long as the frame pacer asks.
    pub fn pace(&mut self) {
        self.timer.pace();
    }

    pub fn title(&self) -> String {
        format!("ShadowMap - FPS: {}", self.timer.fps() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessBackend;
    use glam::DVec2;

    fn app() -> (App, HeadlessBackend) {
        let mut backend = HeadlessBackend::new(800, 600);
        let mut app = App::new(&SceneConfig::default());
        app.init(&mut backend, &ShaderLibrary::embedded()).unwrap();
        (app, backend)
    }

    #[test]
    fn drag_orbits_camera_and_scroll_zooms() {
        let (mut app, _backend) = app();
        let start = app.scene.camera.position;
        let distance = app.scene.camera.distance();

        app.handle_event(&InputEvent::PointerMoved(DVec2::new(100.0, 100.0)));
        app.handle_event(&InputEvent::ButtonPressed(MouseButton::LEFT));
        app.handle_event(&InputEvent::PointerMoved(DVec2::new(150.0, 100.0)));
        app.handle_event(&InputEvent::ButtonReleased(MouseButton::LEFT));
        assert_ne!(app.scene.camera.position, start);
        assert!((app.scene.camera.distance() - distance).abs() < 1e-9);

        let moved = app.scene.camera.position;
        app.handle_event(&InputEvent::PointerMoved(DVec2::new(300.0, 300.0)));
        assert_eq!(app.scene.camera.position, moved);

        app.handle_event(&InputEvent::Scroll(1.0));
        assert!((app.scene.camera.distance() - distance / 1.1).abs() < 1e-9);
    }

    #[test]
    fn only_the_left_button_orbits() {
        let (mut app, _backend) = app();
        let start = app.scene.camera.position;
        app.handle_event(&InputEvent::ButtonPressed(MouseButton::RIGHT));
        app.handle_event(&InputEvent::PointerMoved(DVec2::new(80.0, 40.0)));
        assert_eq!(app.scene.camera.position, start);
        assert!(!app.orbit.is_dragging());
    }

    #[test]
    fn held_key_toggles_depth_view_once() {
        let (mut app, _backend) = app();
        app.handle_event(&InputEvent::KeyPressed(DEPTH_VIEW_KEY));
        app.handle_event(&InputEvent::KeyPressed(DEPTH_VIEW_KEY));
        assert!(!app.scene.depth_view_enabled());
        app.handle_event(&InputEvent::KeyReleased(DEPTH_VIEW_KEY));
        app.handle_event(&InputEvent::KeyPressed(DEPTH_VIEW_KEY));
        assert!(app.scene.depth_view_enabled());
    }

    #[test]
    fn keys_toggle_depth_view_and_exit() {
        let (mut app, _backend) = app();
        assert!(app.scene.depth_view_enabled());
        app.handle_event(&InputEvent::KeyPressed(DEPTH_VIEW_KEY));
        assert!(!app.scene.depth_view_enabled());
        assert!(!app.exit_requested());
        app.handle_event(&InputEvent::KeyPressed(KeyCode::Named(NamedKey::Escape)));
        assert!(app.exit_requested());
    }

    #[test]
    fn frames_render_and_title_reports_fps() {
        let (mut app, mut backend) = app();
        for frame in 0..3 {
            app.frame_at(&mut backend, Duration::from_millis(frame * 16)).unwrap();
        }
        assert_eq!(backend.frames_rendered(), 3);
        assert!(app.title().starts_with("ShadowMap - FPS: "));
    }
}
