//! Orbit controls for rotating the camera around its look-at point.

use glam::DVec2;

use crate::camera::Camera;
use crate::math::PitchYaw;

/// Radians of rotation per pixel of pointer travel.
pub const DRAG_SENSITIVITY: f64 = 0.01;

/// Distance factor applied by one scroll step.
pub const ZOOM_FACTOR: f64 = 1.1;

/// Pitch stays this far away from the poles so `up` never lines up with the
/// view direction.
const POLE_MARGIN: f64 = 1e-3;

/// Drag and wheel driven orbit camera: the look-at point stays fixed and the
/// eye moves on a sphere around it.
#[derive(Debug, Default, Clone)]
pub struct OrbitController {
    drag: Option<DragStart>,
}

#[derive(Debug, Clone, Copy)]
struct DragStart {
    pointer: DVec2,
    orbit: PitchYaw,
}

impl OrbitController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Records the camera orbit at the moment the drag begins.
    pub fn on_drag_start(&mut self, camera: &Camera, pointer: DVec2) {
        self.drag = Some(DragStart {
            pointer,
            orbit: PitchYaw::from_offset(camera.offset()),
        });
    }

    /// Rotates the camera by the pointer travel since the drag started.
    /// Vertical travel is inverted: dragging down raises the camera.
    pub fn on_drag_move(&mut self, camera: &mut Camera, pointer: DVec2) {
        let Some(start) = self.drag else {
            return;
        };
        let delta = pointer - start.pointer;
        let limit = std::f64::consts::FRAC_PI_2 - POLE_MARGIN;
        let orbit = PitchYaw {
            pitch: (start.orbit.pitch + delta.y * DRAG_SENSITIVITY).clamp(-limit, limit),
            yaw: start.orbit.yaw - delta.x * DRAG_SENSITIVITY,
            distance: start.orbit.distance,
        };
        camera.position = camera.look_at + orbit.to_offset();
    }

    pub fn on_drag_end(&mut self) {
        self.drag = None;
    }

    /// Positive deltas zoom in, negative deltas zoom out. Only the distance
    /// to the look-at point changes.
    pub fn on_scroll(&mut self, camera: &mut Camera, delta: f64) {
        let factor = if delta > 0.0 {
            1.0 / ZOOM_FACTOR
        } else if delta < 0.0 {
            ZOOM_FACTOR
        } else {
            return;
        };
        camera.position = camera.look_at + camera.offset() * factor;
        if let Some(start) = self.drag.as_mut() {
            start.orbit.distance *= factor;
        }
    }
}
