use glam::DMat4;

use crate::math::{look_at, Vec3};

/// Observer camera. The orbit controller writes it, the renderer reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub look_at: Vec3,
    pub up: Vec3,
    /// Vertical field of view, in degrees.
    pub fov_y: f64,
    pub near: f64,
    pub far: f64,
    aspect: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, -1.0, 0.75), Vec3::ZERO, Vec3::Z)
    }
}

impl Camera {
    pub fn new(position: Vec3, look_at: Vec3, up: Vec3) -> Self {
        Self {
            position,
            look_at,
            up,
            fov_y: 60.0,
            near: 0.1,
            far: 10.0,
            aspect: 1.0,
        }
    }

    /// Updates the aspect ratio from the window size. Zero sized windows
    /// keep the previous ratio.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = f64::from(width) / f64::from(height);
        }
    }

    pub fn aspect(&self) -> f64 {
        self.aspect
    }

    /// Offset of the eye from the look-at point.
    pub fn offset(&self) -> Vec3 {
        self.position - self.look_at
    }

    pub fn distance(&self) -> f64 {
        self.offset().length()
    }

    pub fn view(&self) -> DMat4 {
        look_at(self.position, self.look_at, self.up)
    }

    /// Perspective projection with a `[0, 1]` depth range.
    pub fn projection(&self) -> DMat4 {
        DMat4::perspective_rh(self.fov_y.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> DMat4 {
        self.projection() * self.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_follows_window_size() {
        let mut camera = Camera::default();
        camera.set_viewport(1280, 720);
        assert!((camera.aspect() - 1280.0 / 720.0).abs() < 1e-12);
        camera.set_viewport(0, 720);
        assert!((camera.aspect() - 1280.0 / 720.0).abs() < 1e-12);
    }

    #[test]
    fn look_at_point_projects_to_screen_centre() {
        let camera = Camera::default();
        let clip = camera.view_projection() * camera.look_at.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-9 && ndc.y.abs() < 1e-9);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }
}
