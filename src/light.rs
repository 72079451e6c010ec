//! Directional shadow-casting light and its scripted motion.

use std::time::Duration;

use glam::{DMat4, Mat4};

use crate::math::{look_at, Vec3};

/// Light acting as a virtual orthographic camera.
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub position: Vec3,
    pub look_at: Vec3,
    pub up: Vec3,
    /// World-space size of the shadow frustum: `x`/`y` span its width and
    /// height, `z` is the far plane distance from the light.
    pub shadow_extent: Vec3,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            position: Vec3::new(-0.5, -0.5, 1.0),
            look_at: Vec3::ZERO,
            up: Vec3::Z,
            shadow_extent: Vec3::new(1.0, 1.0, 2.0),
        }
    }
}

impl Light {
    pub fn view(&self) -> DMat4 {
        look_at(self.position, self.look_at, self.up)
    }

    /// Half width and half height of the orthographic frustum.
    pub fn half_extents(&self) -> (f64, f64) {
        (self.shadow_extent.x * 0.5, self.shadow_extent.y * 0.5)
    }

    /// Orthographic projection with an OpenGL style `[-1, 1]` depth range.
    ///
    /// The horizontal bounds use half of the extent while the far plane uses
    /// the whole `z` extent.
    pub fn projection(&self) -> DMat4 {
        let (half_width, half_height) = self.half_extents();
        DMat4::orthographic_rh_gl(
            -half_width,
            half_width,
            -half_height,
            half_height,
            0.0,
            self.shadow_extent.z,
        )
    }

    /// World to light clip transform, shared by the depth pass and the
    /// shadow lookup of the color pass.
    pub fn world_to_light_clip(&self) -> Mat4 {
        (self.projection() * self.view()).as_mat4()
    }

    /// Unit vector from the look-at point towards the light.
    pub fn direction(&self) -> Vec3 {
        (self.position - self.look_at).normalize_or_zero()
    }
}

/// Scripted circular motion of the light around its look-at point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightOrbit {
    pub radius: f64,
    /// Height of the orbit plane above the look-at point.
    pub height: f64,
    /// Radians per second.
    pub angular_speed: f64,
}

impl Default for LightOrbit {
    fn default() -> Self {
        Self {
            radius: 1.0,
            height: 1.0,
            angular_speed: 1.0,
        }
    }
}

impl LightOrbit {
    /// Places the light where the orbit puts it after `elapsed`.
    pub fn apply(&self, light: &mut Light, elapsed: Duration) {
        let angle = elapsed.as_secs_f64() * self.angular_speed;
        let (sin, cos) = angle.sin_cos();
        light.position =
            light.look_at + Vec3::new(self.radius * cos, self.radius * sin, self.height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4Swizzles;

    #[test]
    fn frustum_uses_half_extent_and_full_depth() {
        let light = Light {
            shadow_extent: Vec3::new(4.0, 2.0, 3.0),
            ..Light::default()
        };
        assert_eq!(light.half_extents(), (2.0, 1.0));
        let projection = light.projection();
        let corner = projection * glam::DVec4::new(2.0, 1.0, -3.0, 1.0);
        assert!((corner.xyz() - Vec3::new(1.0, 1.0, 1.0)).length() < 1e-12);
        let near = projection * glam::DVec4::new(0.0, 0.0, 0.0, 1.0);
        assert!((near.z + 1.0).abs() < 1e-12);
    }

    #[test]
    fn look_at_point_lands_in_frustum_centre() {
        let light = Light::default();
        let clip = light.world_to_light_clip() * light.look_at.as_vec3().extend(1.0);
        assert!(clip.x.abs() < 1e-5 && clip.y.abs() < 1e-5);
        assert!(clip.z > -1.0 && clip.z < 1.0);
    }

    #[test]
    fn orbit_keeps_radius_and_height() {
        let orbit = LightOrbit::default();
        let mut light = Light::default();
        for millis in [0, 250, 1_000, 4_321, 60_000] {
            orbit.apply(&mut light, Duration::from_millis(millis));
            let offset = light.position - light.look_at;
            assert!((offset.truncate().length() - 1.0).abs() < 1e-12);
            assert!((offset.z - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn orbit_advances_at_constant_rate() {
        let orbit = LightOrbit::default();
        let mut light = Light::default();
        // Duration rounds to whole nanoseconds, so the angle is only close to pi/2.
        orbit.apply(&mut light, Duration::from_secs_f64(std::f64::consts::FRAC_PI_2));
        assert!(light.position.x.abs() < 1e-9);
        assert!((light.position.y - 1.0).abs() < 1e-9);

        let slow = LightOrbit {
            angular_speed: 0.5,
            ..LightOrbit::default()
        };
        slow.apply(&mut light, Duration::from_secs(2));
        assert!((light.position.x - 1f64.cos()).abs() < 1e-12);
        assert!((light.position.y - 1f64.sin()).abs() < 1e-12);
    }

    #[test]
    fn coincident_light_still_yields_finite_matrix() {
        let light = Light {
            position: Vec3::ZERO,
            ..Light::default()
        };
        assert!(light.world_to_light_clip().is_finite());
    }
}
