//! Vector helpers shared by the camera, the orbit controller and the light.
//!
//! Scene state is kept in double precision; matrices are narrowed to `f32`
//! only when they are handed to the renderer.

use glam::DMat4;

/// Three component vector used for all scene state.
pub type Vec3 = glam::DVec3;

/// Smallest eye/target separation [`look_at`] accepts before nudging the eye.
pub const MIN_SEPARATION: f64 = 1e-6;

/// Spherical parameterisation of an offset around a pivot, with +Z up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchYaw {
    /// Elevation above the XY plane, in radians.
    pub pitch: f64,
    /// Rotation around +Z measured from +X, in radians.
    pub yaw: f64,
    pub distance: f64,
}

impl PitchYaw {
    /// Decomposes an offset into pitch, yaw and distance.
    ///
    /// A zero offset maps to `pitch = 0, yaw = 0, distance = 1`.
    pub fn from_offset(offset: Vec3) -> Self {
        let distance = offset.length();
        if distance == 0.0 {
            return Self {
                pitch: 0.0,
                yaw: 0.0,
                distance: 1.0,
            };
        }
        let planar = offset.x.hypot(offset.y);
        Self {
            pitch: offset.z.atan2(planar),
            yaw: offset.y.atan2(offset.x),
            distance,
        }
    }

    /// Rebuilds the offset described by these angles.
    pub fn to_offset(self) -> Vec3 {
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        Vec3::new(cos_pitch * cos_yaw, cos_pitch * sin_yaw, sin_pitch) * self.distance
    }
}

/// Right handed look-at transform that never produces NaNs.
///
/// An eye closer than [`MIN_SEPARATION`] to the target is pushed away along
/// an axis orthogonal to `up`, and an `up` parallel to the view direction is
/// replaced by an orthogonal axis.
pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> DMat4 {
    let up = match up.try_normalize() {
        Some(up) => up,
        None => Vec3::Z,
    };
    let eye = if eye.distance(target) < MIN_SEPARATION {
        target + up.any_orthonormal_vector() * MIN_SEPARATION
    } else {
        eye
    };
    let forward = (target - eye).normalize();
    let up = if forward.cross(up).length_squared() < 1e-12 {
        forward.any_orthonormal_vector()
    } else {
        up
    };
    DMat4::look_at_rh(eye, target, up)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Vec3, b: Vec3) {
        let scale = b.length().max(1.0);
        assert!(
            (a - b).length() <= 1e-9 * scale,
            "expected {b:?}, got {a:?}"
        );
    }

    #[test]
    fn pitch_yaw_round_trip() {
        let offsets = [
            Vec3::new(0.0, -1.0, 0.75),
            Vec3::new(3.0, 4.0, 0.0),
            Vec3::new(-0.2, 0.1, -5.0),
            Vec3::new(0.0, 0.0, 2.0),
            Vec3::new(1e-4, -2e-4, 1e-4),
            Vec3::new(-7.5, -0.001, 12.0),
        ];
        for offset in offsets {
            assert_close(PitchYaw::from_offset(offset).to_offset(), offset);
        }
    }

    #[test]
    fn zero_offset_has_unit_distance() {
        let angles = PitchYaw::from_offset(Vec3::ZERO);
        assert_eq!(angles.distance, 1.0);
        assert_eq!(angles.pitch, 0.0);
    }

    #[test]
    fn look_at_survives_degenerate_inputs() {
        let coincident = look_at(Vec3::ONE, Vec3::ONE, Vec3::Z);
        assert!(coincident.is_finite());
        let parallel_up = look_at(Vec3::new(0.0, 0.0, 2.0), Vec3::ZERO, Vec3::Z);
        assert!(parallel_up.is_finite());
    }

    #[test]
    fn look_at_maps_target_onto_negative_z() {
        let view = look_at(Vec3::new(0.0, -1.0, 0.0), Vec3::ZERO, Vec3::Z);
        let target = view.transform_point3(Vec3::ZERO);
        assert_close(target, Vec3::new(0.0, 0.0, -1.0));
    }
}
