//! Directional light used for shading and shadow mapping

use glam::{Mat4, Vec3};

use super::vertex::colors;

/// A directional light with an orthographic shadow frustum centred on the arena
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels (need not be normalized)
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub ambient: f32,
    /// How far back along the direction the shadow camera sits
    pub distance: f32,
    /// Half-size of the orthographic box
    pub half_extent: f32,
    pub near: f32,
    pub far: f32,
}

/// The only light in the scene
pub const SUN: DirectionalLight = DirectionalLight {
    direction: Vec3::new(-0.4, -1.0, -0.3),
    color: Vec3::from_array(colors::LIGHT),
    intensity: 1.1,
    ambient: 0.25,
    distance: 12.0,
    half_extent: 10.0,
    near: 0.1,
    far: 30.0,
};

impl DirectionalLight {
    pub fn dir(&self) -> Vec3 {
        self.direction.normalize_or(Vec3::NEG_Y)
    }

    /// World space to light clip space
    pub fn view_proj(&self) -> Mat4 {
        let dir = self.dir();
        let eye = -dir * self.distance;
        // Straight-down light would make Y a degenerate up vector
        let up = if dir.cross(Vec3::Y).length_squared() < 1e-6 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, up);
        let e = self.half_extent;
        let proj = Mat4::orthographic_rh(-e, e, -e, e, self.near, self.far);
        proj * view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::sim::falling::{SPAWN_XZ_RANGE, SPAWN_Y_MAX};

    fn inside_clip(m: Mat4, p: Vec3) -> bool {
        let c = m.project_point3(p);
        c.x.abs() <= 1.0 && c.y.abs() <= 1.0 && (0.0..=1.0).contains(&c.z)
    }

    #[test]
    fn test_arena_fits_in_shadow_frustum() {
        let m = SUN.view_proj();
        let h = ARENA_HALF_EXTENT;
        let bottom = FLOOR_TOP - FLOOR_THICKNESS;
        for x in [-h, h] {
            for z in [-h, h] {
                assert!(inside_clip(m, Vec3::new(x, bottom, z)));
                assert!(inside_clip(m, Vec3::new(x, PLAYER_GROUND_Y + 1.0, z)));
            }
        }
    }

    #[test]
    fn test_spawn_volume_fits_in_shadow_frustum() {
        let m = SUN.view_proj();
        let r = SPAWN_XZ_RANGE + OBJECT_HALF_SIZE;
        let top = SPAWN_Y_MAX + OBJECT_HALF_SIZE;
        for x in [-r, r] {
            for z in [-r, r] {
                assert!(inside_clip(m, Vec3::new(x, top, z)));
            }
        }
    }

    #[test]
    fn test_vertical_light_has_valid_matrix() {
        let light = DirectionalLight {
            direction: Vec3::NEG_Y,
            ..SUN
        };
        assert!(light.view_proj().is_finite());
        assert!(inside_clip(light.view_proj(), Vec3::ZERO));
    }
}
