//! Fixed perspective camera looking down at the arena

use glam::{Mat4, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new(aspect: f32) -> Self {
        Self {
            eye: Vec3::new(0.0, 7.0, 9.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: 45f32.to_radians(),
            aspect,
            near: 0.1,
            far: 100.0,
        }
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn view_proj(&self) -> Mat4 {
        let view = Mat4::look_at_rh(self.eye, self.target, self.up);
        let proj = Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far);
        proj * view
    }

    /// Horizontal viewing direction, used as the player's "forward"
    pub fn facing(&self) -> Vec3 {
        let f = self.target - self.eye;
        Vec3::new(f.x, 0.0, f.z).normalize_or(Vec3::NEG_Z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facing_is_flat_forward() {
        let cam = Camera::new(16.0 / 9.0);
        assert!((cam.facing() - Vec3::NEG_Z).length() < 1e-6);
    }

    #[test]
    fn test_arena_center_in_view() {
        let cam = Camera::new(1.0);
        let c = cam.view_proj().project_point3(Vec3::ZERO);
        assert!(c.x.abs() < 1e-5);
        assert!((0.0..1.0).contains(&c.z));
    }

    #[test]
    fn test_zero_viewport_keeps_aspect() {
        let mut cam = Camera::new(2.0);
        cam.set_viewport(0, 600);
        assert_eq!(cam.aspect, 2.0);
        cam.set_viewport(800, 400);
        assert_eq!(cam.aspect, 2.0);
        cam.set_viewport(400, 800);
        assert_eq!(cam.aspect, 0.5);
    }
}
