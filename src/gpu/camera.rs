//! Fixed camera looking at the attractor.

use glam::{Mat4, Vec3};

/// Far plane for the CPU strategies.
pub const FAR_CPU: f32 = 100.0;
/// Far plane for the GPU kernel strategy.
pub const FAR_GPU: f32 = 200.0;

/// Stationary perspective camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Looking down -Z at the origin from `(0, 0, 100)`.
    pub fn new(far: f32) -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 100.0),
            target: Vec3::ZERO,
            fov_y: 45.0_f32.to_radians(),
            near: 0.1,
            far,
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, Vec3::Y)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, aspect, self.near, self.far)
    }

    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        self.projection(aspect) * self.view_matrix()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(FAR_GPU)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_projects_to_center() {
        let camera = Camera::default();
        let clip = camera.view_proj(16.0 / 9.0) * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-6 && ndc.y.abs() < 1e-6);
        assert!((0.0..=1.0).contains(&ndc.z));
    }

    #[test]
    fn test_far_plane_clips() {
        let near = Camera::new(FAR_CPU);
        let clip = near.view_proj(1.0) * glam::Vec4::new(0.0, 0.0, -50.0, 1.0);
        assert!(clip.z / clip.w > 1.0);

        let far = Camera::new(FAR_GPU);
        let clip = far.view_proj(1.0) * glam::Vec4::new(0.0, 0.0, -50.0, 1.0);
        assert!(clip.z / clip.w <= 1.0);
    }
}
