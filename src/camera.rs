use glam::{Mat4, Vec2, Vec3};

pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// The non-immersive fallback view; while presenting, the host tracks
    /// the camera itself.
    pub fn standing() -> Self {
        Self {
            eye: Vec3::new(0.0, 1.6, 3.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y_degrees: 70.0,
            near: 0.01,
            far: 20.0,
        }
    }

    pub fn get_vp_matrix(&self, resolution: Vec2) -> Mat4 {
        let view = Mat4::look_at_rh(self.eye, self.target, self.up);
        let projection = Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            resolution.x / resolution.y,
            self.near,
            self.far,
        );
        projection * view
    }
}
