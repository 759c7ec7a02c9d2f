use glam::Mat4;

/// Transient surface anchor. The pose is copied verbatim from the latest
/// hit-test result; when no surface resolves, only `visible` is cleared and
/// the stale pose stays unobserved because rendering gates on visibility.
#[derive(Debug, Clone)]
pub struct Reticle {
    pub visible: bool,
    pub pose: Mat4,
}

impl Reticle {
    pub fn new() -> Self {
        Self {
            visible: false,
            pose: Mat4::IDENTITY,
        }
    }

    pub fn clear(&mut self) {
        self.visible = false;
        self.pose = Mat4::IDENTITY;
    }
}

impl Default for Reticle {
    fn default() -> Self {
        Self::new()
    }
}
