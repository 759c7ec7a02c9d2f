use crate::math::Aabb;

/// What asset decoding hands back: a positioned, scaled root node reduced to
/// the one thing placement needs, its bounding box.
#[derive(Debug, Clone, Copy)]
pub struct LoadedAsset {
    pub aabb: Aabb,
}

#[derive(Debug, Clone)]
pub enum LoadEvent {
    /// Download progress in `0.0..=1.0`.
    Progress(f32),
    Loaded(LoadedAsset),
    Failed(String),
}

/// External model/material loader. `begin_load` kicks off an asynchronous
/// load; outcomes arrive through `poll_events` on later frames.
pub trait AssetLoader {
    fn begin_load(&mut self, obj_url: &str, texture_url: &str, obj_name: &str);
    fn poll_events(&mut self, out: &mut Vec<LoadEvent>);
}

/// Loading-bar state. On load failure the indicator is deliberately left in
/// its prior state.
#[derive(Debug, Clone, Copy)]
pub struct LoadingIndicator {
    pub visible: bool,
    pub progress: f32,
}

impl LoadingIndicator {
    pub fn new() -> Self {
        Self {
            visible: false,
            progress: 0.0,
        }
    }
}

impl Default for LoadingIndicator {
    fn default() -> Self {
        Self::new()
    }
}
