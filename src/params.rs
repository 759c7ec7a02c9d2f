use glam::Vec3;

const KEY_OBJ_URL: &str = "objurl";
const KEY_TEXTURE_URL: &str = "txurl";
const KEY_OBJ_NAME: &str = "objname";
const KEY_OFFSET_X: &str = "offsetX";
const KEY_OFFSET_Y: &str = "offsetY";
const KEY_OFFSET_Z: &str = "offsetZ";

/// Placement inputs supplied through the page's query string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlacementParams {
    pub offset: Vec3,
    pub obj_url: Option<String>,
    pub texture_url: Option<String>,
    pub obj_name: Option<String>,
}

impl PlacementParams {
    pub fn from_query(query: &str) -> Self {
        let mut params = PlacementParams::default();

        for pair in query.trim_start_matches('?').split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };

            match key {
                KEY_OBJ_URL => params.obj_url = Some(value.to_string()),
                KEY_TEXTURE_URL => params.texture_url = Some(value.to_string()),
                KEY_OBJ_NAME => params.obj_name = Some(value.to_string()),
                // Malformed offsets are ignored, not rejected.
                KEY_OFFSET_X => {
                    if let Some(x) = parse_offset(value) {
                        params.offset.x = x;
                    }
                }
                KEY_OFFSET_Y => {
                    if let Some(y) = parse_offset(value) {
                        params.offset.y = y;
                    }
                }
                KEY_OFFSET_Z => {
                    if let Some(z) = parse_offset(value) {
                        params.offset.z = z;
                    }
                }
                _ => {}
            }
        }

        params
    }

    /// The asset location override applies only when all three identifiers
    /// are present; a partial triple falls back to the caller's defaults.
    pub fn asset_override(&self) -> Option<(&str, &str, &str)> {
        match (&self.obj_url, &self.texture_url, &self.obj_name) {
            (Some(obj), Some(tx), Some(name)) => Some((obj, tx, name)),
            _ => None,
        }
    }
}

fn parse_offset(value: &str) -> Option<f32> {
    value.parse::<f32>().ok().filter(|v| v.is_finite())
}
