use anyhow::Result;

mod app;
mod camera;
mod control_panel;
mod gestures;
mod loader;
mod math;
mod object_controller;
mod params;
mod reticle;
mod scene_graph;
mod session;
mod sim;
mod surface_tracker;
mod xr;

use params::PlacementParams;

// Used when no query string is given on the command line.
const DEMO_QUERY: &str = "objurl=models/&txurl=textures/&objname=chair&offsetX=0.5";

fn main() -> Result<()> {
    pretty_env_logger::init();

    let query = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEMO_QUERY.to_string());
    sim::run_demo(PlacementParams::from_query(&query))?;

    Ok(())
}
