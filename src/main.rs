//! Rect Collide entry point
//!
//! Runs a JSON scene through the collision force and prints the resolved
//! layout as JSON.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use rect_collide::{CollideError, Scene, SceneOutput};

#[derive(Parser)]
#[command(
    name = "rect-collide",
    about = "Resolve rectangle overlaps in a JSON scene and print the layout"
)]
struct Args {
    /// Scene file: optional `settings` plus a `nodes` array.
    scene: PathBuf,

    /// Number of ticks to run.
    #[arg(default_value_t = 300)]
    ticks: u64,
}

fn run(path: &Path, ticks: u64) -> Result<String, CollideError> {
    let scene = Scene::load(path)?;
    let footprints = scene.footprints();
    let mut sim = scene.to_simulation()?;

    sim.run(ticks);

    let output = SceneOutput::new(&sim, &footprints);
    log::info!(
        "Finished {} ticks, {} overlapping pairs remain",
        output.ticks,
        output.overlapping_pairs
    );
    Ok(serde_json::to_string_pretty(&output)?)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(&args.scene, args.ticks) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
