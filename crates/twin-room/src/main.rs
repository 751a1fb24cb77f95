//! Demo room for the twin engine.
//!
//! Renders a lit room (floor, spinning textured cube, optional skinned model)
//! for the desktop HMD session and mirrors both eyes into the window.
//!
//! Controls: W/A/S/D move the headset, Q/E turn it, R recenters, Esc quits.

mod room;

use anyhow::Result;
use clap::Parser;

use twin_engine::gpu::GpuInit;
use twin_engine::loader::LoaderConfig;
use twin_engine::logging::{init_logging, LoggingConfig};
use twin_engine::window::{Runtime, RuntimeConfig};

use room::{Room, RoomOptions};

#[derive(Parser, Debug)]
#[command(author, version, about = "Stereo demo room on the desktop HMD session")]
struct Args {
    /// Skinned model to place in the room (path, file: URL or res: key).
    #[arg(long)]
    model: Option<String>,

    /// Image for the cube; a checkerboard is used when absent.
    #[arg(long)]
    texture: Option<String>,

    /// Log filter in env_logger syntax; overrides RUST_LOG.
    #[arg(long)]
    log: Option<String>,

    /// Number of background loader threads.
    #[arg(long)]
    workers: Option<usize>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(LoggingConfig {
        env_filter: args.log,
        ..LoggingConfig::default()
    });

    let mut loader = LoaderConfig::default();
    if let Some(workers) = args.workers {
        loader.workers = workers.max(1);
    }

    let mut config = RuntimeConfig {
        title: "twin room".to_string(),
        loader,
        ..RuntimeConfig::default()
    };
    config.driver.clear = [0.04, 0.05, 0.08, 1.0];

    let app = Room::new(RoomOptions {
        model: args.model,
        texture: args.texture,
    });

    Runtime::run(config, GpuInit::default(), app)
}
