//! hand_km CLI
//!
//! Usage:
//!   hand_km capture.json --target-rig Armature --left-target hand.L --right-target hand.R -o rig.json
//!   hand_km --demo --print-tree

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hand_km::config::{Config, DegenerateFramePolicy};
use hand_km::pipeline;
use hand_km::rig::RestSkeleton;
use hand_km::sink::JsonRigSink;
use hand_km::{demo, loading, HandType};

#[derive(Parser, Debug)]
#[command(
    name = "hand_km",
    version,
    about = "Retarget tracked hand joint positions onto a skeletal rig"
)]
struct Args {
    /// Hand tracking JSON file
    #[arg(required_unless_present = "demo")]
    input: Option<PathBuf>,

    /// Use a generated pair of waving hands instead of an input file
    #[arg(long, conflicts_with = "input")]
    demo: bool,

    /// JSON configuration file; missing fields keep their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where to write the rig; printed to stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Rig both hands are added to
    #[arg(long)]
    target_rig: Option<String>,

    /// Rig bone the left wrist attaches to
    #[arg(long)]
    left_target: Option<String>,

    /// Rig bone the right wrist attaches to
    #[arg(long)]
    right_target: Option<String>,

    /// Host frames per second
    #[arg(long)]
    fps: Option<f64>,

    /// Host frame of the first sample
    #[arg(long)]
    start_frame: Option<f64>,

    /// Keep measured bone lengths instead of the sequence averages
    #[arg(long)]
    no_average_distance: bool,

    /// Fail a hand on its first degenerate frame instead of skipping it
    #[arg(long)]
    abort_on_degenerate: bool,

    /// Print the rest skeleton of every exported hand
    #[arg(long)]
    print_tree: bool,
}

impl Args {
    fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_json(path)?,
            None => Config::default(),
        };
        if let Some(rig) = &self.target_rig {
            config.alignment.target_rig = Some(rig.clone());
        }
        if let Some(target) = &self.left_target {
            config.alignment.left_hand_target = Some(target.clone());
        }
        if let Some(target) = &self.right_target {
            config.alignment.right_hand_target = Some(target.clone());
        }
        if let Some(fps) = self.fps {
            config.alignment.fps = fps;
        }
        if let Some(start_frame) = self.start_frame {
            config.alignment.start_frame = start_frame;
        }
        if self.no_average_distance {
            config.reconstruction.use_average_distance = false;
        }
        if self.abort_on_degenerate {
            config.reconstruction.degenerate_frames = DegenerateFramePolicy::Abort;
        }
        if self.demo {
            config.alignment.target_rig.get_or_insert_with(|| "Armature".to_string());
            config.alignment.left_hand_target.get_or_insert_with(|| "hand.L".to_string());
            config.alignment.right_hand_target.get_or_insert_with(|| "hand.R".to_string());
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.config().context("invalid configuration")?;

    let hands = match &args.input {
        Some(path) => loading::load_json(path).map_err(|e| anyhow::anyhow!(e.chain()))?,
        None => vec![
            demo::waving_hand(HandType::Left, 90, 30.0),
            demo::waving_hand(HandType::Right, 90, 30.0),
        ],
    };
    if hands.is_empty() {
        bail!("no hands to process");
    }

    let outcomes = pipeline::run(&hands, &config)?;
    let mut sink = JsonRigSink::new();
    let exports = pipeline::export_all(&mut sink, &outcomes, &config.alignment);

    if args.print_tree {
        for animation in outcomes.iter().filter_map(|o| o.result.as_ref().ok()) {
            let Ok(target) = config.alignment.target_bone(animation.hand_type) else {
                continue;
            };
            RestSkeleton::new(
                &animation.name,
                animation.hand_type,
                &animation.average_joint_distance,
                target,
            )
            .print_tree();
        }
    }

    let json = sink.to_json()?;
    match &args.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "rig written");
        }
        None => println!("{json}"),
    }

    let failed: Vec<&str> = outcomes
        .iter()
        .filter(|o| !o.is_ok())
        .map(|o| o.name.as_str())
        .chain(exports.iter().filter(|o| !o.is_ok()).map(|o| o.name.as_str()))
        .collect();
    if !failed.is_empty() {
        bail!("{} of {} hands failed: {}", failed.len(), hands.len(), failed.join(", "));
    }
    Ok(())
}
