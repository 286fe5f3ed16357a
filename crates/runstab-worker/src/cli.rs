//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use runstab_models::AnchorPoint;

#[derive(Debug, Parser)]
#[command(name = "runstab")]
#[command(author, version, about = "Stabilize a runner in a panning video", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Render a vertical video that keeps the runner centred
    Stabilize(StabilizeArgs),

    /// Inspect a video and extract a low-resolution frame for picking anchors
    Preview(PreviewArgs),
}

#[derive(Debug, Clone, Args)]
pub struct StabilizeArgs {
    /// Source video
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output file (default: <work dir>/<name>_<yyMMddHHmm>.mp4)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Runner position at the first anchor, as FRAME,X,Y in display pixels
    #[arg(long, value_name = "FRAME,X,Y", allow_hyphen_values = true)]
    pub start: AnchorPoint,

    /// Runner position at the second anchor, as FRAME,X,Y in display pixels
    #[arg(long, value_name = "FRAME,X,Y", allow_hyphen_values = true)]
    pub end: AnchorPoint,

    /// Do not save the result to the library
    #[arg(long)]
    pub no_save: bool,
}

#[derive(Debug, Clone, Args)]
pub struct PreviewArgs {
    /// Source video
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Frame index to extract
    #[arg(short, long, default_value = "0")]
    pub frame: u64,

    /// Write the frame as PNG to this path
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}
