use std::path::PathBuf;

use clap::Parser;

/// Image transform benchmark comparing heap and buddy-arena pixel storage.
#[derive(Parser)]
#[command(name = "bench")]
#[command(version)]
pub struct Cli {
    /// Input image (png or jpeg)
    pub input: PathBuf,

    /// Output name; results are written as `new_<output>` and, in buddy
    /// mode, `buddy_<output>`
    pub output: PathBuf,

    /// Rotate the image by this many degrees
    #[arg(long)]
    pub angle: Option<f32>,

    /// Scale the image by this factor
    #[arg(long)]
    pub scale: Option<f32>,

    /// Invert every channel value
    #[arg(long)]
    pub invert: bool,

    /// Also run with buddy-arena allocation and compare the two strategies
    #[arg(long, overrides_with = "no_buddy")]
    pub buddy: bool,

    /// Heap allocation only (default)
    #[arg(long = "no-buddy", overrides_with = "buddy")]
    pub no_buddy: bool,
}
