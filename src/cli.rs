use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Directory of captured 16-bit depth PNGs
    pub input: PathBuf,

    /// Directory for the color-aligned output frames
    pub output: PathBuf,

    /// Camera-info JSON document with the stereo calibration
    #[arg(long)]
    pub calibration: PathBuf,

    /// Depth camera resolution, WIDTHxHEIGHT
    #[arg(long, default_value = "640x576", value_parser = parse_resolution)]
    pub depth_resolution: (usize, usize),

    /// Color camera resolution, WIDTHxHEIGHT
    #[arg(long, default_value = "2048x1536", value_parser = parse_resolution)]
    pub color_resolution: (usize, usize),

    /// Worker thread count (defaults to available parallelism)
    #[arg(long)]
    pub jobs: Option<usize>,
}

fn parse_resolution(raw: &str) -> Result<(usize, usize), String> {
    let (width, height) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("`{raw}` is not of the form WIDTHxHEIGHT"))?;
    let parse = |s: &str| {
        s.parse::<usize>()
            .map_err(|e| format!("bad dimension `{s}`: {e}"))
    };
    match (parse(width)?, parse(height)?) {
        (0, _) | (_, 0) => Err(format!("`{raw}` has a zero dimension")),
        (w, h) => Ok((w, h)),
    }
}
