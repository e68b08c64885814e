use anyhow::Result;
use clap::{Parser, Subcommand};

mod cli;
mod config;
mod output;
mod raw_data;

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Calibrate(args) => args.run(),
        Command::Psd(args) => args.run(),
    }
}

#[derive(Parser)]
#[command(name = "shaper-tune", about = "Input shaper calibration from accelerometer captures")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fit every enabled shaper family to a capture and recommend one.
    Calibrate(cli::calibrate::CalibrateArgs),
    /// Write the per-axis power spectral density of a capture.
    Psd(cli::psd::PsdArgs),
}
