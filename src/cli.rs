//! CLI argument parsing for qtorsion

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "qtorsion")]
#[command(version)]
#[command(
    about = "Pool two- and three-way experiment results and report z statistics",
    long_about = None
)]
pub struct Cli {
    /// Directory containing the result units (*.json)
    #[arg(value_name = "DIR")]
    pub input_dir: PathBuf,
}
