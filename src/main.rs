use anyhow::Result;
use clap::Parser;
use qtorsion::{batch, cli::Cli, config::AnalysisConfig};

/// Initialize the stderr log subscriber
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing();

    let config = AnalysisConfig::default();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    let outcome = batch::run_batch(&args.input_dir, &config)?;

    println!("{}", outcome.report.to_json()?);

    if outcome.csv.write_to(&config.csv_output)? {
        tracing::info!(path = %config.csv_output.display(), "CSV saved");
    } else {
        tracing::warn!("No valid data found, CSV not written");
    }

    Ok(())
}
