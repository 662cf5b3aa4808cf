use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use disaster_response::{config::Config, logging, training::TrainingOrchestrator};
use std::path::PathBuf;

const USAGE: &str = "Please provide the filepath of the disaster messages database \
as the first argument and the filepath of the model file to save the model to as \
the second argument. \n\nExample: train_classifier ../data/DisasterResponse.db classifier.bin";

/// Train the disaster message classifier
#[derive(Parser)]
#[command(name = "train_classifier", version)]
struct Cli {
    /// SQLite database holding the labeled messages
    database_path: PathBuf,

    /// Where to write the trained model
    model_output_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.print()?;
            return Ok(());
        }
        Err(_) => {
            println!("{}", USAGE);
            return Ok(());
        }
    };

    let config = Config::load().context("failed to load configuration")?;
    logging::init(&config.logging);

    tracing::info!("Starting train_classifier v{}", env!("CARGO_PKG_VERSION"));

    TrainingOrchestrator::new(config)
        .with_console_output(true)
        .run(&cli.database_path, &cli.model_output_path)
        .with_context(|| {
            format!(
                "training from {} failed",
                cli.database_path.display()
            )
        })?;

    Ok(())
}
