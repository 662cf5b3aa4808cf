use anyhow::Context;
use clap::{Parser, Subcommand};
use disaster_response::{
    config::LoggingConfig,
    data::{DataSource, SqliteSource},
    logging, ClassifierPipeline,
};
use serde_json::json;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dr-cli")]
#[command(about = "Disaster response classifier CLI", long_about = None)]
struct Cli {
    /// Log level for the library
    #[arg(long, env = "DR_LOG_LEVEL", default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify one message with a trained model
    Predict {
        /// Trained model file
        #[arg(short, long, default_value = "models/classifier.bin")]
        model: PathBuf,

        /// Message text
        #[arg(value_name = "QUERY")]
        query: String,
    },

    /// Print genre and category counts of a message database
    Summary {
        /// SQLite database holding the labeled messages
        #[arg(short, long, default_value = "data/DisasterResponse.db")]
        database: PathBuf,

        /// Table holding the labeled messages
        #[arg(short, long, default_value = "DisasterResponse")]
        table: String,
    },

    /// Show the metadata stored with a trained model
    Info {
        /// Trained model file
        #[arg(short, long, default_value = "models/classifier.bin")]
        model: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&LoggingConfig {
        level: cli.log_level.clone(),
        json: false,
    });

    match cli.command {
        Commands::Predict { model, query } => {
            let pipeline = ClassifierPipeline::load(&model)
                .with_context(|| format!("cannot load model {}", model.display()))?;
            let prediction = pipeline.predict_message(&query)?;

            let body = json!({
                "query": query,
                "categories": prediction.to_json(),
                "positive": prediction.positives(),
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Commands::Summary { database, table } => {
            let corpus = SqliteSource::new(&database, table)
                .load()
                .with_context(|| format!("cannot read {}", database.display()))?;
            println!("{}", serde_json::to_string_pretty(&corpus.summary().to_json())?);
        }

        Commands::Info { model } => {
            let pipeline = ClassifierPipeline::load(&model)
                .with_context(|| format!("cannot load model {}", model.display()))?;
            let metadata = pipeline.metadata();

            let body = json!({
                "run_id": metadata.run_id,
                "version": metadata.version,
                "trained_at": metadata.trained_at,
                "n_training_samples": metadata.n_training_samples,
                "n_features": metadata.n_features,
                "cv_score": metadata.cv_score,
                "tokenizer": metadata.config.tokenizer,
                "hyperparameters": metadata.config.hyperparameters(),
                "categories": pipeline.categories(),
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}
