use anyhow::Context;
use flight_delay::{config::TrainerConfig, model::ArtifactPaths, trainer};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Optional first argument: path to a JSON trainer config.
    let cfg = match std::env::args().nth(1) {
        Some(path) => TrainerConfig::load(&path)?,
        None => TrainerConfig::default(),
    };

    let outcome = trainer::run(&cfg).context("training failed")?;
    tracing::info!(train = outcome.n_train, test = outcome.n_test, "model evaluation");
    println!("Model Evaluation:\n{}", outcome.report);

    let paths = ArtifactPaths::in_dir(&cfg.model_dir);
    tracing::info!("saving artifacts to {}", cfg.model_dir.display());
    outcome.artifacts.save(&paths)?;
    tracing::info!("save complete");
    Ok(())
}
