use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::PathBuf};

use crate::forest::ForestParams;
use crate::model::{ArtifactPaths, ENCODERS_FILE, MODEL_FILE};

/// Inference service settings, read from the environment.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub artifacts: ArtifactPaths,
    pub port: u16,
    /// `LOG_PRED=1`: log every feature vector before scoring.
    pub log_predictions: bool,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let model = get("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("models").join(MODEL_FILE));
        let encoders = get("ENCODERS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("models").join(ENCODERS_FILE));
        let port = get("PORT").and_then(|s| s.parse().ok()).unwrap_or(8000);
        Self {
            artifacts: ArtifactPaths { model, encoders },
            port,
            log_predictions: get("LOG_PRED").as_deref() == Some("1"),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct TrainerConfig {
    /// Tried in order; the first that exists is used.
    pub data_paths: Vec<PathBuf>,
    pub model_dir: PathBuf,
    pub test_fraction: f64,
    pub seed: u64,
    pub forest: ForestParams,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            data_paths: vec![
                PathBuf::from("data/flight_delays.csv"),
                PathBuf::from("flight_delays.csv"),
            ],
            model_dir: PathBuf::from("models"),
            test_fraction: 0.2,
            seed: 42,
            forest: ForestParams::default(),
        }
    }
}

impl TrainerConfig {
    pub fn load(path: &str) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("trainer config not found at {}", path))?;
        let cfg: Self = serde_json::from_str(&data)
            .with_context(|| format!("invalid trainer config JSON in {}", path))?;
        anyhow::ensure!(
            cfg.test_fraction > 0.0 && cfg.test_fraction < 1.0,
            "test_fraction must be in (0, 1), got {}",
            cfg.test_fraction
        );
        Ok(cfg)
    }
}
