use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::encoding::{EncoderTable, FeatureVector};
use crate::error::ModelError;
use crate::forest::RandomForest;

pub const MODEL_FILE: &str = "flight_delay_model.json";
pub const ENCODERS_FILE: &str = "encoders.json";

/// Anything that can turn a feature vector into P(delayed).
pub trait Classifier: Send + Sync {
    fn predict_proba(&self, features: &FeatureVector) -> Result<f64, ModelError>;
}

/// The two training outputs: fitted encoders and fitted classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifacts {
    pub encoders: EncoderTable,
    pub classifier: RandomForest,
}

#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub encoders: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            model: dir.join(MODEL_FILE),
            encoders: dir.join(ENCODERS_FILE),
        }
    }
}

impl Artifacts {
    pub fn load(paths: &ArtifactPaths) -> Result<Self> {
        let model_txt = fs::read_to_string(&paths.model)
            .with_context(|| format!("failed to read model at {}", paths.model.display()))?;
        let classifier: RandomForest = serde_json::from_str(&model_txt)
            .with_context(|| format!("failed to parse model {}", paths.model.display()))?;

        let enc_txt = fs::read_to_string(&paths.encoders)
            .with_context(|| format!("failed to read encoders at {}", paths.encoders.display()))?;
        let encoders: EncoderTable = serde_json::from_str(&enc_txt)
            .with_context(|| format!("failed to parse encoders {}", paths.encoders.display()))?;

        // Probe once so a broken model fails here rather than on every request.
        let probe = FeatureVector {
            airline_code: 0,
            origin_code: 0,
            destination_code: 0,
            distance_miles: 0.0,
            departure_hour: 0,
            departure_weekday: 0,
            departure_month: 1,
        };
        classifier
            .predict_row(&probe.to_array())
            .context("warmup scoring failed")?;

        Ok(Self {
            encoders,
            classifier,
        })
    }

    /// Writes both blobs, creating the parent directories if needed.
    pub fn save(&self, paths: &ArtifactPaths) -> Result<()> {
        for p in [&paths.model, &paths.encoders] {
            if let Some(dir) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
            }
        }
        let model_txt = serde_json::to_string(&self.classifier).context("failed to encode model")?;
        fs::write(&paths.model, model_txt)
            .with_context(|| format!("failed to write model to {}", paths.model.display()))?;
        let enc_txt =
            serde_json::to_string_pretty(&self.encoders).context("failed to encode encoders")?;
        fs::write(&paths.encoders, enc_txt)
            .with_context(|| format!("failed to write encoders to {}", paths.encoders.display()))?;
        Ok(())
    }
}
