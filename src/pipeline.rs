//! Online inference: frozen artifacts in, one prediction per query out.
//!
//! A [`Pipeline`] is built once at startup and never mutated afterwards. If
//! the artifacts could not be loaded it stays unready and every call to
//! [`Pipeline::predict`] returns [`PredictError::ModelNotLoaded`].

use std::sync::Arc;

use crate::encoding::{CategoryField, EncoderTable, FeatureVector};
use crate::error::PredictError;
use crate::model::{ArtifactPaths, Artifacts, Classifier};
use crate::types::{DelayLabel, FlightQuery};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: DelayLabel,
    pub probability: f64,
}

enum State {
    Ready {
        encoders: EncoderTable,
        classifier: Arc<dyn Classifier>,
    },
    Unready {
        reason: String,
    },
}

pub struct Pipeline {
    state: State,
    log_features: bool,
}

impl Pipeline {
    pub fn ready(encoders: EncoderTable, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            state: State::Ready {
                encoders,
                classifier,
            },
            log_features: false,
        }
    }

    pub fn unready(reason: impl Into<String>) -> Self {
        Self {
            state: State::Unready {
                reason: reason.into(),
            },
            log_features: false,
        }
    }

    pub fn from_artifacts(artifacts: Artifacts) -> Self {
        Self::ready(artifacts.encoders, Arc::new(artifacts.classifier))
    }

    /// Loads both artifacts. Failure is logged once and yields an unready
    /// pipeline instead of an error.
    pub fn load(paths: &ArtifactPaths) -> Self {
        tracing::info!(
            model = %paths.model.display(),
            encoders = %paths.encoders.display(),
            "loading artifacts"
        );
        match Artifacts::load(paths) {
            Ok(a) => {
                tracing::info!(
                    trees = a.classifier.trees().len(),
                    airlines = a.encoders.get(CategoryField::Airline).len(),
                    "artifacts loaded successfully"
                );
                Self::from_artifacts(a)
            }
            Err(e) => {
                tracing::error!("error loading artifacts: {:#}", e);
                Self::unready(format!("{:#}", e))
            }
        }
    }

    pub fn with_feature_logging(mut self, on: bool) -> Self {
        self.log_features = on;
        self
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready { .. })
    }

    /// Why the pipeline is unready, if it is.
    pub fn unready_reason(&self) -> Option<&str> {
        match &self.state {
            State::Unready { reason } => Some(reason),
            State::Ready { .. } => None,
        }
    }

    /// The exact vector the classifier would see for `query`.
    pub fn features(&self, query: &FlightQuery) -> Result<FeatureVector, PredictError> {
        match &self.state {
            State::Ready { encoders, .. } => Ok(FeatureVector::from_query(query, encoders)),
            State::Unready { .. } => Err(PredictError::ModelNotLoaded),
        }
    }

    pub fn predict(&self, query: &FlightQuery) -> Result<Prediction, PredictError> {
        let (encoders, classifier) = match &self.state {
            State::Ready {
                encoders,
                classifier,
            } => (encoders, classifier),
            State::Unready { .. } => return Err(PredictError::ModelNotLoaded),
        };

        let fv = FeatureVector::from_query(query, encoders);
        if self.log_features {
            tracing::info!(
                "recv airline={} origin={} destination={} features={}",
                query.airline,
                query.origin,
                query.destination,
                fv
            );
        }

        let p = classifier.predict_proba(&fv)?;
        if !(0.0..=1.0).contains(&p) {
            return Err(PredictError::Internal(format!(
                "classifier returned probability {} outside [0, 1]",
                p
            )));
        }
        Ok(Prediction {
            label: DelayLabel::from_probability(p),
            probability: p,
        })
    }
}
