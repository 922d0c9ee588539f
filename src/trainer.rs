//! Offline trainer: CSV -> encoders + forest + held-out metrics.

use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::Deserialize;

use crate::config::TrainerConfig;
use crate::encoding::{parse_timestamp, EncoderTable, FeatureVector};
use crate::error::TrainError;
use crate::forest::RandomForest;
use crate::metrics::EvaluationReport;
use crate::model::{Artifacts, Classifier};
use crate::types::{DelayLabel, FlightRecord};

/// Columns we read; any others in the file are ignored.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Airline")]
    airline: String,
    #[serde(rename = "Origin")]
    origin: String,
    #[serde(rename = "Destination")]
    destination: String,
    #[serde(rename = "Distance")]
    distance: f64,
    #[serde(rename = "ScheduledDeparture")]
    scheduled_departure: String,
    #[serde(rename = "DelayMinutes")]
    delay_minutes: f64,
}

impl CsvRow {
    fn into_record(self) -> Option<FlightRecord> {
        if !self.distance.is_finite() || !self.delay_minutes.is_finite() {
            return None;
        }
        let departure = parse_timestamp(&self.scheduled_departure).ok()?;
        Some(FlightRecord {
            airline: self.airline,
            origin: self.origin,
            destination: self.destination,
            distance_miles: self.distance,
            departure,
            delay_minutes: self.delay_minutes,
        })
    }
}

#[derive(Debug)]
pub struct LoadedData {
    pub source: PathBuf,
    pub records: Vec<FlightRecord>,
    pub skipped: usize,
}

#[derive(Debug)]
pub struct TrainingOutcome {
    pub artifacts: Artifacts,
    pub report: EvaluationReport,
    pub n_train: usize,
    pub n_test: usize,
}

/// First existing path wins.
pub fn resolve_data_source(candidates: &[PathBuf]) -> Result<PathBuf, TrainError> {
    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or_else(|| TrainError::DataSourceMissing {
            searched: candidates.to_vec(),
        })
}

/// Reads flight records from CSV. Rows that do not parse are skipped and
/// counted; I/O failures abort.
pub fn load_records(path: &Path) -> Result<LoadedData, TrainError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (line, row) in rdr.deserialize::<CsvRow>().enumerate() {
        match row {
            Ok(row) => match row.into_record() {
                Some(r) => records.push(r),
                None => skipped += 1,
            },
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                tracing::debug!(line = line + 2, error = %e, "skipping malformed row");
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        tracing::warn!(skipped, "skipped malformed rows in {}", path.display());
    }
    if records.is_empty() {
        return Err(TrainError::EmptyDataset(path.to_path_buf()));
    }
    Ok(LoadedData {
        source: path.to_path_buf(),
        records,
        skipped,
    })
}

/// Shuffled (train, test) index split. The test side gets
/// ceil(n * test_fraction) rows; with two or more rows neither side is empty.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut idx: Vec<usize> = (0..n).collect();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    idx.shuffle(&mut rng);
    let n_test = if n < 2 {
        0
    } else {
        ((n as f64 * test_fraction).ceil() as usize).clamp(1, n - 1)
    };
    let train = idx.split_off(n_test);
    (train, idx)
}

/// Fits encoders on every record, then the forest on the training split,
/// and scores the held-out split.
pub fn fit(records: &[FlightRecord], cfg: &TrainerConfig) -> Result<TrainingOutcome, TrainError> {
    if records.len() < 2 {
        return Err(TrainError::TooFewRows(records.len()));
    }

    let encoders = EncoderTable::fit(records);
    let features: Vec<FeatureVector> = records
        .iter()
        .map(|r| FeatureVector::from_record(r, &encoders))
        .collect();
    let labels: Vec<bool> = records.iter().map(FlightRecord::is_delayed).collect();

    let (train_idx, test_idx) = train_test_split(records.len(), cfg.test_fraction, cfg.seed);
    tracing::info!(train = train_idx.len(), test = test_idx.len(), "split data");

    let x_train: Vec<FeatureVector> = train_idx.iter().map(|&i| features[i]).collect();
    let y_train: Vec<bool> = train_idx.iter().map(|&i| labels[i]).collect();

    tracing::info!(
        n_estimators = cfg.forest.n_estimators,
        max_depth = cfg.forest.max_depth,
        "training model"
    );
    let classifier = RandomForest::fit(&x_train, &y_train, cfg.forest);

    let mut predicted = Vec::with_capacity(test_idx.len());
    for &i in &test_idx {
        let p = classifier.predict_proba(&features[i])?;
        predicted.push(DelayLabel::from_probability(p) == DelayLabel::Delayed);
    }
    let actual: Vec<bool> = test_idx.iter().map(|&i| labels[i]).collect();
    let report = EvaluationReport::new(&predicted, &actual);

    Ok(TrainingOutcome {
        artifacts: Artifacts {
            encoders,
            classifier,
        },
        report,
        n_train: train_idx.len(),
        n_test: test_idx.len(),
    })
}

/// Full offline run: locate data, load, fit. Saving is left to the caller.
pub fn run(cfg: &TrainerConfig) -> Result<TrainingOutcome, TrainError> {
    let source = resolve_data_source(&cfg.data_paths)?;
    tracing::info!("loading data from {}", source.display());
    let data = load_records(&source)?;
    tracing::info!(rows = data.records.len(), skipped = data.skipped, "preprocessed data");
    fit(&data.records, cfg)
}
