use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::encoding::parse_timestamp;
use crate::error::PredictError;

/// Delay threshold in minutes; strictly greater counts as delayed.
pub const DELAY_THRESHOLD_MINUTES: f64 = 15.0;

/// Probability above which a flight is labelled delayed.
pub const DELAYED_PROBABILITY_THRESHOLD: f64 = 0.5;

// ---------- Wire types ----------

/// Inference request. Accepts the data-science field names as well as the
/// gateway ones (aerolinea, origen, ...).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PredictRequest {
    #[serde(alias = "aerolinea")]
    pub airline: String,
    #[serde(alias = "origen")]
    pub origin: String,
    #[serde(alias = "destino")]
    pub destination: String,
    #[serde(alias = "departure_date", alias = "fecha_partida")]
    pub departure_timestamp: String,
    #[serde(alias = "distance", alias = "distancia_km")]
    pub distance_km: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictResponse {
    pub prediction_label: DelayLabel,
    pub probability: f64,
}

/// Response shape of the `/predict` gateway route (prevision / probabilidad).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayResponse {
    pub prevision: DelayLabel,
    pub probabilidad: f64,
}

impl PredictRequest {
    /// Validates the raw request and turns it into a query the pipeline can encode.
    pub fn into_query(self) -> Result<FlightQuery, PredictError> {
        if !self.distance_km.is_finite() || self.distance_km < 0.0 {
            return Err(PredictError::InvalidInput(format!(
                "distance_km must be a non-negative number, got {}",
                self.distance_km
            )));
        }
        let departure = parse_timestamp(&self.departure_timestamp)?;
        Ok(FlightQuery {
            airline: self.airline,
            origin: self.origin,
            destination: self.destination,
            departure,
            distance_km: self.distance_km,
        })
    }
}

// ---------- Domain types ----------

/// One labelled historical flight. Distance is already in miles.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightRecord {
    pub airline: String,
    pub origin: String,
    pub destination: String,
    pub distance_miles: f64,
    pub departure: NaiveDateTime,
    pub delay_minutes: f64,
}

impl FlightRecord {
    pub fn is_delayed(&self) -> bool {
        self.delay_minutes > DELAY_THRESHOLD_MINUTES
    }
}

/// A flight to score. Distance is in kilometres.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightQuery {
    pub airline: String,
    pub origin: String,
    pub destination: String,
    pub departure: NaiveDateTime,
    pub distance_km: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelayLabel {
    Delayed,
    #[serde(rename = "On-time")]
    OnTime,
}

impl DelayLabel {
    pub fn from_probability(p: f64) -> Self {
        if p > DELAYED_PROBABILITY_THRESHOLD {
            DelayLabel::Delayed
        } else {
            DelayLabel::OnTime
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DelayLabel::Delayed => "Delayed",
            DelayLabel::OnTime => "On-time",
        }
    }
}
