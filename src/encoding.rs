//! Shared feature encoding used by both the trainer and the inference pipeline.
//!
//! Everything that turns a flight into classifier input lives here so the two
//! sides cannot drift apart. Column order of [`FeatureVector`] is fixed by
//! [`FEATURE_NAMES`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::EncodingError;
use crate::types::{FlightQuery, FlightRecord};

/// Code handed out for categories that were never seen during training.
pub const FALLBACK_CODE: u32 = 0;

/// Kilometres to statute miles. The model is trained on miles.
pub const KM_TO_MILES: f64 = 0.621371;

pub const N_FEATURES: usize = 7;

/// Authoritative feature order.
pub const FEATURE_NAMES: [&str; N_FEATURES] = [
    "Airline",
    "Origin",
    "Destination",
    "Distance",
    "dep_hour",
    "dep_day_of_week",
    "dep_month",
];

// ---------- Categorical fields ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CategoryField {
    Airline,
    Origin,
    Destination,
}

impl CategoryField {
    pub const ALL: [CategoryField; 3] = [
        CategoryField::Airline,
        CategoryField::Origin,
        CategoryField::Destination,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryField::Airline => "Airline",
            CategoryField::Origin => "Origin",
            CategoryField::Destination => "Destination",
        }
    }
}

impl fmt::Display for CategoryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryField {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoryField::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| EncodingError::UnknownField(s.to_string()))
    }
}

/// Result of a vocabulary lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoded {
    pub code: u32,
    pub was_fallback: bool,
}

/// Frozen vocabulary for one categorical field.
///
/// Codes are positions in `classes`. Fitting sorts the vocabulary, so the
/// same set of values always yields the same codes regardless of row order.
/// Persisted as the plain list of classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct CategoryEncoder {
    classes: Vec<String>,
    index: HashMap<String, u32>,
}

impl CategoryEncoder {
    pub fn fit<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let vocab: BTreeSet<String> = values.into_iter().map(|v| v.as_ref().to_string()).collect();
        let classes: Vec<String> = vocab.into_iter().collect();
        let index = classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i as u32))
            .collect();
        Self { classes, index }
    }

    /// Builds an encoder from an explicit class list; position is the code.
    pub fn from_classes(classes: Vec<String>) -> Result<Self, EncodingError> {
        let mut index = HashMap::with_capacity(classes.len());
        for (i, c) in classes.iter().enumerate() {
            if index.insert(c.clone(), i as u32).is_some() {
                return Err(EncodingError::DuplicateCategory(c.clone()));
            }
        }
        Ok(Self { classes, index })
    }

    /// Pure lookup; unknown values get [`FALLBACK_CODE`].
    pub fn lookup(&self, value: &str) -> Encoded {
        match self.index.get(value) {
            Some(&code) => Encoded {
                code,
                was_fallback: false,
            },
            None => Encoded {
                code: FALLBACK_CODE,
                was_fallback: true,
            },
        }
    }

    pub fn decode(&self, code: u32) -> Option<&str> {
        self.classes.get(code as usize).map(String::as_str)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl TryFrom<Vec<String>> for CategoryEncoder {
    type Error = EncodingError;

    fn try_from(classes: Vec<String>) -> Result<Self, Self::Error> {
        Self::from_classes(classes)
    }
}

impl From<CategoryEncoder> for Vec<String> {
    fn from(enc: CategoryEncoder) -> Self {
        enc.classes
    }
}

/// One encoder per categorical field. Persisted as a map keyed by field name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<CategoryField, CategoryEncoder>",
    into = "BTreeMap<CategoryField, CategoryEncoder>"
)]
pub struct EncoderTable {
    airline: CategoryEncoder,
    origin: CategoryEncoder,
    destination: CategoryEncoder,
}

impl EncoderTable {
    pub fn new(
        airline: CategoryEncoder,
        origin: CategoryEncoder,
        destination: CategoryEncoder,
    ) -> Self {
        Self {
            airline,
            origin,
            destination,
        }
    }

    /// Fits every encoder on the full vocabulary of `records`.
    pub fn fit(records: &[FlightRecord]) -> Self {
        Self {
            airline: CategoryEncoder::fit(records.iter().map(|r| r.airline.as_str())),
            origin: CategoryEncoder::fit(records.iter().map(|r| r.origin.as_str())),
            destination: CategoryEncoder::fit(records.iter().map(|r| r.destination.as_str())),
        }
    }

    pub fn get(&self, field: CategoryField) -> &CategoryEncoder {
        match field {
            CategoryField::Airline => &self.airline,
            CategoryField::Origin => &self.origin,
            CategoryField::Destination => &self.destination,
        }
    }

    /// Encodes `value`, emitting a warning when the fallback code is used.
    pub fn encode(&self, field: CategoryField, value: &str) -> Encoded {
        let enc = self.get(field).lookup(value);
        if enc.was_fallback {
            tracing::warn!(field = %field, value, "unknown category, using fallback code");
        }
        enc
    }

    /// Same as [`encode`](Self::encode) but with the field given by name.
    pub fn encode_named(&self, field: &str, value: &str) -> Result<Encoded, EncodingError> {
        let field: CategoryField = field.parse()?;
        Ok(self.encode(field, value))
    }
}

impl TryFrom<BTreeMap<CategoryField, CategoryEncoder>> for EncoderTable {
    type Error = EncodingError;

    fn try_from(mut map: BTreeMap<CategoryField, CategoryEncoder>) -> Result<Self, Self::Error> {
        let mut take = |f: CategoryField| {
            map.remove(&f)
                .ok_or_else(|| EncodingError::MissingEncoder(f.to_string()))
        };
        Ok(Self {
            airline: take(CategoryField::Airline)?,
            origin: take(CategoryField::Origin)?,
            destination: take(CategoryField::Destination)?,
        })
    }
}

impl From<EncoderTable> for BTreeMap<CategoryField, CategoryEncoder> {
    fn from(t: EncoderTable) -> Self {
        BTreeMap::from([
            (CategoryField::Airline, t.airline),
            (CategoryField::Origin, t.origin),
            (CategoryField::Destination, t.destination),
        ])
    }
}

// ---------- Temporal decomposition ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepartureParts {
    pub hour: u32,
    /// Monday = 0.
    pub weekday: u32,
    pub month: u32,
}

/// Calendar breakdown of a departure; no timezone handling.
pub fn decompose_departure(ts: &NaiveDateTime) -> DepartureParts {
    DepartureParts {
        hour: ts.hour(),
        weekday: ts.weekday().num_days_from_monday(),
        month: ts.month(),
    }
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parses an ISO-8601 style timestamp. An explicit offset is accepted but the
/// wall-clock time is kept as written.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, EncodingError> {
    let s = s.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.naive_local());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| EncodingError::BadTimestamp(s.to_string()))
}

// ---------- Distance ----------

pub fn km_to_miles(km: f64) -> f64 {
    km * KM_TO_MILES
}

// ---------- Feature vector ----------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub airline_code: u32,
    pub origin_code: u32,
    pub destination_code: u32,
    pub distance_miles: f64,
    pub departure_hour: u32,
    pub departure_weekday: u32,
    pub departure_month: u32,
}

impl FeatureVector {
    /// Training side. Record distances are already in miles and are used as is.
    pub fn from_record(record: &FlightRecord, encoders: &EncoderTable) -> Self {
        Self::assemble(
            encoders,
            [
                record.airline.as_str(),
                record.origin.as_str(),
                record.destination.as_str(),
            ],
            record.distance_miles,
            &record.departure,
        )
    }

    /// Inference side. Query distances arrive in kilometres.
    pub fn from_query(query: &FlightQuery, encoders: &EncoderTable) -> Self {
        Self::assemble(
            encoders,
            [
                query.airline.as_str(),
                query.origin.as_str(),
                query.destination.as_str(),
            ],
            km_to_miles(query.distance_km),
            &query.departure,
        )
    }

    fn assemble(
        encoders: &EncoderTable,
        categories: [&str; 3],
        distance_miles: f64,
        departure: &NaiveDateTime,
    ) -> Self {
        let [airline, origin, destination] = categories;
        let parts = decompose_departure(departure);
        Self {
            airline_code: encoders.encode(CategoryField::Airline, airline).code,
            origin_code: encoders.encode(CategoryField::Origin, origin).code,
            destination_code: encoders.encode(CategoryField::Destination, destination).code,
            distance_miles,
            departure_hour: parts.hour,
            departure_weekday: parts.weekday,
            departure_month: parts.month,
        }
    }

    /// Values in [`FEATURE_NAMES`] order.
    pub fn to_array(&self) -> [f64; N_FEATURES] {
        [
            self.airline_code as f64,
            self.origin_code as f64,
            self.destination_code as f64,
            self.distance_miles,
            self.departure_hour as f64,
            self.departure_weekday as f64,
            self.departure_month as f64,
        ]
    }
}

impl fmt::Display for FeatureVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = FEATURE_NAMES
            .iter()
            .zip(self.to_array())
            .map(|(name, v)| format!("{}={:.3}", name, v))
            .collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::capture_logs;
    use tracing::Level;

    fn classes(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    /// AA -> 2, JFK -> 5, LAX -> 9.
    fn sample_table() -> EncoderTable {
        EncoderTable::new(
            CategoryEncoder::from_classes(classes(&["9E", "AS", "AA", "B6"])).unwrap(),
            CategoryEncoder::from_classes(classes(&["ATL", "BOS", "DEN", "DFW", "ORD", "JFK"]))
                .unwrap(),
            CategoryEncoder::from_classes(classes(&[
                "ATL", "BOS", "DEN", "DFW", "ORD", "JFK", "SEA", "SFO", "MIA", "LAX",
            ]))
            .unwrap(),
        )
    }

    #[test]
    fn unseen_value_warns_once_with_field() {
        let table = sample_table();
        let (enc, lines) = capture_logs(Level::WARN, || table.encode(CategoryField::Origin, "XXX"));
        assert!(enc.was_fallback);
        let warns: Vec<&String> = lines.iter().filter(|l| l.contains("WARN")).collect();
        assert_eq!(warns.len(), 1, "{lines:?}");
        assert!(warns[0].contains("unknown category"));
        assert!(warns[0].contains("field=Origin"));
        assert!(warns[0].contains("XXX"));

        let (enc, lines) = capture_logs(Level::WARN, || table.encode(CategoryField::Origin, "JFK"));
        assert_eq!(enc.code, 5);
        assert!(lines.iter().all(|l| !l.contains("WARN")), "{lines:?}");
    }

    #[test]
    fn fit_is_a_bijection_onto_code_range() {
        let enc = CategoryEncoder::fit(["UA", "AA", "DL", "AA", "WN", "UA"]);
        assert_eq!(enc.len(), 4);
        let mut codes: Vec<u32> = enc.classes().iter().map(|c| enc.lookup(c).code).collect();
        codes.sort_unstable();
        assert_eq!(codes, vec![0, 1, 2, 3]);
        for c in enc.classes() {
            let e = enc.lookup(c);
            assert!(!e.was_fallback);
            assert_eq!(enc.decode(e.code), Some(c.as_str()));
            assert_eq!(enc.lookup(c), e);
        }
    }

    #[test]
    fn fit_ignores_row_order() {
        let a = CategoryEncoder::fit(["WN", "AA", "DL"]);
        let b = CategoryEncoder::fit(["DL", "WN", "AA", "AA"]);
        assert_eq!(a, b);
        assert_eq!(a.lookup("AA").code, 0);
    }

    #[test]
    fn unseen_value_falls_back_to_zero() {
        let enc = CategoryEncoder::fit(["AA", "DL"]);
        let e = enc.lookup("ZZ");
        assert_eq!(e.code, FALLBACK_CODE);
        assert!(e.was_fallback);
        assert_eq!(enc.lookup(""), e);
        // Lookup never grows the vocabulary.
        assert_eq!(enc.len(), 2);
    }

    #[test]
    fn duplicate_classes_are_rejected() {
        let err = CategoryEncoder::from_classes(classes(&["AA", "DL", "AA"])).unwrap_err();
        assert_eq!(err, EncodingError::DuplicateCategory("AA".into()));
    }

    #[test]
    fn encode_named_rejects_unknown_field() {
        let t = sample_table();
        assert_eq!(t.encode_named("airline", "AA").unwrap().code, 2);
        assert_eq!(t.encode_named("Origin", "JFK").unwrap().code, 5);
        assert_eq!(
            t.encode_named("tail_number", "N123"),
            Err(EncodingError::UnknownField("tail_number".into()))
        );
    }

    #[test]
    fn encoder_table_serializes_by_field_name() {
        let t = sample_table();
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v["Airline"][2], "AA");
        let back: EncoderTable = serde_json::from_value(v).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn encoder_table_requires_all_fields() {
        let err = serde_json::from_str::<EncoderTable>(r#"{"Airline":["AA"],"Origin":["JFK"]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("Destination"));
    }

    #[test]
    fn distance_conversion() {
        assert_eq!(km_to_miles(0.0), 0.0);
        assert_eq!(km_to_miles(1.0), 0.621371);
        let (a, b) = (1234.5, 678.9);
        assert!((km_to_miles(a + b) - (km_to_miles(a) + km_to_miles(b))).abs() < 1e-9);
    }

    #[test]
    fn temporal_decomposition() {
        let ts = parse_timestamp("2026-01-01T08:30:00").unwrap();
        assert_eq!(
            decompose_departure(&ts),
            DepartureParts {
                hour: 8,
                weekday: 3,
                month: 1
            }
        );
    }

    #[test]
    fn timestamp_variants() {
        let base = parse_timestamp("2026-03-15T14:00:00").unwrap();
        assert_eq!(parse_timestamp("2026-03-15 14:00:00").unwrap(), base);
        assert_eq!(parse_timestamp("2026-03-15T14:00").unwrap(), base);
        assert_eq!(parse_timestamp("2026-03-15T14:00:00.000").unwrap(), base);
        // offset kept as wall clock
        assert_eq!(parse_timestamp("2026-03-15T14:00:00+05:00").unwrap(), base);
        assert_eq!(
            parse_timestamp("2026-03-15").unwrap(),
            parse_timestamp("2026-03-15T00:00:00").unwrap()
        );
        assert!(matches!(
            parse_timestamp("15/03/2026"),
            Err(EncodingError::BadTimestamp(_))
        ));
    }

    #[test]
    fn query_features_match_reference_vector() {
        let q = FlightQuery {
            airline: "AA".into(),
            origin: "JFK".into(),
            destination: "LAX".into(),
            departure: parse_timestamp("2026-03-15T14:00:00").unwrap(),
            distance_km: 1000.0,
        };
        let fv = FeatureVector::from_query(&q, &sample_table());
        assert_eq!(
            (fv.airline_code, fv.origin_code, fv.destination_code),
            (2, 5, 9)
        );
        assert!((fv.distance_miles - 621.371).abs() < 1e-9);
        assert_eq!(
            (fv.departure_hour, fv.departure_weekday, fv.departure_month),
            (14, 6, 3)
        );
    }

    #[test]
    fn record_distance_is_not_converted() {
        let r = FlightRecord {
            airline: "AA".into(),
            origin: "JFK".into(),
            destination: "LAX".into(),
            distance_miles: 2475.0,
            departure: parse_timestamp("2026-03-15T14:00:00").unwrap(),
            delay_minutes: 30.0,
        };
        let fv = FeatureVector::from_record(&r, &sample_table());
        assert_eq!(fv.distance_miles, 2475.0);
        assert_eq!(fv.to_array()[..3], [2.0, 5.0, 9.0]);
    }
}
