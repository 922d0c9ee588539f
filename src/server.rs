use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

use crate::error::PredictError;
use crate::pipeline::{Pipeline, Prediction};
use crate::types::{GatewayResponse, PredictRequest, PredictResponse};

// ---------- Server state ----------

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn error_response(e: PredictError) -> ApiError {
    let status = match &e {
        PredictError::ModelNotLoaded => StatusCode::SERVICE_UNAVAILABLE,
        PredictError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        PredictError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": e.to_string() })))
}

// ---------- Handlers ----------

fn run_prediction(state: &AppState, payload: PredictRequest) -> Result<Prediction, ApiError> {
    if !state.pipeline.is_ready() {
        return Err(error_response(PredictError::ModelNotLoaded));
    }
    let query = payload.into_query().map_err(error_response)?;
    state.pipeline.predict(&query).map_err(|e| {
        if let PredictError::Internal(msg) = &e {
            tracing::error!("prediction failed: {}", msg);
        }
        error_response(e)
    })
}

async fn predict(
    State(state): State<AppState>,
    Json(payload): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, ApiError> {
    let out = run_prediction(&state, payload)?;
    Ok(Json(PredictResponse {
        prediction_label: out.label,
        probability: out.probability,
    }))
}

/// Same scoring, answered in the gateway's field names.
async fn predict_gateway(
    State(state): State<AppState>,
    Json(payload): Json<PredictRequest>,
) -> Result<Json<GatewayResponse>, ApiError> {
    let out = run_prediction(&state, payload)?;
    Ok(Json(GatewayResponse {
        prevision: out.label,
        probabilidad: out.probability,
    }))
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    match state.pipeline.unready_reason() {
        None => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Some(reason) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unready", "reason": reason })),
        ),
    }
}

pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/predict_model", post(predict))
        .route("/predict", post(predict_gateway))
        .route("/health", get(health))
        .with_state(AppState { pipeline })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::encoding::{CategoryEncoder, EncoderTable, FeatureVector};
    use crate::error::ModelError;
    use crate::model::Classifier;

    /// Delayed iff the flight leaves in the evening.
    struct Evening;

    impl Classifier for Evening {
        fn predict_proba(&self, fv: &FeatureVector) -> Result<f64, ModelError> {
            Ok(if fv.departure_hour >= 18 { 0.9 } else { 0.1 })
        }
    }

    fn ready_app() -> Router {
        let encoders = EncoderTable::new(
            CategoryEncoder::fit(["AA", "DL"]),
            CategoryEncoder::fit(["JFK"]),
            CategoryEncoder::fit(["LAX"]),
        );
        router(Arc::new(Pipeline::ready(encoders, Arc::new(Evening))))
    }

    async fn post_json(app: Router, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let v = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, v)
    }

    const EVENING: &str = r#"{"airline":"AA","origin":"JFK","destination":"LAX",
        "departure_timestamp":"2026-03-15T19:30:00","distance_km":3980.0}"#;

    #[tokio::test]
    async fn predicts_delayed() {
        let (status, v) = post_json(ready_app(), "/predict_model", EVENING).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["prediction_label"], "Delayed");
        assert_eq!(v["probability"], 0.9);
    }

    #[tokio::test]
    async fn gateway_route_and_fields() {
        let body = r#"{"aerolinea":"XX","origen":"JFK","destino":"LAX",
            "fecha_partida":"2026-03-15T08:00:00","distancia_km":500}"#;
        let (status, v) = post_json(ready_app(), "/predict", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["prevision"], "On-time");
        assert_eq!(v["probabilidad"], 0.1);
        assert!(v.get("prediction_label").is_none());
    }

    #[tokio::test]
    async fn gateway_route_answers_in_gateway_keys() {
        let (status, v) = post_json(ready_app(), "/predict", EVENING).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["prevision"], "Delayed");
        assert_eq!(v["probabilidad"], 0.9);

        let app = router(Arc::new(Pipeline::unready("missing model")));
        let (status, v) = post_json(app, "/predict", EVENING).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(v["error"], "Model not loaded");
    }

    #[tokio::test]
    async fn unready_is_503() {
        let app = router(Arc::new(Pipeline::unready("missing model")));
        let (status, v) = post_json(app, "/predict_model", EVENING).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(v["error"], "Model not loaded");
    }

    #[tokio::test]
    async fn bad_timestamp_is_400() {
        let body = r#"{"airline":"AA","origin":"JFK","destination":"LAX",
            "departure_timestamp":"soon","distance_km":10}"#;
        let (status, v) = post_json(ready_app(), "/predict_model", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(v["error"].as_str().unwrap().contains("soon"));
    }

    #[tokio::test]
    async fn health_reports_state() {
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = ready_app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let app = router(Arc::new(Pipeline::unready("boom")));
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
