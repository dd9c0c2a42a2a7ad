//! ==============================================================================
//! api.rs - http api
//! ==============================================================================
//!
//! purpose:
//!     json endpoints over the query façade. handlers only ever read
//!     snapshots, so they keep answering (with the last known data) after
//!     the serial reader has stopped.
//!
//! routes:
//!     GET /data                      station position + every series
//!     GET /sensor/:id/data           [ts, value] pairs per metric (id 1 only)
//!     GET /sensor/:id/data/:metric   [ts, value] pairs for one metric
//!     GET /status                    reader state and counters
//!     GET /demo/sensors              generated demo grid
//!     GET /demo/sensor/:id           generated rows for one demo sensor
//!
//! relationships:
//!     - uses: query.rs (StationQuery), mock.rs
//!     - started by: main.rs
//!
//! ==============================================================================

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::error::QueryError;
use crate::mock::{self, MockSample};
use crate::query::{SensorSeries, Series, StationData, StationQuery, StatusReport};

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (StatusCode::NOT_FOUND, body).into_response()
    }
}

pub fn router(query: StationQuery) -> Router {
    Router::new()
        .route("/data", get(data_handler))
        .route("/sensor/:id/data", get(sensor_handler))
        .route("/sensor/:id/data/:metric", get(metric_handler))
        .route("/status", get(status_handler))
        .route("/demo/sensors", get(demo_sensors_handler))
        .route("/demo/sensor/:id", get(demo_sensor_handler))
        .layer(CorsLayer::permissive())
        .with_state(query)
}

/// Serve until `shutdown` resolves.
pub async fn run_server<F>(listener: TcpListener, query: StationQuery, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(query))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn data_handler(State(query): State<StationQuery>) -> Json<StationData> {
    Json(query.snapshot().await)
}

async fn sensor_handler(
    State(query): State<StationQuery>,
    Path(id): Path<u32>,
) -> Result<Json<SensorSeries>, QueryError> {
    query.sensor_series(id).await.map(Json)
}

async fn metric_handler(
    State(query): State<StationQuery>,
    Path((id, metric)): Path<(u32, String)>,
) -> Result<Json<Series>, QueryError> {
    query.metric_series(id, &metric).await.map(Json)
}

async fn status_handler(State(query): State<StationQuery>) -> Json<StatusReport> {
    Json(query.status().await)
}

async fn demo_sensors_handler() -> Json<Vec<MockSample>> {
    Json(mock::generate(&mut rand::thread_rng(), chrono::Utc::now()))
}

async fn demo_sensor_handler(Path(id): Path<u32>) -> Result<Json<Vec<MockSample>>, QueryError> {
    mock::generate_for(&mut rand::thread_rng(), chrono::Utc::now(), id)
        .map(Json)
        .ok_or(QueryError::SensorNotFound(id))
}
