//! HTTP read endpoints over the rate service.

use crate::core::Rate;
use crate::service::RateService;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::error;

const INTERNAL_ERROR: &str = "500 Internal Server Error";

pub fn create_router(service: RateService) -> Router {
    Router::new()
        .route("/latest", get(get_latest))
        .route("/history", get(get_history))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Handler failure. Internal details are logged, never sent to the client.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            ApiError::Internal(err) => {
                error!(error = %format!("{err:#}"), "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR).into_response()
            }
        }
    }
}

async fn get_latest(State(service): State<RateService>) -> Result<Json<Vec<Rate>>, ApiError> {
    Ok(Json(service.get_latest().await?))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    currency: Option<String>,
}

async fn get_history(
    State(service): State<RateService>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<Rate>>, ApiError> {
    let currency = params
        .currency
        .filter(|c| !c.is_empty())
        .ok_or(ApiError::BadRequest("Missing currency parameter"))?;

    Ok(Json(service.get_history(&currency).await?))
}
