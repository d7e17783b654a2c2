//! Admin CRUD routes for the instrument catalog
//!
//! Inserts and removals keep the simulator's correlation graph in
//! step with the store. The merge route assigns fields by wire name,
//! so the next published delta carries exactly what was changed.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use market_data::metrics::MetricsSnapshot;
use market_data::store::CatalogFilter;
use types::ids::InstrumentId;
use types::instrument::{Currency, Instrument, InstrumentStatus, Rating, SecurityType};

use crate::error::AppError;
use crate::state::AppState;

/// Catalog listing filters, all optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogQuery {
    pub security_type: Option<SecurityType>,
    pub currency: Option<Currency>,
    pub status: Option<InstrumentStatus>,
    pub rating: Option<Rating>,
}

impl From<CatalogQuery> for CatalogFilter {
    fn from(query: CatalogQuery) -> Self {
        CatalogFilter {
            security_type: query.security_type,
            currency: query.currency,
            status: query.status,
            rating: query.rating,
        }
    }
}

/// `GET /v1/instruments`
pub async fn list_instruments(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> Json<Vec<Instrument>> {
    Json(state.store.list_by(&query.into()))
}

/// `POST /v1/instruments`
pub async fn create_instrument(
    State(state): State<AppState>,
    Json(instrument): Json<Instrument>,
) -> Result<(StatusCode, Json<Instrument>), AppError> {
    let existing = state.store.list_all();
    state.store.insert(instrument.clone())?;
    state
        .simulator
        .lock()
        .expect("simulator lock poisoned")
        .instrument_added(&instrument, &existing);
    info!(instrument = %instrument.id, "instrument created");
    Ok((StatusCode::CREATED, Json(instrument)))
}

/// `GET /v1/instruments/{id}`
pub async fn get_instrument(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Instrument>, AppError> {
    let id = InstrumentId::new(id);
    state
        .store
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("instrument not found: {id}")))
}

/// `PATCH /v1/instruments/{id}`: field-wise merge.
pub async fn merge_instrument(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Instrument>, AppError> {
    let id = InstrumentId::new(id);
    let fields = body
        .as_object()
        .ok_or_else(|| AppError::BadRequest("merge body must be an object".to_string()))?;
    let updated = state.store.merge(&id, fields)?;
    Ok(Json(updated))
}

/// `DELETE /v1/instruments/{id}`
pub async fn delete_instrument(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = InstrumentId::new(id);
    state.store.remove(&id)?;
    state
        .simulator
        .lock()
        .expect("simulator lock poisoned")
        .instrument_removed(&id);
    info!(instrument = %id, "instrument deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Runtime pacing limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitsUpdate {
    pub max_updates_per_second: f64,
    pub bucket_size: f64,
}

/// `PUT /v1/limits`: apply new token-bucket parameters to every
/// connected session, preserving current levels.
pub async fn update_limits(
    State(state): State<AppState>,
    Json(body): Json<LimitsUpdate>,
) -> Result<Json<Value>, AppError> {
    if body.max_updates_per_second <= 0.0 || !body.max_updates_per_second.is_finite() {
        return Err(AppError::BadRequest(
            "maxUpdatesPerSecond must be a positive number".to_string(),
        ));
    }
    if body.bucket_size < 1.0 || !body.bucket_size.is_finite() {
        return Err(AppError::BadRequest(
            "bucketSize must be at least 1".to_string(),
        ));
    }

    state
        .registry
        .lock()
        .expect("registry lock poisoned")
        .reconfigure_buckets(body.bucket_size, body.max_updates_per_second);
    info!(
        max_updates_per_second = body.max_updates_per_second,
        bucket_size = body.bucket_size,
        "pacing limits updated"
    );
    Ok(Json(json!({
        "maxUpdatesPerSecond": body.max_updates_per_second,
        "bucketSize": body.bucket_size,
    })))
}

/// `POST /v1/simulator/pause`
pub async fn pause_simulator(State(state): State<AppState>) -> Json<Value> {
    state
        .simulator
        .lock()
        .expect("simulator lock poisoned")
        .set_enabled(false);
    Json(json!({"enabled": false}))
}

/// `POST /v1/simulator/resume`
pub async fn resume_simulator(State(state): State<AppState>) -> Json<Value> {
    state
        .simulator
        .lock()
        .expect("simulator lock poisoned")
        .set_enabled(true);
    Json(json!({"enabled": true}))
}

/// `GET /v1/stats`
pub async fn stats(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "instruments": state.store.len(),
        "sessions": state
            .registry
            .lock()
            .expect("registry lock poisoned")
            .session_count(),
    }))
}
