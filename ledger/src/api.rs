use crate::errors::ApiError;
use crate::identity::CREDENTIAL_HEADER;
use crate::models::*;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    middleware::{self, Next},
    response::{
        sse::{Event, KeepAlive, Sse},
        Response,
    },
    routing::{get, post},
    Extension, Json, Router,
};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Gateway routes, served under `/api/v1/{channel}/{contract}`.
pub fn router(state: AppState, channel: &str, contract: &str) -> Router {
    let contract_routes = Router::new()
        .route("/records", post(create_record))
        .route("/records/:id", get(get_record))
        .route("/records/:id/exists", get(record_exists))
        .route("/records/:id/commitment", get(get_commitment))
        .route("/records/:id/verify", post(verify_record))
        .route("/events", get(events))
        .layer(middleware::from_fn_with_state(state.clone(), identity_middleware));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest(&format!("/api/v1/{channel}/{contract}"), contract_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Resolve the caller's credential to a registered identity; unknown callers never reach a handler.
async fn identity_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response, ApiError> {
    let identity = request
        .headers()
        .get(CREDENTIAL_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|credential| state.identities.resolve(credential))
        .cloned();

    let Some(identity) = identity else {
        tracing::warn!("unauthenticated request");
        return Err(ApiError::Unauthenticated);
    };

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

async fn create_record(
    State(state): State<AppState>,
    Extension(caller): Extension<ClientIdentity>,
    body: Result<Json<CreateRecordRequest>, JsonRejection>,
) -> Result<Json<ConfidentialRecord>, ApiError> {
    let Json(req) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let record = state
        .ledger
        .create_record(&caller, &req.id, &req.reporter, &req.evidence_ref, &req.commitment)
        .await?;
    Ok(Json(record))
}

async fn get_record(
    State(state): State<AppState>,
    Extension(caller): Extension<ClientIdentity>,
    Path(id): Path<String>,
) -> Result<Json<ConfidentialRecord>, ApiError> {
    Ok(Json(state.ledger.get_record(&caller, &id).await?))
}

async fn record_exists(
    State(state): State<AppState>,
    Extension(caller): Extension<ClientIdentity>,
    Path(id): Path<String>,
) -> Result<Json<RecordExistsResponse>, ApiError> {
    let exists = state.ledger.record_exists(&caller, &id).await?;
    Ok(Json(RecordExistsResponse { id, exists }))
}

async fn get_commitment(
    State(state): State<AppState>,
    Extension(caller): Extension<ClientIdentity>,
    Path(id): Path<String>,
) -> Result<Json<CommitmentIndexEntry>, ApiError> {
    Ok(Json(state.ledger.get_commitment(&caller, &id).await?))
}

async fn verify_record(
    State(state): State<AppState>,
    Extension(caller): Extension<ClientIdentity>,
    Path(id): Path<String>,
) -> Result<Json<ConfidentialRecord>, ApiError> {
    Ok(Json(state.ledger.verify_record(&caller, &id).await?))
}

/// Server-sent stream of committed contract events: the event name, the committing
/// transaction id as the SSE id, and the payload as data.
async fn events(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();

    let stream = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(ev) => match Event::default().event(&ev.name).id(ev.tx_id.to_string()).json_data(&ev.payload) {
                    Ok(sse) => return Some((Ok(sse), rx)),
                    Err(e) => tracing::warn!(error = %e, "dropping unserializable event"),
                },
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "event subscriber lagged"),
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
