//! HTTP surface for the relay.
//!
//! Routes:
//! - `GET /courses/{course_id}/ally` reports whether the integration is enabled
//! - `GET /courses/{course_id}/ally/sign` returns signing metadata
//! - `GET /courses/{course_id}/ally/proxy` signs, forwards and relays the response
//!
//! Caller authentication belongs to the host: its middleware inserts a
//! [`Subject`] request extension for authenticated callers. Requests without
//! one are treated as anonymous.

mod error;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Extension, Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

use crate::Result;
use crate::error::{Error, Kind as ErrorKind};
use crate::relay::{EnabledResponse, ProxyContent, Relay, SignParams, SignResponse};
use crate::store::CourseDirectory;
use crate::types::{Course, Subject};

const JSON_CONTENT_TYPE: &str = "application/json";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub courses: Arc<dyn CourseDirectory>,
}

impl AppState {
    #[must_use]
    pub fn new(relay: Arc<Relay>, courses: Arc<dyn CourseDirectory>) -> Self {
        Self { relay, courses }
    }
}

/// Builds the router; mount it under the host's API prefix.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/courses/{course_id}/ally", get(enabled))
        .route("/courses/{course_id}/ally/sign", get(sign))
        .route("/courses/{course_id}/ally/proxy", get(proxy))
        .with_state(state)
}

/// Binds `addr` and serves [`router`] until the listener fails.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::with_source(ErrorKind::Internal, e))?;

    #[cfg(feature = "tracing")]
    tracing::info!(addr = %addr, "ally relay listening");

    axum::serve(listener, router(state))
        .await
        .map_err(|e| Error::with_source(ErrorKind::Internal, e))
}

async fn find_course(state: &AppState, course_id: &str) -> Result<Course> {
    state
        .courses
        .find(course_id)
        .await?
        .ok_or_else(Error::not_found)
}

#[cfg_attr(feature = "tracing", tracing::instrument(name = "ally.enabled", skip(state)))]
async fn enabled(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<Json<EnabledResponse>> {
    let course = find_course(&state, &course_id).await?;
    Ok(Json(state.relay.enabled(&course.account_id).await?))
}

#[cfg_attr(
    feature = "tracing",
    tracing::instrument(name = "ally.sign", skip(state, subject, params))
)]
async fn sign(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    subject: Option<Extension<Subject>>,
    Query(params): Query<SignParams>,
) -> Result<Json<SignResponse>> {
    let course = find_course(&state, &course_id).await?;
    let subject = subject.map(|Extension(subject)| subject);
    let signed = state.relay.sign(subject.as_ref(), &course, &params).await?;
    Ok(Json(signed))
}

#[cfg_attr(
    feature = "tracing",
    tracing::instrument(name = "ally.proxy", skip(state, subject, params))
)]
async fn proxy(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    subject: Option<Extension<Subject>>,
    Query(params): Query<SignParams>,
) -> Result<Response> {
    let course = find_course(&state, &course_id).await?;
    let subject = subject.map(|Extension(subject)| subject);
    let relayed = state.relay.proxy(subject.as_ref(), &course, &params).await?;

    let content_type = match relayed.content {
        ProxyContent::Json => JSON_CONTENT_TYPE,
        ProxyContent::Text => TEXT_CONTENT_TYPE,
    };
    Ok((relayed.status, [(CONTENT_TYPE, content_type)], relayed.body).into_response())
}
