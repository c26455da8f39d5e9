//! Data API handlers under `/io/{dbid}/{*path}`.
//!
//! | Method | Operation | Response |
//! |--------|-----------|----------|
//! | `GET` | read (`shallow=1` collapses children) | the subtree, `{}` when absent |
//! | `PUT` | replace | the written JSON |
//! | `PATCH` | merge | the written JSON |
//! | `POST` | push under a generated id | `{"name": id}` |
//! | `DELETE` | remove the subtree | `{}` |
//!
//! Writes with `print=silent` answer 204 with an empty body.

use crate::auth::AuthToken;
use crate::error::ServerResult;
use crate::state::{run_blocking, AppState};
use arbordb_core::{DatabaseAction, WriteMode};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Query parameters of the data API. Token parameters are read by
/// [`AuthToken`].
#[derive(Debug, Default, Deserialize)]
pub struct IoParams {
    /// `silent` suppresses the response body of writes.
    pub print: Option<String>,
    /// `1` or `true` requests a shallow read.
    pub shallow: Option<String>,
}

impl IoParams {
    fn is_silent(&self) -> bool {
        self.print.as_deref() == Some("silent")
    }

    fn is_shallow(&self) -> bool {
        matches!(self.shallow.as_deref(), Some("1" | "true"))
    }

    fn respond(&self, body: Value) -> Response {
        if self.is_silent() {
            StatusCode::NO_CONTENT.into_response()
        } else {
            Json(body).into_response()
        }
    }
}

/// Reads the subtree at the path.
pub async fn get(
    State(app): State<AppState>,
    Path((dbid, path)): Path<(String, String)>,
    token: AuthToken,
    Query(params): Query<IoParams>,
) -> ServerResult<Response> {
    let request = app
        .processor
        .process(&dbid, &path, DatabaseAction::Retrieve, token.into_inner());
    request.ensure_permitted()?;

    let service = Arc::clone(&app.service);
    let shallow = params.is_shallow();
    let value = run_blocking(move || service.get_data(&request, shallow)).await?;
    Ok(Json(value.unwrap_or_else(|| json!({}))).into_response())
}

/// Replaces the subtree at the path.
pub async fn put(
    State(app): State<AppState>,
    Path((dbid, path)): Path<(String, String)>,
    token: AuthToken,
    Query(params): Query<IoParams>,
    body: Bytes,
) -> ServerResult<Response> {
    write(app, &dbid, &path, token, &params, &body, WriteMode::Put).await
}

/// Merges the body's fields into the subtree at the path.
pub async fn patch(
    State(app): State<AppState>,
    Path((dbid, path)): Path<(String, String)>,
    token: AuthToken,
    Query(params): Query<IoParams>,
    body: Bytes,
) -> ServerResult<Response> {
    write(app, &dbid, &path, token, &params, &body, WriteMode::Update).await
}

/// Appends the body under a fresh push id.
pub async fn post(
    State(app): State<AppState>,
    Path((dbid, path)): Path<(String, String)>,
    token: AuthToken,
    Query(params): Query<IoParams>,
    body: Bytes,
) -> ServerResult<Response> {
    write(app, &dbid, &path, token, &params, &body, WriteMode::Push).await
}

/// Removes the subtree at the path.
pub async fn delete(
    State(app): State<AppState>,
    Path((dbid, path)): Path<(String, String)>,
    token: AuthToken,
    Query(params): Query<IoParams>,
) -> ServerResult<Response> {
    let request = app
        .processor
        .process(&dbid, &path, DatabaseAction::Delete, token.into_inner());
    request.ensure_permitted()?;

    let service = Arc::clone(&app.service);
    run_blocking(move || service.delete_data(&request)).await?;
    Ok(params.respond(json!({})))
}

async fn write(
    app: AppState,
    dbid: &str,
    path: &str,
    token: AuthToken,
    params: &IoParams,
    body: &[u8],
    mode: WriteMode,
) -> ServerResult<Response> {
    let request = app
        .processor
        .process(dbid, path, mode.action(), token.into_inner());
    // The body is only looked at once the caller is known to be allowed.
    request.ensure_permitted()?;
    let payload: Value = serde_json::from_slice(body)?;

    let service = Arc::clone(&app.service);
    let written = run_blocking(move || service.place_data(&request, payload, mode)).await?;
    Ok(params.respond(written))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(print: Option<&str>, shallow: Option<&str>) -> IoParams {
        IoParams {
            print: print.map(str::to_string),
            shallow: shallow.map(str::to_string),
        }
    }

    #[test]
    fn silent_print() {
        assert!(params(Some("silent"), None).is_silent());
        assert!(!params(Some("pretty"), None).is_silent());
        assert!(!params(None, None).is_silent());
    }

    #[test]
    fn shallow_flag() {
        assert!(params(None, Some("1")).is_shallow());
        assert!(params(None, Some("true")).is_shallow());
        assert!(!params(None, Some("0")).is_shallow());
        assert!(!params(None, None).is_shallow());
    }

    #[test]
    fn silent_response_has_no_content() {
        let response = params(Some("silent"), None).respond(json!({"a": 1}));
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = params(None, None).respond(json!({"a": 1}));
        assert_eq!(response.status(), StatusCode::OK);
    }
}
