use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::services::Database;

#[derive(Clone)]
pub struct AdminState {
    pub db: Arc<Database>,
    pub admin_token: String,
}

#[derive(Deserialize)]
pub struct AuthQuery {
    #[serde(default)]
    token: String,
}

#[derive(Deserialize)]
pub struct UpsertRequest {
    #[serde(rename = "clientId", default)]
    client_id: Option<Value>,
    #[serde(default)]
    config: Option<Value>,
}

#[derive(Deserialize)]
pub struct UpdateRequest {
    #[serde(default)]
    config: Option<Value>,
}

/// Create admin router with the client config routes
pub fn create_admin_router(db: Arc<Database>, admin_token: String) -> Router {
    let state = AdminState { db, admin_token };

    Router::new()
        .route("/api/client-configs", get(list_configs).post(upsert_config))
        .route(
            "/api/client-configs/:client_id",
            get(get_config).put(update_config).delete(delete_config),
        )
        .with_state(state)
}

/// Verify admin token
fn verify_token(query: &AuthQuery, admin_token: &str) -> Result<(), Response> {
    if query.token == admin_token {
        Ok(())
    } else {
        Err(error_response(StatusCode::UNAUTHORIZED, "Unauthorized"))
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn database_error(e: anyhow::Error) -> Response {
    log::error!("❌ Client config query failed: {}", e);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
}

/// Malformed bodies get the same `{error}` shape as every other failure.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    body.map(|Json(value)| value)
        .map_err(|rejection| error_response(rejection.status(), &rejection.body_text()))
}

fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn list_configs(
    Query(query): Query<AuthQuery>,
    State(state): State<AdminState>,
) -> Result<Response, Response> {
    verify_token(&query, &state.admin_token)?;

    let items = state.db.list_client_configs().await.map_err(database_error)?;
    Ok(Json(json!({ "items": items })).into_response())
}

async fn upsert_config(
    Query(query): Query<AuthQuery>,
    State(state): State<AdminState>,
    body: Result<Json<UpsertRequest>, JsonRejection>,
) -> Result<Response, Response> {
    verify_token(&query, &state.admin_token)?;
    let request = json_body(body)?;

    let client_id = match request.client_id {
        Some(Value::String(id)) if !id.is_empty() => id,
        _ => return Err(error_response(StatusCode::BAD_REQUEST, "clientId is required")),
    };
    let config = request.config.unwrap_or_else(|| json!({}));

    let saved = state
        .db
        .upsert_client_config(&client_id, &config)
        .await
        .map_err(database_error)?;

    log::info!("🗂️ Client config saved: {}", client_id);
    Ok((StatusCode::CREATED, Json(saved)).into_response())
}

async fn get_config(
    Path(client_id): Path<String>,
    Query(query): Query<AuthQuery>,
    State(state): State<AdminState>,
) -> Result<Response, Response> {
    verify_token(&query, &state.admin_token)?;

    match state.db.get_client_config(&client_id).await.map_err(database_error)? {
        Some(config) => Ok(Json(config).into_response()),
        None => Err(not_found()),
    }
}

async fn update_config(
    Path(client_id): Path<String>,
    Query(query): Query<AuthQuery>,
    State(state): State<AdminState>,
    body: Result<Json<UpdateRequest>, JsonRejection>,
) -> Result<Response, Response> {
    verify_token(&query, &state.admin_token)?;
    let request = json_body(body)?;

    let config = request.config.unwrap_or_else(|| json!({}));
    match state
        .db
        .update_client_config(&client_id, &config)
        .await
        .map_err(database_error)?
    {
        Some(updated) => Ok(Json(updated).into_response()),
        None => Err(not_found()),
    }
}

async fn delete_config(
    Path(client_id): Path<String>,
    Query(query): Query<AuthQuery>,
    State(state): State<AdminState>,
) -> Result<Response, Response> {
    verify_token(&query, &state.admin_token)?;

    if state.db.delete_client_config(&client_id).await.map_err(database_error)? {
        Ok(Json(json!({ "success": true })).into_response())
    } else {
        Err(not_found())
    }
}
