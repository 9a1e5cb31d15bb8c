use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    response::Response,
};
use herald_db::ConnectionFilter;
use herald_types::api::{
    ChangeStatusRequest, Claims, CreateConnectionRequest, ListConnectionsQuery,
    UpdateWebhookRequest,
};
use tracing::debug;

use crate::error::ApiError;
use crate::{AppState, cached_list, created, ok, run, validate};

fn list_key(q: &ConnectionFilter) -> String {
    format!(
        "connections:{}:{}:{}:{}:{}",
        q.user_delivery_server_id.as_deref().unwrap_or_default(),
        q.webview_server_id.as_deref().unwrap_or_default(),
        q.status.map(|s| s.as_str()).unwrap_or_default(),
        q.limit,
        q.page_token.as_deref().unwrap_or_default()
    )
}

pub async fn list_connections(
    State(state): State<AppState>,
    query: Result<Query<ListConnectionsQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let filter = validate::connection_filter(&query)?;
    let key = list_key(&filter);

    cached_list(&state, key, move |c| c.list_connections(&filter)).await
}

pub async fn create_connection(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    body: Result<Json<CreateConnectionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = body?;
    let ud = validate::id("userDeliveryServerId", &req.user_delivery_server_id)?.to_string();
    let wv = validate::id("webviewServerId", &req.webview_server_id)?.to_string();
    let hook = validate::webhook_url(&req.user_delivery_server_web_hook_url)?.to_string();
    debug!("{} connecting {} <-> {}", claims.user_id, ud, wv);

    let connection = run(&state, move |c| c.create_connection(&ud, &wv, &hook)).await?;
    Ok(created(connection))
}

pub async fn get_connection(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(raw) = path?;
    let id = validate::id("id", &raw)?.to_string();

    let connection = run(&state, move |c| c.get_connection(&id)).await?;
    Ok(ok(connection))
}

pub async fn update_webhook_url(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<UpdateWebhookRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Path(raw) = path?;
    let Json(req) = body?;
    let id = validate::id("id", &raw)?.to_string();
    let url = validate::webhook_url(&req.user_delivery_server_web_hook_url)?.to_string();

    let connection = run(&state, move |c| c.update_webhook_url(&id, &url)).await?;
    Ok(ok(connection))
}

pub async fn change_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<ChangeStatusRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Path(raw) = path?;
    let Json(req) = body?;
    let id = validate::id("id", &raw)?.to_string();
    let status = validate::status(&req.status)?;
    debug!("{} setting connection {} to {}", claims.user_id, id, status);

    let connection = run(&state, move |c| c.change_connection_status(&id, status)).await?;
    Ok(ok(connection))
}

pub async fn delete_connection(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(raw) = path?;
    let id = validate::id("id", &raw)?.to_string();

    let deletion = run(&state, move |c| c.delete_connection(&id)).await?;
    Ok(ok(deletion))
}
