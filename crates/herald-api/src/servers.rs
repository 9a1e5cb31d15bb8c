//! Handlers shared by the webview server and user delivery server routes.
//! The collection is picked by the `ServerKind` extension on each router.

use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    response::Response,
};
use herald_types::ServerKind;
use herald_types::api::{
    ChangeStatusRequest, Claims, CreateServerRequest, ListServersQuery, UpdateServerRequest,
};
use tracing::debug;

use crate::error::ApiError;
use crate::{AppState, cached_list, created, ok, run, validate};

fn list_key(kind: ServerKind, q: &herald_db::ServerFilter) -> String {
    let prefix = match kind {
        ServerKind::Webview => "webview_list",
        ServerKind::UserDelivery => "user_delivery_list",
    };
    format!(
        "{}:{}:{}:{}:{}",
        prefix,
        q.keyword.as_deref().unwrap_or_default(),
        q.status.map(|s| s.as_str()).unwrap_or_default(),
        q.limit,
        q.page_token.as_deref().unwrap_or_default()
    )
}

pub async fn list_servers(
    State(state): State<AppState>,
    Extension(kind): Extension<ServerKind>,
    query: Result<Query<ListServersQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let filter = validate::server_filter(&query)?;
    let key = list_key(kind, &filter);

    cached_list(&state, key, move |c| c.list_servers(kind, &filter)).await
}

pub async fn create_server(
    State(state): State<AppState>,
    Extension(kind): Extension<ServerKind>,
    Extension(claims): Extension<Claims>,
    body: Result<Json<CreateServerRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = body?;
    let name = validate::name(&req.name)?.to_string();
    debug!("{} creating {} '{}'", claims.user_id, kind, name);

    let server = run(&state, move |c| c.create_server(kind, &name)).await?;
    Ok(created(server))
}

pub async fn get_server(
    State(state): State<AppState>,
    Extension(kind): Extension<ServerKind>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(raw) = path?;
    let id = validate::id("id", &raw)?.to_string();

    let server = run(&state, move |c| c.get_server(kind, &id)).await?;
    Ok(ok(server))
}

pub async fn update_server(
    State(state): State<AppState>,
    Extension(kind): Extension<ServerKind>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<UpdateServerRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Path(raw) = path?;
    let Json(req) = body?;
    let id = validate::id("id", &raw)?.to_string();
    let name = validate::name(&req.name)?.to_string();

    let server = run(&state, move |c| c.update_server_name(kind, &id, &name)).await?;
    Ok(ok(server))
}

pub async fn change_status(
    State(state): State<AppState>,
    Extension(kind): Extension<ServerKind>,
    Extension(claims): Extension<Claims>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<ChangeStatusRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Path(raw) = path?;
    let Json(req) = body?;
    let id = validate::id("id", &raw)?.to_string();
    let status = validate::status(&req.status)?;
    debug!("{} setting {} {} to {}", claims.user_id, kind, id, status);

    let change = run(&state, move |c| c.change_server_status(kind, &id, status)).await?;
    Ok(ok(change))
}

pub async fn delete_server(
    State(state): State<AppState>,
    Extension(kind): Extension<ServerKind>,
    Extension(claims): Extension<Claims>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(raw) = path?;
    let id = validate::id("id", &raw)?.to_string();
    debug!("{} deleting {} {}", claims.user_id, kind, id);

    let deletion = run(&state, move |c| c.delete_server(kind, &id)).await?;
    Ok(ok(deletion))
}

