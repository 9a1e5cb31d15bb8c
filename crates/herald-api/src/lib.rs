pub mod cache;
pub mod connections;
pub mod coordinator;
pub mod error;
pub mod middleware;
pub mod servers;
pub mod validate;

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    http::{StatusCode, header},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
};
use herald_types::ServerKind;
use herald_types::api::{Envelope, ListPage};
use serde::Serialize;
use tracing::{debug, error};

use crate::cache::ResponseCache;
use crate::coordinator::Coordinator;
use crate::error::{ApiError, ServiceError};
use crate::middleware::require_auth;

pub struct AppStateInner {
    pub coordinator: Coordinator,
    /// `None` when caching is disabled.
    pub cache: Option<Arc<ResponseCache>>,
    pub jwt_secret: String,
}

pub type AppState = Arc<AppStateInner>;

/// Run a coordinator call off the async runtime.
pub(crate) async fn run<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Coordinator) -> Result<T, ServiceError> + Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.coordinator))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.to_string())
        })?
        .map_err(ApiError::from)
}

pub(crate) fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(Envelope::success(200, data))).into_response()
}

pub(crate) fn created<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(Envelope::success(201, data))).into_response()
}

fn raw_json(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}

/// Serve a list from the cache when a fresh entry exists under `key`,
/// otherwise run the query and remember the serialized envelope.
pub(crate) async fn cached_list<T, F>(
    state: &AppState,
    key: String,
    f: F,
) -> Result<Response, ApiError>
where
    T: Serialize + Send + 'static,
    F: FnOnce(&Coordinator) -> Result<ListPage<T>, ServiceError> + Send + 'static,
{
    if let Some(body) = state.cache.as_ref().and_then(|c| c.get(&key)) {
        debug!("Cache hit: {}", key);
        return Ok(raw_json(body));
    }

    let page = run(state, f).await?;
    let body = serde_json::to_string(&Envelope::success(200, page))
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if let Some(cache) = &state.cache {
        cache.set(key, body.clone());
    }
    Ok(raw_json(body))
}

async fn health() -> Response {
    ok(serde_json::json!({ "status": "ok" }))
}

fn server_routes(kind: ServerKind, list: &str, item: &str) -> Router<AppState> {
    Router::new()
        .route(list, get(servers::list_servers))
        .route(item, post(servers::create_server))
        .route(
            &format!("{}/{{id}}", item),
            get(servers::get_server)
                .put(servers::update_server)
                .delete(servers::delete_server),
        )
        .route(
            &format!("{}/{{id}}/status", item),
            patch(servers::change_status),
        )
        .layer(Extension(kind))
}

/// All API routes. Everything except `/health` requires a bearer token.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(health));

    let protected_routes = Router::new()
        .merge(server_routes(ServerKind::Webview, "/webview-servers", "/webview-server"))
        .merge(server_routes(ServerKind::UserDelivery, "/user-deliveries", "/user-delivery"))
        .route("/connections", get(connections::list_connections))
        .route("/connection", post(connections::create_connection))
        .route(
            "/connection/{id}",
            get(connections::get_connection).delete(connections::delete_connection),
        )
        .route(
            "/connection/{id}/webhook-url",
            put(connections::update_webhook_url),
        )
        .route("/connection/{id}/status", patch(connections::change_status))
        .layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use herald_db::{DEFAULT_TIMEOUT, Database};
    use herald_types::api::Claims;
    use http_body_util::BodyExt;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::{Value, json};
    use std::time::Duration;
    use tower::ServiceExt;

    const SECRET: &str = "router-test-secret";

    fn state(cache_ttl: Option<Duration>) -> AppState {
        let db = Arc::new(Database::open_in_memory(DEFAULT_TIMEOUT).unwrap());
        Arc::new(AppStateInner {
            coordinator: Coordinator::new(db),
            cache: cache_ttl.map(|ttl| Arc::new(ResponseCache::new(ttl))),
            jwt_secret: SECRET.to_string(),
        })
    }

    fn token(secret: &str, exp_offset: i64) -> String {
        let claims = Claims {
            user_id: "tester".into(),
            exp: (chrono::Utc::now().timestamp() + exp_offset) as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token(SECRET, 3600)));
        let body = match body {
            Some(v) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn create(app: &Router, item: &str, name: &str) -> String {
        let (status, body) = call(app, Method::POST, item, Some(json!({ "name": name }))).await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["data"]["_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = router(state(None));
        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_routes_need_a_valid_token() {
        let app = router(state(None));

        let resp = app
            .clone()
            .oneshot(Request::get("/webview-servers").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        for bad in [token("other-secret", 3600), token(SECRET, -3600)] {
            let resp = app
                .clone()
                .oneshot(
                    Request::get("/connections")
                        .header(header::AUTHORIZATION, format!("Bearer {}", bad))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn server_crud_and_validation() {
        let app = router(state(None));
        let id = create(&app, "/webview-server", "edge-1").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/webview-server",
            Some(json!({ "name": "edge-1" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["kind"], "DUPLICATE_NAME");
        assert_eq!(body["data"], Value::Null);

        let (status, _) = call(
            &app,
            Method::POST,
            "/webview-server",
            Some(json!({ "name": " " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let long = "n".repeat(101);
        let (status, _) = call(
            &app,
            Method::POST,
            "/webview-server",
            Some(json!({ "name": long })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(
            &app,
            Method::POST,
            "/webview-server",
            Some(json!({ "name": "x", "extra": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(
            &app,
            Method::GET,
            &format!("/webview-server/{}", id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "inactive");
        assert_eq!(body["code"], 200);

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/webview-server/{}", id),
            Some(json!({ "name": "edge-renamed" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "edge-renamed");

        let uri = format!("/webview-server/{}/status", id);
        let (status, _) = call(
            &app,
            Method::PATCH,
            &uri,
            Some(json!({ "status": "paused" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) = call(
            &app,
            Method::PATCH,
            &uri,
            Some(json!({ "status": "inactive" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "NO_OP");

        let (status, _) = call(&app, Method::GET, "/webview-server/not-an-id", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let missing = herald_db::new_id();
        let (status, body) = call(
            &app,
            Method::GET,
            &format!("/user-delivery/{}", missing),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["kind"], "NOT_FOUND");

        let (status, body) = call(
            &app,
            Method::DELETE,
            &format!("/webview-server/{}", id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["connectionsDeleted"], 0);
    }

    #[tokio::test]
    async fn cascade_over_http() {
        let app = router(state(None));
        let wv = create(&app, "/webview-server", "wv").await;
        let ud = create(&app, "/user-delivery", "ud").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/connection",
            Some(json!({
                "userDeliveryServerId": ud,
                "webviewServerId": wv,
                "userDeliveryServerWebHookUrl": "https://hooks.example/ud",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["status"], "inactive");
        let conn = body["data"]["_id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            Method::POST,
            "/connection",
            Some(json!({
                "userDeliveryServerId": ud,
                "webviewServerId": wv,
                "userDeliveryServerWebHookUrl": "https://hooks.example/other",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["kind"], "ALREADY_EXISTS");

        let (status, body) = call(
            &app,
            Method::PATCH,
            &format!("/connection/{}/status", conn),
            Some(json!({ "status": "active" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["kind"], "PEER_INACTIVE");

        let (_, body) = call(
            &app,
            Method::PATCH,
            &format!("/webview-server/{}/status", wv),
            Some(json!({ "status": "active" })),
        )
        .await;
        assert_eq!(body["data"]["connectionsUpdated"], 0);
        let (_, body) = call(
            &app,
            Method::PATCH,
            &format!("/user-delivery/{}/status", ud),
            Some(json!({ "status": "active" })),
        )
        .await;
        assert_eq!(body["data"]["connectionsUpdated"], 1);

        let (_, body) = call(&app, Method::GET, &format!("/connection/{}", conn), None).await;
        assert_eq!(body["data"]["status"], "active");
        assert_eq!(body["data"]["webviewServerApiKey"].as_str().unwrap().len(), 32);

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/connection/{}/webhook-url", conn),
            Some(json!({ "userDeliveryServerWebHookUrl": "https://hooks.example/new" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["userDeliveryServerWebHookUrl"], "https://hooks.example/new");

        let (status, body) = call(
            &app,
            Method::DELETE,
            &format!("/user-delivery/{}", ud),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["connectionsDeleted"], 1);

        let (status, _) = call(&app, Method::GET, &format!("/connection/{}", conn), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, body) = call(
            &app,
            Method::GET,
            &format!("/connections?userDeliveryServerId={}", ud),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["kind"], "REFERENCE_NOT_FOUND");
    }

    #[tokio::test]
    async fn list_pagination() {
        let app = router(state(None));
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(create(&app, "/user-delivery", &format!("ud-{}", i)).await);
        }

        let (status, body) = call(&app, Method::GET, "/user-deliveries?limit=2", None).await;
        assert_eq!(status, StatusCode::OK);
        let list = body["data"]["list"].as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(body["data"]["nextPageToken"], ids[1].as_str());

        let uri = format!("/user-deliveries?limit=2&pageToken={}", ids[1]);
        let (_, body) = call(&app, Method::GET, &uri, None).await;
        assert_eq!(body["data"]["list"][0]["_id"], ids[2].as_str());
        assert_eq!(body["data"]["nextPageToken"], ids[3].as_str());

        let uri = format!("/user-deliveries?limit=2&pageToken={}", ids[3]);
        let (_, body) = call(&app, Method::GET, &uri, None).await;
        assert_eq!(body["data"]["list"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"]["nextPageToken"], "");

        let (_, body) = call(&app, Method::GET, "/user-deliveries?keyword=UD-3", None).await;
        assert_eq!(body["data"]["list"].as_array().unwrap().len(), 1);

        let (status, _) = call(&app, Method::GET, "/user-deliveries?limit=0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&app, Method::GET, "/user-deliveries?pageToken=garbage", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_responses_are_memoised() {
        let app = router(state(Some(Duration::from_secs(60))));
        create(&app, "/webview-server", "first").await;

        let (_, before) = call(&app, Method::GET, "/webview-servers", None).await;
        assert_eq!(before["data"]["list"].as_array().unwrap().len(), 1);

        create(&app, "/webview-server", "second").await;

        // Same query within the TTL: stale by design.
        let (_, cached) = call(&app, Method::GET, "/webview-servers", None).await;
        assert_eq!(cached, before);

        // A different query key misses the cache.
        let (_, fresh) = call(&app, Method::GET, "/webview-servers?limit=50", None).await;
        assert_eq!(fresh["data"]["list"].as_array().unwrap().len(), 2);
    }
}
