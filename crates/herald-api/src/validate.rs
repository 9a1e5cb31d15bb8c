use herald_db::{ConnectionFilter, ServerFilter};
use herald_types::Status;
use herald_types::api::{ListConnectionsQuery, ListServersQuery};

use crate::error::ApiError;

pub const MAX_NAME_LEN: usize = 100;
pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;

/// Trimmed id, rejected when empty. Shape is checked by the store.
pub fn id<'a>(field: &str, raw: &'a str) -> Result<&'a str, ApiError> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(ApiError::invalid(format!("{} is required", field)));
    }
    Ok(id)
}

pub fn name(raw: &str) -> Result<&str, ApiError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ApiError::invalid("name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::invalid(format!(
            "name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name)
}

pub fn status(raw: &str) -> Result<Status, ApiError> {
    raw.trim()
        .parse()
        .map_err(|e: herald_types::models::UnknownStatus| ApiError::invalid(e.to_string()))
}

pub fn webhook_url(raw: &str) -> Result<&str, ApiError> {
    let url = raw.trim();
    if url.is_empty() {
        return Err(ApiError::invalid("userDeliveryServerWebHookUrl is required"));
    }
    Ok(url)
}

pub fn limit(raw: Option<u32>) -> Result<u32, ApiError> {
    match raw {
        None => Ok(DEFAULT_LIMIT),
        Some(0) => Err(ApiError::invalid("limit must be at least 1")),
        Some(n) => Ok(n.min(MAX_LIMIT)),
    }
}

fn optional(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn optional_status(raw: Option<&str>) -> Result<Option<Status>, ApiError> {
    optional(raw).map(|s| status(&s)).transpose()
}

pub fn server_filter(q: &ListServersQuery) -> Result<ServerFilter, ApiError> {
    Ok(ServerFilter {
        keyword: optional(q.keyword.as_deref()),
        status: optional_status(q.status.as_deref())?,
        limit: limit(q.limit)?,
        page_token: optional(q.page_token.as_deref()),
    })
}

pub fn connection_filter(q: &ListConnectionsQuery) -> Result<ConnectionFilter, ApiError> {
    Ok(ConnectionFilter {
        user_delivery_server_id: optional(q.user_delivery_server_id.as_deref()),
        webview_server_id: optional(q.webview_server_id.as_deref()),
        status: optional_status(q.status.as_deref())?,
        limit: limit(q.limit)?,
        page_token: optional(q.page_token.as_deref()),
    })
}
