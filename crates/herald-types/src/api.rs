use serde::{Deserialize, Serialize};

use crate::models::Status;

// -- JWT Claims --

/// Claims carried by the bearer token on every protected request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub exp: usize,
}

// -- Envelope --

/// Result envelope returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub message: String,
    pub code: u16,
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> Envelope<T> {
    pub fn success(code: u16, data: T) -> Self {
        Self {
            message: "success".to_string(),
            code,
            data: Some(data),
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub detail: String,
}

/// One page of a list query. `next_page_token` is the id of the last
/// entry when the page came back full, and empty otherwise. A full final
/// page still carries a token, so clients stop on the first short page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPage<T> {
    pub list: Vec<T>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: String,
}

/// Outcome of a status change, with the number of dependent connections
/// the cascade rewrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    #[serde(rename = "_id")]
    pub id: String,
    pub status: Status,
    pub connections_updated: usize,
}

/// Outcome of a delete, with the number of dependent connections removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deletion {
    #[serde(rename = "_id")]
    pub id: String,
    pub connections_deleted: usize,
}

// -- Servers --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateServerRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateServerRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeStatusRequest {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListServersQuery {
    pub keyword: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub page_token: Option<String>,
}

// -- Connections --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateConnectionRequest {
    pub user_delivery_server_id: String,
    pub webview_server_id: String,
    pub user_delivery_server_web_hook_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateWebhookRequest {
    pub user_delivery_server_web_hook_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListConnectionsQuery {
    pub user_delivery_server_id: Option<String>,
    pub webview_server_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub page_token: Option<String>,
}
