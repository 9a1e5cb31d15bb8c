use herald_types::Status;

/// Filters for a server list scan.
#[derive(Debug, Clone, Default)]
pub struct ServerFilter {
    /// Case-insensitive literal substring of `name`.
    pub keyword: Option<String>,
    pub status: Option<Status>,
    pub limit: u32,
    /// Exclusive lower bound on `id`.
    pub page_token: Option<String>,
}

/// Filters for a connection list scan.
#[derive(Debug, Clone, Default)]
pub struct ConnectionFilter {
    pub user_delivery_server_id: Option<String>,
    pub webview_server_id: Option<String>,
    pub status: Option<Status>,
    pub limit: u32,
    pub page_token: Option<String>,
}
