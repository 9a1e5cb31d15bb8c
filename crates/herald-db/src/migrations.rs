use rusqlite::Connection;
use tracing::info;

use crate::StoreError;

pub fn run(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE webview_servers (
                id          TEXT PRIMARY KEY,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                name        TEXT NOT NULL UNIQUE,
                name_key    TEXT NOT NULL,
                status      TEXT NOT NULL CHECK (status IN ('active', 'inactive'))
            );

            CREATE TABLE user_deliveries (
                id          TEXT PRIMARY KEY,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                name        TEXT NOT NULL UNIQUE,
                name_key    TEXT NOT NULL,
                status      TEXT NOT NULL CHECK (status IN ('active', 'inactive'))
            );

            -- No ON DELETE CASCADE: dependents are removed explicitly, and the
            -- foreign keys refuse any delete that would orphan a connection.
            CREATE TABLE connections (
                id                                  TEXT PRIMARY KEY,
                created_at                          TEXT NOT NULL,
                updated_at                          TEXT NOT NULL,
                status                              TEXT NOT NULL
                    CHECK (status IN ('active', 'inactive')),
                webview_server_api_key              TEXT NOT NULL,
                user_delivery_server_api_key        TEXT NOT NULL,
                webview_server_id                   TEXT NOT NULL REFERENCES webview_servers(id),
                user_delivery_server_id             TEXT NOT NULL REFERENCES user_deliveries(id),
                user_delivery_server_web_hook_url   TEXT NOT NULL,
                UNIQUE (user_delivery_server_id, webview_server_id)
            );

            CREATE INDEX idx_connections_webview
                ON connections(webview_server_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
