use chrono::{DateTime, Utc};
use herald_types::api::ListPage;
use herald_types::{Connection, ServerKind, Status};
use rusqlite::Row;

use crate::rows::{Clauses, OptionalExt, format_ts, page, status, timestamp};
use crate::{ConnectionFilter, StoreError, validate_id};

const COLUMNS: &str = "id, created_at, updated_at, status, webview_server_api_key, \
    user_delivery_server_api_key, webview_server_id, user_delivery_server_id, \
    user_delivery_server_web_hook_url";

/// The `connections` collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStore;

impl ConnectionStore {
    pub fn create(&self, conn: &rusqlite::Connection, c: &Connection) -> Result<(), StoreError> {
        validate_id(&c.id)?;
        conn.execute(
            &format!(
                "INSERT INTO connections ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                COLUMNS
            ),
            rusqlite::params![
                c.id,
                format_ts(c.created_at),
                format_ts(c.updated_at),
                c.status.as_str(),
                c.webview_server_api_key,
                c.user_delivery_server_api_key,
                c.webview_server_id,
                c.user_delivery_server_id,
                c.user_delivery_server_web_hook_url,
            ],
        )
        .map_err(StoreError::from_insert)?;
        Ok(())
    }

    pub fn exists_by_id(&self, conn: &rusqlite::Connection, id: &str) -> Result<bool, StoreError> {
        validate_id(id)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM connections WHERE id = ?1",
            [id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Whether a connection already pairs these two servers.
    pub fn exists_by_pair(
        &self,
        conn: &rusqlite::Connection,
        user_delivery_id: &str,
        webview_id: &str,
    ) -> Result<bool, StoreError> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM connections
             WHERE user_delivery_server_id = ?1 AND webview_server_id = ?2",
            [user_delivery_id, webview_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn get_by_id(
        &self,
        conn: &rusqlite::Connection,
        id: &str,
    ) -> Result<Option<Connection>, StoreError> {
        validate_id(id)?;
        conn.query_row(
            &format!("SELECT {} FROM connections WHERE id = ?1", COLUMNS),
            [id],
            connection_from_row,
        )
        .optional()
    }

    pub fn list(
        &self,
        conn: &rusqlite::Connection,
        filter: &ConnectionFilter,
    ) -> Result<ListPage<Connection>, StoreError> {
        let mut clauses = Clauses::default();
        if let Some(id) = filter.user_delivery_server_id.as_deref() {
            validate_id(id)?;
            clauses.eq("user_delivery_server_id", id);
        }
        if let Some(id) = filter.webview_server_id.as_deref() {
            validate_id(id)?;
            clauses.eq("webview_server_id", id);
        }
        if let Some(status) = filter.status {
            clauses.eq("status", status.as_str());
        }
        clauses.after(filter.page_token.as_deref())?;
        let limit = clauses.limit(filter.limit);

        let sql = format!(
            "SELECT {} FROM connections {} ORDER BY id ASC LIMIT {}",
            COLUMNS,
            clauses.where_sql(),
            limit
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                rusqlite::params_from_iter(clauses.values.iter()),
                connection_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(page(rows, filter.limit, |c| &c.id))
    }

    /// Every connection referencing the given user-delivery server.
    pub fn list_by_user_delivery_id(
        &self,
        conn: &rusqlite::Connection,
        user_delivery_id: &str,
    ) -> Result<Vec<Connection>, StoreError> {
        self.list_by_server(conn, ServerKind::UserDelivery, user_delivery_id)
    }

    /// Every connection referencing the given webview server.
    pub fn list_by_webview_id(
        &self,
        conn: &rusqlite::Connection,
        webview_id: &str,
    ) -> Result<Vec<Connection>, StoreError> {
        self.list_by_server(conn, ServerKind::Webview, webview_id)
    }

    /// Unpaginated scan used by cascades.
    pub fn list_by_server(
        &self,
        conn: &rusqlite::Connection,
        kind: ServerKind,
        server_id: &str,
    ) -> Result<Vec<Connection>, StoreError> {
        validate_id(server_id)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM connections WHERE {} = ?1 ORDER BY id ASC",
            COLUMNS,
            reference_column(kind)
        ))?;
        let rows = stmt
            .query_map([server_id], connection_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn update_webhook_url(
        &self,
        conn: &rusqlite::Connection,
        id: &str,
        url: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        validate_id(id)?;
        let changed = conn.execute(
            "UPDATE connections SET user_delivery_server_web_hook_url = ?2, updated_at = ?3
             WHERE id = ?1",
            rusqlite::params![id, url, format_ts(now)],
        )?;
        Ok(changed == 1)
    }

    pub fn change_status(
        &self,
        conn: &rusqlite::Connection,
        id: &str,
        status: Status,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        validate_id(id)?;
        let changed = conn.execute(
            "UPDATE connections SET status = ?2, updated_at = ?3 WHERE id = ?1",
            rusqlite::params![id, status.as_str(), format_ts(now)],
        )?;
        Ok(changed == 1)
    }

    pub fn delete(&self, conn: &rusqlite::Connection, id: &str) -> Result<bool, StoreError> {
        validate_id(id)?;
        let changed = conn.execute("DELETE FROM connections WHERE id = ?1", [id])?;
        Ok(changed == 1)
    }
}

fn reference_column(kind: ServerKind) -> &'static str {
    match kind {
        ServerKind::Webview => "webview_server_id",
        ServerKind::UserDelivery => "user_delivery_server_id",
    }
}

fn connection_from_row(row: &Row<'_>) -> rusqlite::Result<Connection> {
    Ok(Connection {
        id: row.get(0)?,
        created_at: timestamp(row, 1)?,
        updated_at: timestamp(row, 2)?,
        status: status(row, 3)?,
        webview_server_api_key: row.get(4)?,
        user_delivery_server_api_key: row.get(5)?,
        webview_server_id: row.get(6)?,
        user_delivery_server_id: row.get(7)?,
        user_delivery_server_web_hook_url: row.get(8)?,
    })
}
