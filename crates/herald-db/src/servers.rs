use chrono::{DateTime, Utc};
use herald_types::api::ListPage;
use herald_types::{Server, ServerKind, Status};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};

use crate::rows::{Clauses, OptionalExt, format_ts, page, status, timestamp};
use crate::{ServerFilter, StoreError, validate_id};

const COLUMNS: &str = "id, created_at, updated_at, name, status";

/// One of the two server collections. Both share a schema, so a single
/// store parameterised by kind serves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerStore {
    kind: ServerKind,
}

impl ServerStore {
    pub const fn new(kind: ServerKind) -> Self {
        Self { kind }
    }

    fn table(&self) -> &'static str {
        table(self.kind)
    }

    pub fn create(&self, conn: &Connection, server: &Server) -> Result<(), StoreError> {
        validate_id(&server.id)?;
        conn.execute(
            &format!(
                "INSERT INTO {} ({}, name_key) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                self.table(),
                COLUMNS
            ),
            rusqlite::params![
                server.id,
                format_ts(server.created_at),
                format_ts(server.updated_at),
                server.name,
                server.status.as_str(),
                name_key(&server.name),
            ],
        )
        .map_err(StoreError::from_insert)?;
        Ok(())
    }

    pub fn exists_by_id(&self, conn: &Connection, id: &str) -> Result<bool, StoreError> {
        validate_id(id)?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE id = ?1", self.table()),
            [id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn exists_by_name(&self, conn: &Connection, name: &str) -> Result<bool, StoreError> {
        Ok(self.find_id_by_name(conn, name)?.is_some())
    }

    pub fn find_id_by_name(
        &self,
        conn: &Connection,
        name: &str,
    ) -> Result<Option<String>, StoreError> {
        conn.query_row(
            &format!("SELECT id FROM {} WHERE name = ?1", self.table()),
            [name],
            |row| row.get(0),
        )
        .optional()
    }

    /// `None` when no record has this id.
    pub fn get_by_id(&self, conn: &Connection, id: &str) -> Result<Option<Server>, StoreError> {
        validate_id(id)?;
        conn.query_row(
            &format!("SELECT {} FROM {} WHERE id = ?1", COLUMNS, self.table()),
            [id],
            server_from_row,
        )
        .optional()
    }

    /// Ascending-id scan starting strictly after `filter.page_token`.
    pub fn list(
        &self,
        conn: &Connection,
        filter: &ServerFilter,
    ) -> Result<ListPage<Server>, StoreError> {
        let mut clauses = Clauses::default();
        if let Some(keyword) = filter.keyword.as_deref().filter(|k| !k.is_empty()) {
            clauses.push(
                "instr(name_key, {}) > 0",
                Value::Text(name_key(keyword)),
            );
        }
        if let Some(status) = filter.status {
            clauses.eq("status", status.as_str());
        }
        clauses.after(filter.page_token.as_deref())?;
        let limit = clauses.limit(filter.limit);

        let sql = format!(
            "SELECT {} FROM {} {} ORDER BY id ASC LIMIT {}",
            COLUMNS,
            self.table(),
            clauses.where_sql(),
            limit
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(clauses.values.iter()), server_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(page(rows, filter.limit, |s| &s.id))
    }

    /// Returns whether a record was updated.
    pub fn update_name(
        &self,
        conn: &Connection,
        id: &str,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        validate_id(id)?;
        let changed = conn
            .execute(
                &format!(
                    "UPDATE {} SET name = ?2, name_key = ?3, updated_at = ?4 WHERE id = ?1",
                    self.table()
                ),
                rusqlite::params![id, name, name_key(name), format_ts(now)],
            )
            .map_err(StoreError::from_insert)?;
        Ok(changed == 1)
    }

    pub fn update_status(
        &self,
        conn: &Connection,
        id: &str,
        status: Status,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        validate_id(id)?;
        let changed = conn.execute(
            &format!(
                "UPDATE {} SET status = ?2, updated_at = ?3 WHERE id = ?1",
                self.table()
            ),
            rusqlite::params![id, status.as_str(), format_ts(now)],
        )?;
        Ok(changed == 1)
    }

    pub fn delete(&self, conn: &Connection, id: &str) -> Result<bool, StoreError> {
        validate_id(id)?;
        let changed = conn.execute(&format!("DELETE FROM {} WHERE id = ?1", self.table()), [id])?;
        Ok(changed == 1)
    }
}

/// Case-folded copy of a name, kept beside it for keyword search. SQLite's
/// `lower()` only folds ASCII.
fn name_key(name: &str) -> String {
    name.to_lowercase()
}

pub(crate) fn table(kind: ServerKind) -> &'static str {
    match kind {
        ServerKind::Webview => "webview_servers",
        ServerKind::UserDelivery => "user_deliveries",
    }
}

fn server_from_row(row: &Row<'_>) -> rusqlite::Result<Server> {
    Ok(Server {
        id: row.get(0)?,
        created_at: timestamp(row, 1)?,
        updated_at: timestamp(row, 2)?,
        name: row.get(3)?,
        status: status(row, 4)?,
    })
}
