use chrono::{DateTime, SecondsFormat, Utc};
use herald_types::Status;
use herald_types::api::ListPage;
use rusqlite::Row;
use rusqlite::types::{Type, Value};

use crate::{StoreError, validate_id};

pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn status(row: &Row<'_>, idx: usize) -> rusqlite::Result<Status> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Accumulates `WHERE` clauses with positional parameters.
#[derive(Default)]
pub(crate) struct Clauses {
    parts: Vec<String>,
    pub(crate) values: Vec<Value>,
}

impl Clauses {
    /// `template` uses `{}` where the parameter placeholder goes.
    pub(crate) fn push(&mut self, template: &str, value: Value) {
        self.values.push(value);
        let placeholder = format!("?{}", self.values.len());
        self.parts.push(template.replace("{}", &placeholder));
    }

    pub(crate) fn eq(&mut self, column: &str, value: &str) {
        self.push(&format!("{} = {{}}", column), Value::Text(value.to_string()));
    }

    /// Exclusive cursor: only rows with an id strictly greater than the token.
    pub(crate) fn after(&mut self, page_token: Option<&str>) -> Result<(), StoreError> {
        if let Some(token) = page_token.filter(|t| !t.is_empty()) {
            validate_id(token)?;
            self.push("id > {}", Value::Text(token.to_string()));
        }
        Ok(())
    }

    pub(crate) fn where_sql(&self) -> String {
        if self.parts.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.parts.join(" AND "))
        }
    }

    /// Appends the limit parameter and returns its placeholder.
    pub(crate) fn limit(&mut self, limit: u32) -> String {
        self.values.push(Value::Integer(i64::from(limit)));
        format!("?{}", self.values.len())
    }
}

/// A page that came back full carries the last id as the next cursor, even
/// when nothing follows it; a short page ends the scan with an empty token.
pub(crate) fn page<T>(list: Vec<T>, limit: u32, id: impl Fn(&T) -> &str) -> ListPage<T> {
    let next_page_token = match list.last() {
        Some(last) if limit > 0 && list.len() == limit as usize => id(last).to_string(),
        _ => String::new(),
    };
    ListPage {
        list,
        next_page_token,
    }
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, StoreError>;
}

impl<T> OptionalExt<T> for rusqlite::Result<T> {
    fn optional(self) -> Result<Option<T>, StoreError> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
