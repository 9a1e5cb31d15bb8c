use rusqlite::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("malformed id '{0}'")]
    InvalidId(String),

    #[error("store call timed out")]
    Timeout,

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Sqlite(rusqlite::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, _) = &err {
            match failure.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => return Self::Timeout,
                ErrorCode::CannotOpen | ErrorCode::NotADatabase => {
                    return Self::Unavailable(err.to_string());
                }
                _ => {}
            }
        }
        Self::Sqlite(err)
    }
}

impl StoreError {
    /// Classify an insert failure: primary key or unique violations become
    /// `DuplicateKey`, everything else goes through the normal mapping.
    pub(crate) fn from_insert(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, msg) = &err {
            let ext = failure.extended_code;
            if ext == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || ext == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            {
                return Self::DuplicateKey(msg.clone().unwrap_or_else(|| err.to_string()));
            }
        }
        err.into()
    }
}
