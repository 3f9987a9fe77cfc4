use thiserror::Error;

#[derive(Error, Debug)]
pub enum CuratelaError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Validation(String),

    /// A delete was blocked by a row that still references the record.
    #[error("Cannot delete {0}: it is in use by existing transactions")]
    InUse(String),

    #[error("Nothing to import: no rows are marked as new")]
    NoNewRows,

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Remote service error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("{0}")]
    Other(String),
}

impl CuratelaError {
    /// Network hiccups and overloaded upstreams are worth another attempt;
    /// everything else fails the same way twice.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Remote { status, .. } => *status == 429 || *status >= 500,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}

/// Translate a store error raised while deleting `what` into `InUse` when the
/// cause is a foreign-key violation.
pub fn map_delete_error(err: rusqlite::Error, what: &str) -> CuratelaError {
    if let rusqlite::Error::SqliteFailure(ref code, _) = err {
        if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
            return CuratelaError::InUse(what.to_string());
        }
    }
    CuratelaError::Db(err)
}

pub type Result<T> = std::result::Result<T, CuratelaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_status_transience() {
        let busy = CuratelaError::Remote { status: 503, message: "busy".into() };
        let limited = CuratelaError::Remote { status: 429, message: "slow down".into() };
        let bad = CuratelaError::Remote { status: 400, message: "bad payload".into() };
        assert!(busy.is_transient());
        assert!(limited.is_transient());
        assert!(!bad.is_transient());
    }

    #[test]
    fn test_validation_is_not_transient() {
        assert!(!CuratelaError::Validation("Name is required".into()).is_transient());
        assert!(!CuratelaError::NoNewRows.is_transient());
    }

    #[test]
    fn test_missing_columns_message() {
        let e = CuratelaError::MissingColumns(vec!["data".into(), "valor".into()]);
        assert_eq!(e.to_string(), "Missing required columns: data, valor");
    }
}
