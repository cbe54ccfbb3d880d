use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuditError>;

#[derive(Debug, Error)]
pub enum AuditError {
    /// Rejected before any work starts.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Bulk analysis failed: {0}")]
    BulkAnalysis(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

impl AuditError {
    pub fn fetch(url: &str, reason: impl Into<String>) -> Self {
        AuditError::Fetch {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for AuditError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();
        AuditError::Fetch {
            url,
            reason: err.to_string(),
        }
    }
}

impl From<rusqlite::Error> for AuditError {
    fn from(err: rusqlite::Error) -> Self {
        AuditError::Cache(err.to_string())
    }
}
