use reqwest::StatusCode;
use thiserror::Error;

/// 向遠端取資料時可能發生的錯誤
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: StatusCode },

    #[error("failed to parse response from {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("field `{field}` is missing in response from {url}")]
    MissingField { url: String, field: &'static str },

    #[error("{category} of {symbol} still failing after {attempts} attempts: {last}")]
    Exhausted {
        symbol: String,
        category: String,
        attempts: usize,
        #[source]
        last: Box<FetchError>,
    },

    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}
