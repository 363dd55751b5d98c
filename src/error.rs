use thiserror::Error;

/// Why a candidate URL could not be fetched at all.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed after {attempts} attempt(s): {source}")]
    Transport {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} still answered {status} after {attempts} attempt(s)")]
    RetriesExhausted {
        url: String,
        status: u16,
        attempts: u32,
    },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::Transport { url, .. } | FetchError::RetriesExhausted { url, .. } => url,
        }
    }
}
