use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlerError {
    #[error("browser init failed: {0}")]
    BrowserInit(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("timed out loading {0}")]
    Timeout(String),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("crawler already running")]
    AlreadyRunning,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
