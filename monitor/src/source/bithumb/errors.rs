use thiserror::Error;

#[derive(Error, Debug)]
pub enum BithumbError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response from bithumb: {0}")]
    InvalidResponse(String),

    #[error("date parse error: {0}")]
    ParseDate(#[from] chrono::ParseError),
}
