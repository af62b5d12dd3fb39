use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not read closure table: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not fetch closure table: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed closure table: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid placeholder marker: {0}")]
    Pattern(#[from] regex::Error),
}
