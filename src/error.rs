//! Error types for webbook operations.

use thiserror::Error;

/// Errors that abort a whole run.
///
/// Expected per-file control flow (a guard cancelling a write, a handler
/// skipping its own effect) is not an error; see
/// [`Outcome`](crate::pipeline::Outcome).
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Invalid EPUB: {0}")]
    InvalidEpub(String),

    #[error("Missing required element: {0}")]
    MissingElement(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(
        "The value '{index}' is out of bounds, only values from 1 up to {max} can be used."
    )]
    OrderOutOfRange { index: usize, max: usize },

    #[error("No route registered for '{0}'")]
    MissingRoute(String),

    #[error("Handler '{handler}' requires '{field}', which this run does not provide")]
    MissingContext {
        handler: &'static str,
        field: &'static str,
    },

    #[error("Aborted by user")]
    Aborted,
}

pub type Result<T> = std::result::Result<T, Error>;
