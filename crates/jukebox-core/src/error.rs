use thiserror::Error;

/// A submitted share link that cannot be turned into a media reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("invalid link: not an absolute URL: {0}")]
    Malformed(String),
    #[error("invalid link: expected /<kind>/<id>, got {0:?}")]
    MissingSegments(String),
    #[error("invalid link: unsupported media kind {0:?}")]
    UnknownKind(String),
}

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("tag reader closed")]
    Closed,
    #[error("tag reader unavailable: {0}")]
    Unavailable(String),
    #[error("tag reader I/O: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("no access token; log in to the media service first")]
    Missing,
    #[error("access token expired at {0}")]
    Expired(i64),
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("playback rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("playback request failed: {0}")]
    Transport(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Reasons the scan-and-play loop stops.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatcher startup: {0}")]
    Auth(#[from] AuthError),
    #[error("dispatcher reader: {0}")]
    Reader(#[from] ReaderError),
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error(transparent)]
    InvalidLink(#[from] LinkError),
    #[error(transparent)]
    Reader(#[from] ReaderError),
    #[error("binding store: {0}")]
    Store(#[from] sqlx::Error),
    #[error("blocking tag read aborted: {0}")]
    ReadAborted(#[from] tokio::task::JoinError),
}
