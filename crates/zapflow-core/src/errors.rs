/// Core error type for ZapFlow.
///
/// Adapter crates map their transport errors into this type so the session
/// can surface failures consistently (operator message vs per-contact status).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("import error: {0}")]
    Import(String),

    #[error("template error: {0}")]
    Template(String),

    /// The operation is not allowed in the session's current state.
    #[error("{0}")]
    Session(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The automation server answered (or failed to answer) with an error.
    /// The payload is the human-readable reason shown to the operator.
    #[error("{0}")]
    Remote(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
