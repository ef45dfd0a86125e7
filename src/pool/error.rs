use thiserror::Error;

/// Broad failure classes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller deadline, client request timeout, header timeout, or the wait
    /// for a free connection ran out.
    Timeout,
    /// The caller cancelled the request.
    Cancelled,
    /// Connect, TLS, DNS or other I/O failure.
    Network,
    /// Malformed response, undecodable body, or a body that failed to encode.
    Protocol,
    /// The pool was closed or could not be built.
    Lifecycle,
}

/// Errors returned by pool operations. Backend errors are carried as-is.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("context canceled")]
    Cancelled,

    #[error("timeout awaiting response headers")]
    ResponseHeaderTimeout,

    #[error("timed out waiting for a free connection")]
    ConnectionWaitTimeout,

    #[error("client pool is closed")]
    Closed,

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Ureq(#[from] ureq::Error),

    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to build client: {0}")]
    Build(String),

    #[error("request task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl PoolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PoolError::DeadlineExceeded
            | PoolError::ResponseHeaderTimeout
            | PoolError::ConnectionWaitTimeout => ErrorKind::Timeout,
            PoolError::Cancelled => ErrorKind::Cancelled,
            PoolError::Closed | PoolError::Build(_) => ErrorKind::Lifecycle,
            PoolError::Encode(_) => ErrorKind::Protocol,
            PoolError::Join(e) if e.is_cancelled() => ErrorKind::Cancelled,
            PoolError::Join(_) => ErrorKind::Lifecycle,
            PoolError::Reqwest(e) => reqwest_kind(e),
            PoolError::Ureq(e) => ureq_kind(e),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}

fn reqwest_kind(e: &reqwest::Error) -> ErrorKind {
    if e.is_timeout() {
        ErrorKind::Timeout
    } else if e.is_decode() || e.is_builder() || e.is_redirect() {
        ErrorKind::Protocol
    } else {
        // connect, request and body errors are all I/O underneath
        ErrorKind::Network
    }
}

fn ureq_kind(e: &ureq::Error) -> ErrorKind {
    match e {
        ureq::Error::Timeout(_) => ErrorKind::Timeout,
        ureq::Error::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => ErrorKind::Timeout,
        ureq::Error::Io(_)
        | ureq::Error::HostNotFound
        | ureq::Error::ConnectionFailed
        | ureq::Error::Tls(_) => ErrorKind::Network,
        _ => ErrorKind::Protocol,
    }
}
