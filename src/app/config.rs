use std::env;
use std::time::Duration;

pub const DEFAULT_POOL_SIZE: usize = 8;

/// Settings shared by every client slot of a pool.
///
/// A pool copies its `Config` at construction; editing the caller's value
/// afterwards never reaches a live pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub base_url: String,
    /// Number of independent clients. Zero or negative resolves to
    /// [`DEFAULT_POOL_SIZE`].
    pub size: i64,
    pub request_timeout: Duration,
    pub dial_timeout: Duration,
    pub tls_handshake_timeout: Duration,
    pub idle_connection_timeout: Duration,
    pub max_connections_per_host: usize,
    pub insecure_skip_verify: bool,
    /// `None` (or zero) disables the header deadline.
    ///
    /// The ureq variant starts this timer once the request has been written.
    /// The reqwest variant cannot observe that point, so its timer covers the
    /// whole `send()`: waiting for a connection, dial, TLS and the request
    /// write all count against it. Set it above
    /// `dial_timeout + tls_handshake_timeout` when using reqwest against
    /// hosts that need fresh connections.
    pub response_header_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            size: DEFAULT_POOL_SIZE as i64,
            request_timeout: Duration::from_secs(10),
            dial_timeout: Duration::from_secs(5),
            tls_handshake_timeout: Duration::from_secs(2),
            idle_connection_timeout: Duration::from_secs(90),
            max_connections_per_host: 1,
            insecure_skip_verify: true,
            response_header_timeout: None,
        }
    }
}

impl Config {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::var("POOL_BASE_URL").unwrap_or(defaults.base_url),
            size: env::var("POOL_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.size),
            request_timeout: env_millis("POOL_REQUEST_TIMEOUT_MS").unwrap_or(defaults.request_timeout),
            dial_timeout: env_millis("POOL_DIAL_TIMEOUT_MS").unwrap_or(defaults.dial_timeout),
            tls_handshake_timeout: env_millis("POOL_TLS_TIMEOUT_MS")
                .unwrap_or(defaults.tls_handshake_timeout),
            idle_connection_timeout: env_millis("POOL_IDLE_CONN_TIMEOUT_MS")
                .unwrap_or(defaults.idle_connection_timeout),
            max_connections_per_host: env::var("POOL_MAX_CONNS_PER_HOST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_connections_per_host),
            insecure_skip_verify: env::var("POOL_INSECURE_SKIP_VERIFY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.insecure_skip_verify),
            response_header_timeout: env_millis("POOL_RESPONSE_HEADER_TIMEOUT_MS")
                .or(defaults.response_header_timeout),
        }
    }

    /// Pool size after defaulting; always at least 1.
    pub fn pool_size(&self) -> usize {
        usize::try_from(self.size)
            .ok()
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_POOL_SIZE)
    }

    /// Copy with every value a transport depends on made concrete.
    pub fn resolved(&self) -> Self {
        Self {
            size: self.pool_size() as i64,
            max_connections_per_host: self.max_connections_per_host.max(1),
            response_header_timeout: self.response_header_timeout.filter(|d| !d.is_zero()),
            ..self.clone()
        }
    }

    /// Joins `base_url` and `path` with exactly one `/` between them.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');

        match (base.is_empty(), path.is_empty()) {
            (true, _) => format!("/{path}"),
            (false, true) => base.to_string(),
            (false, false) => format!("{base}/{path}"),
        }
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
}
