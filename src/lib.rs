//! Fixed-size pools of independent HTTP clients sharing one base URL.
//!
//! Requests are handed to the pool's clients in strict round-robin order so
//! concurrent callers fan out over several connections instead of queueing
//! on one. Two interchangeable variants implement [`pool::Client`]:
//! [`ReqwestPool`] (async, cancellable per request) and [`UreqPool`]
//! (blocking agents, bounded only by the client request timeout).

pub mod app;
pub mod pool;
pub mod services;

pub use app::config::{Config, DEFAULT_POOL_SIZE};
pub use pool::{
    Capabilities, Client, ClientExt, ErrorKind, PoolError, RequestContext, Response, RoundRobin,
};
pub use services::{ReqwestPool, UreqPool};
