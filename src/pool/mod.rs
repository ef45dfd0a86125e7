//! The uniform client contract every pool variant implements, plus the
//! pieces they share: round-robin selection, request context, per-slot
//! connection limits and the owned response type.

pub mod context;
pub mod error;
pub mod limiter;
pub mod response;
pub mod round_robin;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

pub use context::RequestContext;
pub use error::{ErrorKind, PoolError};
pub use limiter::ConnectionLimiter;
pub use response::Response;
pub use round_robin::RoundRobin;

/// What a pool variant can honor beyond the common contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// `RequestContext` cancellation and deadlines abort in-flight requests.
    /// When unset, only the client-level request timeout bounds a call.
    pub supports_cancellation: bool,
    /// `Config::response_header_timeout` is enforced.
    pub supports_response_header_timeout: bool,
}

#[async_trait]
pub trait Client: Send + Sync {
    /// GET `base_url + path` on the next client in rotation.
    async fn get(&self, ctx: &RequestContext, path: &str) -> Result<Response, PoolError>;

    /// POST `body` as JSON to `base_url + path` on the next client in rotation.
    async fn post(&self, ctx: &RequestContext, path: &str, body: &Value) -> Result<Response, PoolError>;

    /// Releases every client exactly once. Safe to call repeatedly and from
    /// several threads at the same time.
    fn close(&self);

    fn capabilities(&self) -> Capabilities;
}

#[async_trait]
pub trait ClientExt: Client {
    /// POST any serializable value.
    async fn post_json<T>(&self, ctx: &RequestContext, path: &str, body: &T) -> Result<Response, PoolError>
    where
        T: Serialize + Sync + ?Sized,
    {
        let value = serde_json::to_value(body).map_err(PoolError::Encode)?;
        self.post(ctx, path, &value).await
    }
}

impl<C: Client + ?Sized> ClientExt for C {}
