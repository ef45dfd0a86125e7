use crate::app::config::Config;
use crate::pool::{
    Capabilities, Client, ConnectionLimiter, PoolError, RequestContext, Response, RoundRobin,
};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Once};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Builds one standalone `reqwest::Client` with its own connection pool.
///
/// reqwest runs the TCP dial and the TLS handshake under a single connect
/// timer, so both budgets are summed into it.
pub fn build_client(cfg: &Config) -> Result<reqwest::Client, PoolError> {
    reqwest::Client::builder()
        .timeout(cfg.request_timeout)
        .connect_timeout(cfg.dial_timeout + cfg.tls_handshake_timeout)
        .pool_idle_timeout(cfg.idle_connection_timeout)
        .pool_max_idle_per_host(cfg.max_connections_per_host)
        .danger_accept_invalid_certs(cfg.insecure_skip_verify)
        .http1_only()
        .tcp_nodelay(true)
        .build()
        .map_err(|e| PoolError::Build(e.to_string()))
}

struct Slot {
    /// Emptied by `close()`; dropping the last handle shuts idle sockets.
    client: ArcSwapOption<reqwest::Client>,
    limiter: ConnectionLimiter,
}

impl Slot {
    fn client(&self) -> Result<Arc<reqwest::Client>, PoolError> {
        self.client.load_full().ok_or(PoolError::Closed)
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        header_timeout: Option<Duration>,
    ) -> Result<Response, PoolError> {
        let _permit = self.limiter.acquire().await?;

        // send() resolves once the status line and headers are in; the
        // timer also covers connect and the request write
        let sent = request.send();
        let resp = match header_timeout {
            Some(limit) => tokio::time::timeout(limit, sent)
                .await
                .map_err(|_| PoolError::ResponseHeaderTimeout)??,
            None => sent.await?,
        };

        let status = resp.status().as_u16();
        let body = resp.bytes().await?;
        Ok(Response::new(status, body.to_vec()))
    }
}

/// Pool of independent async reqwest clients. Honors `RequestContext`
/// cancellation and deadlines per request.
pub struct ReqwestPool {
    clients: Vec<Slot>,
    spin: RoundRobin,
    cfg: Config,
    close_once: Once,
}

impl ReqwestPool {
    pub fn new(cfg: Config) -> Result<Self, PoolError> {
        let cfg = cfg.resolved();
        let size = cfg.pool_size();

        let mut clients = Vec::with_capacity(size);
        for _ in 0..size {
            clients.push(Slot {
                client: ArcSwapOption::from_pointee(build_client(&cfg)?),
                limiter: ConnectionLimiter::new(cfg.max_connections_per_host, cfg.request_timeout),
            });
        }

        info!(size, base_url = %cfg.base_url, "reqwest client pool ready");
        Ok(Self {
            clients,
            spin: RoundRobin::new(),
            cfg,
            close_once: Once::new(),
        })
    }

    pub fn size(&self) -> usize {
        self.clients.len()
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn is_closed(&self) -> bool {
        self.close_once.is_completed()
    }

    fn pick(&self) -> Result<(usize, &Slot, Arc<reqwest::Client>), PoolError> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }
        let index = self.spin.next(self.clients.len());
        let slot = &self.clients[index];
        Ok((index, slot, slot.client()?))
    }

    async fn dispatch(
        &self,
        ctx: &RequestContext,
        index: usize,
        slot: &Slot,
        request: reqwest::RequestBuilder,
    ) -> Result<Response, PoolError> {
        let result = ctx
            .run(slot.execute(request, self.cfg.response_header_timeout))
            .await;
        if let Err(e) = &result {
            warn!(slot = index, error = %e, "request failed");
        }
        result
    }
}

#[async_trait]
impl Client for ReqwestPool {
    async fn get(&self, ctx: &RequestContext, path: &str) -> Result<Response, PoolError> {
        let (index, slot, client) = self.pick()?;
        let url = self.cfg.url_for(path);
        debug!(slot = index, %url, "GET");
        self.dispatch(ctx, index, slot, client.get(url)).await
    }

    async fn post(&self, ctx: &RequestContext, path: &str, body: &Value) -> Result<Response, PoolError> {
        let (index, slot, client) = self.pick()?;
        let url = self.cfg.url_for(path);
        debug!(slot = index, %url, "POST");
        self.dispatch(ctx, index, slot, client.post(url).json(body)).await
    }

    fn close(&self) {
        self.close_once.call_once(|| {
            for slot in &self.clients {
                slot.limiter.close();
                slot.client.store(None);
            }
            info!(size = self.clients.len(), "reqwest client pool closed");
        });
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_cancellation: true,
            supports_response_header_timeout: true,
        }
    }
}

impl Drop for ReqwestPool {
    fn drop(&mut self) {
        self.close();
    }
}
