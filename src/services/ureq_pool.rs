use crate::app::config::Config;
use crate::pool::{
    Capabilities, Client, ConnectionLimiter, PoolError, RequestContext, Response, RoundRobin,
};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Once;
use tracing::{debug, info, warn};
use ureq::tls::TlsConfig;
use ureq::Agent;

/// Builds one standalone blocking `ureq::Agent` with its own connection pool.
///
/// Like reqwest, ureq has a single connect timer covering dial and TLS, so
/// both budgets are summed into it.
pub fn build_agent(cfg: &Config) -> Agent {
    let tls = TlsConfig::builder()
        .disable_verification(cfg.insecure_skip_verify)
        .build();

    Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(cfg.request_timeout))
        .timeout_connect(Some(cfg.dial_timeout + cfg.tls_handshake_timeout))
        .timeout_recv_response(cfg.response_header_timeout)
        .max_idle_age(cfg.idle_connection_timeout)
        .max_idle_connections_per_host(cfg.max_connections_per_host)
        .max_idle_connections(cfg.pool_size() * 2)
        .tls_config(tls)
        .build()
        .new_agent()
}

fn call(agent: &Agent, url: &str, body: Option<&Value>) -> Result<Response, PoolError> {
    let mut resp = match body {
        None => agent.get(url).call()?,
        Some(body) => agent.post(url).send_json(body)?,
    };
    let status = resp.status().as_u16();
    // ureq caps read_to_vec at 10 MiB by default; reqwest has no cap
    let body = resp.body_mut().with_config().limit(u64::MAX).read_to_vec()?;
    Ok(Response::new(status, body))
}

struct Slot {
    /// Emptied by `close()`; the agent's pooled sockets go with the last clone.
    agent: ArcSwapOption<Agent>,
    limiter: ConnectionLimiter,
}

/// Pool of independent blocking ureq agents.
///
/// Each call runs on tokio's blocking thread pool. A blocking agent cannot
/// be interrupted, so `RequestContext` is not consulted: a call lasts until
/// it completes or `Config::request_timeout` fires.
pub struct UreqPool {
    clients: Vec<Slot>,
    spin: RoundRobin,
    cfg: Config,
    close_once: Once,
}

impl UreqPool {
    pub fn new(cfg: Config) -> Result<Self, PoolError> {
        let cfg = cfg.resolved();
        let size = cfg.pool_size();

        let clients = (0..size)
            .map(|_| Slot {
                agent: ArcSwapOption::from_pointee(build_agent(&cfg)),
                limiter: ConnectionLimiter::new(cfg.max_connections_per_host, cfg.request_timeout),
            })
            .collect();

        info!(size, base_url = %cfg.base_url, "ureq client pool ready");
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

    async fn dispatch(&self, path: &str, body: Option<Value>) -> Result<Response, PoolError> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }
        let index = self.spin.next(self.clients.len());
        let slot = &self.clients[index];
        let url = self.cfg.url_for(path);
        let method = if body.is_some() { "POST" } else { "GET" };
        debug!(slot = index, %url, method);

        let result = async {
            let permit = slot.limiter.acquire().await?;
            let agent = slot.agent.load_full().ok_or(PoolError::Closed)?;
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                call(&agent, &url, body.as_ref())
            })
            .await?
        }
        .await;

        if let Err(e) = &result {
            warn!(slot = index, error = %e, "request failed");
        }
        result
    }
}

#[async_trait]
impl Client for UreqPool {
    async fn get(&self, _ctx: &RequestContext, path: &str) -> Result<Response, PoolError> {
        self.dispatch(path, None).await
    }

    async fn post(&self, _ctx: &RequestContext, path: &str, body: &Value) -> Result<Response, PoolError> {
        self.dispatch(path, Some(body.clone())).await
    }

    fn close(&self) {
        self.close_once.call_once(|| {
            for slot in &self.clients {
                slot.limiter.close();
                slot.agent.store(None);
            }
            info!(size = self.clients.len(), "ureq client pool closed");
        });
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_cancellation: false,
            supports_response_header_timeout: true,
        }
    }
}

impl Drop for UreqPool {
    fn drop(&mut self) {
        self.close();
    }
}
