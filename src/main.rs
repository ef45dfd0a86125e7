use anyhow::Context;
use clap::{Parser, ValueEnum};
use futures::stream::{self, StreamExt};
use http_client_pool::{Client, Config, RequestContext, ReqwestPool, UreqPool};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    Reqwest,
    Ureq,
}

/// Fires GET requests at one endpoint through a client pool and reports
/// the status histogram. Pool settings come from `POOL_*` env vars and
/// may be overridden by flags.
#[derive(Debug, Parser)]
#[command(name = "http-client-pool", version)]
struct Args {
    #[arg(long, value_enum, default_value = "reqwest")]
    backend: Backend,

    /// Overrides POOL_BASE_URL.
    #[arg(long)]
    base_url: Option<String>,

    #[arg(long, default_value = "/")]
    path: String,

    /// Overrides POOL_SIZE.
    #[arg(long)]
    size: Option<i64>,

    #[arg(long, default_value_t = 1000)]
    requests: usize,

    /// Defaults to four in-flight requests per CPU.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Per-request deadline in milliseconds.
    #[arg(long)]
    deadline_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = Config::from_env();
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(size) = args.size {
        config.size = size;
    }
    anyhow::ensure!(!config.base_url.is_empty(), "base URL is required (--base-url or POOL_BASE_URL)");

    let pool: Arc<dyn Client> = match args.backend {
        Backend::Reqwest => Arc::new(ReqwestPool::new(config.clone()).context("building reqwest pool")?),
        Backend::Ureq => Arc::new(UreqPool::new(config.clone()).context("building ureq pool")?),
    };
    let concurrency = args.concurrency.unwrap_or_else(|| num_cpus::get() * 4).max(1);
    info!(
        backend = ?args.backend,
        base_url = %config.base_url,
        size = config.pool_size(),
        requests = args.requests,
        concurrency,
        "starting run"
    );

    let started = Instant::now();
    let outcomes: Vec<Result<u16, String>> = stream::iter(0..args.requests)
        .map(|_| {
            let pool = pool.clone();
            let path = args.path.clone();
            async move {
                let ctx = match args.deadline_ms {
                    Some(ms) => RequestContext::with_timeout(Duration::from_millis(ms)),
                    None => RequestContext::background(),
                };
                pool.get(&ctx, &path)
                    .await
                    .map(|resp| resp.status_code())
                    .map_err(|e| e.to_string())
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;
    let elapsed = started.elapsed();

    pool.close();

    let mut statuses: BTreeMap<u16, usize> = BTreeMap::new();
    let mut failures = 0usize;
    for outcome in outcomes {
        match outcome {
            Ok(status) => *statuses.entry(status).or_default() += 1,
            Err(e) => {
                failures += 1;
                warn!(error = %e, "request failed");
            }
        }
    }

    for (status, count) in &statuses {
        info!(status, count, "responses");
    }
    info!(
        failures,
        elapsed_ms = elapsed.as_millis() as u64,
        rps = (args.requests as f64 / elapsed.as_secs_f64().max(f64::EPSILON)) as u64,
        "run finished"
    );

    Ok(())
}
