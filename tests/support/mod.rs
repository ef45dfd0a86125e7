//! In-process HTTP/1.1 servers the pool suites talk to.
//!
//! Binds `127.0.0.1:0` and serves on the test's tokio runtime, either in
//! plain text or over TLS with a throwaway self-signed certificate. Every
//! handler answers `{"ok":true}` unless stated otherwise; unknown paths get a
//! 400 naming the path the server actually saw.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, State},
    http::{StatusCode, Uri},
    routing::{get, post},
    Extension, Json, Router,
};
use dashmap::DashMap;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use rustls::pki_types::PrivatePkcs8KeyDer;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_rustls::TlsAcceptor;

pub const SLOW_DELAY: Duration = Duration::from_millis(200);

/// Size of the `/huge` body, above ureq's default 10 MiB read cap.
pub const HUGE_BODY_LEN: usize = 12 * 1024 * 1024;

const KEEP_ALIVE_RESPONSE: &[u8] =
    b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 11\r\n\r\n{\"ok\":true}";

/// Remote address of every connection that delivered a request, with a
/// request count.
pub type Seen = Arc<DashMap<SocketAddr, usize>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub seen: Seen,
    pub tls: bool,
}

impl TestServer {
    pub fn url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{scheme}://{}", self.addr)
    }

    pub fn connections(&self) -> usize {
        self.seen.len()
    }

    pub fn requests(&self) -> usize {
        self.seen.iter().map(|entry| *entry.value()).sum()
    }
}

pub fn app(seen: Seen) -> Router {
    Router::new()
        .route("/ping", get(ok))
        .route("/ok", get(ok))
        .route("/x", get(ok))
        .route("/hello", get(ok))
        .route("/echo", post(echo))
        .route("/slow", get(slow))
        .route("/slow-headers", get(slow))
        .route("/any", get(slow))
        .route("/large", get(large))
        .route("/huge", get(huge))
        .fallback(bad_path)
        .layer(axum::middleware::from_fn_with_state(seen.clone(), record))
        .with_state(seen)
}

pub async fn spawn() -> TestServer {
    let seen: Seen = Arc::new(DashMap::new());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let router = app(seen.clone());
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestServer { addr, seen, tls: false }
}

/// Same routes as [`spawn`], served over HTTPS with a fresh self-signed
/// certificate for `localhost` and `127.0.0.1`. Only HTTP/1.1 is offered.
pub async fn spawn_tls() -> TestServer {
    let seen: Seen = Arc::new(DashMap::new());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let acceptor = TlsAcceptor::from(Arc::new(self_signed_config()));
    let router = app(seen.clone());
    tokio::spawn(async move {
        loop {
            let Ok((tcp, remote)) = listener.accept().await else {
                break;
            };
            let acceptor = acceptor.clone();
            let router = router.clone().layer(Extension(ConnectInfo(remote)));
            tokio::spawn(async move {
                let Ok(stream) = acceptor.accept(tcp).await else {
                    return;
                };
                let _ = hyper::server::conn::http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), TowerToHyperService::new(router))
                    .await;
            });
        }
    });

    TestServer { addr, seen, tls: true }
}

fn self_signed_config() -> rustls::ServerConfig {
    let key_pair = rcgen::KeyPair::generate().unwrap();
    let params =
        rcgen::CertificateParams::new(vec!["localhost".to_string(), "127.0.0.1".to_string()])
            .unwrap();
    let cert = params.self_signed(&key_pair).unwrap();
    let key = PrivatePkcs8KeyDer::from(key_pair.serialize_der());

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert.der().clone()], key.into())
        .unwrap();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    config
}

/// Hand-rolled keep-alive server for a single connection. Every request
/// head gets a fixed `{"ok":true}` reply; the receiver fires once the peer
/// closes its end of the socket.
pub async fn spawn_keep_alive() -> (SocketAddr, oneshot::Receiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (closed_tx, closed_rx) = oneshot::channel();

    tokio::spawn(async move {
        let Ok((mut stream, _)) = listener.accept().await else {
            return;
        };
        let mut pending = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                let _ = closed_tx.send(());
                return;
            }
            pending.extend_from_slice(&chunk[..n]);
            while let Some(end) = head_end(&pending) {
                pending.drain(..end);
                if stream.write_all(KEEP_ALIVE_RESPONSE).await.is_err() {
                    let _ = closed_tx.send(());
                    return;
                }
            }
        }
    });

    (addr, closed_rx)
}

fn head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|at| at + 4)
}

/// Address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

async fn record(
    State(seen): State<Seen>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    *seen.entry(remote).or_insert(0) += 1;
    next.run(request).await
}

async fn ok() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn echo(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({ "ok": true, "echo": body }))
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(SLOW_DELAY).await;
    Json(json!({ "ok": true }))
}

async fn large() -> Json<Value> {
    Json(json!({ "ok": true, "data": "A".repeat(256 * 1024) }))
}

async fn huge() -> Vec<u8> {
    vec![b'A'; HUGE_BODY_LEN]
}

async fn bad_path(uri: Uri) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, format!("bad path: {}", uri.path()))
}
