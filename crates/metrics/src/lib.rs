//! Metrics and tracing setup for the rating node.
//!
//! Provides a global [`RatingMetrics`] singleton backed by the `prometheus`
//! crate, plus an optional lightweight HTTP server for Prometheus scraping.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::net::SocketAddr;
use std::sync::OnceLock;

// ────────────────────────── Tracing ──────────────────────────

/// Initialize the tracing subscriber with env-filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

// ────────────────────────── Prometheus metrics ──────────────────────────

static METRICS: OnceLock<RatingMetrics> = OnceLock::new();

/// Retrieve (or lazily create) the global metrics singleton.
pub fn metrics() -> &'static RatingMetrics {
    METRICS.get_or_init(RatingMetrics::new)
}

/// All Prometheus metrics for a rating node.
pub struct RatingMetrics {
    pub registry: Registry,

    // ── Rating operations ──
    pub puts: IntCounter,
    pub gets: IntCounter,
    pub deletes: IntCounter,

    // ── Write outcomes ──
    pub stale_writes: IntCounter,
    pub cas_retries: IntCounter,
    pub contention_failures: IntCounter,

    // ── HTTP ──
    pub http_requests: IntCounterVec,

    // ── Latency ──
    pub op_latency_secs: HistogramVec,
}

// Manual Debug impl because prometheus types don't derive Debug.
impl std::fmt::Debug for RatingMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RatingMetrics").finish_non_exhaustive()
    }
}

/// Histogram buckets (seconds) for operation latency.
const LATENCY_BUCKETS: &[f64] = &[0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0];

fn counter(name: &str, help: &str) -> IntCounter {
    IntCounter::with_opts(Opts::new(name, help)).expect("valid counter opts")
}

impl RatingMetrics {
    fn new() -> Self {
        let registry = Registry::new();

        let puts = counter("ratings_puts_total", "Rating PUT operations");
        let gets = counter("ratings_gets_total", "Rating GET operations");
        let deletes = counter("ratings_deletes_total", "Rating DELETE operations");

        let stale_writes = counter(
            "ratings_stale_writes_total",
            "Writes discarded because an existing sibling already covered them",
        );
        let cas_retries = counter(
            "ratings_cas_retries_total",
            "Read-merge-write attempts retried after a revision conflict",
        );
        let contention_failures = counter(
            "ratings_contention_failures_total",
            "Writes abandoned after exhausting retries or the lock timeout",
        );

        let http_requests = IntCounterVec::new(
            Opts::new("ratings_http_requests_total", "HTTP requests, by method and status"),
            &["method", "status"],
        )
        .expect("http_requests counter vec");

        let op_latency_secs = HistogramVec::new(
            HistogramOpts::new(
                "ratings_op_latency_seconds",
                "Rating operation latency in seconds",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["op"],
        )
        .expect("op_latency_secs histogram");

        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(puts.clone()),
            Box::new(gets.clone()),
            Box::new(deletes.clone()),
            Box::new(stale_writes.clone()),
            Box::new(cas_retries.clone()),
            Box::new(contention_failures.clone()),
            Box::new(http_requests.clone()),
            Box::new(op_latency_secs.clone()),
        ];
        for collector in collectors {
            registry
                .register(collector)
                .expect("metric names are unique");
        }

        Self {
            registry,
            puts,
            gets,
            deletes,
            stale_writes,
            cas_retries,
            contention_failures,
            http_requests,
            op_latency_secs,
        }
    }
}

/// Encode all registered metrics in Prometheus text exposition format.
pub fn encode_metrics() -> String {
    let m = metrics();
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    encoder
        .encode(&m.registry.gather(), &mut buf)
        .expect("prometheus text encoding");
    String::from_utf8(buf).expect("prometheus output is valid UTF-8")
}

/// Start a latency timer for a rating operation ("put", "get", "delete").
/// The returned guard records elapsed time on drop.
pub fn start_op_timer(op: &str) -> prometheus::HistogramTimer {
    metrics()
        .op_latency_secs
        .with_label_values(&[op])
        .start_timer()
}

/// Count one served HTTP request.
pub fn record_http_request(method: &str, status: u16) {
    let status = status.to_string();
    metrics()
        .http_requests
        .with_label_values(&[method, status.as_str()])
        .inc();
}

// ────────────────────────── Metrics HTTP server ──────────────────────────

use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

async fn metrics_handler(
    req: Request<hyper::body::Incoming>,
) -> Result<Response<Full<Bytes>>, std::convert::Infallible> {
    let response = if req.uri().path() == "/metrics" {
        Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "text/plain; version=0.0.4; charset=utf-8")
            .body(Full::new(Bytes::from(encode_metrics())))
    } else {
        Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::new()))
    };
    Ok(response.expect("valid HTTP response"))
}

/// Serve Prometheus metrics on the given address (`GET /metrics`).
///
/// This spawns a lightweight HTTP/1.1 server. Call from a `tokio::spawn`.
pub async fn serve_metrics(
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("metrics server listening on http://{}/metrics", addr);

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(metrics_handler))
                .await
            {
                tracing::debug!("metrics connection error: {}", e);
            }
        });
    }
}

// ────────────────────────── Tests ──────────────────────────
