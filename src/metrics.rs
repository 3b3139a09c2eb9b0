//! Prometheus metrics for the scraper.
//!
//! Exposes:
//! - `tg_scraper_scrape_duration_seconds` (histogram)
//! - `tg_scraper_scrape_total` (counter by outcome)
//! - `tg_scraper_scrape_inflight` (gauge)
//! - `tg_scraper_rows_exported_total` (counter)
//! - process metrics via `process` collector

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use once_cell::sync::Lazy;
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    default_registry, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

static PROCESS_COLLECTOR: Lazy<()> = Lazy::new(|| {
    if let Err(err) = default_registry().register(Box::new(ProcessCollector::for_self())) {
        warn!("Failed to register process collector: {}", err);
    }
});

static SCRAPE_DURATION: Lazy<Histogram> = Lazy::new(|| {
    // Exponential buckets from 100ms up to ~27 minutes.
    let buckets =
        prometheus::exponential_buckets(0.1, 2.0, 15).expect("failed to create histogram buckets");
    register_histogram!(
        "tg_scraper_scrape_duration_seconds",
        "Scrape invocation duration in seconds",
        buckets
    )
    .expect("failed to register scrape duration histogram")
});

static SCRAPE_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tg_scraper_scrape_total",
        "Total scrape invocations by outcome",
        &["outcome"]
    )
    .expect("failed to register scrape counter")
});

static SCRAPE_INFLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "tg_scraper_scrape_inflight",
        "Number of in-flight scrape invocations"
    )
    .expect("failed to register inflight gauge")
});

static ROWS_EXPORTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tg_scraper_rows_exported_total",
        "Rows delivered in exported spreadsheets"
    )
    .expect("failed to register rows counter")
});

/// Ensure collectors are registered.
fn init_collectors() {
    Lazy::force(&PROCESS_COLLECTOR);
    Lazy::force(&SCRAPE_DURATION);
    Lazy::force(&SCRAPE_TOTAL);
    Lazy::force(&SCRAPE_INFLIGHT);
    Lazy::force(&ROWS_EXPORTED);
}

/// Increment the inflight gauge.
pub fn record_scrape_start() {
    init_collectors();
    SCRAPE_INFLIGHT.inc();
}

/// Record a finished scrape with duration, outcome label and delivered rows.
pub fn record_scrape_result(duration: Duration, outcome: &'static str, rows: usize) {
    init_collectors();
    SCRAPE_INFLIGHT.dec();
    SCRAPE_DURATION.observe(duration.as_secs_f64());
    SCRAPE_TOTAL.with_label_values(&[outcome]).inc();
    ROWS_EXPORTED.inc_by(rows as u64);
}

/// Count a rejected command (unauthorized caller, bad arguments).
pub fn record_rejected(outcome: &'static str) {
    init_collectors();
    SCRAPE_TOTAL.with_label_values(&[outcome]).inc();
}

async fn metrics_response() -> Result<Response<Full<Bytes>>, Infallible> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", err);
        let mut response = Response::new(Full::from("encode error"));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        return Ok(response);
    }

    let mut response = Response::new(Full::from(buffer));
    if let Ok(content_type) = hyper::header::HeaderValue::from_str(encoder.format_type()) {
        response
            .headers_mut()
            .insert(hyper::header::CONTENT_TYPE, content_type);
    }
    Ok(response)
}

async fn handle_request(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    match req.uri().path() {
        "/metrics" => metrics_response().await,
        _ => {
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = StatusCode::NOT_FOUND;
            Ok(response)
        }
    }
}

async fn serve(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Prometheus metrics endpoint started");

    loop {
        let (stream, peer) = listener.accept().await?;
        let service = service_fn(handle_request);
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(?peer, "Metrics connection error: {}", err);
            }
        });
    }
}

/// Spawn the metrics HTTP endpoint on the given address.
pub fn spawn_metrics_server(addr: SocketAddr) {
    init_collectors();
    tokio::spawn(async move {
        if let Err(err) = serve(addr).await {
            error!(%addr, "Metrics server failed: {}", err);
        }
    });
}
