use std::{net::SocketAddr, sync::Arc};

use action_flow::recorder::{TAG_FLOW, TAG_STEP};
use action_flow::{Check, OutcomeRecorder};
use axum::{
    extract::State,
    http::HeaderValue,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use once_cell::sync::{Lazy, OnceCell};
use prometheus::{
    histogram_opts, opts, Encoder, HistogramVec, IntCounterVec, Registry, TextEncoder,
};
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::{error, info};

static GLOBAL_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);
static REGISTER_ONCE: OnceCell<()> = OnceCell::new();

static CHECKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        opts!("storeprobe_checks_total", "Step checks recorded"),
        &["flow", "step", "result"],
    )
    .expect("valid checks counter")
});

static RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        opts!("storeprobe_runs_total", "Flow runs by final verdict"),
        &["flow", "verdict"],
    )
    .expect("valid runs counter")
});

static STEP_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        histogram_opts!(
            "storeprobe_step_latency_ms",
            "Step latency in milliseconds",
            vec![50.0, 100.0, 250.0, 500.0, 1_000.0, 2_500.0, 5_000.0, 10_000.0, 30_000.0]
        ),
        &["flow", "step"],
    )
    .expect("valid latency histogram")
});

pub fn register_metrics() {
    REGISTER_ONCE.get_or_init(|| {
        let registry = global_registry();
        for collector in [
            Box::new(CHECKS_TOTAL.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(RUNS_TOTAL.clone()),
            Box::new(STEP_LATENCY.clone()),
        ] {
            if let Err(err) = registry.register(collector) {
                error!(?err, "failed to register metric");
            }
        }
    });
}

/// Mirrors every check into the Prometheus collectors
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusRecorder;

impl PrometheusRecorder {
    pub fn new() -> Self {
        register_metrics();
        Self
    }
}

impl OutcomeRecorder for PrometheusRecorder {
    fn record(&self, check: Check) {
        let flow = check.tag(TAG_FLOW).unwrap_or_default();
        let result = if check.passed { "passed" } else { "failed" };

        if check.is_verdict() {
            RUNS_TOTAL.with_label_values(&[flow, result]).inc();
            return;
        }

        let step = check.tag(TAG_STEP).unwrap_or_default();
        CHECKS_TOTAL.with_label_values(&[flow, step, result]).inc();
        if let Some(latency_ms) = check.latency_ms {
            STEP_LATENCY
                .with_label_values(&[flow, step])
                .observe(latency_ms as f64);
        }
    }
}

pub fn spawn_metrics_server(port: u16) -> Option<JoinHandle<()>> {
    if port == 0 {
        return None;
    }

    register_metrics();
    let app = router();

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(%addr, "metrics server listening");
    Some(tokio::spawn(async move {
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                if let Err(err) = axum::serve(listener, app.into_make_service()).await {
                    error!(?err, "metrics server exited with error");
                }
            }
            Err(err) => {
                error!(?err, "failed to bind metrics listener");
            }
        }
    }))
}

pub fn router() -> Router {
    let registry = Arc::new(global_registry().clone());
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(registry)
}

async fn metrics_handler(State(registry): State<Arc<Registry>>) -> Response {
    let encoder = TextEncoder::new();
    let format_type = encoder.format_type().to_string();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!(?err, "failed to encode prometheus metrics");
        return encode_error();
    }

    match (String::from_utf8(buffer), HeaderValue::from_str(&format_type)) {
        (Ok(body), Ok(value)) => {
            ([(axum::http::header::CONTENT_TYPE, value)], body).into_response()
        }
        (Err(err), _) => {
            error!(?err, "failed to convert prometheus metrics to utf8");
            encode_error()
        }
        (_, Err(err)) => {
            error!(?err, "failed to build content-type header");
            encode_error()
        }
    }
}

fn encode_error() -> Response {
    (
        axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        "metric encode error",
    )
        .into_response()
}

pub fn global_registry() -> &'static Registry {
    &GLOBAL_REGISTRY
}
