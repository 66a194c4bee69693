//! environ-trace
//!
//! Replays a single synthetic request through the tracing middleware and
//! prints what it recorded.
//!
//! # Architecture Overview
//!
//! ```text
//!   CLI arguments ──▶ http::Request ──▶ Environ
//!                                         │
//!                                         ▼
//!                          ┌──────────────────────────────┐
//!                          │        TraceMiddleware       │
//!                          │  LogTracer   MetricsRecorder │
//!                          └──────────────┬───────────────┘
//!                                         │
//!                                         ▼
//!                                  echo application
//!                          (status, headers, body from CLI)
//!
//!   span  ──▶ log events (RUST_LOG)
//!   metrics ──▶ Prometheus text on stdout
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;

use environ_trace::config::{load_config, CaptureConfig};
use environ_trace::http::Environ;
use environ_trace::middleware::{
    app_fn, chunks_body, AppError, BoxBody, HeaderList, Responder, TraceMiddleware,
};
use environ_trace::observability::{init_logging, LogTracer, MetricsRecorder};

#[derive(Parser)]
#[command(name = "environ-trace")]
#[command(about = "Replay a request through the tracing middleware", long_about = None)]
struct Cli {
    /// Request method
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Request target (path and query)
    #[arg(short, long, default_value = "/")]
    target: String,

    /// Host header
    #[arg(long, default_value = "localhost:8000")]
    host: String,

    /// Request header as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Client address
    #[arg(long)]
    remote: Option<SocketAddr>,

    /// Status line returned by the application
    #[arg(short, long, default_value = "200 OK")]
    status: String,

    /// Response header as "Name: value" (repeatable)
    #[arg(short = 'R', long = "response-header", value_parser = parse_header)]
    response_headers: Vec<(String, String)>,

    /// Response body
    #[arg(short, long, default_value = "")]
    body: String,

    /// Capture settings (TOML). Defaults to the process environment.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn parse_header(value: &str) -> Result<(String, String), String> {
    let (name, value) = value
        .split_once(':')
        .ok_or_else(|| format!("expected \"Name: value\", got {:?}", value))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    init_logging("environ_trace=info");

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => CaptureConfig::from_env(),
    };

    tracing::info!(
        request_headers = ?config.server_request,
        response_headers = ?config.server_response,
        sanitize_fields = ?config.sanitize_fields,
        "Configuration loaded"
    );

    let mut builder = ::http::Request::builder()
        .method(cli.method.as_str())
        .uri(cli.target.as_str())
        .header(::http::header::HOST, cli.host.as_str());
    for (name, value) in &cli.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    let request = builder.body(())?;
    let environ = Environ::from_request(&request, cli.remote);

    let status = cli.status.clone();
    let response_headers: HeaderList = cli.response_headers.clone();
    let body = cli.body.clone();
    let app = app_fn(
        move |_: &Environ, start_response: Responder| -> Result<BoxBody, AppError> {
            start_response.start_response(&status, &response_headers, None)?;
            Ok(chunks_body([body.clone()]))
        },
    );

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    let sent = metrics::with_local_recorder(&recorder, || -> Result<usize, AppError> {
        let middleware = TraceMiddleware::builder(app)
            .tracer(LogTracer)
            .metrics(MetricsRecorder::new())
            .config(config)
            .build();

        let start_response = Responder::new(
            |status: &str, headers: &[(String, String)], _: Option<&AppError>| -> Result<(), AppError> {
                tracing::info!(%status, headers = headers.len(), "Response started");
                Ok(())
            },
        );

        let mut sent = 0;
        for chunk in middleware.handle(&environ, start_response)? {
            sent += chunk?.len();
        }
        Ok(sent)
    })?;

    tracing::info!(bytes = sent, "Response body sent");
    print!("{}", handle.render());
    Ok(())
}
