//! resilient-http
//!
//! Sends one HTTP request through the retrying executor and prints the result.
//!
//! ```text
//!     CLI args ─▶ ClientConfig (TOML + overrides)
//!                     │
//!                     ▼
//!         TransportRegistry::resolve ─▶ RetryingExecutor
//!                     │
//!        ┌────────────┴────────────┐
//!        ▼                         ▼
//!   WorkerPool::shared       execute_blocking
//!   execute_async            (calling thread)
//!        │                         │
//!        └────────────┬────────────┘
//!                     ▼
//!          status, headers, body ─▶ stdout
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use resilient_http::config::{load_config, validate_config, ClientConfig};
use resilient_http::observability::{init_logging, metrics};
use resilient_http::{
    ExecutionError, Method, Request, Response, RetryingExecutor, TransportRegistry, WorkerPool,
};

#[derive(Parser)]
#[command(name = "resilient-http")]
#[command(about = "Send an HTTP request with retries and exponential backoff", long_about = None)]
struct Cli {
    /// Target URL (http or https).
    url: String,

    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Request method.
    #[arg(short = 'X', long, default_value = "GET")]
    method: Method,

    /// Request header as `name: value`; may be repeated.
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Request body.
    #[arg(short, long)]
    data: Option<String>,

    /// Transport backend, overriding the config file.
    #[arg(short, long)]
    backend: Option<String>,

    /// Maximum attempts, overriding the config file.
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Run on the calling thread instead of the worker pool.
    #[arg(long)]
    blocking: bool,

    /// Print response headers.
    #[arg(short, long)]
    include: bool,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected 'name: value', got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing header name in '{raw}'"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Request failed");
            eprintln!("error: {err}");
            let mut source = std::error::Error::source(err.as_ref());
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    if let Some(backend) = &cli.backend {
        config.transport.backend = backend.clone();
    }
    if let Some(max_attempts) = cli.max_attempts {
        config.retries.max_attempts = max_attempts;
    }
    if let Err(errors) = validate_config(&config) {
        let joined = errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(", ");
        return Err(format!("invalid configuration: {joined}").into());
    }

    if let Err(err) = init_logging(&config.observability) {
        eprintln!("warning: logging not initialized: {err}");
    }
    metrics::set_enabled(config.observability.metrics_enabled);

    tracing::info!(
        backend = %config.transport.backend,
        max_attempts = config.retries.max_attempts,
        "resilient-http v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let executor = RetryingExecutor::from_config(&config, &TransportRegistry::with_defaults())?;

    let mut builder = Request::builder(cli.method, &cli.url);
    for (name, value) in &cli.headers {
        builder = builder.header(name, value);
    }
    if let Some(data) = cli.data {
        builder = builder.body(data);
    }
    let request = builder.build()?;

    let response = if cli.blocking {
        executor.execute_blocking(request)?
    } else {
        // from_config started the shared pool from `[worker_pool]`
        let pool = WorkerPool::shared()?;
        pool.block_on(async {
            let response = executor.execute_async(request).await?;
            response.into_buffered().await.map_err(ExecutionError::Body)
        })?
    };

    print_response(response, cli.include)?;
    Ok(())
}

fn print_response(response: Response, include_headers: bool) -> std::io::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if include_headers {
        writeln!(out, "{}", response.status())?;
        for (name, value) in response.headers() {
            writeln!(out, "{}: {}", name, String::from_utf8_lossy(value.as_bytes()))?;
        }
        writeln!(out)?;
    } else if !response.status().is_success() {
        eprintln!("status: {}", response.status());
    }

    if let Some(body) = response.body().as_bytes() {
        out.write_all(body)?;
        if !body.ends_with(b"\n") && !body.is_empty() {
            writeln!(out)?;
        }
    }
    out.flush()
}
