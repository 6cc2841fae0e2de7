use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let http_port = std::env::var("TASKGATE_HTTP_PORT").unwrap_or_else(|_| "8787".to_string());
    let config_path = std::env::var("TASKGATE_CONFIG").unwrap_or_else(|_| "<builtin roles>".to_string());
    info!(
        target: "taskgate",
        "taskgate starting: RUST_LOG='{}', http_port={}, config='{}'",
        rust_log, http_port, config_path
    );

    taskgate::server::run().await
}
