use site_dashboard::config::AppConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = site_dashboard::run(AppConfig::from_env()).await {
        tracing::error!(%error, "dashboard exited with error");
        std::process::exit(1);
    }
}
