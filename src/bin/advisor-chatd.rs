use advisor_chat::config::ProxyConfig;
use advisor_chat::error::Result;
use advisor_chat::proxy;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "advisor-chatd")]
#[command(about = "Completion proxy and static page server for the advisor chat")]
#[command(version, long_version = env!("ADVISOR_LONG_VERSION"))]
struct Cli {
    #[command(flatten)]
    proxy: ProxyConfig,
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("Could not listen for shutdown signal: {err}");
        futures::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    advisor_chat::logging::init_tracing("advisor_chatd");
    let cli = Cli::parse();

    proxy::run_with_shutdown(cli.proxy, shutdown_signal()).await
}
