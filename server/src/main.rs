mod config;
mod kinds;
mod services;

use clap::Parser;
use config::Config;
use protobuf::jobs_server::JobsServer;
use services::jobservice::JobService;
use std::net::SocketAddr;
use std::path::Path;
use tonic::transport::Server;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG overrides the default of info
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::parse();
    let output_root = config.output_root()?;
    serve(config.addr, &output_root).await
}

async fn serve(addr: SocketAddr, output_root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let registry = kinds::registry(output_root);
    let kind_names: Vec<_> = registry.names().map(str::to_string).collect();
    let job_service = JobService::new(registry);

    info!(%addr, output_root = %output_root.display(), kinds = ?kind_names, "listening");
    Server::builder()
        .add_service(JobsServer::new(job_service))
        .serve(addr)
        .await?;

    Ok(())
}
