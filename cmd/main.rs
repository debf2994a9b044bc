use favorites_bridge::config::ConfigSources;
use favorites_bridge::error::Result;
use favorites_bridge::server::BridgeServer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let server = BridgeServer::new(ConfigSources::default());

    info!("Starting favorites bridge");

    server.run().await
}
