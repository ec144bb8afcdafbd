use clap::Parser;
use hellogate::client::{create_sender, HelloClient};
use hellogate::config::{ClientArgs, ClientConfig};
use hellogate::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ClientArgs::parse();
    let config = ClientConfig::load(&args)?;

    if args.validate {
        println!("Configuration is valid.");
        return Ok(());
    }

    telemetry::init_telemetry(&config.log)?;

    tracing::debug!(transport = ?config.transport, "Creating sender");

    let sender = create_sender(&config).await?;
    HelloClient::new(sender, &config).run().await?;

    Ok(())
}
