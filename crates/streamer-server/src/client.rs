//! Command-line subscriber for the `Streamer` service.
//!
//! Opens one subscription and prints every received event as a JSON line on
//! stdout. Exits successfully when the server closes the stream cleanly and
//! with an error when the stream ends with a failure status.

use anyhow::Context;
use clap::Parser;
use streamer_core::{
    event::Event,
    proto::{StreamRequest, streamer_client::StreamerClient},
};
use tonic::codec::CompressionEncoding;

#[derive(Parser, Debug)]
#[command(
    name = "streamer-client",
    version,
    about = "Subscribe to a streamer server and print its events"
)]
struct ClientArgs {
    /// Server endpoint.
    ///
    /// Environment variable: `STREAMER_ENDPOINT`
    #[arg(long, env = "STREAMER_ENDPOINT", default_value_t = String::from("http://127.0.0.1:50051"))]
    endpoint: String,

    /// Identifier sent with the subscription.
    ///
    /// Environment variable: `STREAMER_CLIENT_ID`
    #[arg(long, env = "STREAMER_CLIENT_ID", default_value_t = String::from("streamer-client"))]
    client_id: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = ClientArgs::parse();

    let mut client = StreamerClient::connect(args.endpoint.clone())
        .await
        .with_context(|| format!("failed to connect to {}", args.endpoint))?
        .accept_compressed(CompressionEncoding::Zstd);

    let mut stream = client
        .subscribe(StreamRequest {
            client_id: args.client_id,
        })
        .await
        .context("subscription refused")?
        .into_inner();

    while let Some(wire) = stream.message().await.context("stream failed")? {
        let event = Event::try_from(wire)?;
        println!("{}", serde_json::to_string(&event)?);
    }

    Ok(())
}
