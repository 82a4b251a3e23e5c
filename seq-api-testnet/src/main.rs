use anyhow::Result;
use clap::Parser;
use seq_api_testnet::MockSeqServer;

#[derive(Parser, Debug)]
struct Cli {
    /// Port to listen on; random when 0.
    #[clap(long, default_value_t = 5341)]
    port: u16,

    /// Require this API key on everything but the root resource.
    #[clap(long, env = "SEQ_API_KEY")]
    api_key: Option<String>,

    /// Number of sample events to ingest at startup.
    #[clap(long, default_value_t = 3)]
    sample_events: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter("seq_api_testnet=debug,seq_api=debug,tower_http=debug".to_string())
        .init();

    let mut builder = MockSeqServer::builder().port(args.port);
    if let Some(key) = args.api_key {
        builder = builder.api_key(key);
    }
    let server = builder.start().await?;

    for n in 1..=args.sample_events {
        server.log("Information", &format!("Sample event {n}"));
    }

    tracing::info!("Mock Seq server running");
    tracing::info!("Root: {}api", server.base_url());
    tracing::info!("Events: {}", server.event_count());

    tokio::signal::ctrl_c().await?;
    drop(server);

    Ok(())
}
