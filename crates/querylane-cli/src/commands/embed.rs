//! One-shot embedding round trip, for checking the service is reachable.

use anyhow::Context;
use clap::Args;

use querylane_clients::EmbeddingClient;
use querylane_core::config::EnvConfig;

#[derive(Args)]
pub struct EmbedArgs {
    /// Prompt to embed
    #[arg(long, default_value = "Random Prompt")]
    prompt: String,
}

pub async fn run(args: EmbedArgs) -> anyhow::Result<()> {
    let env = EnvConfig::from_env();

    println!(
        "Connecting to embedding server at {}...",
        env.embedding_server_addr
    );
    let client = EmbeddingClient::connect(&env.embedding_server_addr)
        .await
        .context("failed to create client")?;
    println!("Connected to embedding server");

    println!("Generating embedding for prompt: {}", args.prompt);
    let embedding = client
        .get_embedding(&args.prompt)
        .await
        .context("failed to get embedding")?;

    let head = &embedding[..embedding.len().min(5)];
    println!("Dimension: {}", embedding.len());
    println!("Resulting embedding (first {}): {head:?}", head.len());

    Ok(())
}
