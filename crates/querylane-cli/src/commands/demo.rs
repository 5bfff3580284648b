//! The routed demo: the full workload through the bin layer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Args;

use querylane_clients::{
    close_embedding_client, global_embedder, init_embedding_client, GeminiClient, GeminiConfig,
    PineconeClient, PineconeConfig,
};
use querylane_core::config::{BatchConfig, EnvConfig, RouterConfig};
use querylane_core::traits::LlmClient;
use querylane_router::Router;

use super::{rule, DEMO_QUERIES};

#[derive(Args)]
pub struct DemoArgs {
    /// Upper bound on the number of bins
    #[arg(long, default_value_t = 100)]
    max_bins: usize,

    /// Minimum cosine similarity to join an existing bin
    #[arg(long, default_value_t = 0.7)]
    threshold: f32,

    /// Queue length that triggers an immediate flush
    #[arg(long, default_value_t = 6)]
    batch_size: usize,

    /// Longest a buffered query may wait, in milliseconds
    #[arg(long, default_value_t = 500)]
    max_wait_ms: u64,

    /// Per-query deadline, in seconds
    #[arg(long, default_value_t = 10)]
    query_timeout_secs: u64,
}

pub async fn run(args: DemoArgs) -> anyhow::Result<()> {
    let env = EnvConfig::from_env();
    env.validate().context("invalid environment")?;

    println!(
        "Connecting to embedding server at {}...",
        env.embedding_server_addr
    );
    init_embedding_client(&env.embedding_server_addr)
        .await
        .context("failed to initialize embedding client")?;
    let embedder = global_embedder().context("embedding client unavailable")?;
    println!("Connected to embedding server");

    println!("Connecting to Pinecone index {}...", env.pinecone_index);
    let store = PineconeClient::connect(PineconeConfig::from_env_config(&env))
        .await
        .context("failed to initialize Pinecone client")?;
    println!("Pinecone client initialized");

    let llm: Option<Arc<dyn LlmClient>> = match GeminiConfig::from_env() {
        Some(config) => {
            println!("LLM composition enabled ({})", config.model);
            Some(Arc::new(GeminiClient::new(config)?))
        }
        None => {
            println!("GEMINI_API_KEY not set, returning raw match payloads");
            None
        }
    };

    let router = Arc::new(Router::new(
        embedder,
        Arc::new(store),
        llm,
        RouterConfig {
            max_bins: args.max_bins,
            grouping_threshold: args.threshold,
            batch: BatchConfig {
                max_batch_size: args.batch_size,
                max_wait: Duration::from_millis(args.max_wait_ms),
                top_k: 5,
            },
        },
    )?);

    let line = rule();
    println!("\n{line}");
    println!(
        "Processing {} queries to test similarity grouping...",
        DEMO_QUERIES.len()
    );
    println!("{line}\n");

    let query_timeout = Duration::from_secs(args.query_timeout_secs);
    let started = Instant::now();

    let tasks: Vec<_> = DEMO_QUERIES
        .iter()
        .map(|&text| {
            let router = Arc::clone(&router);
            tokio::spawn(async move {
                let query_start = Instant::now();
                let outcome = router.query_with_deadline(text, query_timeout).await;
                (text, outcome, query_start.elapsed())
            })
        })
        .collect();

    let gather = async {
        let mut outcomes = Vec::with_capacity(tasks.len());
        for task in tasks {
            outcomes.push(task.await.context("query task panicked")?);
        }
        anyhow::Ok(outcomes)
    };

    let outcomes = tokio::select! {
        outcomes = gather => outcomes?,
        _ = tokio::signal::ctrl_c() => {
            println!("\nReceived interrupt signal, shutting down gracefully...");
            let _ = router.close(Duration::from_secs(5)).await;
            close_embedding_client().await;
            return Ok(());
        }
    };

    let total = started.elapsed();

    // Results, in the original query order.
    println!("\n{line}");
    println!("RESULTS");
    println!("{line}");
    let mut successes = 0usize;
    for (idx, (text, outcome, elapsed)) in outcomes.iter().enumerate() {
        match outcome {
            Ok(result) => {
                successes += 1;
                println!("\n[{}] SUCCESS ({elapsed:.2?})", idx + 1);
                println!("Query: {text}");
                println!("Result: {result}");
            }
            Err(err) => {
                println!("\n[{}] FAILED ({elapsed:.2?})", idx + 1);
                println!("Query: {text}");
                println!("Error: {err}");
            }
        }
    }

    let stats = router.stats();
    println!("\n{line}");
    println!("ROUTER STATISTICS");
    println!("{line}");
    println!("Total bins created: {}", stats.num_bins);
    println!("Grouping threshold: {:.2}", stats.grouping_threshold);
    println!("Max bins allowed: {}", stats.max_bins);

    println!("\n{line}");
    println!("SUMMARY");
    println!("{line}");
    println!("Total queries: {}", DEMO_QUERIES.len());
    println!("Successful: {successes}");
    println!("Failed: {}", DEMO_QUERIES.len() - successes);
    println!("Total time: {total:.2?}");
    println!(
        "Average time per query: {:.2?}",
        total / DEMO_QUERIES.len() as u32
    );
    println!("{line}");

    router
        .close(Duration::from_secs(5))
        .await
        .context("router shutdown failed")?;
    close_embedding_client().await;

    Ok(())
}
