//! The unbatched comparison run: every query goes straight to the index.
//!
//! Same workload as `demo`, but each query embeds and searches on its own,
//! paying full per-request overhead. Timings from both runners side by
//! side show what the batching layer buys.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Args;

use querylane_clients::{
    close_embedding_client, global_embedder, init_embedding_client, GeminiClient, GeminiConfig,
    PineconeClient, PineconeConfig,
};
use querylane_core::config::EnvConfig;
use querylane_core::traits::{Embedder, LlmClient, VectorStore};
use querylane_core::types::SearchRequest;

use super::{rule, DEMO_QUERIES};

#[derive(Args)]
pub struct BaselineArgs {
    /// Results returned per query
    #[arg(long, default_value_t = 5)]
    top_k: u32,

    /// Per-query deadline, in seconds
    #[arg(long, default_value_t = 15)]
    query_timeout_secs: u64,
}

struct QueryReport {
    text: &'static str,
    outcome: anyhow::Result<String>,
    store_time: Duration,
    llm_time: Duration,
}

async fn run_one(
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    llm: Option<Arc<dyn LlmClient>>,
    text: &'static str,
    top_k: u32,
) -> QueryReport {
    let embedding = match embedder.embed(text).await {
        Ok(embedding) => embedding,
        Err(err) => {
            return QueryReport {
                text,
                outcome: Err(anyhow::anyhow!("failed to embed query: {err}")),
                store_time: Duration::ZERO,
                llm_time: Duration::ZERO,
            }
        }
    };

    let store_start = Instant::now();
    let response = store.query(SearchRequest::new(embedding, top_k)).await;
    let store_time = store_start.elapsed();

    let response = match response {
        Ok(response) => response,
        Err(err) => {
            return QueryReport {
                text,
                outcome: Err(anyhow::anyhow!("query failed: {err}")),
                store_time,
                llm_time: Duration::ZERO,
            }
        }
    };

    let (outcome, llm_time) = match llm {
        Some(llm) => {
            let mut context = String::new();
            for m in &response.matches {
                if let Some(chunk) = m.text() {
                    context.push_str(chunk);
                    context.push_str("\n\n");
                }
            }
            let prompt = format!(
                "Answer the question using only the provided context.\n\n\
                 Context:\n{context}\n\
                 Question: {text}\n\
                 Answer:"
            );
            let llm_start = Instant::now();
            let answer = llm.complete(&prompt).await;
            (
                answer.map_err(|err| anyhow::anyhow!("LLM call failed: {err}")),
                llm_start.elapsed(),
            )
        }
        None => (
            serde_json::to_string(&response.matches).map_err(Into::into),
            Duration::ZERO,
        ),
    };

    QueryReport {
        text,
        outcome,
        store_time,
        llm_time,
    }
}

pub async fn run(args: BaselineArgs) -> anyhow::Result<()> {
    let env = EnvConfig::from_env();
    env.validate().context("invalid environment")?;

    println!(
        "Connecting to embedding server at {}...",
        env.embedding_server_addr
    );
    init_embedding_client(&env.embedding_server_addr)
        .await
        .context("failed to initialize embedding client")?;
    let embedder: Arc<dyn Embedder> = global_embedder().context("embedding client unavailable")?;
    println!("Connected to embedding server");

    println!("Connecting to Pinecone index {}...", env.pinecone_index);
    let store: Arc<dyn VectorStore> = Arc::new(
        PineconeClient::connect(PineconeConfig::from_env_config(&env))
            .await
            .context("failed to initialize Pinecone client")?,
    );
    println!("Pinecone client initialized");

    let llm: Option<Arc<dyn LlmClient>> = match GeminiConfig::from_env() {
        Some(config) => Some(Arc::new(GeminiClient::new(config)?)),
        None => None,
    };

    let line = rule();
    println!("\n{line}");
    println!("Embedding and querying {} queries...", DEMO_QUERIES.len());
    println!("{line}\n");

    let timeout = Duration::from_secs(args.query_timeout_secs);
    let started = Instant::now();

    let tasks: Vec<_> = DEMO_QUERIES
        .iter()
        .map(|&text| {
            let embedder = Arc::clone(&embedder);
            let store = Arc::clone(&store);
            let llm = llm.clone();
            let top_k = args.top_k;
            tokio::spawn(async move {
                match tokio::time::timeout(timeout, run_one(embedder, store, llm, text, top_k))
                    .await
                {
                    Ok(report) => report,
                    Err(_) => QueryReport {
                        text,
                        outcome: Err(anyhow::anyhow!("deadline exceeded")),
                        store_time: Duration::ZERO,
                        llm_time: Duration::ZERO,
                    },
                }
            })
        })
        .collect();

    let mut reports = Vec::with_capacity(tasks.len());
    for task in tasks {
        reports.push(task.await.context("query task panicked")?);
    }

    let total = started.elapsed();

    println!("\n{line}");
    println!("RESULTS");
    println!("{line}");
    let mut successes = 0usize;
    for (idx, report) in reports.iter().enumerate() {
        match &report.outcome {
            Ok(result) => {
                successes += 1;
                println!("\n[{}] SUCCESS", idx + 1);
                println!("Query: {}", report.text);
                println!("Query time: {:.2?}", report.store_time);
                println!("Answer: {result}");
            }
            Err(err) => {
                println!("\n[{}] FAILED", idx + 1);
                println!("Query: {}", report.text);
                println!("Error: {err}");
            }
        }
    }

    let count = reports.len().max(1) as u32;
    let avg_store: Duration = reports.iter().map(|r| r.store_time).sum::<Duration>() / count;
    let avg_llm: Duration = reports.iter().map(|r| r.llm_time).sum::<Duration>() / count;

    println!("\n{line}");
    println!("SUMMARY");
    println!("{line}");
    println!("Total queries executed: {}", DEMO_QUERIES.len());
    println!("Successful queries: {successes}");
    println!("Failed queries: {}", DEMO_QUERIES.len() - successes);
    println!("Total time (all queries): {total:.2?}");
    println!("Average vector store query time: {avg_store:.2?}");
    println!("Average LLM call time: {avg_llm:.2?}");
    println!(
        "Average time per query: {:.2?}",
        total / DEMO_QUERIES.len() as u32
    );
    println!("{line}");

    close_embedding_client().await;
    Ok(())
}
