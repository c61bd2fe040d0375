use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use dialoguer::Input;

use candor_core::config::Config;
use candor_core::context::ContextBuilder;
use candor_core::generator::Generator;
use candor_core::history::Session;
use candor_core::judge::Judge;
use candor_core::pipeline::{Confidence, PipelineController, PipelineResult, RetryPolicy};
use candor_core::router::Router;
use candor_index::indexer::{CorpusIndexer, IndexerConfig};
use candor_index::{ChunkStore, RetrievalConfig, Retriever};
use candor_llm::openai::OpenAiProvider;

#[derive(Parser)]
#[command(name = "candor", version, about = "Grounded Q&A over an indexed code corpus")]
struct Cli {
    /// Path to the config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Walk the corpus, embed its chunks, and write the index snapshot.
    Index,
    /// Answer a single question and exit.
    Query { question: String },
    /// Interactive question loop with conversation history.
    Interactive,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config);
    let config = Config::load(&config_path)?;
    config.validate()?;

    match cli.command {
        Command::Index => index(&config).await,
        Command::Query { question } => {
            let controller = build_controller(&config)?;
            let mut session = Session::new(config.context.max_history_turns);
            let result = controller.run(&question, &mut session).await?;
            print_result(&result);
            Ok(())
        }
        Command::Interactive => interactive(&config).await,
    }
}

fn resolve_config_path(cli_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli_path {
        return path;
    }
    if let Ok(path) = std::env::var("CANDOR_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

fn build_provider(config: &Config) -> anyhow::Result<OpenAiProvider> {
    let api_key = std::env::var(&config.llm.api_key_env)
        .with_context(|| format!("{} not set", config.llm.api_key_env))?;
    Ok(OpenAiProvider::new(
        api_key,
        config.llm.base_url.clone(),
        config.llm.model.clone(),
        config.llm.max_tokens,
        Some(config.llm.embedding_model.clone()),
        Duration::from_secs(config.llm.timeout_secs),
    ))
}

async fn index(config: &Config) -> anyhow::Result<()> {
    let provider = Arc::new(build_provider(config)?);
    let index_path = Path::new(&config.corpus.index_path);

    let mut store = if index_path.exists() {
        ChunkStore::load(index_path)?
    } else {
        ChunkStore::new(&config.llm.embedding_model)
    };

    let indexer = CorpusIndexer::new(provider, IndexerConfig::default());
    let report = indexer
        .index_corpus(Path::new(&config.corpus.path), &mut store)
        .await?;
    store.save(index_path)?;

    println!(
        "Indexed {} file(s): {} chunk(s) embedded, {} unchanged, in {} ms.",
        report.files_indexed, report.chunks_created, report.chunks_skipped, report.duration_ms
    );
    println!("Index written to {}", index_path.display());
    Ok(())
}

fn build_controller(config: &Config) -> anyhow::Result<PipelineController<OpenAiProvider>> {
    let provider = Arc::new(build_provider(config)?);

    let index_path = Path::new(&config.corpus.index_path);
    let store = Arc::new(ChunkStore::load(index_path).with_context(|| {
        format!(
            "no index at {} (run `candor index` first)",
            index_path.display()
        )
    })?);

    let retriever = Retriever::new(
        store,
        provider.clone(),
        RetrievalConfig {
            top_k: config.retrieval.top_k,
            min_score: config.retrieval.min_score,
        },
    );
    let generator = Generator::new(provider.clone(), config.corpus.name.clone());

    let policy = RetryPolicy {
        max_retries: config.retry.max_retries,
        retry_threshold: config.judge.retry_threshold,
        allow_no_evidence: config.retry.allow_no_evidence,
        re_retrieve: config.retry.re_retrieve,
    };

    let mut controller = PipelineController::new(
        retriever,
        ContextBuilder::new(config.context.clone()),
        generator,
    )
    .with_policy(policy)
    .with_accept_threshold(config.judge.accept_threshold);

    if config.router.enabled {
        let router_provider = Arc::new(provider.with_model(config.router_model()));
        controller =
            controller.with_router(Router::new(router_provider, config.corpus.name.clone()));
    }
    if config.judge.enabled {
        let judge_provider = Arc::new(provider.with_model(config.judge_model()));
        controller = controller.with_judge(Judge::new(judge_provider));
    }

    Ok(controller)
}

async fn interactive(config: &Config) -> anyhow::Result<()> {
    let controller = build_controller(config)?;
    let mut session = Session::new(config.context.max_history_turns);

    println!(
        "candor v{} - ask about {}",
        env!("CARGO_PKG_VERSION"),
        config.corpus.name
    );
    println!("Type 'exit' or press ctrl-c to quit.\n");

    loop {
        let question: String = match Input::new().with_prompt("you").interact_text() {
            Ok(q) => q,
            Err(_) => break,
        };
        let question = question.trim().to_string();
        if question.is_empty() {
            continue;
        }
        if question == "exit" || question == "quit" {
            break;
        }

        match controller.run(&question, &mut session).await {
            Ok(result) => print_result(&result),
            Err(e) => eprintln!("error: {e:#}"),
        }
        println!();
    }

    Ok(())
}

fn print_result(result: &PipelineResult) {
    println!("\n{}", result.answer);

    if result.rejected {
        return;
    }
    if !result.citations.is_empty() {
        println!("\nSources:");
        for citation in &result.citations {
            println!("  {citation}");
        }
    }
    if let Some(score) = result.judge_score {
        let confidence = result.confidence.map_or("unknown", |c| match c {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        });
        println!("\nConfidence: {confidence} (judge score {score}/6)");
    }
    if result.retries_used > 0 {
        println!(
            "Answer was regenerated {} time(s) after judge feedback.",
            result.retries_used
        );
    }
    if !result.citations_valid {
        println!("Warning: the answer cites no sources; treat it with caution.");
    }
}
