use anyhow::{Context, Result};
use clap::Parser;
use sqlward::config::Settings;
use sqlward::generator::{SqlGeneratorService, DEFAULT_BASE_PROMPT};
use sqlward::guard::ValidationOutcome;
use sqlward::llm::{HttpLlmClient, LlmClient};
use sqlward::log_store::GenerationLogStore;
use sqlward::retrieval::{CharNgramEmbedder, Embedder, RetrievalEngine};
use sqlward::schema::SchemaRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "sqlward")]
#[command(about = "Safety-gated natural-language-to-SQL generation")]
struct Args {
    /// The natural-language question
    #[arg(required_unless_present = "check_sql")]
    question: Option<String>,

    /// Path to the allowed-schema JSON file
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Path to the generation log database
    #[arg(long)]
    log_db: Option<PathBuf>,

    /// Enable the operator/function/keyword linter stage
    #[arg(long)]
    lint: bool,

    /// Validate an already-generated SQL statement and exit (no LLM call)
    #[arg(long, value_name = "SQL")]
    check_sql: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut settings = Settings::from_env()?;
    if let Some(path) = args.schema {
        settings.schema_path = path;
    }
    if let Some(path) = args.log_db {
        settings.log_db_path = path;
    }
    if args.lint {
        settings.enable_linter = true;
    }

    let registry = SchemaRegistry::load(&settings.schema_path)?;
    let log = Arc::new(GenerationLogStore::open(&settings.log_db_path)?);

    let pairs = log.history_pairs(settings.seed_limit).unwrap_or_else(|e| {
        warn!("failed to read seed history, starting empty: {}", e);
        Vec::new()
    });
    let embedder: Arc<dyn Embedder> = Arc::new(CharNgramEmbedder::new(settings.embedding_dimension));
    let retrieval = RetrievalEngine::seeded(embedder, pairs).await?;
    info!("retrieval engine ready with {} exemplars", retrieval.len());

    let llm: Arc<dyn LlmClient> = Arc::new(HttpLlmClient::new(
        settings.api_key.clone(),
        settings.base_url.clone(),
        settings.model.clone(),
    ));
    let base_prompt = match &settings.prompt_path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read prompt file {}", path.display()))?,
        None => DEFAULT_BASE_PROMPT.to_string(),
    };

    let service = SqlGeneratorService::new(
        registry.schema(),
        retrieval,
        llm,
        log,
        base_prompt,
        settings.enable_linter,
    );

    if let Some(sql) = args.check_sql {
        match service.check_sql(&sql) {
            ValidationOutcome::Passed => println!("passed"),
            ValidationOutcome::Rejected { reason } => println!("rejected: {}", reason),
        }
        return Ok(());
    }

    let question = args.question.context("a question is required")?;
    let response = service.generate(&question).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
