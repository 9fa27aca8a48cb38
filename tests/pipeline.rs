//! End-to-end generation flow with a scripted mock LLM.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sqlward::error::Result;
use sqlward::generator::{SqlGeneratorService, DEFAULT_BASE_PROMPT};
use sqlward::llm::{LlmClient, LlmReply};
use sqlward::log_store::GenerationLogStore;
use sqlward::retrieval::{CharNgramEmbedder, Embedder, RetrievalEngine};
use sqlward::schema::AllowedSchema;
use std::sync::Arc;
use std::sync::Mutex;

/// Replays a scripted list of raw model replies in order.
struct MockLlm {
    replies: Mutex<Vec<String>>,
}

impl MockLlm {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().rev().map(|s| s.to_string()).collect()),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    fn model_name(&self) -> &str {
        "mock-model"
    }

    async fn generate_sql(&self, _prompt: &str) -> Result<LlmReply> {
        let content = self
            .replies
            .lock()
            .unwrap()
            .pop()
            .expect("mock LLM ran out of scripted replies");
        LlmReply::parse(&content)
    }
}

fn schema() -> Arc<AllowedSchema> {
    Arc::new(
        AllowedSchema::from_json(
            r#"{"person": ["person_id", "name", "birth_year"], "visit": ["visit_id", "person_id"]}"#,
        )
        .unwrap(),
    )
}

async fn service_with(replies: &[&str], enable_linter: bool) -> (SqlGeneratorService, Arc<GenerationLogStore>) {
    let log = Arc::new(GenerationLogStore::in_memory().unwrap());
    let embedder: Arc<dyn Embedder> = Arc::new(CharNgramEmbedder::default());
    let retrieval = RetrievalEngine::seeded(embedder, Vec::new()).await.unwrap();
    let service = SqlGeneratorService::new(
        schema(),
        retrieval,
        Arc::new(MockLlm::new(replies)),
        Arc::clone(&log),
        DEFAULT_BASE_PROMPT.to_string(),
        enable_linter,
    );
    (service, log)
}

#[tokio::test]
async fn happy_path_returns_sql_and_grows_the_store() {
    let (service, log) = service_with(&["sql: select name from person"], false).await;
    assert_eq!(service.exemplar_count(), 1); // fallback seed

    let response = service.generate("show person names").await.unwrap();
    assert_eq!(response.sql.as_deref(), Some("select name from person"));
    assert!(response.error.is_none());

    // One audit row, and the surviving pair was appended.
    assert_eq!(log.count().unwrap(), 1);
    assert_eq!(service.exemplar_count(), 2);

    let pairs = log.history_pairs(50).unwrap();
    assert_eq!(
        pairs,
        vec![("show person names".to_string(), "select name from person".to_string())]
    );
}

#[tokio::test]
async fn text_guard_rejection_skips_the_llm() {
    // No scripted reply: reaching the LLM would panic the mock.
    let (service, log) = service_with(&[], false).await;

    let response = service.generate("hi").await.unwrap();
    assert!(response.sql.is_none());
    assert_eq!(
        response.error.as_deref(),
        Some("Input text must be between 5 and 500 characters")
    );

    assert_eq!(log.count().unwrap(), 1);
    assert_eq!(service.exemplar_count(), 1); // nothing appended
}

#[tokio::test]
async fn unauthorized_sql_from_the_model_is_gated() {
    let (service, log) = service_with(&["sql: select secret from hidden_table"], false).await;

    let response = service.generate("show hidden things").await.unwrap();
    assert!(response.sql.is_none());
    assert_eq!(
        response.error.as_deref(),
        Some("Unauthorized tables: hidden_table")
    );

    assert_eq!(log.count().unwrap(), 1);
    assert_eq!(service.exemplar_count(), 1);
}

#[tokio::test]
async fn ddl_from_the_model_is_gated() {
    let (service, _log) = service_with(&["sql: drop table person"], false).await;
    let response = service.generate("remove person records").await.unwrap();
    assert_eq!(
        response.error.as_deref(),
        Some("DDL statements are not allowed (CREATE, DROP, ALTER, TRUNCATE)")
    );
}

#[tokio::test]
async fn model_error_replies_pass_through() {
    let (service, log) = service_with(&["error: question is unrelated to the schema"], false).await;
    let response = service.generate("what is the weather").await.unwrap();
    assert_eq!(
        response.error.as_deref(),
        Some("question is unrelated to the schema")
    );
    assert_eq!(log.count().unwrap(), 1);
}

#[tokio::test]
async fn successful_pairs_steer_later_retrieval() {
    let (service, _log) = service_with(
        &[
            "sql: select birth_year from person",
            "sql: select name from person",
        ],
        false,
    )
    .await;

    service.generate("show person birth years").await.unwrap();
    service.generate("show person names").await.unwrap();
    assert_eq!(service.exemplar_count(), 3);
}

#[tokio::test]
async fn check_sql_applies_the_composed_gate() {
    let (service, _log) = service_with(&[], false).await;
    assert!(service.check_sql("select name from person").is_passed());
    assert!(!service.check_sql("select * from ghost_table").is_passed());
    assert!(!service.check_sql("select name from person; select 1").is_passed());

    // The structure check is always active.
    let outcome = service.check_sql("select 1");
    assert_eq!(outcome.reason(), Some("SELECT statement has no FROM clause"));
}

#[tokio::test]
async fn linter_is_composed_only_when_enabled() {
    let (lenient, _) = service_with(&[], false).await;
    assert!(lenient
        .check_sql("select name from person where name != 'kim'")
        .is_passed());

    let (strict, _) = service_with(&[], true).await;
    let outcome = strict.check_sql("select name from person where name != 'kim'");
    assert_eq!(outcome.reason(), Some("Forbidden operator: '!='"));
}

#[tokio::test]
async fn randomized_append_sequences_keep_store_and_index_aligned() {
    let embedder: Arc<dyn Embedder> = Arc::new(CharNgramEmbedder::default());
    let engine = RetrievalEngine::seeded(embedder, Vec::new()).await.unwrap();

    let mut rng = StdRng::seed_from_u64(7);
    let mut expected = 1; // fallback seed
    for round in 0..100 {
        if rng.gen_bool(0.7) {
            engine
                .append(
                    &format!("question number {}", round),
                    &format!("select {} from person", round),
                )
                .await
                .unwrap();
            expected += 1;
        } else {
            let k = rng.gen_range(0..5);
            let matches = engine
                .search("question number 0", k, f32::MAX)
                .await
                .unwrap();
            assert!(matches.len() <= k.min(expected));
        }
        assert_eq!(engine.len(), expected);
    }

    // Every stored exemplar is still reachable, in ascending distance order.
    let matches = engine.search("question number 3", expected, f32::MAX).await.unwrap();
    assert_eq!(matches.len(), expected);
    for pair in matches.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }
    assert_eq!(matches[0].query, "question number 3");
}
