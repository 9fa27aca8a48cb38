//! Generation pipeline: guard, retrieve, prompt, LLM, gate, log, append.
//!
//! Orchestrates the whole flow for one question. The text guard gates
//! entry, the retrieval engine primes the prompt with similar historical
//! exemplars, and the SQL gate stands between the model's output and the
//! caller. Every attempt leaves an audit row; a pair that survives the
//! gate is appended to the exemplar store.

use crate::error::Result;
use crate::guard::{
    SelectStructureValidator, SqlGuard, SqlLinter, StatementSummary, TextGuard, ValidationOutcome,
};
use crate::llm::LlmClient;
use crate::log_store::{GenerationLogStore, GenerationRecord};
use crate::retrieval::{RetrievalEngine, RetrievalMatch};
use crate::schema::AllowedSchema;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_BASE_PROMPT: &str = "\
You translate natural-language questions about a clinical database into a \
single SQL SELECT statement. Only reference tables and columns from the \
allowed schema. Reply with exactly one line, either `sql: <statement>` or \
`error: <explanation>`.";

/// Exactly one side is populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub sql: Option<String>,
    pub error: Option<String>,
}

impl GenerationResponse {
    fn rejected(reason: String) -> Self {
        Self {
            sql: None,
            error: Some(reason),
        }
    }
}

pub struct SqlGeneratorService {
    text_guard: TextGuard,
    sql_guard: SqlGuard,
    structure: SelectStructureValidator,
    linter: Option<SqlLinter>,
    retrieval: RetrievalEngine,
    llm: Arc<dyn LlmClient>,
    log: Arc<GenerationLogStore>,
    base_prompt: String,
}

impl SqlGeneratorService {
    pub fn new(
        schema: Arc<AllowedSchema>,
        retrieval: RetrievalEngine,
        llm: Arc<dyn LlmClient>,
        log: Arc<GenerationLogStore>,
        base_prompt: String,
        enable_linter: bool,
    ) -> Self {
        Self {
            text_guard: TextGuard::new(),
            sql_guard: SqlGuard::new(schema),
            structure: SelectStructureValidator::new(),
            linter: enable_linter.then(SqlLinter::new),
            retrieval,
            llm,
            log,
            base_prompt,
        }
    }

    /// Run the full pipeline for one question.
    pub async fn generate(&self, text: &str) -> Result<GenerationResponse> {
        let input_received_at = Utc::now().to_rfc3339();

        let outcome = self.text_guard.validate(text);
        let filter_completed_at = Utc::now().to_rfc3339();
        if let ValidationOutcome::Rejected { reason } = outcome {
            warn!("input rejected by text guard: {}", reason);
            self.write_audit(GenerationRecord {
                input_received_at,
                user_input_text: text.to_string(),
                filter_status: "rejected".to_string(),
                filter_reason: Some(reason.clone()),
                filter_completed_at: Some(filter_completed_at),
                ..Default::default()
            });
            return Ok(GenerationResponse::rejected(reason));
        }

        let matches = self.retrieval.search_default(text).await?;
        let prompt = self.render_prompt(text, &matches);

        let llm_requested_at = Utc::now().to_rfc3339();
        let reply = match self.llm.generate_sql(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                self.write_audit(GenerationRecord {
                    input_received_at,
                    user_input_text: text.to_string(),
                    filter_status: "passed".to_string(),
                    filter_completed_at: Some(filter_completed_at),
                    llm_requested_at: Some(llm_requested_at),
                    validation_reason: Some(e.to_string()),
                    model_name: Some(self.llm.model_name().to_string()),
                    ..Default::default()
                });
                return Err(e);
            }
        };
        let llm_responded_at = Utc::now().to_rfc3339();

        let mut record = GenerationRecord {
            input_received_at,
            user_input_text: text.to_string(),
            filter_status: "passed".to_string(),
            filter_completed_at: Some(filter_completed_at),
            llm_requested_at: Some(llm_requested_at),
            llm_responded_at: Some(llm_responded_at),
            model_name: Some(self.llm.model_name().to_string()),
            ..Default::default()
        };

        if let Some(error) = reply.error {
            record.validation_reason = Some(error.clone());
            self.write_audit(record);
            return Ok(GenerationResponse::rejected(error));
        }

        let sql = match reply.sql {
            Some(sql) => sql,
            None => {
                let reason = "model reply contained neither sql nor error".to_string();
                record.validation_reason = Some(reason.clone());
                self.write_audit(record);
                return Ok(GenerationResponse::rejected(reason));
            }
        };

        record.generated_sql = Some(sql.clone());
        if let ValidationOutcome::Rejected { reason } = self.check_sql(&sql) {
            warn!("generated SQL rejected: {}", reason);
            record.validation_reason = Some(reason.clone());
            self.write_audit(record);
            return Ok(GenerationResponse::rejected(reason));
        }

        self.write_audit(record);
        info!("generated SQL passed the gate");

        // The SQL already passed and will be returned; a failed exemplar
        // append must not fail the request.
        if let Err(e) = self.retrieval.append(text, &sql).await {
            warn!("exemplar append failed: {}", e);
        }

        Ok(GenerationResponse {
            sql: Some(sql),
            error: None,
        })
    }

    /// The composed SQL gate: allow-list guard, structure check, then the
    /// linter when enabled. Also the executor-side entry point for SQL
    /// that arrives from elsewhere.
    pub fn check_sql(&self, sql: &str) -> ValidationOutcome {
        let summary = match StatementSummary::parse(sql) {
            Ok(summary) => summary,
            Err(e) => {
                return ValidationOutcome::rejected(e.to_string());
            }
        };

        let outcome = self.sql_guard.validate_summary(&summary);
        if !outcome.is_passed() {
            return outcome;
        }

        let outcome = self.structure.validate(&summary);
        if !outcome.is_passed() {
            return outcome;
        }

        match &self.linter {
            Some(linter) => linter.validate(sql),
            None => ValidationOutcome::Passed,
        }
    }

    pub fn exemplar_count(&self) -> usize {
        self.retrieval.len()
    }

    fn render_prompt(&self, question: &str, matches: &[RetrievalMatch]) -> String {
        let mut prompt = self.base_prompt.clone();
        if !matches.is_empty() {
            prompt.push_str("\n<EXAMPLE>\n");
            for m in matches {
                prompt.push_str(&format!("query : {}, sql : {}\n", m.query, m.sql));
            }
            prompt.push_str("</EXAMPLE>\n");
            prompt.push_str(
                "Please use the above example for reference only and do not include it in your answer.\n",
            );
        }
        prompt.push_str(&format!("\nQuestion: {}\n", question));
        prompt
    }

    fn write_audit(&self, record: GenerationRecord) {
        if let Err(e) = self.log.record(&record) {
            warn!("failed to write generation log: {}", e);
        }
    }
}
