//! SQL guard applied to LLM-generated SQL before execution.
//!
//! Steps run in a fixed order and the first failing step wins; within a
//! step every offending name is collected into one sorted reason string,
//! so a statement touching three unknown tables reports all three.

use crate::error::WardError;
use crate::guard::ast::{StatementKind, StatementSummary};
use crate::guard::ValidationOutcome;
use crate::schema::AllowedSchema;
use std::sync::Arc;

/// Allow-list and statement-kind validation for one SQL statement.
pub struct SqlGuard {
    schema: Arc<AllowedSchema>,
    /// Enables the optional `SELECT *` / `SELECT INTO` rules.
    check_projection: bool,
}

impl SqlGuard {
    pub fn new(schema: Arc<AllowedSchema>) -> Self {
        Self {
            schema,
            check_projection: false,
        }
    }

    pub fn with_projection_rules(mut self) -> Self {
        self.check_projection = true;
        self
    }

    pub fn validate(&self, sql: &str) -> ValidationOutcome {
        let summary = match StatementSummary::parse(sql) {
            Ok(summary) => summary,
            Err(WardError::Syntax(message)) => {
                return ValidationOutcome::rejected(format!("SQL syntax error: {}", message));
            }
            Err(other) => {
                return ValidationOutcome::rejected(other.to_string());
            }
        };
        self.validate_summary(&summary)
    }

    /// Validation over an already-extracted summary; `validate` is the
    /// string-input entry point.
    pub fn validate_summary(&self, summary: &StatementSummary) -> ValidationOutcome {
        let invalid_tables: Vec<&str> = summary
            .tables
            .iter()
            .filter(|table| !self.schema.contains_table(table))
            .map(String::as_str)
            .collect();
        if !invalid_tables.is_empty() {
            return ValidationOutcome::rejected(format!(
                "Unauthorized tables: {}",
                invalid_tables.join(", ")
            ));
        }

        let invalid_columns: Vec<String> = summary
            .columns
            .iter()
            .filter(|column| !self.column_is_allowed(column))
            .map(|column| column.label())
            .collect();
        if !invalid_columns.is_empty() {
            return ValidationOutcome::rejected(format!(
                "Unauthorized columns: {}",
                invalid_columns.join(", ")
            ));
        }

        if matches!(
            summary.kind,
            StatementKind::Insert | StatementKind::Update | StatementKind::Delete
        ) {
            return ValidationOutcome::rejected(
                "DML statements are not allowed (INSERT, UPDATE, DELETE)",
            );
        }

        if matches!(
            summary.kind,
            StatementKind::Create | StatementKind::Drop | StatementKind::Alter | StatementKind::Truncate
        ) {
            return ValidationOutcome::rejected(
                "DDL statements are not allowed (CREATE, DROP, ALTER, TRUNCATE)",
            );
        }

        if self.check_projection {
            if summary.selects.iter().any(|facts| facts.has_wildcard) {
                return ValidationOutcome::rejected("SELECT * is not allowed");
            }
            if summary.selects.iter().any(|facts| facts.has_into) {
                return ValidationOutcome::rejected("SELECT INTO is not allowed");
            }
        }

        ValidationOutcome::Passed
    }

    /// Qualified references need the column in that specific table's set;
    /// unqualified references need it in at least one allowed table.
    fn column_is_allowed(&self, column: &crate::guard::ast::ColumnRef) -> bool {
        match &column.table {
            Some(table) => self
                .schema
                .table_columns(table)
                .map(|columns| columns.contains(&column.column))
                .unwrap_or(false),
            None => self.schema.column_in_any_table(&column.column),
        }
    }
}

/// Rejects structurally incomplete SELECT statements. Always active and
/// independent of the allow-list guard; non-SELECT shapes pass untouched.
pub struct SelectStructureValidator;

impl SelectStructureValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, summary: &StatementSummary) -> ValidationOutcome {
        if let Some(facts) = &summary.top_select {
            if facts.projection_count == 0 {
                return ValidationOutcome::rejected("SELECT statement has no output columns");
            }
            if !facts.has_from {
                return ValidationOutcome::rejected("SELECT statement has no FROM clause");
            }
        }
        ValidationOutcome::Passed
    }
}

impl Default for SelectStructureValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::ast::SelectFacts;
    use std::collections::BTreeSet;

    fn schema() -> Arc<AllowedSchema> {
        Arc::new(
            AllowedSchema::from_json(
                r#"{"person": ["person_id", "name", "id"], "visit": ["visit_id", "person_id"]}"#,
            )
            .unwrap(),
        )
    }

    fn guard() -> SqlGuard {
        SqlGuard::new(schema())
    }

    #[test]
    fn allowed_select_passes() {
        assert_eq!(
            guard().validate("SELECT name FROM person"),
            ValidationOutcome::Passed
        );
    }

    #[test]
    fn qualified_columns_are_checked_per_table() {
        assert_eq!(
            guard().validate("SELECT person.name FROM person"),
            ValidationOutcome::Passed
        );
        let outcome = guard().validate("SELECT visit.name FROM visit");
        assert_eq!(outcome.reason(), Some("Unauthorized columns: visit.name"));
    }

    #[test]
    fn unknown_table_is_reported_by_name() {
        let outcome = guard().validate("SELECT x FROM ghost_table");
        assert_eq!(
            outcome.reason(),
            Some("Unauthorized tables: ghost_table")
        );
    }

    #[test]
    fn all_unknown_tables_are_reported_together() {
        let outcome = guard().validate(
            "SELECT person_id FROM zombie_table JOIN ghost_table ON zombie_table.person_id = ghost_table.person_id",
        );
        assert_eq!(
            outcome.reason(),
            Some("Unauthorized tables: ghost_table, zombie_table")
        );
    }

    #[test]
    fn all_unknown_columns_are_reported_together() {
        let outcome = guard().validate("SELECT person.salary, password FROM person");
        assert_eq!(
            outcome.reason(),
            Some("Unauthorized columns: password, person.salary")
        );
    }

    #[test]
    fn dml_is_rejected_even_with_valid_names() {
        for sql in [
            "INSERT INTO person (name) VALUES ('kim')",
            "UPDATE person SET name = 'kim'",
            "DELETE FROM person",
        ] {
            let outcome = guard().validate(sql);
            assert_eq!(
                outcome.reason(),
                Some("DML statements are not allowed (INSERT, UPDATE, DELETE)"),
                "for {:?}",
                sql
            );
        }
    }

    #[test]
    fn ddl_is_rejected() {
        for sql in [
            "DROP TABLE person",
            "TRUNCATE TABLE person",
            "ALTER TABLE person ADD COLUMN age INT",
        ] {
            let outcome = guard().validate(sql);
            assert_eq!(
                outcome.reason(),
                Some("DDL statements are not allowed (CREATE, DROP, ALTER, TRUNCATE)"),
                "for {:?}",
                sql
            );
        }
    }

    #[test]
    fn unknown_names_are_reported_before_statement_kind() {
        let outcome = guard().validate("DROP TABLE ghost_table");
        assert_eq!(
            outcome.reason(),
            Some("Unauthorized tables: ghost_table")
        );
    }

    #[test]
    fn unparseable_sql_reports_the_parser_message() {
        let outcome = guard().validate("SELEKT nothing");
        let reason = outcome.reason().unwrap();
        assert!(reason.starts_with("SQL syntax error:"), "got {:?}", reason);
    }

    #[test]
    fn projection_rules_are_off_by_default() {
        assert_eq!(
            guard().validate("SELECT * FROM person"),
            ValidationOutcome::Passed
        );
    }

    #[test]
    fn opt_in_projection_rules_reject_select_star() {
        let guard = SqlGuard::new(schema()).with_projection_rules();
        let outcome = guard.validate("SELECT * FROM person");
        assert_eq!(outcome.reason(), Some("SELECT * is not allowed"));
    }

    #[test]
    fn opt_in_projection_rules_reject_select_into() {
        let guard = SqlGuard::new(schema()).with_projection_rules();
        let outcome = guard.validate("SELECT name INTO person FROM person");
        assert_eq!(outcome.reason(), Some("SELECT INTO is not allowed"));
    }

    fn summary_with_top(facts: SelectFacts) -> StatementSummary {
        StatementSummary {
            kind: StatementKind::Select,
            tables: BTreeSet::new(),
            columns: BTreeSet::new(),
            functions: BTreeSet::new(),
            top_select: Some(facts),
            selects: vec![facts],
        }
    }

    #[test]
    fn structure_validator_rejects_empty_projection() {
        let summary = summary_with_top(SelectFacts {
            projection_count: 0,
            has_wildcard: false,
            has_from: true,
            has_into: false,
        });
        let outcome = SelectStructureValidator::new().validate(&summary);
        assert_eq!(outcome.reason(), Some("SELECT statement has no output columns"));
    }

    #[test]
    fn structure_validator_rejects_missing_from() {
        let summary = StatementSummary::parse("SELECT 1").unwrap();
        let outcome = SelectStructureValidator::new().validate(&summary);
        assert_eq!(outcome.reason(), Some("SELECT statement has no FROM clause"));
    }

    #[test]
    fn structure_validator_passes_complete_selects() {
        let summary = StatementSummary::parse("SELECT name FROM person").unwrap();
        assert!(SelectStructureValidator::new()
            .validate(&summary)
            .is_passed());
    }
}
