//! Opt-in operator/function/keyword linter for generated SQL.
//!
//! A separable stage composed after the base guard. Keyword and operator
//! checks are raw-text substring matches over the lowercased SQL; the
//! function check inspects call names in the AST. Item lists are fixed
//! slices so the first offending item is deterministic.

use crate::error::WardError;
use crate::guard::ast::StatementSummary;
use crate::guard::ValidationOutcome;

const FORBIDDEN_KEYWORDS: &[&str] = &["--", "/*", "*/", ";", "sleep", "benchmark", "exec"];
const FORBIDDEN_FUNCTIONS: &[&str] = &["now", "concat", "regexp"];
const FORBIDDEN_OPERATORS: &[&str] = &["||", "!=", "<>", "not in", "not between"];

pub struct SqlLinter;

impl SqlLinter {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, sql: &str) -> ValidationOutcome {
        let lowered = sql.to_lowercase();

        for keyword in FORBIDDEN_KEYWORDS {
            if lowered.contains(keyword) {
                return ValidationOutcome::rejected(format!(
                    "Forbidden keyword or pattern: '{}'",
                    keyword
                ));
            }
        }

        let summary = match StatementSummary::parse(sql) {
            Ok(summary) => summary,
            Err(WardError::Syntax(message)) => {
                return ValidationOutcome::rejected(format!("SQL syntax error: {}", message));
            }
            Err(other) => {
                return ValidationOutcome::rejected(other.to_string());
            }
        };
        for name in FORBIDDEN_FUNCTIONS {
            if summary.functions.contains(*name) {
                return ValidationOutcome::rejected(format!("Forbidden function: '{}'", name));
            }
        }

        for operator in FORBIDDEN_OPERATORS {
            if lowered.contains(operator) {
                return ValidationOutcome::rejected(format!("Forbidden operator: '{}'", operator));
            }
        }

        ValidationOutcome::Passed
    }
}

impl Default for SqlLinter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linter() -> SqlLinter {
        SqlLinter::new()
    }

    #[test]
    fn clean_select_passes() {
        assert_eq!(
            linter().validate("select name from person where person_id = 3"),
            ValidationOutcome::Passed
        );
    }

    #[test]
    fn comment_markers_are_forbidden() {
        let outcome = linter().validate("select name from person -- peek");
        assert_eq!(outcome.reason(), Some("Forbidden keyword or pattern: '--'"));
    }

    #[test]
    fn statement_separator_is_forbidden() {
        let outcome = linter().validate("select name from person;");
        assert_eq!(outcome.reason(), Some("Forbidden keyword or pattern: ';'"));
    }

    #[test]
    fn timing_probes_are_forbidden() {
        let outcome = linter().validate("select sleep(5) from person");
        assert_eq!(
            outcome.reason(),
            Some("Forbidden keyword or pattern: 'sleep'")
        );
    }

    #[test]
    fn forbidden_functions_are_detected_in_the_ast() {
        let outcome = linter().validate("select NOW() from person");
        assert_eq!(outcome.reason(), Some("Forbidden function: 'now'"));
    }

    #[test]
    fn forbidden_operators_are_detected_in_raw_text() {
        let outcome = linter().validate("select name from person where name != 'kim'");
        assert_eq!(outcome.reason(), Some("Forbidden operator: '!='"));
    }

    #[test]
    fn not_in_is_matched_as_a_phrase() {
        let outcome =
            linter().validate("select name from person where person_id not in (1, 2)");
        assert_eq!(outcome.reason(), Some("Forbidden operator: 'not in'"));
    }

    #[test]
    fn keyword_check_runs_before_the_parser() {
        // Unparseable text still reports the raw-text keyword first.
        let outcome = linter().validate("garbage; more garbage");
        assert_eq!(outcome.reason(), Some("Forbidden keyword or pattern: ';'"));
    }

    #[test]
    fn parse_failure_surfaces_as_a_rejection() {
        let outcome = linter().validate("selekt whatever");
        let reason = outcome.reason().unwrap();
        assert!(reason.starts_with("SQL syntax error:"), "got {:?}", reason);
    }
}
