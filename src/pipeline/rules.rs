//! Rules Engine
//!
//! "Junior-proof" guardrails for SQL change scripts.
//!
//! This is a lexical heuristic, not a parser. Input is upper-cased and
//! scanned with substring and regex checks, so keyword-like text inside
//! comments or quoted string literals is treated as live SQL, and a
//! quoted table name after `DELETE FROM` is not recognized.

use crate::pipeline::types::{Finding, Severity};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const MSG_DROP_DATABASE: &str = "Found forbidden statement: DROP DATABASE";
pub const MSG_TRUNCATE_TABLE: &str = "Found forbidden statement: TRUNCATE TABLE";
pub const MSG_DELETE_WITHOUT_WHERE: &str = "Found DELETE without WHERE clause";
pub const MSG_WRITE_WITHOUT_TRANSACTION: &str = "Write statements without explicit transaction";

/// `DELETE FROM <ident>` followed only by whitespace, then `;` or end of text
static DELETE_WITHOUT_WHERE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"DELETE\s+FROM\s+[A-Z0-9_.]+\s*(?:;|$)").expect("valid DELETE pattern")
});

static WRITE_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:UPDATE|DELETE|INSERT)\b").expect("valid write keyword pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    DataLoss,
    BestPractice,
}

/// A governance rule definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub description: String,
    pub severity: Severity,
    pub enabled: bool,
    /// Category for grouping
    pub category: RuleCategory,
}

/// The rules engine that screens SQL text before it runs
#[derive(Debug, Clone)]
pub struct RulesEngine {
    rules: Vec<Rule>,
}

impl RulesEngine {
    /// Create a new rules engine with every rule enabled
    pub fn new() -> Self {
        Self {
            rules: Self::default_rules(),
        }
    }

    /// Create an engine that skips the listed rule ids
    pub fn with_disabled<S: AsRef<str>>(disabled: &[S]) -> Self {
        let mut rules = Self::default_rules();
        for rule in &mut rules {
            if disabled.iter().any(|d| d.as_ref() == rule.id) {
                rule.enabled = false;
            }
        }
        Self { rules }
    }

    /// Get all configured rules
    pub fn list_rules(&self) -> &[Rule] {
        &self.rules
    }

    fn is_enabled(&self, id: &str) -> bool {
        self.rules.iter().any(|r| r.id == id && r.enabled)
    }

    /// Validate SQL text, returning findings in rule order.
    ///
    /// Rules are independent: each may add a finding regardless of what
    /// earlier rules found. Empty or malformed input yields no findings.
    pub fn validate(&self, sql_text: &str) -> Vec<Finding> {
        let normalized = sql_text.to_uppercase();
        let mut findings = Vec::new();

        if self.is_enabled("SQL001") {
            findings.extend(Self::check_drop_database(&normalized));
        }
        if self.is_enabled("SQL002") {
            findings.extend(Self::check_truncate_table(&normalized));
        }
        if self.is_enabled("SQL003") {
            findings.extend(Self::check_delete_without_where(&normalized));
        }
        if self.is_enabled("SQL004") {
            findings.extend(Self::check_write_without_transaction(&normalized));
        }

        debug!(findings = findings.len(), "SQL validation complete");
        findings
    }

    /// Rule: Block DROP DATABASE anywhere in the script
    fn check_drop_database(normalized: &str) -> Option<Finding> {
        normalized
            .contains("DROP DATABASE")
            .then(|| Finding::error(MSG_DROP_DATABASE))
    }

    /// Rule: Block TRUNCATE TABLE anywhere in the script
    fn check_truncate_table(normalized: &str) -> Option<Finding> {
        normalized
            .contains("TRUNCATE TABLE")
            .then(|| Finding::error(MSG_TRUNCATE_TABLE))
    }

    /// Rule: Block a DELETE whose statement ends right after the table name
    fn check_delete_without_where(normalized: &str) -> Option<Finding> {
        DELETE_WITHOUT_WHERE
            .is_match(normalized)
            .then(|| Finding::error(MSG_DELETE_WITHOUT_WHERE))
    }

    /// Rule: Warn on writes that are not wrapped in BEGIN TRANSACTION ... COMMIT
    fn check_write_without_transaction(normalized: &str) -> Option<Finding> {
        let has_write = WRITE_KEYWORD.is_match(normalized);
        let has_transaction =
            normalized.contains("BEGIN TRANSACTION") && normalized.contains("COMMIT");

        (has_write && !has_transaction).then(|| Finding::warning(MSG_WRITE_WITHOUT_TRANSACTION))
    }

    fn default_rules() -> Vec<Rule> {
        vec![
            Rule {
                id: "SQL001".to_string(),
                name: "Forbidden DROP DATABASE".to_string(),
                description: "Block scripts that drop a whole database".to_string(),
                severity: Severity::Error,
                enabled: true,
                category: RuleCategory::DataLoss,
            },
            Rule {
                id: "SQL002".to_string(),
                name: "Forbidden TRUNCATE TABLE".to_string(),
                description: "Block scripts that truncate tables".to_string(),
                severity: Severity::Error,
                enabled: true,
                category: RuleCategory::DataLoss,
            },
            Rule {
                id: "SQL003".to_string(),
                name: "DELETE without WHERE".to_string(),
                description: "Block DELETE statements with no WHERE clause".to_string(),
                severity: Severity::Error,
                enabled: true,
                category: RuleCategory::DataLoss,
            },
            Rule {
                id: "SQL004".to_string(),
                name: "Write without transaction".to_string(),
                description: "Warn when UPDATE/DELETE/INSERT is not wrapped in BEGIN TRANSACTION ... COMMIT"
                    .to_string(),
                severity: Severity::Warning,
                enabled: true,
                category: RuleCategory::BestPractice,
            },
        ]
    }
}

impl Default for RulesEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn validate(sql_text: &str) -> Vec<Finding> {
        RulesEngine::new().validate(sql_text)
    }

    fn messages(findings: &[Finding]) -> Vec<&str> {
        findings.iter().map(|f| f.message.as_str()).collect()
    }

    #[test]
    fn test_drop_database_any_case() {
        for sql in ["DROP DATABASE prod_db;", "drop database prod_db", "Drop Database x"] {
            let findings = validate(sql);
            assert_eq!(findings[0], Finding::error(MSG_DROP_DATABASE), "{sql}");
        }
    }

    #[test]
    fn test_truncate_table() {
        let findings = validate("truncate table audit_events;");
        assert_eq!(messages(&findings), vec![MSG_TRUNCATE_TABLE]);
        assert_eq!(findings[0].severity, Severity::Error);
    }

    #[test]
    fn test_delete_without_where() {
        for sql in [
            "DELETE FROM t;",
            "delete from t",
            "delete from public.users   ;",
            "DELETE FROM t\n",
            "BEGIN TRANSACTION;\nDELETE FROM a WHERE id = 1;\nDELETE FROM b;\nCOMMIT;",
        ] {
            let findings = validate(sql);
            assert!(
                findings.contains(&Finding::error(MSG_DELETE_WITHOUT_WHERE)),
                "expected DELETE finding for {sql:?}"
            );
        }
    }

    #[test]
    fn test_delete_with_where_is_allowed() {
        for sql in [
            "DELETE FROM t WHERE id=1;",
            "delete from t where id = 1",
            "DELETE FROM t\nWHERE id = 1;",
            "DELETE FROM t USING u WHERE t.id = u.id;",
        ] {
            let findings = validate(sql);
            assert!(
                !findings.contains(&Finding::error(MSG_DELETE_WITHOUT_WHERE)),
                "unexpected DELETE finding for {sql:?}"
            );
        }
    }

    #[test]
    fn test_write_without_transaction_is_warning_only() {
        let findings = validate("UPDATE users SET active = 1 WHERE id = 7;");
        assert_eq!(findings, vec![Finding::warning(MSG_WRITE_WITHOUT_TRANSACTION)]);
    }

    #[test]
    fn test_write_inside_transaction() {
        let sql = "BEGIN TRANSACTION;\nUPDATE t SET c=1 WHERE id=1;\nCOMMIT;";
        assert!(validate(sql).is_empty());
    }

    #[test]
    fn test_transaction_needs_both_markers() {
        let sql = "BEGIN TRANSACTION;\nINSERT INTO t VALUES (1);";
        assert_eq!(messages(&validate(sql)), vec![MSG_WRITE_WITHOUT_TRANSACTION]);
    }

    #[test]
    fn test_identifier_containing_keyword_is_not_a_write() {
        let sql = "SELECT updated_at, inserted_by, deleted FROM audit;";
        assert!(validate(sql).is_empty());
    }

    #[test]
    fn test_rules_do_not_short_circuit() {
        let findings = validate("DROP DATABASE a; TRUNCATE TABLE b; DELETE FROM c;");
        assert_eq!(
            messages(&findings),
            vec![
                MSG_DROP_DATABASE,
                MSG_TRUNCATE_TABLE,
                MSG_DELETE_WITHOUT_WHERE,
                MSG_WRITE_WITHOUT_TRANSACTION,
            ]
        );
    }

    #[test]
    fn test_empty_and_garbage_input() {
        assert!(validate("").is_empty());
        assert!(validate("   \n\t").is_empty());
        assert!(validate("SELECT 1; -- )( ;;").is_empty());
    }

    #[test]
    fn test_disabled_rules_are_skipped() {
        let engine = RulesEngine::with_disabled(&["SQL004"]);
        assert!(engine.validate("UPDATE t SET c = 1 WHERE id = 1;").is_empty());
        assert_eq!(
            messages(&engine.validate("DELETE FROM t;")),
            vec![MSG_DELETE_WITHOUT_WHERE]
        );
        assert!(!engine.list_rules()[3].enabled);
    }

    #[test]
    fn test_catalog_order() {
        let engine = RulesEngine::new();
        let ids: Vec<_> = engine.list_rules().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["SQL001", "SQL002", "SQL003", "SQL004"]);
        assert!(engine.list_rules().iter().all(|r| r.enabled));
    }
}
