//! Interpreter: question in, formatted answer out
//!
//! `execute_query` never fails outright. Every path ends in a
//! [`QueryOutcome`]; unmatched questions, build errors and gateway errors
//! are reported through it.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::gateway::QueryGateway;
use crate::nlq::builder::build_query;
use crate::nlq::matcher::{match_question, MatchResult};
use crate::nlq::pattern::PatternTable;
use crate::nlq::{NlqError, NlqResult};
use crate::value::Params;

/// Questions the built-in table answers
pub const EXAMPLE_QUESTIONS: [&str; 9] = [
    "Show me all concessions",
    "What did we agree to in round 2?",
    "Find liability clauses",
    "What did Sarah Chen decide?",
    "Show unfavorable terms",
    "Overview of matter_001",
    "Track clause 1.1 history",
    "How many clauses are there?",
    "Show decision distribution",
];

pub fn example_questions() -> Vec<String> {
    EXAMPLE_QUESTIONS.iter().map(|q| q.to_string()).collect()
}

/// Result of one interpretation cycle
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results_count: Option<usize>,
    /// Formatted rows; empty on failure
    pub results: String,
    /// Query text sent to the gateway; empty when nothing matched
    pub cypher: String,
    #[serde(skip_serializing_if = "Params::is_empty")]
    pub parameters: Params,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

impl QueryOutcome {
    fn unmatched(question: &str) -> Self {
        Self {
            success: false,
            question: Some(question.to_string()),
            description: None,
            results_count: None,
            results: String::new(),
            cypher: String::new(),
            parameters: Params::new(),
            error: Some("Could not understand the question".to_string()),
            suggestions: Some(example_questions()),
        }
    }

    fn failed(question: &str, description: Option<&str>, error: String, cypher: &str) -> Self {
        Self {
            success: false,
            question: Some(question.to_string()),
            description: description.map(str::to_string),
            results_count: None,
            results: String::new(),
            cypher: cypher.to_string(),
            parameters: Params::new(),
            error: Some(error),
            suggestions: None,
        }
    }
}

/// Rule-based natural-language query interpreter.
///
/// Holds a shared, immutable pattern table and one gateway handle.
pub struct Interpreter<G> {
    table: Arc<PatternTable>,
    gateway: G,
}

impl<G: QueryGateway> Interpreter<G> {
    /// Interpreter over the built-in negotiation rules
    pub fn new(gateway: G) -> NlqResult<Self> {
        Ok(Self::with_table(PatternTable::shared()?, gateway))
    }

    /// Interpreter over a caller-supplied table
    pub fn with_table(table: Arc<PatternTable>, gateway: G) -> Self {
        Self { table, gateway }
    }

    pub fn table(&self) -> &Arc<PatternTable> {
        &self.table
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Select the rule for `question` and extract its parameters
    pub fn match_query(&self, question: &str) -> NlqResult<Option<MatchResult<'_>>> {
        match_question(&self.table, question)
    }

    /// Interpret `question`, run its query and format the rows.
    pub fn execute_query(&self, question: &str) -> QueryOutcome {
        let matched = match self.match_query(question) {
            Ok(Some(m)) => m,
            Ok(None) => {
                info!("Unrecognized question: {}", question);
                return QueryOutcome::unmatched(question);
            }
            Err(e) => {
                warn!("Parameter extraction failed for '{}': {}", question, e);
                return QueryOutcome::failed(question, None, e.to_string(), "");
            }
        };
        let spec = matched.spec;

        let built = match build_query(spec, &matched.params) {
            Ok(built) => built,
            Err(e) => {
                warn!("Query build failed for '{}': {}", question, e);
                return QueryOutcome::failed(
                    question,
                    Some(&spec.description),
                    e.to_string(),
                    spec.query.text(),
                );
            }
        };

        match self.gateway.execute(&built.text, &built.params) {
            Ok(rows) => {
                info!("{} -> {} row(s)", spec.description, rows.len());
                QueryOutcome {
                    success: true,
                    question: Some(question.to_string()),
                    description: Some(spec.description.clone()),
                    results_count: Some(rows.len()),
                    results: spec.formatter.render(&rows, &matched.params),
                    cypher: built.text,
                    parameters: built.params,
                    error: None,
                    suggestions: None,
                }
            }
            Err(e) => {
                let error = NlqError::from(e);
                warn!("Query execution failed for '{}': {}", question, error);
                let mut outcome = QueryOutcome::failed(
                    question,
                    Some(&spec.description),
                    error.to_string(),
                    &built.text,
                );
                outcome.parameters = built.params;
                outcome
            }
        }
    }
}
