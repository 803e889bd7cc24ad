//! Natural Language Querying (NLQ)
//!
//! Rule-based question-to-Cypher translation for negotiation history.
//! An ordered pattern table picks a query for each question; the query runs
//! through a [`QueryGateway`](crate::gateway::QueryGateway) and the rows are
//! rendered as text.

pub mod builder;
pub mod format;
pub mod interpreter;
pub mod matcher;
pub mod pattern;

use thiserror::Error;

use crate::gateway::GatewayError;

pub use builder::{build_query, placeholders, BuiltQuery};
pub use format::Formatter;
pub use interpreter::{example_questions, Interpreter, QueryOutcome, EXAMPLE_QUESTIONS};
pub use matcher::{infer_keyword, match_question, normalize, MatchResult};
pub use pattern::{title_case, ParamRole, ParamSpec, PatternSpec, PatternTable, QuerySource};

#[derive(Error, Debug)]
pub enum NlqError {
    #[error("Invalid pattern /{pattern}/: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("Missing parameter '{name}' for '{pattern}'")]
    MissingParameter { pattern: String, name: String },
    #[error("Invalid value for parameter '{name}': {value}")]
    InvalidParameter { name: String, value: String },
    #[error("Query execution error: {0}")]
    Gateway(#[from] GatewayError),
}

pub type NlqResult<T> = Result<T, NlqError>;
