//! ScriptedGateway: canned responses, no graph store
//!
//! Rules are checked in registration order; the first rule whose needle
//! occurs in the query text answers. Unmatched queries return no rows.

use std::sync::Mutex;
use tracing::debug;

use crate::gateway::{GatewayError, GatewayResult, QueryGateway};
use crate::value::{Params, Row};

/// One query the gateway received
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedQuery {
    pub query: String,
    pub params: Params,
}

enum Reply {
    Rows(Vec<Row>),
    Fail(String),
}

struct Rule {
    needle: String,
    reply: Reply,
}

/// In-memory gateway that answers from a fixed script and records calls.
#[derive(Default)]
pub struct ScriptedGateway {
    rules: Vec<Rule>,
    log: Mutex<Vec<ExecutedQuery>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer queries containing `needle` with `rows`
    pub fn respond(mut self, needle: impl Into<String>, rows: Vec<Row>) -> Self {
        self.rules.push(Rule {
            needle: needle.into(),
            reply: Reply::Rows(rows),
        });
        self
    }

    /// Fail queries containing `needle` with `message`
    pub fn fail(mut self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        self.rules.push(Rule {
            needle: needle.into(),
            reply: Reply::Fail(message.into()),
        });
        self
    }

    /// Every query executed so far, oldest first
    pub fn executed(&self) -> Vec<ExecutedQuery> {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// The most recent query, if any
    pub fn last(&self) -> Option<ExecutedQuery> {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).last().cloned()
    }
}

impl QueryGateway for ScriptedGateway {
    fn execute(&self, query: &str, params: &Params) -> GatewayResult<Vec<Row>> {
        self.log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ExecutedQuery {
                query: query.to_string(),
                params: params.clone(),
            });

        match self.rules.iter().find(|rule| query.contains(&rule.needle)) {
            Some(Rule { reply: Reply::Rows(rows), needle }) => {
                debug!("Scripted reply for '{}': {} rows", needle, rows.len());
                Ok(rows.clone())
            }
            Some(Rule { reply: Reply::Fail(message), .. }) => {
                Err(GatewayError::Scripted(message.clone()))
            }
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_first_matching_rule_answers() {
        let gateway = ScriptedGateway::new()
            .respond("Concession", vec![vec![Value::from("first")]])
            .respond("Concession", vec![vec![Value::from("second")]]);
        let rows = gateway.execute("MATCH (c:Concession) RETURN c", &Params::new()).unwrap();
        assert_eq!(rows, vec![vec![Value::from("first")]]);
    }

    #[test]
    fn test_unmatched_query_returns_no_rows() {
        let gateway = ScriptedGateway::new().respond("Concession", vec![vec![Value::Null]]);
        assert!(gateway.execute("MATCH (m:Matter) RETURN m", &Params::new()).unwrap().is_empty());
    }

    #[test]
    fn test_fail_rule() {
        let gateway = ScriptedGateway::new().fail("Matter", "connection refused");
        let err = gateway.execute("MATCH (m:Matter) RETURN m", &Params::new()).unwrap_err();
        assert_eq!(err.to_string(), "connection refused");
    }

    #[test]
    fn test_records_params() {
        let gateway = ScriptedGateway::new();
        let mut params = Params::new();
        params.insert("version".to_string(), Value::Integer(2));
        gateway.execute("RETURN $version", &params).unwrap();
        let last = gateway.last().unwrap();
        assert_eq!(last.query, "RETURN $version");
        assert_eq!(last.params.get("version"), Some(&Value::Integer(2)));
        assert_eq!(gateway.executed().len(), 1);
    }
}
