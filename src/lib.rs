//! Negotiation Graph
//!
//! Answers contract-negotiation lineage questions (concessions, round
//! decisions, clause history, reviewer activity) against a graph store.
//!
//! # Architecture
//!
//! - `nlq` - rule-based interpreter: ordered pattern table, parameter
//!   extraction, query building with bound parameters, result formatting
//! - `gateway` - the one operation the interpreter needs from a graph store,
//!   with a RESP network implementation and a scripted in-memory one
//! - `protocol` - RESP codec
//! - `kpi` - named audit queries
//! - `ids` - deterministic canonical identifiers
//! - `config` - gateway settings
//!
//! ## Example Usage
//!
//! ```rust
//! use negotiation_graph::{Interpreter, ScriptedGateway, Value};
//!
//! let gateway = ScriptedGateway::new().respond(
//!     "Decision",
//!     vec![vec![Value::from("apply"), Value::Integer(3), Value::Float(60.0)]],
//! );
//! let interpreter = Interpreter::new(gateway).unwrap();
//!
//! let outcome = interpreter.execute_query("Show decision distribution");
//! assert!(outcome.success);
//! assert!(outcome.results.contains("apply: 3 (60%)"));
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod gateway;
pub mod ids;
pub mod kpi;
pub mod nlq;
pub mod protocol;
pub mod value;

pub use config::{ConfigError, ConfigResult, Dialect, GatewayConfig};
pub use gateway::{GatewayError, GatewayResult, QueryGateway, RespGateway, ScriptedGateway};
pub use nlq::{
    example_questions, Formatter, Interpreter, NlqError, NlqResult, PatternSpec, PatternTable,
    QueryOutcome, EXAMPLE_QUESTIONS,
};
pub use protocol::{RespError, RespValue};
pub use value::{Params, Row, Value};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
