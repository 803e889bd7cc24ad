//! Graph query gateway
//!
//! The interpreter only needs one operation from a graph store: run a query
//! with bound parameters and hand back tabular rows. Implemented by:
//! - `RespGateway` - a FalkorDB/Samyama server reached over RESP
//! - `ScriptedGateway` - canned responses, for tests and offline demos

pub mod resp;
pub mod scripted;

use crate::protocol::RespError;
use crate::value::{Params, Row};
use std::sync::Arc;
use thiserror::Error;

pub use resp::RespGateway;
pub use scripted::{ExecutedQuery, ScriptedGateway};

/// Gateway errors
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Connection or socket failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed reply on the wire
    #[error("Protocol error: {0}")]
    Protocol(#[from] RespError),

    /// The server rejected the query
    #[error("Server error: {0}")]
    Server(String),

    /// Reply was well-formed RESP but not a result set
    #[error("Unexpected reply: {0}")]
    Decode(String),

    /// Failure injected by a scripted gateway
    #[error("{0}")]
    Scripted(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Executes a read query against a graph store.
pub trait QueryGateway {
    /// Run `query` with `params` bound, returning rows in column order.
    fn execute(&self, query: &str, params: &Params) -> GatewayResult<Vec<Row>>;
}

impl<G: QueryGateway + ?Sized> QueryGateway for &G {
    fn execute(&self, query: &str, params: &Params) -> GatewayResult<Vec<Row>> {
        (**self).execute(query, params)
    }
}

impl<G: QueryGateway + ?Sized> QueryGateway for Arc<G> {
    fn execute(&self, query: &str, params: &Params) -> GatewayResult<Vec<Row>> {
        (**self).execute(query, params)
    }
}

impl<G: QueryGateway + ?Sized> QueryGateway for Box<G> {
    fn execute(&self, query: &str, params: &Params) -> GatewayResult<Vec<Row>> {
        (**self).execute(query, params)
    }
}
