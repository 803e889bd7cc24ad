//! Network protocol module
//!
//! RESP (Redis Serialization Protocol) codec used by the graph gateway to
//! talk to FalkorDB-compatible servers.

pub mod resp;

pub use resp::{RespDecoder, RespError, RespResult, RespValue};
