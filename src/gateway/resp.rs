//! RespGateway: graph queries over the Redis protocol
//!
//! Sends `GRAPH.QUERY <graph> <query>` to a FalkorDB-compatible server.
//! Parameters travel in a `CYPHER name=value ...` header in front of the
//! query text, so values are never spliced into the query itself.

use bytes::BytesMut;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::config::{Dialect, GatewayConfig};
use crate::gateway::{GatewayError, GatewayResult, QueryGateway};
use crate::protocol::{RespDecoder, RespValue};
use crate::value::{Params, Row, Value};

const READ_CHUNK: usize = 4096;

struct Connection {
    stream: TcpStream,
    buf: BytesMut,
    decoder: RespDecoder,
}

/// Network gateway to a running graph server.
///
/// Connects lazily on first use and keeps one connection. Access is
/// serialized by an internal lock. A failed round trip drops the connection;
/// the next call reconnects. Nothing is retried.
pub struct RespGateway {
    config: GatewayConfig,
    conn: Mutex<Option<Connection>>,
}

impl RespGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            conn: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Ping the server
    pub fn ping(&self) -> GatewayResult<String> {
        match self.round_trip(&RespValue::command(["PING"]))? {
            RespValue::Error(e) => Err(GatewayError::Server(e)),
            other => Ok(other
                .as_string()?
                .unwrap_or_else(|| "PONG".to_string())),
        }
    }

    /// The query text actually sent: a `CYPHER` parameter header (when there
    /// are parameters) followed by the query.
    pub fn query_text(query: &str, params: &Params) -> String {
        if params.is_empty() {
            return query.to_string();
        }
        let header: Vec<String> = params
            .iter()
            .map(|(name, value)| format!("{}={}", name, value.to_cypher_literal()))
            .collect();
        format!("CYPHER {} {}", header.join(" "), query)
    }

    fn connect(&self) -> GatewayResult<Connection> {
        let address = self.config.address();
        let mut last_err = None;
        for addr in address.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.config.connect_timeout()) {
                Ok(stream) => {
                    stream.set_read_timeout(self.config.read_timeout())?;
                    stream.set_nodelay(true)?;
                    debug!("Connected to graph server at {}", addr);
                    return Ok(Connection {
                        stream,
                        buf: BytesMut::with_capacity(READ_CHUNK),
                        decoder: RespDecoder::new(),
                    });
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err
            .unwrap_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no address for {}", address))
            })
            .into())
    }

    fn round_trip(&self, command: &RespValue) -> GatewayResult<RespValue> {
        let mut guard = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_none() {
            *guard = Some(self.connect()?);
        }
        let result = match guard.as_mut() {
            Some(conn) => Self::send_and_receive(conn, command),
            None => Err(GatewayError::Decode("connection unavailable".to_string())),
        };
        if let Err(e) = &result {
            warn!("Dropping graph connection after error: {}", e);
            *guard = None;
        }
        result
    }

    fn send_and_receive(conn: &mut Connection, command: &RespValue) -> GatewayResult<RespValue> {
        let mut out = Vec::new();
        command.encode(&mut out)?;
        conn.stream.write_all(&out)?;
        conn.stream.flush()?;

        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(value) = conn.decoder.decode(&mut conn.buf)? {
                return Ok(value);
            }
            let n = conn.stream.read(&mut chunk)?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                )
                .into());
            }
            conn.buf.extend_from_slice(&chunk[..n]);
        }
    }
}

impl QueryGateway for RespGateway {
    fn execute(&self, query: &str, params: &Params) -> GatewayResult<Vec<Row>> {
        let text = Self::query_text(query, params);
        debug!("GRAPH.QUERY {} ({} params)", self.config.graph, params.len());
        let command = RespValue::command(["GRAPH.QUERY", self.config.graph.as_str(), text.as_str()]);
        let reply = self.round_trip(&command)?;
        decode_result_set(&reply, self.config.dialect)
    }
}

/// Turn a `GRAPH.QUERY` reply into rows.
pub fn decode_result_set(reply: &RespValue, dialect: Dialect) -> GatewayResult<Vec<Row>> {
    let items = match reply {
        RespValue::Error(e) => return Err(GatewayError::Server(e.clone())),
        RespValue::Array(items) => items,
        other => {
            return Err(GatewayError::Decode(format!(
                "expected result array, got {:?}",
                other
            )))
        }
    };

    let raw_rows: &[RespValue] = match dialect {
        Dialect::FalkorDb => match items.len() {
            // statistics only: write query or no RETURN
            0 | 1 => &[],
            3 => items[1].as_array()?,
            n => {
                return Err(GatewayError::Decode(format!(
                    "expected [header, rows, stats], got {} elements",
                    n
                )))
            }
        },
        Dialect::Samyama => items.get(1..).unwrap_or(&[]),
    };

    raw_rows
        .iter()
        .map(|row| -> GatewayResult<Row> { row.as_array()?.iter().map(decode_cell).collect() })
        .collect()
}

fn decode_cell(value: &RespValue) -> GatewayResult<Value> {
    Ok(match value {
        RespValue::Null | RespValue::BulkString(None) => Value::Null,
        RespValue::Integer(i) => Value::Integer(*i),
        RespValue::Double(d) => Value::Float(*d),
        RespValue::SimpleString(s) => Value::String(s.clone()),
        RespValue::BulkString(Some(_)) => Value::String(value.as_string()?.unwrap_or_default()),
        RespValue::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|item| decode_cell(item).map(|v| v.to_string()))
                .collect::<GatewayResult<_>>()?;
            Value::String(format!("[{}]", parts.join(", ")))
        }
        RespValue::Error(e) => return Err(GatewayError::Server(e.clone())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(s: &str) -> RespValue {
        RespValue::BulkString(Some(s.as_bytes().to_vec()))
    }

    #[test]
    fn test_query_text_without_params() {
        assert_eq!(RespGateway::query_text("RETURN 1", &Params::new()), "RETURN 1");
    }

    #[test]
    fn test_query_text_binds_params() {
        let mut params = Params::new();
        params.insert("version".to_string(), Value::Integer(2));
        params.insert("actor".to_string(), Value::from("O\"Brien"));
        assert_eq!(
            RespGateway::query_text("MATCH (n) RETURN n", &params),
            r#"CYPHER version=2 actor="O\"Brien" MATCH (n) RETURN n"#
        );
    }

    #[test]
    fn test_decode_falkordb_result_set() {
        let reply = RespValue::Array(vec![
            RespValue::Array(vec![bulk("matter"), bulk("count")]),
            RespValue::Array(vec![
                RespValue::Array(vec![bulk("matter_001"), RespValue::Integer(4)]),
                RespValue::Array(vec![RespValue::BulkString(None), RespValue::Integer(0)]),
            ]),
            RespValue::Array(vec![bulk("Query internal execution time: 0.1 milliseconds")]),
        ]);
        let rows = decode_result_set(&reply, Dialect::FalkorDb).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec![Value::from("matter_001"), Value::Integer(4)]);
        assert!(rows[1][0].is_null());
    }

    #[test]
    fn test_decode_falkordb_stats_only() {
        let reply = RespValue::Array(vec![RespValue::Array(vec![bulk("Nodes created: 1")])]);
        assert!(decode_result_set(&reply, Dialect::FalkorDb).unwrap().is_empty());
    }

    #[test]
    fn test_decode_samyama_result_set() {
        let reply = RespValue::Array(vec![
            RespValue::Array(vec![bulk("decision_type")]),
            RespValue::Array(vec![bulk("apply")]),
            RespValue::Array(vec![bulk("override")]),
        ]);
        let rows = decode_result_set(&reply, Dialect::Samyama).unwrap();
        assert_eq!(rows, vec![vec![Value::from("apply")], vec![Value::from("override")]]);
    }

    #[test]
    fn test_decode_server_error() {
        let reply = RespValue::Error("errMsg: Invalid input".to_string());
        assert!(matches!(
            decode_result_set(&reply, Dialect::FalkorDb),
            Err(GatewayError::Server(_))
        ));
    }

    #[test]
    fn test_decode_nested_cell_flattens() {
        let cell = RespValue::Array(vec![bulk("a"), RespValue::Integer(1)]);
        assert_eq!(decode_cell(&cell).unwrap(), Value::from("[a, 1]"));
    }
}
