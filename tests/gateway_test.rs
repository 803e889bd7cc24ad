use bytes::BytesMut;
use negotiation_graph::config::{Dialect, GatewayConfig};
use negotiation_graph::{
    GatewayError, Interpreter, Params, QueryGateway, RespGateway, RespValue, Value,
};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;

/// Serve one connection: answer each command with the next canned reply and
/// report the received command arguments back to the test.
fn fake_server(replies: Vec<RespValue>) -> (u16, mpsc::Receiver<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = BytesMut::new();
        let mut chunk = [0u8; 1024];
        for reply in replies {
            let command = loop {
                if let Some(value) = RespValue::decode(&mut buf).unwrap() {
                    break value;
                }
                let n = stream.read(&mut chunk).unwrap();
                if n == 0 {
                    return;
                }
                buf.extend_from_slice(&chunk[..n]);
            };
            let args = command
                .as_array()
                .unwrap()
                .iter()
                .map(|v| v.as_string().unwrap().unwrap())
                .collect();
            tx.send(args).unwrap();

            let mut out = Vec::new();
            reply.encode(&mut out).unwrap();
            stream.write_all(&out).unwrap();
        }
    });

    (port, rx)
}

fn config(port: u16, dialect: Dialect) -> GatewayConfig {
    GatewayConfig {
        port,
        graph: "negotiation_test".to_string(),
        dialect,
        ..GatewayConfig::default()
    }
}

fn bulk(s: &str) -> RespValue {
    RespValue::BulkString(Some(s.as_bytes().to_vec()))
}

#[test]
fn test_falkordb_result_set() {
    let reply = RespValue::Array(vec![
        RespValue::Array(vec![bulk("decision"), bulk("count")]),
        RespValue::Array(vec![
            RespValue::Array(vec![bulk("apply"), RespValue::Integer(3)]),
            RespValue::Array(vec![bulk("defer"), RespValue::BulkString(None)]),
        ]),
        RespValue::Array(vec![bulk("Query internal execution time: 0.1 ms")]),
    ]);
    let (port, commands) = fake_server(vec![reply]);
    let gateway = RespGateway::new(config(port, Dialect::FalkorDb));

    let rows = gateway.execute("MATCH (d:Decision) RETURN d", &Params::new()).unwrap();
    assert_eq!(
        rows,
        vec![
            vec![Value::from("apply"), Value::Integer(3)],
            vec![Value::from("defer"), Value::Null],
        ]
    );

    let sent = commands.recv().unwrap();
    assert_eq!(sent[0], "GRAPH.QUERY");
    assert_eq!(sent[1], "negotiation_test");
    assert_eq!(sent[2], "MATCH (d:Decision) RETURN d");
}

#[test]
fn test_parameters_sent_in_header() {
    let reply = RespValue::Array(vec![
        RespValue::Array(vec![bulk("matter")]),
        RespValue::Array(vec![]),
        RespValue::Array(vec![]),
    ]);
    let (port, commands) = fake_server(vec![reply]);
    let gateway = RespGateway::new(config(port, Dialect::FalkorDb));

    let mut params = Params::new();
    params.insert("actor".to_string(), Value::from("O\"Brien"));
    params.insert("version".to_string(), Value::Integer(2));
    let rows = gateway
        .execute("MATCH (d:Decision {actor: $actor}) RETURN d", &params)
        .unwrap();
    assert!(rows.is_empty());

    let sent = commands.recv().unwrap();
    assert_eq!(
        sent[2],
        "CYPHER actor=\"O\\\"Brien\" version=2 MATCH (d:Decision {actor: $actor}) RETURN d"
    );
}

#[test]
fn test_samyama_result_set() {
    let reply = RespValue::Array(vec![
        RespValue::Array(vec![bulk("type"), bulk("count"), bulk("pct")]),
        RespValue::Array(vec![bulk("apply"), RespValue::Integer(3), RespValue::Double(60.0)]),
        RespValue::Array(vec![bulk("override"), RespValue::Integer(2), RespValue::Null]),
    ]);
    let (port, _commands) = fake_server(vec![reply]);
    let gateway = RespGateway::new(config(port, Dialect::Samyama));

    let rows = gateway.execute("MATCH (d) RETURN d", &Params::new()).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][2], Value::Float(60.0));
    assert_eq!(rows[1][2], Value::Null);
}

#[test]
fn test_server_error_is_reported() {
    let (port, _commands) = fake_server(vec![RespValue::Error(
        "ERR Invalid input 'X'".to_string(),
    )]);
    let gateway = RespGateway::new(config(port, Dialect::FalkorDb));

    let err = gateway.execute("X", &Params::new()).unwrap_err();
    match err {
        GatewayError::Server(msg) => assert!(msg.contains("Invalid input")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_ping() {
    let (port, commands) = fake_server(vec![RespValue::SimpleString("PONG".to_string())]);
    let gateway = RespGateway::new(config(port, Dialect::FalkorDb));
    assert_eq!(gateway.ping().unwrap(), "PONG");
    assert_eq!(commands.recv().unwrap(), vec!["PING".to_string()]);
}

#[test]
fn test_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let gateway = RespGateway::new(config(port, Dialect::FalkorDb));
    let err = gateway.execute("RETURN 1", &Params::new()).unwrap_err();
    assert!(matches!(err, GatewayError::Io(_)));
}

#[test]
fn test_interpreter_over_network() {
    let reply = RespValue::Array(vec![
        RespValue::Array(vec![bulk("decision_type"), bulk("count"), bulk("percentage")]),
        RespValue::Array(vec![
            RespValue::Array(vec![bulk("apply"), RespValue::Integer(3), bulk("60.0")]),
            RespValue::Array(vec![bulk("defer"), RespValue::Integer(2), bulk("40.0")]),
        ]),
        RespValue::Array(vec![]),
    ]);
    let (port, commands) = fake_server(vec![reply]);
    let interpreter =
        Interpreter::new(RespGateway::new(config(port, Dialect::FalkorDb))).unwrap();

    let outcome = interpreter.execute_query("Show decision distribution");
    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(outcome.results_count, Some(2));
    assert!(outcome.results.contains("apply: 3"));
    assert!(outcome.results.contains("defer: 2"));
    assert_eq!(commands.recv().unwrap()[2], outcome.cypher);
}
