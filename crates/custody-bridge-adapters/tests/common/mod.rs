#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::thread;

use serde_json::{json, Value};
use tiny_http::{Header, Response, Server, StatusCode};

pub const ACCOUNT: &str = "0x1000000000000000000000000000000000000001";
pub const TX_HASH: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One recorded request: `"METHOD /path?query"` plus the raw body.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub line: String,
    pub body: String,
}

impl Recorded {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("request body is json")
    }
}

pub type Calls = Arc<Mutex<Vec<Recorded>>>;

/// Serves `respond(method, url, body)` on an ephemeral port until the test
/// process exits.
pub fn spawn_mock_server<F>(respond: F) -> (String, Calls)
where
    F: Fn(&str, &str, &str) -> (u16, Value) + Send + 'static,
{
    let server = Server::http("127.0.0.1:0").expect("start server");
    let addr = format!("http://{}", server.server_addr());
    let calls: Calls = Arc::default();
    let recorded = Arc::clone(&calls);

    thread::spawn(move || loop {
        let mut req = match server.recv() {
            Ok(r) => r,
            Err(_) => break,
        };
        let method = req.method().to_string();
        let url = req.url().to_owned();
        let mut body = String::new();
        let _ = req.as_reader().read_to_string(&mut body);
        if let Ok(mut g) = recorded.lock() {
            g.push(Recorded {
                line: format!("{method} {url}"),
                body: body.clone(),
            });
        }

        let (code, payload) = respond(&method, &url, &body);
        let header =
            Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).expect("header");
        let response = Response::from_string(payload.to_string())
            .with_status_code(StatusCode(code))
            .with_header(header);
        let _ = req.respond(response);
    });

    (addr, calls)
}

/// A custody service plus node on one server. Authorization statuses are
/// served from `statuses` in order, then `PENDING`.
pub fn spawn_custody_backend(statuses: Vec<&'static str>) -> (String, Calls) {
    let statuses = Mutex::new(statuses.into_iter());
    spawn_mock_server(move |method, url, body| match (method, url) {
        ("GET", u) if u.starts_with("/api/ethereum/accounts?code=") => {
            (200, json!({"accounts": [ACCOUNT]}))
        }
        ("POST", u) if u.starts_with("/api/ethereum/authz?code=") => {
            (200, json!({"authorizationId": "authz-7"}))
        }
        ("GET", u) if u.starts_with("/api/ethereum/authz?authorizationId=") => {
            let status = statuses
                .lock()
                .ok()
                .and_then(|mut s| s.next())
                .unwrap_or("PENDING");
            let hash = (status == "APPROVED").then_some(TX_HASH);
            (200, json!({"status": status, "transactionHash": hash}))
        }
        ("POST", "/rpc") => {
            let request: Value = serde_json::from_str(body).unwrap_or(Value::Null);
            match request["method"].as_str() {
                Some("eth_blockNumber") => (
                    200,
                    json!({"jsonrpc": "2.0", "id": request["id"], "result": "0x2a"}),
                ),
                _ => (
                    200,
                    json!({
                        "jsonrpc": "2.0",
                        "id": request["id"],
                        "error": {"code": -32601, "message": "method not found"}
                    }),
                ),
            }
        }
        _ => (404, json!({"error": "not found"})),
    })
}

pub fn lines(calls: &Calls) -> Vec<String> {
    calls
        .lock()
        .expect("calls lock")
        .iter()
        .map(|r| r.line.clone())
        .collect()
}
