//! In-memory stand-in for the Minds service, plugged in through the `Transport` trait.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream;
use minds_sdk::transport::{ByteStream, Method, Transport, TransportResponse};
use minds_sdk::{Client, MindsError};
use serde_json::{json, Value};

#[derive(Default)]
struct State {
    datasources: Vec<Value>,
    minds: Vec<Value>,
}

/// Fake service. Datasources and Minds are kept in creation order.
pub struct FakeMindsServer {
    state: Mutex<State>,
    requests: Mutex<Vec<(Method, String)>>,
    /// Chunks of every completion answer.
    pub answer_chunks: Vec<String>,
    /// Streamed completions break with a read error after this many frames.
    pub stream_breaks_after: Option<usize>,
    /// Completions answer with this status and message instead of an answer.
    pub completion_failure: Option<(u16, String)>,
    /// Answer 409 when attaching an already attached datasource (otherwise 200).
    pub conflict_on_duplicate_attach: bool,
    /// Raw `data:` payloads streamed instead of chunk frames.
    pub stream_payloads: Option<Vec<String>>,
    /// Buffered completion body returned instead of the chunk-based answer.
    pub answer_body: Option<Value>,
    /// Creating a datasource answers with this status and message.
    pub datasource_failure: Option<(u16, String)>,
}

impl FakeMindsServer {
    pub fn new() -> Self {
        FakeMindsServer {
            state: Mutex::new(State::default()),
            requests: Mutex::new(Vec::new()),
            answer_chunks: vec!["2 + 3".into(), " equals".into(), " 5.".into()],
            stream_breaks_after: None,
            completion_failure: None,
            conflict_on_duplicate_attach: true,
            stream_payloads: None,
            answer_body: None,
            datasource_failure: None,
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<(Method, String)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn mind_json(&self, name: &str) -> Option<Value> {
        let state = self.state.lock().unwrap();
        state.minds.iter().find(|m| m["name"] == name).cloned()
    }

    fn full_answer(&self) -> String {
        self.answer_chunks.concat()
    }

    fn handle(&self, method: &Method, segments: &[String], body: Option<Value>) -> (u16, Value) {
        let mut state = self.state.lock().unwrap();
        let segs: Vec<&str> = segments.iter().map(String::as_str).collect();

        match (method.as_str(), segs.as_slice()) {
            ("GET", ["datasources"]) => (200, Value::Array(state.datasources.clone())),
            ("POST", ["datasources"]) => {
                if let Some((status, message)) = &self.datasource_failure {
                    return (*status, json!({"detail": message}));
                }
                let body = body.unwrap_or(Value::Null);
                let name = body["name"].as_str().unwrap_or_default().to_string();
                if state.datasources.iter().any(|d| d["name"] == name) {
                    return (409, json!({"detail": format!("Database '{}' already exists", name)}));
                }
                let mut stored = body.clone();
                stored["created_at"] = json!("2024-10-04 12:00:00.000000");
                state.datasources.push(stored.clone());
                (200, stored)
            }
            ("GET", ["datasources", name]) => match state.datasources.iter().find(|d| d["name"] == *name) {
                Some(ds) => (200, ds.clone()),
                None => (404, json!({"detail": "Datasource not found"})),
            },
            ("DELETE", ["datasources", name]) => {
                let before = state.datasources.len();
                state.datasources.retain(|d| d["name"] != *name);
                if state.datasources.len() == before {
                    (404, json!({"detail": "Datasource not found"}))
                } else {
                    for mind in state.minds.iter_mut() {
                        detach(mind, name);
                    }
                    (200, Value::Null)
                }
            }
            ("GET", ["projects", _, "minds"]) => (200, Value::Array(state.minds.clone())),
            ("POST", ["projects", _, "minds"]) => {
                let body = body.unwrap_or(Value::Null);
                let name = body["name"].as_str().unwrap_or_default().to_string();
                if state.minds.iter().any(|m| m["name"] == name) {
                    return (409, json!({"detail": format!("Mind '{}' already exists", name)}));
                }
                let names = string_list(&body["datasources"]);
                if let Some(missing) = names.iter().find(|n| !has_datasource(&state, n)) {
                    return (404, json!({"detail": format!("Datasource {} not found", missing)}));
                }
                let mind = json!({
                    "name": name,
                    "datasources": names,
                    "prompt_template": body.get("prompt_template").cloned().unwrap_or(Value::Null),
                    "model_name": body.get("model_name").cloned().unwrap_or(json!("gpt-4o")),
                    "provider": body.get("provider").cloned().unwrap_or(json!("openai")),
                    "parameters": body.get("parameters").cloned().unwrap_or(json!({})),
                    "created_at": "2024-10-04 12:30:15.123456",
                    "updated_at": "2024-10-04 12:30:15.123456",
                });
                state.minds.push(mind);
                (200, Value::Null)
            }
            ("GET", ["projects", _, "minds", name]) => match state.minds.iter().find(|m| m["name"] == *name) {
                Some(mind) => (200, mind.clone()),
                None => (404, json!({"detail": "Mind not found"})),
            },
            ("PATCH", ["projects", _, "minds", name]) => {
                let patch = body.unwrap_or(json!({}));
                if let Some(new_name) = patch.get("name").and_then(Value::as_str) {
                    if new_name != *name && state.minds.iter().any(|m| m["name"] == new_name) {
                        return (409, json!({"detail": "Mind already exists"}));
                    }
                }
                if let Some(list) = patch.get("datasources") {
                    if let Some(missing) = string_list(list).iter().find(|n| !has_datasource(&state, n)) {
                        return (404, json!({"detail": format!("Datasource {} not found", missing)}));
                    }
                }
                let Some(mind) = state.minds.iter_mut().find(|m| m["name"] == *name) else {
                    return (404, json!({"detail": "Mind not found"}));
                };
                if let (Value::Object(target), Value::Object(fields)) = (mind, patch) {
                    for (key, value) in fields {
                        target.insert(key, value);
                    }
                    target.insert("updated_at".into(), json!("2024-10-05 08:00:00"));
                }
                (200, Value::Null)
            }
            ("DELETE", ["projects", _, "minds", name]) => {
                let before = state.minds.len();
                state.minds.retain(|m| m["name"] != *name);
                if state.minds.len() == before {
                    (404, json!({"detail": "Mind not found"}))
                } else {
                    (200, Value::Null)
                }
            }
            ("POST", ["projects", _, "minds", name, "datasources"]) => {
                let ds = body
                    .as_ref()
                    .and_then(|b| b["name"].as_str())
                    .unwrap_or_default()
                    .to_string();
                if !has_datasource(&state, &ds) {
                    return (404, json!({"detail": "Datasource not found"}));
                }
                let conflict = self.conflict_on_duplicate_attach;
                let Some(mind) = state.minds.iter_mut().find(|m| m["name"] == *name) else {
                    return (404, json!({"detail": "Mind not found"}));
                };
                let mut names = string_list(&mind["datasources"]);
                if names.contains(&ds) {
                    return if conflict {
                        (409, json!({"detail": "Datasource already attached"}))
                    } else {
                        (200, Value::Null)
                    };
                }
                names.push(ds);
                mind["datasources"] = json!(names);
                (200, Value::Null)
            }
            ("DELETE", ["projects", _, "minds", name, "datasources", ds]) => {
                let Some(mind) = state.minds.iter_mut().find(|m| m["name"] == *name) else {
                    return (404, json!({"detail": "Mind not found"}));
                };
                if detach(mind, ds) {
                    (200, Value::Null)
                } else {
                    (404, json!({"detail": "Datasource is not attached"}))
                }
            }
            ("POST", ["projects", _, "minds", name, "completions"]) => {
                if !state.minds.iter().any(|m| m["name"] == *name) {
                    return (404, json!({"detail": "Mind not found"}));
                }
                if let Some((status, message)) = &self.completion_failure {
                    return (*status, json!({"detail": message}));
                }
                if let Some(body) = &self.answer_body {
                    return (200, body.clone());
                }
                (
                    200,
                    json!({"choices": [{"message": {"role": "assistant", "content": self.full_answer()}}]}),
                )
            }
            _ => (405, json!({"detail": "Method not allowed"})),
        }
    }

    fn sse_body(&self) -> Vec<Result<Vec<u8>, MindsError>> {
        if let Some(payloads) = &self.stream_payloads {
            let mut chunks: Vec<Result<Vec<u8>, MindsError>> = payloads
                .iter()
                .map(|payload| Ok(format!("data: {}\n\n", payload).into_bytes()))
                .collect();
            chunks.push(Ok(b"data: [DONE]\n\n".to_vec()));
            return chunks;
        }
        let mut chunks = Vec::new();
        for (i, text) in self.answer_chunks.iter().enumerate() {
            if self.stream_breaks_after == Some(i) {
                chunks.push(Err(MindsError::Transport("connection reset by peer".into())));
                return chunks;
            }
            let frame = format!(
                "data: {}\n\n",
                json!({"choices": [{"delta": {"content": text}, "finish_reason": null}]})
            );
            // split every frame in two to exercise reassembly
            let (head, tail) = frame.as_bytes().split_at(frame.len() / 2);
            chunks.push(Ok(head.to_vec()));
            chunks.push(Ok(tail.to_vec()));
        }
        chunks.push(Ok(b": keep-alive\n\ndata: [DONE]\n\n".to_vec()));
        chunks
    }
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn has_datasource(state: &State, name: &str) -> bool {
    state.datasources.iter().any(|d| d["name"] == name)
}

fn detach(mind: &mut Value, ds: &str) -> bool {
    let mut names = string_list(&mind["datasources"]);
    let before = names.len();
    names.retain(|n| n != ds);
    let removed = names.len() != before;
    mind["datasources"] = json!(names);
    removed
}

fn segments(path: &str) -> Vec<String> {
    path.trim_matches('/')
        .split('/')
        .map(|s| urlencoding::decode(s).map(|c| c.into_owned()).unwrap_or_else(|_| s.to_string()))
        .collect()
}

#[async_trait]
impl Transport for FakeMindsServer {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<TransportResponse, MindsError> {
        self.requests.lock().unwrap().push((method.clone(), path.to_string()));
        let (status, body) = self.handle(&method, &segments(path), body);
        Ok(TransportResponse::new(status, body))
    }

    async fn request_stream(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ByteStream, MindsError> {
        self.requests.lock().unwrap().push((method.clone(), path.to_string()));
        assert_eq!(body.as_ref().map(|b| b["stream"].clone()), Some(json!(true)));

        let (status, reply) = self.handle(&method, &segments(path), body);
        if !(200..300).contains(&status) {
            let message = reply["detail"].as_str().unwrap_or_default().to_string();
            return Err(MindsError::RemoteService { status, message });
        }
        Ok(Box::pin(stream::iter(self.sse_body())))
    }
}

/// A client wired to a fresh fake server.
pub fn fake_client() -> (Client, Arc<FakeMindsServer>) {
    fake_client_with(FakeMindsServer::new())
}

pub fn fake_client_with(server: FakeMindsServer) -> (Client, Arc<FakeMindsServer>) {
    minds_sdk::init_logger();
    let server = Arc::new(server);
    let transport: Arc<dyn Transport> = server.clone();
    (Client::with_transport(transport, "mindsdb"), server)
}

pub fn postgres_config(name: &str) -> minds_sdk::DatabaseConfig {
    minds_sdk::DatabaseConfig::new(name, "postgres")
        .with_description("House sales")
        .with_connection("user", "demo_user")
        .with_connection("password", "demo_password")
        .with_connection("host", "samples.mindsdb.com")
        .with_connection("port", "5432")
        .with_connection("database", "demo")
        .with_connection("schema", "demo_data")
        .with_tables(["house_sales"])
}
