use kommo_mcp::app::App;
use kommo_mcp::errors::{ToolError, ToolErrorKind};
use kommo_mcp::mcp::server::McpServer;
use kommo_mcp::services::logger::{LogLevel, Logger};
use kommo_mcp::services::tool_executor::{ToolExecutor, ToolHandler};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

mod common;
use common::FakeTransport;

#[derive(Clone)]
struct DummyHandler {
    calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl ToolHandler for DummyHandler {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({ "success": true, "args": args }))
    }
}

fn quiet_logger() -> Logger {
    Logger::new("test").with_level(LogLevel::Error)
}

fn app(transport: Arc<FakeTransport>) -> Arc<App> {
    Arc::new(App::with_transport(quiet_logger(), transport).expect("app wiring"))
}

fn tool_payload(response: &Value) -> Value {
    let text = response["result"]["content"][0]["text"]
        .as_str()
        .expect("text content");
    serde_json::from_str(text).expect("payload json")
}

async fn call(server: &McpServer, id: i64, name: &str, arguments: Value) -> Value {
    let line = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments},
    })
    .to_string();
    let response = server.handle_line(&line).await.expect("response");
    serde_json::to_value(&response).expect("encode response")
}

#[tokio::test]
async fn executor_wraps_results_and_strips_trace_ids() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut handlers: HashMap<String, Arc<dyn ToolHandler>> = HashMap::new();
    handlers.insert(
        "dummy".to_string(),
        Arc::new(DummyHandler {
            calls: calls.clone(),
        }),
    );
    let aliases = HashMap::from([("dm".to_string(), "dummy".to_string())]);
    let executor = ToolExecutor::new(quiet_logger(), handlers, aliases);

    let payload = executor
        .execute("dm", json!({"action": "ping", "trace_id": "t-1"}))
        .await
        .expect("execute");

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(payload["ok"], json!(true));
    assert_eq!(payload["result"]["args"], json!({"action": "ping"}));
    assert_eq!(payload["meta"]["tool"], json!("dummy"));
    assert_eq!(payload["meta"]["invoked_as"], json!("dm"));
    assert_eq!(payload["meta"]["trace_id"], json!("t-1"));
}

#[tokio::test]
async fn executor_suggests_close_tool_names() {
    let executor = ToolExecutor::new(quiet_logger(), HashMap::new(), HashMap::new());
    let err = executor
        .execute("kommo_custom_field", json!({}))
        .await
        .expect_err("unknown tool");
    assert_eq!(err.kind, ToolErrorKind::InvalidParams);

    let app = app(Arc::new(FakeTransport::lead_fixture()));
    let err = app
        .tool_executor
        .execute("kommo_custom_field", json!({"action": "update"}))
        .await
        .expect_err("unknown tool");
    assert!(err.hint.unwrap_or_default().contains("kommo_custom_fields"));
}

#[tokio::test]
async fn update_through_alias_returns_report() {
    let transport = Arc::new(FakeTransport::lead_fixture());
    let server = McpServer::with_app(app(transport.clone()));

    let response = call(
        &server,
        1,
        "custom_fields",
        json!({
            "action": "update",
            "entity_id": 42,
            "fields": {"City": "bogota", "Unknown": "x"}
        }),
    )
    .await;
    let payload = tool_payload(&response);

    assert_eq!(payload["ok"], json!(true));
    assert_eq!(payload["meta"]["tool"], json!("kommo_custom_fields"));
    assert_eq!(payload["meta"]["invoked_as"], json!("custom_fields"));
    assert_eq!(payload["result"]["success"], json!(true));
    assert_eq!(payload["result"]["updatedFields"], json!(1));
    assert_eq!(payload["result"]["errors"][0]["field"], json!("Unknown"));
    assert_eq!(transport.updates().len(), 1);
}

#[tokio::test]
async fn catalog_filters_enumerated_fields() {
    let server = McpServer::with_app(app(Arc::new(FakeTransport::lead_fixture())));
    let response = call(
        &server,
        2,
        "kommo_custom_fields",
        json!({"action": "catalog", "entity": "lead", "only_enumerated": true}),
    )
    .await;
    let payload = tool_payload(&response);

    assert_eq!(payload["result"]["count"], json!(2));
    assert_eq!(payload["result"]["entity"], json!("leads"));
    let names: Vec<&str> = payload["result"]["fields"]
        .as_array()
        .expect("fields")
        .iter()
        .filter_map(|field| field["name"].as_str())
        .collect();
    assert_eq!(names, vec!["City", "Interests"]);
}

#[tokio::test]
async fn snapshot_lists_populated_fields() {
    let server = McpServer::with_app(app(Arc::new(FakeTransport::lead_fixture())));
    let response = call(
        &server,
        3,
        "fields",
        json!({"action": "snapshot", "entity_id": "42"}),
    )
    .await;
    let payload = tool_payload(&response);
    assert_eq!(payload["result"]["entity_id"], json!(42));
    assert_eq!(payload["result"]["count"], json!(2));
}

#[tokio::test]
async fn malformed_values_are_invalid_params() {
    let transport = Arc::new(FakeTransport::lead_fixture());
    let server = McpServer::with_app(app(transport.clone()));
    let response = call(
        &server,
        4,
        "kommo_custom_fields",
        json!({"action": "update", "entity_id": 42, "fields": {"City": null}}),
    )
    .await;

    assert_eq!(response["error"]["code"], json!(-32602));
    assert!(response["error"]["message"]
        .as_str()
        .unwrap_or("")
        .starts_with("KommoError"));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn protocol_basics() {
    let server = McpServer::with_app(app(Arc::new(FakeTransport::lead_fixture())));

    let init = server
        .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
        .await
        .expect("initialize response");
    let init = serde_json::to_value(&init).expect("encode");
    assert_eq!(init["result"]["serverInfo"]["name"], json!("kommo"));

    assert!(server
        .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
        .await
        .is_none());

    let parse_error = server.handle_line("{not json").await.expect("parse error");
    assert_eq!(
        serde_json::to_value(&parse_error).expect("encode")["error"]["code"],
        json!(-32700)
    );

    let unknown = server
        .handle_line(r#"{"jsonrpc":"2.0","id":9,"method":"resources/list"}"#)
        .await
        .expect("method not found");
    assert_eq!(
        serde_json::to_value(&unknown).expect("encode")["error"]["code"],
        json!(-32601)
    );
}
