use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use switchboard_config::SwitchboardConfig;
use switchboard_core::{CallRequest, Result, SwitchboardError, ToolDescriptor};
use switchboard_mcp::{list_top_level_tools, Router, SuiteConnector, SuiteDescriptor, SuiteSession};
use tokio::sync::Notify;

const CONFIG: &str = r#"
suites:
  - name: weather
    description: Weather tools
    command: weather-mcp
  - name: calendar
    description: Calendar tools
    url: http://localhost:7000
"#;

/// Session that answers like a small weather suite
struct FakeSession {
    suite: String,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl SuiteSession for FakeSession {
    async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>> {
        let tool = serde_json::from_value(json!({
            "name": "forecast",
            "description": "Daily forecast for a city",
            "inputSchema": {
                "type": "object",
                "properties": {"city": {"type": "string"}},
                "required": ["city"]
            }
        }))?;
        Ok(vec![tool])
    }

    async fn call_tool(&mut self, name: &str, arguments: Map<String, Value>) -> Result<Value> {
        match name {
            "forecast" => Ok(json!({
                "suite": self.suite,
                "city": arguments.get("city").cloned().unwrap_or(Value::Null),
                "temperatureC": 14
            })),
            other => Err(SwitchboardError::SuiteError {
                suite: self.suite.clone(),
                code: -32602,
                message: format!("Unknown tool: {}", other),
                data: None,
            }),
        }
    }

    async fn is_connected(&self) -> bool {
        true
    }

    async fn close(&mut self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct FakeConnector {
    attempts: Mutex<Vec<String>>,
    closes: Arc<AtomicUsize>,
    unreachable: Mutex<HashSet<String>>,
    gate: Option<Arc<Notify>>,
}

impl FakeConnector {
    fn attempts(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    fn set_unreachable(&self, suite: &str, unreachable: bool) {
        let mut set = self.unreachable.lock().unwrap();
        if unreachable {
            set.insert(suite.to_string());
        } else {
            set.remove(suite);
        }
    }
}

#[async_trait]
impl SuiteConnector for FakeConnector {
    async fn connect(&self, suite: &SuiteDescriptor) -> Result<Box<dyn SuiteSession>> {
        self.attempts.lock().unwrap().push(suite.name.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.unreachable.lock().unwrap().contains(&suite.name) {
            return Err(SwitchboardError::connection(&suite.name, "connection refused"));
        }
        Ok(Box::new(FakeSession {
            suite: suite.name.clone(),
            closes: self.closes.clone(),
        }))
    }
}

fn build_router(connector: Arc<FakeConnector>) -> Router {
    let config = SwitchboardConfig::from_yaml_str(CONFIG).unwrap();
    Router::new(&config, connector).unwrap()
}

fn city(name: &str) -> Map<String, Value> {
    let mut args = Map::new();
    args.insert("city".to_string(), json!(name));
    args
}

#[tokio::test]
async fn lists_one_tool_per_suite_in_order() {
    let connector = Arc::new(FakeConnector::default());
    let router = build_router(connector.clone());

    let tools = router.list_top_level_tools();
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["weather", "calendar"]);
    assert_eq!(tools[0].description, "Weather tools");

    let config = SwitchboardConfig::from_yaml_str(CONFIG).unwrap();
    assert_eq!(list_top_level_tools(&config).unwrap(), tools);

    // Listing is configuration-only
    assert_eq!(connector.attempts(), 0);
}

#[tokio::test]
async fn introspect_and_call_reach_the_suite() {
    let connector = Arc::new(FakeConnector::default());
    let router = build_router(connector.clone());

    let catalog = router
        .handle_suite_call("weather", CallRequest::introspect())
        .await
        .unwrap();
    assert_eq!(catalog[0]["name"], "forecast");
    assert_eq!(catalog[0]["inputSchema"]["required"], json!(["city"]));

    let result = router
        .handle_suite_call("weather", CallRequest::call("forecast", city("Lyon")))
        .await
        .unwrap();
    assert_eq!(result["temperatureC"], 14);
    assert_eq!(result["city"], "Lyon");

    // Both actions shared one connection
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test]
async fn raw_arguments_are_parsed_after_the_tool_is_resolved() {
    let connector = Arc::new(FakeConnector::default());
    let router = build_router(connector.clone());

    let result = router
        .handle_tool_call(
            "weather",
            json!({"action": "call", "subtool": "forecast", "args": {"city": "Nantes"}}),
        )
        .await
        .unwrap();
    assert_eq!(result["city"], "Nantes");

    let err = router
        .handle_tool_call("weather", json!({"action": "explode"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_request");
}

#[tokio::test]
async fn unknown_tool_never_connects() {
    let connector = Arc::new(FakeConnector::default());
    let router = build_router(connector.clone());

    let err = router
        .handle_suite_call("stocks", CallRequest::introspect())
        .await
        .unwrap_err();

    assert!(matches!(err, SwitchboardError::UnknownTool { ref name } if name == "stocks"));
    assert_eq!(connector.attempts(), 0);
}

#[tokio::test]
async fn call_without_subtool_fails_before_the_pool() {
    let connector = Arc::new(FakeConnector::default());
    let router = build_router(connector.clone());

    let request = CallRequest::from_value(json!({"action": "call", "args": {}})).unwrap();
    let err = router.handle_suite_call("weather", request).await.unwrap_err();

    assert_eq!(err.kind(), "invalid_request");
    assert_eq!(connector.attempts(), 0);
    assert_eq!(router.pool().status("weather"), None);
}

#[tokio::test]
async fn concurrent_calls_share_one_connect() {
    let gate = Arc::new(Notify::new());
    let connector = Arc::new(FakeConnector {
        gate: Some(gate.clone()),
        ..Default::default()
    });
    let router = build_router(connector.clone());

    let first = router.handle_suite_call("weather", CallRequest::introspect());
    let second = router.handle_suite_call("weather", CallRequest::call("forecast", city("Lyon")));
    let release = async {
        tokio::task::yield_now().await;
        gate.notify_one();
    };

    let (first, second, ()) = tokio::join!(first, second, release);
    first.unwrap();
    second.unwrap();
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test]
async fn connect_failures_are_retried_on_the_next_call() {
    let connector = Arc::new(FakeConnector::default());
    connector.set_unreachable("weather", true);
    let router = build_router(connector.clone());

    let err = router
        .handle_suite_call("weather", CallRequest::introspect())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "connection_error");
    assert_eq!(err.suite(), Some("weather"));
    assert!(err.is_retryable());

    connector.set_unreachable("weather", false);
    let catalog = router
        .handle_suite_call("weather", CallRequest::introspect())
        .await
        .unwrap();
    assert_eq!(catalog.as_array().unwrap().len(), 1);
    assert_eq!(connector.attempts(), 2);
}

#[tokio::test]
async fn one_broken_suite_does_not_affect_another() {
    let connector = Arc::new(FakeConnector::default());
    connector.set_unreachable("calendar", true);
    let router = build_router(connector.clone());

    let err = router
        .handle_suite_call("calendar", CallRequest::introspect())
        .await
        .unwrap_err();
    assert_eq!(err.suite(), Some("calendar"));

    let result = router
        .handle_suite_call("weather", CallRequest::call("forecast", city("Lyon")))
        .await
        .unwrap();
    assert_eq!(result["suite"], "weather");
}

#[tokio::test]
async fn suite_side_failures_propagate_with_their_details() {
    let connector = Arc::new(FakeConnector::default());
    let router = build_router(connector.clone());

    let err = router
        .handle_suite_call("weather", CallRequest::call("hurricane", Map::new()))
        .await
        .unwrap_err();

    match err {
        SwitchboardError::SuiteError { suite, code, message, .. } => {
            assert_eq!(suite, "weather");
            assert_eq!(code, -32602);
            assert!(message.contains("hurricane"));
        }
        other => panic!("expected SuiteError, got {:?}", other),
    }
}

#[tokio::test]
async fn close_all_clients_is_idempotent() {
    let connector = Arc::new(FakeConnector::default());
    let router = build_router(connector.clone());

    router
        .handle_suite_call("weather", CallRequest::introspect())
        .await
        .unwrap();
    router
        .handle_suite_call("calendar", CallRequest::introspect())
        .await
        .unwrap();

    router.close_all_clients().await;
    router.close_all_clients().await;
    assert_eq!(connector.closes.load(Ordering::SeqCst), 2);

    let err = router
        .handle_suite_call("weather", CallRequest::introspect())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "pool_closed");
    assert_eq!(connector.attempts(), 2);
}

#[tokio::test]
async fn close_all_clients_on_an_unused_pool() {
    let connector = Arc::new(FakeConnector::default());
    let router = build_router(connector.clone());

    router.close_all_clients().await;

    assert!(router.pool().is_closed());
    assert_eq!(connector.closes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn shutdown_from_two_tasks_closes_once() {
    let connector = Arc::new(FakeConnector::default());
    let router = build_router(connector.clone());
    router
        .handle_suite_call("weather", CallRequest::introspect())
        .await
        .unwrap();

    let fired = Arc::new(AtomicBool::new(false));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let router = router.clone();
            let fired = fired.clone();
            tokio::spawn(async move {
                router.close_all_clients().await;
                fired.store(true, Ordering::SeqCst);
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert!(fired.load(Ordering::SeqCst));
    assert_eq!(connector.closes.load(Ordering::SeqCst), 1);
}
