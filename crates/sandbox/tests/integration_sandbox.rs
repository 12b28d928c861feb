//! Snippets running against mocked third-party APIs

use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use sluice_action::{
    ActionDefinition, ActionRunner, BuildOptions, Dispatcher, Org, ResponseProcessor,
};
use sluice_resilience::RetryStrategy;
use sluice_sandbox::{
    BuiltinFunctionCall, Execution, ExecutionReport, ExecutionState, Sandbox, SandboxConfig,
    SandboxError,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sandbox(timeout: Duration) -> Sandbox {
    let runner = ActionRunner::new(
        Dispatcher::new(RetryStrategy::exponential(3).unwrap()).unwrap(),
        ResponseProcessor::new(),
        BuildOptions::default(),
    );
    Sandbox::new(
        runner,
        SandboxConfig {
            timeout,
            ..SandboxConfig::default()
        },
    )
}

fn action(host: &str, name: &str, route: &str) -> ActionDefinition {
    serde_json::from_value(json!({
        "name": name,
        "http_method": "GET",
        "path": route,
        "parameters": [{"name": "id", "in": "path", "required": true}],
        "api": {
            "api_host": host,
            "auth_header": "Authorization",
            "auth_scheme": "Bearer"
        }
    }))
    .unwrap()
}

async fn run(code: &str, actions: Vec<ActionDefinition>, timeout: Duration) -> ExecutionReport {
    sandbox(timeout)
        .run(Execution {
            code: code.to_string(),
            actions,
            org: Org {
                id: "org_1".into(),
                name: "Acme".into(),
                description: None,
            },
            user_api_key: Some(SecretString::from("user-key-42".to_string())),
        })
        .await
}

fn kinds(report: &ExecutionReport) -> Vec<&'static str> {
    report.events.iter().map(BuiltinFunctionCall::kind).collect()
}

fn last_error(report: &ExecutionReport) -> String {
    match report.events.last() {
        Some(BuiltinFunctionCall::Error(args)) => args.message.clone(),
        other => panic!("expected a trailing error event, got {other:?}"),
    }
}

#[tokio::test]
async fn records_calls_logs_and_plots_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/7"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": 7, "name": "Ada", "visits": [3, 5]})),
        )
        .mount(&server)
        .await;

    let code = r"
const user = await getUser({ id: 7 });
console.log('fetched', user.name);
plot('Visits', 'bar', user.visits, ['mon', 'tue']);
";
    let report = run(
        code,
        vec![action(&server.uri(), "get_user", "/users/{id}")],
        Duration::from_secs(10),
    )
    .await;

    assert_eq!(report.state, ExecutionState::Completed);
    assert!(report.error.is_none());
    assert_eq!(kinds(&report), ["call", "call-human-format", "log", "plot"]);

    let events = serde_json::to_value(&report.events).unwrap();
    assert_eq!(
        events[0],
        json!({"type": "call", "args": {"name": "getUser", "params": {"id": 7}}})
    );
    assert_eq!(
        events[1]["args"]["request"],
        json!(format!(
            "GET {}/users/7\nAccept: application/json\nAuthorization: Bearer <REDACTED>",
            server.uri()
        ))
    );
    assert!(!events.to_string().contains("user-key-42"));
    assert_eq!(events[2], json!({"type": "log", "args": {"message": "fetched Ada"}}));
    assert_eq!(
        events[3],
        json!({"type": "plot", "args": {"title": "Visits", "type": "bar", "data": [3, 5], "labels": ["mon", "tue"]}})
    );
}

#[tokio::test]
async fn downstream_errors_can_be_caught() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "no such user"})))
        .mount(&server)
        .await;

    let code = r"
try {
  await getUser({ id: 1 });
} catch (e) {
  console.log(e.name, e.action, e.status, e.body.message);
}
";
    let report = run(
        code,
        vec![action(&server.uri(), "get_user", "/users/{id}")],
        Duration::from_secs(10),
    )
    .await;

    assert!(report.is_success());
    assert_eq!(kinds(&report), ["call", "call-human-format", "log"]);
    assert_eq!(
        report.events[2],
        BuiltinFunctionCall::log("DownstreamAPIError getUser 404 no such user")
    );
}

#[tokio::test]
async fn config_errors_are_thrown_before_any_call_event() {
    let mut broken = action("https://api.example.com", "get_user", "/users/{id}");
    broken.path = None;

    let code = "try { await getUser({ id: 1 }); } catch (e) { console.error(e.name); }";
    let report = run(code, vec![broken], Duration::from_secs(10)).await;

    assert!(report.is_success());
    assert_eq!(
        report.events,
        vec![BuiltinFunctionCall::error("ActionConfigError")]
    );
}

#[tokio::test]
async fn uncaught_errors_keep_the_partial_trace() {
    let code = "console.log('start');\nnull.missing;\nconsole.log('never');\nconst a = 1;\nconst b = 2;";
    let report = run(code, Vec::new(), Duration::from_secs(10)).await;

    assert_eq!(report.state, ExecutionState::Errored);
    assert_eq!(kinds(&report), ["log", "error"]);
    assert!(matches!(report.error, Some(SandboxError::Runtime(_))));
    let message = last_error(&report);
    assert!(
        message.starts_with("TypeError: Cannot read properties of null (reading 'missing') (line 2, column 1)"),
        "{message}"
    );
}

#[tokio::test]
async fn syntax_errors_fail_before_running() {
    let report = run("console.log('hi');\nconst x = ;", Vec::new(), Duration::from_secs(10)).await;

    assert_eq!(report.state, ExecutionState::Errored);
    assert!(matches!(report.error, Some(SandboxError::Compile(_))));
    assert_eq!(kinds(&report), ["error"]);
    let message = last_error(&report);
    assert!(message.starts_with("SyntaxError: "), "{message}");
    assert!(message.contains("line 2"), "{message}");
}

#[tokio::test]
async fn slow_calls_time_out_with_their_events_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let report = run(
        "await getUser({ id: 1 });\nconsole.log('done');",
        vec![action(&server.uri(), "get_user", "/users/{id}")],
        Duration::from_millis(200),
    )
    .await;

    assert_eq!(report.state, ExecutionState::TimedOut);
    assert_eq!(kinds(&report), ["call", "call-human-format", "error"]);
    assert_eq!(last_error(&report), "Execution timed out after 200 ms");
}

#[tokio::test]
async fn unawaited_calls_run_concurrently() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"ok": true}))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let code = r"
const [a, b] = await Promise.all([getUser({ id: 1 }), getOrder({ id: 2 })]);
console.log(a.ok && b.ok);
";
    let started = Instant::now();
    let report = run(
        code,
        vec![
            action(&server.uri(), "get_user", "/users/{id}"),
            action(&server.uri(), "get_order", "/orders/{id}"),
        ],
        Duration::from_secs(10),
    )
    .await;

    assert!(report.is_success(), "{:?}", report.events);
    assert!(started.elapsed() < Duration::from_millis(550));
    assert_eq!(report.events.last(), Some(&BuiltinFunctionCall::log("true")));
    let mut calls: Vec<&str> = report
        .events
        .iter()
        .filter_map(|event| match event {
            BuiltinFunctionCall::Call(args) => Some(args.name.as_str()),
            _ => None,
        })
        .collect();
    calls.sort_unstable();
    assert_eq!(calls, ["getOrder", "getUser"]);
}
