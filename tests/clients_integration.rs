//! Facade integration tests: paths, methods, query strings and bodies

mod common;

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rtai::clients::types::{
    ActivityEvent, EventIngestRequest, EventType, EventsReply, ReconRequest, RunRequest,
    SessionStartRequest, SuggestRequest,
};
use rtai::clients::{AdvisoryClient, AgentClient};
use rtai::http::Gateway;

fn advisory(server: &MockServer) -> AdvisoryClient {
    // Trailing slashes must not produce `//` paths
    let base = format!("{}//", server.uri());
    AdvisoryClient::new(&base, Gateway::new().unwrap(), common::fast_timeouts())
}

fn agent(server: &MockServer) -> AgentClient {
    AgentClient::new(&server.uri(), Gateway::new().unwrap(), common::fast_timeouts())
}

async fn last_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.expect("recording enabled");
    let last = requests.last().expect("a request was made");
    serde_json::from_slice(&last.body).expect("json body")
}

#[tokio::test]
async fn test_health_summary_and_legacy_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "app_env": "lab"})))
        .mount(&server)
        .await;

    let health = advisory(&server).health().await.unwrap();
    assert_eq!(health.summary(), "status=ok · env=lab");

    let legacy = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .mount(&legacy)
        .await;
    let health = agent(&legacy).health().await.unwrap();
    assert_eq!(health.summary(), "status=unknown");
}

#[tokio::test]
async fn test_create_session_posts_identity() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::session_json("s-1")))
        .mount(&server)
        .await;

    let request = SessionStartRequest {
        tenant_id: "lab".to_string(),
        user_id: "alice".to_string(),
        agent_id: "kali-01".to_string(),
        objective: "Capture the flag".to_string(),
        target_scope: vec!["10.0.0.5".to_string()],
        policy_id: "default".to_string(),
    };
    let record = advisory(&server).create_session(&request).await.unwrap();
    assert_eq!(record.session_id, "s-1");

    let body = last_body(&server).await;
    assert_eq!(body["user_id"], "alice");
    assert_eq!(body["target_scope"], json!(["10.0.0.5"]));
}

#[tokio::test]
async fn test_session_id_is_trimmed_and_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sessions/a%20b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::session_json("a b")))
        .mount(&server)
        .await;

    let record = advisory(&server).get_session("  a b ").await.unwrap();
    assert_eq!(record.session_id, "a b");
}

#[tokio::test]
async fn test_list_sessions_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sessions"))
        .and(query_param("tenant_id", "lab"))
        .and(query_param("user_id", "alice"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"session_id": "s-1", "current_phase": "recon", "updated_at": "2026-01-01T10:00:00Z"},
            {"session_id": "s-2"}
        ])))
        .mount(&server)
        .await;

    let items = advisory(&server)
        .list_sessions(" lab ", "alice", 100)
        .await
        .unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].current_phase.as_deref(), Some("recon"));
}

#[tokio::test]
async fn test_delete_session_ignores_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/sessions/s-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("deleted"))
        .mount(&server)
        .await;

    advisory(&server).delete_session("s-1").await.unwrap();
}

#[tokio::test]
async fn test_add_events_reply_shapes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/sessions/s-1/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let request = EventIngestRequest {
        events: vec![ActivityEvent::new(
            EventType::Command,
            json!({"command": "nmap -sV 10.0.0.5"}),
        )],
    };
    let reply = advisory(&server).add_events("s-1", &request).await.unwrap();
    assert_eq!(reply, EventsReply::Ack { ok: Some(true) });

    let body = last_body(&server).await;
    assert_eq!(body["events"][0]["event_type"], "command");
    assert_eq!(body["events"][0]["payload"]["command"], "nmap -sV 10.0.0.5");
}

#[tokio::test]
async fn test_suggest_returns_raw_value() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/sessions/s-1/suggest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"actions": ["Run nikto"]}})))
        .mount(&server)
        .await;

    let request = SuggestRequest {
        user_message: None,
        memory_mode: Default::default(),
        history_window: 12,
        phase_override: None,
        persist_phase_override: Some(false),
        rag_focus: None,
    };
    let value = advisory(&server).suggest("s-1", &request).await.unwrap();
    assert_eq!(value["data"]["actions"][0], "Run nikto");

    let body = last_body(&server).await;
    assert_eq!(body["memory_mode"], "window");
    assert_eq!(body["history_window"], 12);
    assert!(body.get("user_message").is_none());
}

#[tokio::test]
async fn test_agent_actions() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auto-recon"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"started": true})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/run"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"exit_code": 0, "stdout": "root"})))
        .mount(&server)
        .await;

    let client = agent(&server);
    let request = ReconRequest {
        session_id: "s-1".to_string(),
        base_url: "http://ai.lab:8088".to_string(),
        targets: vec!["10.0.0.5".to_string()],
        enable_nmap: true,
        full_port: false,
        once: true,
        verbose: true,
    };
    assert_eq!(client.auto_recon(&request).await.unwrap()["started"], true);
    let body = last_body(&server).await;
    assert_eq!(body["base_url"], "http://ai.lab:8088");
    assert_eq!(body["enable_nmap"], true);

    let run = RunRequest {
        command: "whoami".to_string(),
        timeout: Some(30),
    };
    assert_eq!(client.run(&run).await.unwrap()["stdout"], "root");
    assert_eq!(last_body(&server).await["timeout"], 30);
}
