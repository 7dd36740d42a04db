use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Value};

use erpbot_agent::{Bot, BotConfig, BotParts, Collaborators};
use erpbot_infra::audit::InMemoryAuditSink;
use erpbot_infra::db::ScriptedQueryExecutor;
use erpbot_infra::erp::InMemoryErpStore;
use erpbot_infra::http::StaticApiClient;
use erpbot_perf::StaticHost;

struct TestServer {
    base_url: String,
    bot: Bot,
    store: Arc<InMemoryErpStore>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let config = BotConfig::default();
        let store = Arc::new(InMemoryErpStore::new());
        let parts = BotParts::wire(
            &config,
            Collaborators {
                db: Arc::new(ScriptedQueryExecutor::new()),
                api: Arc::new(StaticApiClient::always_ok()),
                store: store.clone(),
                audit: Arc::new(InMemoryAuditSink::new()),
                host: Arc::new(StaticHost::default()),
            },
        );
        let bot = Bot::new(config, parts);

        // Same router as prod, bound to an ephemeral port.
        let app = erpbot_api::app::build_app(bot.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            bot,
            store,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/bot{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn get(client: &reqwest::Client, url: String) -> (StatusCode, Value) {
    let res = client.get(url).send().await.unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

async fn post(client: &reqwest::Client, url: String, body: Value) -> (StatusCode, Value) {
    let res = client.post(url).json(&body).send().await.unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

#[tokio::test]
async fn status_of_a_fresh_bot() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/health", srv.base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let (status, body) = get(&client, srv.url("/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["name"], "erpbot");
    assert_eq!(body["data"]["running"], false);
    assert_eq!(body["data"]["stats"]["tests_run"], 0);
}

#[tokio::test]
async fn lifecycle_transitions() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (_, body) = post(&client, srv.url("/start"), json!({})).await;
    assert_eq!(body["success"], true);
    let (_, body) = post(&client, srv.url("/start"), json!({})).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Bot is already running");

    let (_, body) = post(&client, srv.url("/pause"), json!({})).await;
    assert_eq!(body["success"], true);
    let (_, body) = get(&client, srv.url("/status")).await;
    assert_eq!(body["data"]["paused"], true);

    let (_, body) = post(&client, srv.url("/resume"), json!({})).await;
    assert_eq!(body["success"], true);
    let (_, body) = post(&client, srv.url("/stop"), json!({})).await;
    assert_eq!(body["success"], true);
    assert!(!srv.bot.state().running);
}

#[tokio::test]
async fn unknown_suggestion_is_not_found() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let id = uuid::Uuid::now_v7();
    let (status, body) = post(&client, srv.url(&format!("/suggestions/{id}/apply")), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = post(&client, srv.url("/suggestions/not-a-uuid/apply"), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");

    let (status, body) = get(&client, srv.url("/suggestions?status=pending")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn simulate_clamps_the_scenario_count() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = post(&client, srv.url("/simulate"), json!({ "scenarios": 0 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["scenarios"], 1);

    let (_, body) = get(&client, srv.url("/simulate/log?limit=10")).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(srv.bot.stats().simulation_scenarios, 1);
}

#[tokio::test]
async fn manual_cycles_report_their_results() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = post(&client, srv.url("/generate/bulk"), json!({ "customers": 2 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["customers"], 2);
    assert_eq!(srv.store.customers().len(), 2);

    let (status, body) = post(&client, srv.url("/heal"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["errors_found"], 0);

    let (status, body) = post(&client, srv.url("/test"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["total"].as_u64().unwrap() > 0);

    let (status, body) = post(&client, srv.url("/test-features"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["categories"].is_object());

    let (_, body) = get(&client, srv.url("/errors?limit=5")).await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn performance_is_empty_before_any_sample() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = get(&client, srv.url("/performance")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["summary"], Value::Null);
    assert_eq!(body["data"]["history"], json!([]));
    assert_eq!(body["data"]["recommendations"], json!([]));
}

#[tokio::test]
async fn events_are_streamed() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    srv.bot.start().await;

    let mut res = client.get(srv.url("/events")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(srv.bot.pause());

    let mut seen = String::new();
    let found = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(chunk) = res.chunk().await.unwrap() {
            seen.push_str(&String::from_utf8_lossy(&chunk));
            if seen.contains("event: paused") {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);
    assert!(found, "no paused event in {seen:?}");
    srv.bot.stop().await;
}
