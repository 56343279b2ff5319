//! Integration tests for the synopsis REST API.
//!
//! Each test spins up an Axum server on a random port with stub
//! collaborators and exercises the real HTTP contract over reqwest.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use synopsis_assist::config::SynopsisConfig;
use synopsis_assist::error::{LlmError, ResearchError};
use synopsis_assist::llm::{CompletionRequest, CompletionResponse, LlmProvider};
use synopsis_assist::research::LlmSynthesizer;
use synopsis_assist::store::InMemorySessionStore;
use synopsis_assist::synopsis::research::{ResearchItem, SearchSource};
use synopsis_assist::synopsis::synopsis_routes;
use synopsis_assist::{Collaborators, build_state};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const LONG: &str = "a sufficiently long section value";

/// Stub LLM. Utterances of the form `field=value` become a one-field update;
/// anything else updates nothing. Analysis and suggestion prompts get fixed
/// replies.
struct StubLlm;

#[async_trait]
impl LlmProvider for StubLlm {
    fn model_name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let prompt = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
        let content = if prompt.contains("professional analysis") {
            "Stub analysis.".to_string()
        } else if prompt.contains("actionable suggestions") {
            let about = if prompt.contains("Drone crop survey") { "drones" } else { "the project" };
            format!("1. Stub suggestion for {about}.")
        } else {
            let utterance = prompt
                .split("User's latest message:\n")
                .nth(1)
                .and_then(|rest| rest.lines().next())
                .unwrap_or_default();
            let mut memory = serde_json::Map::new();
            if let Some((key, value)) = utterance.split_once('=') {
                memory.insert(key.to_string(), Value::String(value.to_string()));
            }
            json!({"updated_memory": memory, "ai_response": "Got it. Tell me more."}).to_string()
        };
        Ok(CompletionResponse {
            content,
            input_tokens: 0,
            output_tokens: 0,
        })
    }
}

struct StubSource(&'static str);

#[async_trait]
impl SearchSource for StubSource {
    fn name(&self) -> &str {
        self.0
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ResearchItem>, ResearchError> {
        Ok((1..=limit.min(2))
            .map(|i| ResearchItem::new(format!("{} result {i} for {query}", self.0), None))
            .collect())
    }
}

struct DownSource;

#[async_trait]
impl SearchSource for DownSource {
    fn name(&self) -> &str {
        "down"
    }

    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<ResearchItem>, ResearchError> {
        Err(ResearchError::Status {
            source_name: "down".to_string(),
            status: 503,
        })
    }
}

/// Start an Axum server on a random port, return (base url, output dir guard).
async fn start_server() -> (String, tempfile::TempDir) {
    let output = tempfile::tempdir().unwrap();
    let llm: Arc<dyn LlmProvider> = Arc::new(StubLlm);
    let state = build_state(
        Collaborators {
            store: Arc::new(InMemorySessionStore::new()),
            llm: llm.clone(),
            repositories: Arc::new(StubSource("repo")),
            papers: Arc::new(DownSource),
            synthesizer: Arc::new(LlmSynthesizer::new(llm)),
        },
        &SynopsisConfig::default(),
        output.path(),
    );
    let app = synopsis_routes(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://127.0.0.1:{port}"), output)
}

async fn say(client: &reqwest::Client, base: &str, session_id: &str, message: &str) -> Value {
    client
        .post(format!("{base}/api/conversation"))
        .json(&json!({"session_id": session_id, "message": message}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_and_session_creation() {
    timeout(TEST_TIMEOUT, async {
        let (base, _out) = start_server().await;
        let client = reqwest::Client::new();

        let health: Value = client.get(format!("{base}/api/health")).send().await.unwrap().json().await.unwrap();
        assert_eq!(health["status"], "ok");

        let session: Value = client
            .post(format!("{base}/api/session"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(!session["session_id"].as_str().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn title_turn_triggers_research_once() {
    timeout(TEST_TIMEOUT, async {
        let (base, _out) = start_server().await;
        let client = reqwest::Client::new();

        let first = say(&client, &base, "s1", "title=Smart attendance system").await;
        assert_eq!(first["session_id"], "s1");
        assert_eq!(first["updated_fields"], json!(["title"]));
        assert_eq!(first["research_triggered"], true);
        assert_eq!(first["research"]["status"]["repositories"], "completed");
        assert_eq!(first["research"]["status"]["papers"], "failed");
        assert_eq!(first["research"]["papers"], json!([]));
        assert_eq!(first["research"]["analysis"], "Stub analysis.");
        assert_eq!(first["progress"]["stage"], "GATHERING_INFO");
        assert_eq!(first["generation_unlocked"], false);

        let second = say(&client, &base, "s1", "conclusion=Faster roll calls in class").await;
        assert_eq!(second["research_triggered"], false);
        assert!(second["research"].is_null());
        assert_eq!(second["profile"]["title"], "Smart attendance system");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn empty_message_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let (base, _out) = start_server().await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/api/conversation"))
            .json(&json!({"session_id": "s1", "message": "   "}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn generate_is_locked_until_three_sections() {
    timeout(TEST_TIMEOUT, async {
        let (base, _out) = start_server().await;
        let client = reqwest::Client::new();

        say(&client, &base, "s1", &format!("title={LONG}")).await;
        say(&client, &base, "s1", &format!("group_details={LONG}")).await;

        let locked = client
            .post(format!("{base}/api/generate-synopsis"))
            .json(&json!({"session_id": "s1"}))
            .send()
            .await
            .unwrap();
        assert_eq!(locked.status(), 409);

        let third = say(&client, &base, "s1", &format!("objective_scope={LONG}")).await;
        assert_eq!(third["generation_unlocked"], true);
        assert_eq!(third["progress"]["stage"], "RESEARCH_PHASE");

        let progress: Value = client
            .get(format!("{base}/api/progress/s1"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(progress["sections_needed"], 0);
        assert_eq!(progress["progress"]["filled_count"], 3);

        let generated: Value = client
            .post(format!("{base}/api/generate-synopsis"))
            .json(&json!({"session_id": "s1"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let url = generated["download_url"].as_str().unwrap();

        let download = client.get(format!("{base}{url}")).send().await.unwrap();
        assert_eq!(download.status(), 200);
        let body = download.text().await.unwrap();
        assert!(body.contains(&format!("# {LONG}")));
        assert!(body.contains("## 9. Related Projects"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ready_notice_shows_once_and_again_after_reset() {
    timeout(TEST_TIMEOUT, async {
        let (base, _out) = start_server().await;
        let client = reqwest::Client::new();

        let fields = ["title", "group_details", "objective_scope", "process_description", "conclusion"];
        let mut notices = Vec::new();
        for field in fields {
            let turn = say(&client, &base, "s1", &format!("{field}={LONG}")).await;
            notices.push(turn["ready_notice"].as_bool().unwrap());
        }
        assert_eq!(notices, vec![false, false, false, true, false]);

        let reset: Value = client
            .post(format!("{base}/api/session/s1/reset"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(reset["reset"], true);

        let view: Value = client
            .get(format!("{base}/api/session/s1"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(view["profile"], json!({}));
        assert_eq!(view["display"], json!([]));

        let mut notices = Vec::new();
        for field in &fields[..4] {
            let turn = say(&client, &base, "s1", &format!("{field}={LONG}")).await;
            notices.push(turn["ready_notice"].as_bool().unwrap());
        }
        assert_eq!(notices, vec![false, false, false, true]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn manual_search_endpoints() {
    timeout(TEST_TIMEOUT, async {
        let (base, _out) = start_server().await;
        let client = reqwest::Client::new();

        let repos: Value = client
            .get(format!("{base}/api/github-search?q=drones&limit=1"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(repos, json!([{"label": "repo result 1 for drones"}]));

        let papers: Value = client
            .get(format!("{base}/api/research-papers?q=drones"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(papers, json!([]));

        let analysis: Value = client
            .post(format!("{base}/api/professional-analysis"))
            .json(&json!({"title": "Drone crop survey"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(analysis["analysis"], "Stub analysis.");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ai_suggestions_from_memory_or_session() {
    timeout(TEST_TIMEOUT, async {
        let (base, _out) = start_server().await;
        let client = reqwest::Client::new();

        let from_memory: Value = client
            .post(format!("{base}/api/ai-suggestions"))
            .json(&json!({"memory": {"title": "Drone crop survey"}}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(from_memory["suggestions"], "1. Stub suggestion for drones.");

        say(&client, &base, "s1", "title=Drone crop survey").await;
        let from_session: Value = client
            .post(format!("{base}/api/ai-suggestions"))
            .json(&json!({"session_id": "s1"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(from_session["suggestions"], "1. Stub suggestion for drones.");

        let missing = client
            .post(format!("{base}/api/ai-suggestions"))
            .json(&json!({}))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), 400);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn download_rejects_bad_names() {
    timeout(TEST_TIMEOUT, async {
        let (base, _out) = start_server().await;
        let client = reqwest::Client::new();

        let bad = client.get(format!("{base}/api/download/notes.txt")).send().await.unwrap();
        assert_eq!(bad.status(), 400);

        let missing = client
            .get(format!("{base}/api/download/synopsis_20000101_000000_nothing.md"))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), 404);
    })
    .await
    .expect("test timed out");
}
