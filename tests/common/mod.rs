#![allow(dead_code)]

use async_trait::async_trait;
use axum::{routing::get, Json, Router};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use spacex_rag::config::{parse_config, Config};
use spacex_rag::embedding::EmbeddingProvider;
use spacex_rag::engine::RagEngine;
use spacex_rag::error::{RagError, RagResult};
use spacex_rag::launches::LaunchClient;
use spacex_rag::llm::AnswerProvider;
use spacex_rag::server::{router, AppState};

const VOCAB: [&str; 8] = [
    "ift-5", "anomaly", "boostback", "raptor", "engine", "catch", "booster", "starship",
];

/// Bag-of-keywords embedder: deterministic and offline.
pub struct FakeEmbedder {
    pub calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake-keywords"
    }
    fn dims(&self) -> usize {
        VOCAB.len() + 1
    }
    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                let mut v: Vec<f32> = VOCAB.iter().map(|w| lower.matches(w).count() as f32).collect();
                v.push(0.05);
                v
            })
            .collect())
    }
}

/// Returns a fixed answer, or fails every call.
pub struct FakeAnswerer {
    pub answer: Option<String>,
}

impl FakeAnswerer {
    pub fn fixed(answer: &str) -> Self {
        Self {
            answer: Some(answer.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self { answer: None }
    }
}

#[async_trait]
impl AnswerProvider for FakeAnswerer {
    fn model_name(&self) -> &str {
        "fake-answer"
    }
    fn context_window(&self) -> usize {
        8192
    }
    async fn complete(&self, _prompt: &str) -> RagResult<String> {
        self.answer
            .clone()
            .ok_or_else(|| RagError::AnswerProvider("simulated provider outage".to_string()))
    }
}

pub struct TestEnv {
    pub tmp: TempDir,
    pub data_dir: PathBuf,
    pub storage_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let data_dir = tmp.path().join("data");
        fs::create_dir_all(&data_dir).unwrap();
        let storage_dir = tmp.path().join("storage");
        Self {
            tmp,
            data_dir,
            storage_dir,
        }
    }

    pub fn with_spacex_corpus() -> Self {
        let env = Self::new();
        env.write(
            "ift5.txt",
            "IFT-5 experienced a boostback burn anomaly lasting 48 seconds",
        );
        env.write(
            "raptor.md",
            "# Raptor\n\nRaptor engine test stand firing at McGregor.",
        );
        env.write(
            "catch.txt",
            "The booster catch used the chopstick arms of the launch tower.",
        );
        env
    }

    pub fn write(&self, name: &str, text: &str) {
        fs::write(self.data_dir.join(name), text).unwrap();
    }

    pub fn config(&self, opts: &ConfigOpts) -> Config {
        parse_config(&self.config_toml(opts)).unwrap()
    }

    pub fn config_toml(&self, opts: &ConfigOpts) -> String {
        let persist = if opts.persist {
            format!("persist_dir = \"{}\"", self.storage_dir.display())
        } else {
            String::new()
        };
        format!(
            r#"
[server]
bind = "127.0.0.1:0"

[corpus]
root = "{data}"
allow_empty = {allow_empty}

[retrieval]
top_k = 2

[index]
{persist}

[embedding]
provider = "ollama"
model = "fake-keywords"
dims = {dims}
url = "http://127.0.0.1:1"
max_retries = 0

[llm]
provider = "ollama"
model = "fake-answer"
url = "http://127.0.0.1:1"
max_retries = 0

[launches]
base_url = "{launches}"
timeout_secs = 5
"#,
            data = self.data_dir.display(),
            allow_empty = opts.allow_empty,
            persist = persist,
            dims = VOCAB.len() + 1,
            launches = opts.launches_url,
        )
    }

    pub fn write_config_file(&self, opts: &ConfigOpts) -> PathBuf {
        let path = self.tmp.path().join("rag.toml");
        fs::write(&path, self.config_toml(opts)).unwrap();
        path
    }

    pub fn root(&self) -> &Path {
        self.tmp.path()
    }
}

pub struct ConfigOpts {
    pub persist: bool,
    pub allow_empty: bool,
    pub launches_url: String,
}

impl Default for ConfigOpts {
    fn default() -> Self {
        Self {
            persist: false,
            allow_empty: false,
            launches_url: "http://127.0.0.1:1".to_string(),
        }
    }
}

pub fn app_state(
    config: Config,
    embedder: Arc<FakeEmbedder>,
    answerer: Arc<FakeAnswerer>,
) -> AppState {
    let launches = LaunchClient::new(&config.launches).unwrap();
    let engine = RagEngine::new(Arc::new(config), embedder, answerer);
    AppState::new(Arc::new(engine), launches)
}

/// Serve `app` on an ephemeral port and return its base URL.
pub async fn spawn_router(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub async fn spawn_app(state: AppState) -> String {
    spawn_router(router(state)).await
}

/// A stand-in for api.spacexdata.com/v5.
pub async fn spawn_fake_spacex_api() -> String {
    let app = Router::new()
        .route(
            "/launches/latest",
            get(|| async {
                Json(json!({
                    "name": "Starlink 10-9",
                    "date_utc": "2024-10-15T08:21:00.000Z",
                    "success": true,
                    "flight_number": 187,
                    "details": null
                }))
            }),
        )
        .route(
            "/launches",
            get(|| async {
                Json(json!([
                    {"name": "FalconSat", "date_utc": "2006-03-24T22:30:00.000Z", "success": false},
                    {"name": "Crew-9", "date_utc": "2024-09-28T17:17:00.000Z", "success": true},
                    {"name": "Starlink 10-9", "date_utc": "2024-10-15T08:21:00.000Z", "success": true},
                    {"name": "Trailblazer", "date_utc": "2008-08-03T03:34:00.000Z", "success": false}
                ]))
            }),
        );
    spawn_router(app).await
}

/// An upstream that answers 200 with a body that is not JSON.
pub async fn spawn_garbled_spacex_api() -> String {
    let app = Router::new().route("/launches/latest", get(|| async { "<html>maintenance</html>" }));
    spawn_router(app).await
}
