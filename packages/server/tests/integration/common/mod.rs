use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::config::MqAppConfig;
use reqwest::{Client, header};
use serde_json::Value;

use nitpick_server::config::{
    AppConfig, AuthConfig, CatalogConfig, CorsConfig, DatabaseConfig, LoggingConfig, ServerConfig,
};
use nitpick_server::entity::{submission, user};
use nitpick_server::fanout::{EventFanout, EventKind, FanoutError, StoreFanout};
use nitpick_server::flash::{FLASH_COOKIE, Flash};
use nitpick_server::state::AppState;
use nitpick_server::store::{ExerciseCatalog, MemoryStore};
use nitpick_server::utils::jwt;

const JWT_SECRET: &str = "test-secret-for-integration-tests";


pub mod routes {
    pub const ASSIGNMENTS: &str = "/api/v1/user/assignments";

    pub fn skip(language: &str, slug: &str, key: &str) -> String {
        format!("/api/v1/iterations/{language}/{slug}/skip?key={key}")
    }

    pub fn latest(key: &str) -> String {
        format!("/api/v1/iterations/latest?key={key}")
    }

    pub fn submission(key: &str) -> String {
        format!("/submissions/{key}")
    }

    pub fn submission_action(key: &str, action: &str) -> String {
        format!("/submissions/{key}/{action}")
    }
}

/// A job the app asked to enqueue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnqueuedJob {
    pub queue: &'static str,
    pub submission_key: String,
    pub version: i32,
}

/// Store-backed fan-out that records jobs instead of publishing them.
pub struct RecordingFanout {
    inner: StoreFanout,
    jobs: Mutex<Vec<EnqueuedJob>>,
}

impl RecordingFanout {
    pub fn jobs(&self) -> Vec<EnqueuedJob> {
        self.jobs.lock().unwrap().clone()
    }

    fn record(&self, queue: &'static str, submission_key: &str, version: i32) {
        self.jobs.lock().unwrap().push(EnqueuedJob {
            queue,
            submission_key: submission_key.to_string(),
            version,
        });
    }
}

#[async_trait]
impl EventFanout for RecordingFanout {
    async fn notify(
        &self,
        submission: &submission::Model,
        kind: EventKind,
        actor: &user::Model,
    ) -> Result<(), FanoutError> {
        self.inner.notify(submission, kind, actor).await
    }

    async fn authorize(
        &self,
        user: &user::Model,
        track: &str,
        slug: &str,
    ) -> Result<(), FanoutError> {
        self.inner.authorize(user, track, slug).await
    }

    async fn subscribe(
        &self,
        user: &user::Model,
        submission: &submission::Model,
    ) -> Result<(), FanoutError> {
        self.inner.subscribe(user, submission).await
    }

    async fn enqueue_analyze(
        &self,
        submission_key: &str,
        version: i32,
    ) -> Result<(), FanoutError> {
        self.record("analyze", submission_key, version);
        Ok(())
    }

    async fn enqueue_hello(&self, submission_key: &str, version: i32) -> Result<(), FanoutError> {
        self.record("hello", submission_key, version);
        Ok(())
    }
}

/// A running test server backed by the in-memory store.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub store: Arc<MemoryStore>,
    pub fanout: Arc<RecordingFanout>,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
    /// `Location` header of redirects.
    pub location: Option<String>,
    /// Decoded `flash` cookie, if one was set.
    pub flash: Option<Flash>,
}

impl TestResponse {
    async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let location = res
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let flash = res
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.strip_prefix(&format!("{FLASH_COOKIE}=")))
            .filter_map(|v| v.split(';').next())
            .find_map(Flash::decode);
        let text = res.text().await.expect("Failed to read response body");
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);

        Self {
            status,
            text,
            body,
            location,
            flash,
        }
    }

    /// Message of the flash cookie; panics when none was set.
    pub fn flash_message(&self) -> &str {
        &self
            .flash
            .as_ref()
            .expect("Expected a flash cookie")
            .message
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        let config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors: CorsConfig {
                    allow_origins: vec![],
                    max_age: 3600,
                },
            },
            database: DatabaseConfig {
                url: "memory://".to_string(),
            },
            auth: AuthConfig {
                jwt_secret: JWT_SECRET.to_string(),
            },
            mq: MqAppConfig {
                enabled: false,
                ..Default::default()
            },
            catalog: CatalogConfig::default(),
            logging: LoggingConfig::default(),
        };

        let store = Arc::new(MemoryStore::new());
        let fanout = Arc::new(RecordingFanout {
            inner: StoreFanout::new(store.clone(), None, config.mq.clone()),
            jobs: Mutex::new(Vec::new()),
        });

        let state = AppState {
            store: store.clone(),
            fanout: fanout.clone(),
            config,
        };
        let app = nitpick_server::build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to build HTTP client");

        Self {
            addr,
            client,
            store,
            fanout,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Create a user whose API key is `{username}-key`.
    pub fn create_user(&self, username: &str) -> user::Model {
        self.store
            .insert_user(username, &format!("{username}-key"), false)
            .expect("Failed to create user")
    }

    pub fn create_guest(&self, username: &str) -> user::Model {
        self.store
            .insert_user(username, &format!("{username}-key"), true)
            .expect("Failed to create guest")
    }

    pub async fn register_exercise(&self, track: &str, slug: &str) {
        self.store
            .register_exercise(track, slug, "")
            .await
            .expect("Failed to register exercise");
    }

    pub fn session_token(&self, user: &user::Model) -> String {
        jwt::sign(user.id, &user.username, JWT_SECRET).expect("Failed to sign session token")
    }

    /// Submit files for `user` through the API and return the submission key.
    pub async fn submit(
        &self,
        user: &user::Model,
        track: &str,
        slug: &str,
        files: &[(&str, &str)],
    ) -> String {
        let solution: serde_json::Map<String, Value> = files
            .iter()
            .map(|(path, code)| (path.to_string(), Value::String(code.to_string())))
            .collect();
        let res = self
            .post_json(
                routes::ASSIGNMENTS,
                &serde_json::json!({
                    "key": user.key,
                    "language": track,
                    "problem": slug,
                    "solution": solution,
                }),
            )
            .await;
        assert_eq!(res.status, 201, "submit failed: {}", res.text);
        res.body["id"]
            .as_str()
            .expect("Missing submission key")
            .to_string()
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn post_without_token(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn post_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn post_with_cookie(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header(header::COOKIE, format!("session={token}"))
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn get_without_token(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn get_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn delete_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .delete(self.url(path))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send DELETE request");

        TestResponse::from_response(res).await
    }
}
