//! HTTP surface tests: an in-process server on an ephemeral port, driven
//! with reqwest.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use content_rotator::catalog::FolderCatalog;
use content_rotator::collection::CollectionKey;
use content_rotator::config::Config;
use content_rotator::error::{Result, SelectionError};
use content_rotator::gateway::{Gateway, ListingType};
use content_rotator::listing_cache::ListingCache;
use content_rotator::models::{Item, ItemFlags};
use content_rotator::selection::SelectionEngine;
use content_rotator::server::{router, AppState};

/// Serves twelve posts for `pics` and fails authentication for `private`.
#[derive(Default)]
struct StubGateway {
    invalidations: AtomicUsize,
}

#[async_trait]
impl Gateway for StubGateway {
    async fn fetch_listing(
        &self,
        key: &CollectionKey,
        _listing: ListingType,
        _limit: u32,
    ) -> Result<Vec<Item>> {
        match key.as_str() {
            "pics" => Ok((0..12)
                .map(|i| Item {
                    id: format!("p{}", i),
                    title: format!("post {}", i),
                    url: format!("https://i.redd.it/p{}.jpg", i),
                    permalink: String::new(),
                    flags: ItemFlags::default(),
                    gallery_images: Vec::new(),
                    created_at: Utc::now(),
                    author: String::new(),
                    subreddit: "pics".into(),
                })
                .collect()),
            "private" => Err(SelectionError::Auth("token rejected".into())),
            _ => Err(SelectionError::SourceUnavailable(format!("r/{} 503", key))),
        }
    }

    fn invalidate_session(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}

struct TestServer {
    _tmp: TempDir,
    root: std::path::PathBuf,
    base: String,
    gateway: Arc<StubGateway>,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn touch(path: &Path, body: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

async fn start_server() -> TestServer {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();
    touch(&root.join("static/index.html"), b"<html>rotator</html>");
    touch(&root.join("static/custom_content/cats/a.jpg"), b"JPEGDATA");
    touch(&root.join("static/custom_punishment/chores/b.png"), b"PNGDATA");

    let config: Config = toml::from_str(&format!(
        r#"
[server]
bind = "127.0.0.1:0"
static_dir = "{root}/static"

[content]
static_dir = "{root}/static"

[reddit]
credentials_path = "{root}/credentials.json"

[settings]
path = "{root}/user_settings.json"
"#,
        root = root.display()
    ))
    .unwrap();

    let gateway = Arc::new(StubGateway::default());
    let engine = SelectionEngine::with_seed(
        gateway.clone(),
        Arc::new(ListingCache::new()),
        Arc::new(FolderCatalog::from_config(&config.content).unwrap()),
        42,
    );
    let app = router(AppState::new(&config, engine)).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        _tmp: tmp,
        root,
        base: format!("http://127.0.0.1:{}", port),
        gateway,
        handle,
    }
}

async fn post_json(srv: &TestServer, path: &str, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{}{}", srv.base, path))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

async fn get_json(srv: &TestServer, path: &str) -> (u16, Value) {
    let resp = reqwest::get(format!("{}{}", srv.base, path)).await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health() {
    let srv = start_server().await;
    let (status, body) = get_json(&srv, "/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_get_content_remote() {
    let srv = start_server().await;
    let (status, body) = post_json(
        &srv,
        "/get_content",
        json!({
            "contentSource": "reddit",
            "subreddits": {"favorites": [{"name": "r/pics", "enabled": true}], "punishments": []},
            "timerMin": "10",
            "timerMax": 10,
            "contentHistory": [{"subreddit": "pics", "post_id": "p0"}]
        }),
    )
    .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["source"], "remote");
    assert_eq!(body["timer_seconds"], 10);
    assert_eq!(body["is_punishment"], false);
    assert_ne!(body["item_id"], "p0");
    assert!(body.get("file_name").is_none());

    let (status, cache) = get_json(&srv, "/cache").await;
    assert_eq!(status, 200);
    assert_eq!(cache["count"], 1);
    assert_eq!(cache["entries"][0]["key"], "pics");
    assert_eq!(cache["entries"][0]["kind"], "hot");
    assert_eq!(cache["entries"][0]["items"], 12);
}

#[tokio::test]
async fn test_get_content_local_and_media_served() {
    let srv = start_server().await;
    let (status, body) = post_json(
        &srv,
        "/get_content",
        json!({"contentSource": "custom", "punishmentsEnabled": false}),
    )
    .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["source"], "local");
    assert_eq!(body["url"], "/media/content/cats/a.jpg");
    assert_eq!(body["file_name"], "a.jpg");

    let media = reqwest::get(format!("{}/media/content/cats/a.jpg", srv.base))
        .await
        .unwrap();
    assert_eq!(media.status().as_u16(), 200);
    assert_eq!(media.bytes().await.unwrap().as_ref(), b"JPEGDATA");

    let media = reqwest::get(format!("{}/media/punishment/chores/b.png", srv.base))
        .await
        .unwrap();
    assert_eq!(media.status().as_u16(), 200);
}

#[tokio::test]
async fn test_error_envelope_and_statuses() {
    let srv = start_server().await;

    let (status, body) = post_json(&srv, "/get_content", json!({"contentSource": "remote"})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "no_eligible_source");

    let (status, body) = post_json(
        &srv,
        "/get_content",
        json!({"subreddits": {"favorites": ["private"]}}),
    )
    .await;
    assert_eq!(status, 401);
    assert_eq!(body["error"]["code"], "auth_error");

    let (status, body) = post_json(
        &srv,
        "/get_content",
        json!({"subreddits": {"favorites": ["down"]}}),
    )
    .await;
    assert_eq!(status, 502);
    assert_eq!(body["error"]["code"], "source_unavailable");

    let (status, body) = post_json(
        &srv,
        "/get_content",
        json!({"subreddits": {"favorites": ["r/???"]}}),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "invalid_collection_name");

    let (status, body) = post_json(
        &srv,
        "/get_content",
        json!({"subreddits": {"favorites": ["pics"]}, "timerMin": 90, "timerMax": 10}),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let srv = start_server().await;
    let resp = reqwest::Client::new()
        .post(format!("{}/get_content", srv.base))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_custom_folders_listing() {
    let srv = start_server().await;
    let (status, body) = get_json(&srv, "/get_custom_folders").await;
    assert_eq!(status, 200);
    assert_eq!(body["cached"], false);
    assert_eq!(body["content_folders"][0]["name"], "cats");
    assert_eq!(body["content_folders"][0]["file_count"], 1);
    assert_eq!(body["punishment_folders"][0]["name"], "chores");

    touch(&srv.root.join("static/custom_content/dogs/d.gif"), b"GIF");
    let (_, body) = get_json(&srv, "/get_custom_folders").await;
    assert_eq!(body["cached"], true);
    assert_eq!(body["content_folders"].as_array().unwrap().len(), 1);

    let (_, body) = get_json(&srv, "/get_custom_folders?refresh=true").await;
    assert_eq!(body["cached"], false);
    assert_eq!(body["content_folders"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_credentials_roundtrip_invalidates_session() {
    let srv = start_server().await;

    let (_, status) = get_json(&srv, "/credentials/status").await;
    assert_eq!(status["configured"], false);

    let (code, body) = post_json(
        &srv,
        "/update_credentials",
        json!({"client_id": " id ", "client_secret": "secret"}),
    )
    .await;
    assert_eq!(code, 200, "{}", body);
    assert_eq!(body["configured"], true);
    assert_eq!(srv.gateway.invalidations.load(Ordering::SeqCst), 1);

    let saved: Value =
        serde_json::from_str(&fs::read_to_string(srv.root.join("credentials.json")).unwrap())
            .unwrap();
    assert_eq!(saved["client_id"], "id");
    assert_eq!(saved["user_agent"], "Goon/1.0");

    let (_, status) = get_json(&srv, "/credentials/status").await;
    assert_eq!(status["configured"], true);

    let (code, body) = post_json(&srv, "/update_credentials", json!({"client_id": "only"})).await;
    assert_eq!(code, 400);
    assert_eq!(body["error"]["code"], "bad_request");

    let (code, body) = post_json(
        &srv,
        "/update_credentials",
        json!({"client_id": "", "client_secret": ""}),
    )
    .await;
    assert_eq!(code, 200);
    assert_eq!(body["configured"], false);
    assert_eq!(srv.gateway.invalidations.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_settings_roundtrip() {
    let srv = start_server().await;

    let (status, body) = get_json(&srv, "/load_settings").await;
    assert_eq!(status, 200);
    assert_eq!(body["timerMin"], 30);

    let (status, body) = post_json(
        &srv,
        "/save_settings",
        json!({"favorites": ["pics"], "timerMin": "15", "theme": "dark"}),
    )
    .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["version"], "1.1");

    let (_, body) = get_json(&srv, "/load_settings").await;
    assert_eq!(body["favorites"][0], "pics");
    assert_eq!(body["timerMin"], 15);
    assert_eq!(body["theme"], "dark");
    assert!(body["lastUpdated"].is_string());
}

#[tokio::test]
async fn test_static_fallback() {
    let srv = start_server().await;
    let resp = reqwest::get(format!("{}/index.html", srv.base)).await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert!(resp.text().await.unwrap().contains("rotator"));
}
