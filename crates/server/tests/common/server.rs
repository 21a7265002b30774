//! Server test utilities.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use courier_cache::{MemoryCache, ResponseCache};
use courier_core::config::{AppConfig, CacheConfig, MetadataConfig, StorageConfig};
use courier_metadata::{MetadataStore, SqliteStore};
use courier_server::{AppState, Notifier, create_router};
use courier_storage::{FilesystemBackend, ObjectStore};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// Public endpoint configured for test storage; expected links derive from it.
pub const TEST_PUBLIC_ENDPOINT: &str = "https://blobs.example.com";

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage and no cache.
    pub async fn new() -> Self {
        Self::build(None).await
    }

    /// Create a test server with an in-memory response cache.
    pub async fn with_memory_cache() -> Self {
        Self::build(Some(Arc::new(MemoryCache::new()))).await
    }

    async fn build(cache: Option<Arc<dyn ResponseCache>>) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let storage_path = temp_dir.path().join("storage");
        let storage: Arc<dyn ObjectStore> = Arc::new(
            FilesystemBackend::new(&storage_path)
                .await
                .expect("Failed to create storage backend"),
        );

        let db_path = temp_dir.path().join("metadata.db");
        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(&db_path)
                .await
                .expect("Failed to create metadata store"),
        );

        let mut config = AppConfig::for_testing();
        config.storage = StorageConfig::Filesystem {
            path: storage_path,
            public_endpoint: TEST_PUBLIC_ENDPOINT.to_string(),
        };
        config.metadata = MetadataConfig::Sqlite { path: db_path };
        if cache.is_some() {
            config.cache = CacheConfig::Memory;
        }

        let state = AppState::new(config, storage, metadata, cache, Notifier::disabled());
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    /// Get access to the underlying metadata store.
    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.metadata.clone()
    }

    /// Sign up the admin user and log in, returning a bearer token.
    pub async fn auth_token(&self) -> String {
        let signup = serde_json::json!({
            "username": "admin",
            "password": "password",
            "api_key": "test-api-key",
        });
        let (status, _) = json_request(&self.router, "POST", "/signup", Some(signup), None).await;
        assert_eq!(status, StatusCode::OK, "signup failed");

        let login = serde_json::json!({ "username": "admin", "password": "password" });
        let (status, body) = json_request(&self.router, "POST", "/login", Some(login), None).await;
        assert_eq!(status, StatusCode::OK, "login failed");
        body.get("token")
            .and_then(|t| t.as_str())
            .expect("login response missing token")
            .to_string()
    }

    /// Create a dimension via its endpoint, returning the new ID.
    pub async fn create_dimension(&self, token: &str, kind: &str, name: &str) -> String {
        let title = {
            let mut chars = kind.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        };
        let data = format!("{{\"{kind}\": \"{name}\"}}");
        let (status, body) = multipart_request(
            &self.router,
            "POST",
            &format!("/create{title}"),
            Some(&data),
            &[],
            Some(token),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "create {kind} failed: {body}");
        body.get(format!("create{title}Result.Created"))
            .and_then(|v| v.as_str())
            .expect("create response missing id")
            .to_string()
    }

    /// Upload one or more files with the given `data` JSON payload.
    pub async fn upload(
        &self,
        token: &str,
        data: &str,
        files: &[(&str, &[u8])],
    ) -> (StatusCode, serde_json::Value) {
        multipart_request(&self.router, "POST", "/upload", Some(data), files, Some(token)).await
    }

    /// Seed the standard taxonomy used by the end-to-end scenarios.
    pub async fn seed_taxonomy(&self, token: &str) {
        self.create_dimension(token, "app", "testapp").await;
        self.create_dimension(token, "channel", "nightly").await;
        self.create_dimension(token, "platform", "universalPlatform")
            .await;
        self.create_dimension(token, "arch", "universalArch").await;
    }
}

/// Make a JSON request against the router.
#[allow(dead_code)]
pub async fn json_request(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
    auth_token: Option<&str>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = auth_token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }

    let body = match body {
        Some(v) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&v).unwrap())
        }
        None => Body::empty(),
    };

    let request = builder.body(body).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body_json: serde_json::Value = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null)
    };

    (status, body_json)
}

/// Make a multipart request with an optional `data` field and `file` parts.
#[allow(dead_code)]
pub async fn multipart_request(
    router: &axum::Router,
    method: &str,
    uri: &str,
    data: Option<&str>,
    files: &[(&str, &[u8])],
    auth_token: Option<&str>,
) -> (StatusCode, serde_json::Value) {
    let boundary = "courier-test-boundary";
    let mut body = Vec::new();

    for (filename, content) in files {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    if let Some(data) = data {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"data\"\r\n\r\n{data}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={boundary}"),
        );

    if let Some(token) = auth_token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }

    let request = builder.body(Body::from(body)).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body_json: serde_json::Value = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null)
    };

    (status, body_json)
}

/// Expected download link for an object key, mirroring the server's
/// escaping of key separators.
#[allow(dead_code)]
pub fn expected_link(key: &str) -> String {
    format!("{}/{}", TEST_PUBLIC_ENDPOINT, key.replace('/', "%2F"))
}
