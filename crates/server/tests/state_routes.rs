use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use configs::AppConfig;
use serde_json::json;
use service::lock_info::LockInfo;
use tower::Service;
use uuid::Uuid;

use server::routes::state::PURGED_BODY;
use server::startup::build_app;

struct TestApp {
    app: Router,
    dir: std::path::PathBuf,
}

impl TestApp {
    async fn start() -> anyhow::Result<Self> {
        let dir = std::env::temp_dir().join(format!("tfstate_routes_{}", Uuid::new_v4()));
        let mut cfg = AppConfig::default();
        cfg.storage.directory = dir.clone();
        let app = build_app(&cfg).await?;
        Ok(Self { app, dir })
    }

    async fn put_file(&self, name: &str, content: &[u8]) -> anyhow::Result<()> {
        tokio::fs::write(self.dir.join(name), content).await?;
        Ok(())
    }

    async fn send(&self, method: &str, uri: &str, body: impl Into<Body>) -> anyhow::Result<(StatusCode, Option<String>, Vec<u8>)> {
        let req = Request::builder().method(method).uri(uri).body(body.into())?;
        let resp = self.app.clone().call(req).await?;
        let status = resp.status();
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await?;
        Ok((status, content_type, bytes.to_vec()))
    }

    async fn cleanup(self) {
        let _ = tokio::fs::remove_dir_all(&self.dir).await;
    }
}

fn lock_payload(id: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "ID": id,
        "Operation": "START",
        "Info": "ThisInfo",
        "Who": "",
        "Version": "",
        "Created": Utc::now().to_rfc3339(),
        "Path": ""
    }))
    .expect("encode lock payload")
}

#[tokio::test]
async fn get_returns_content_or_not_found() -> anyhow::Result<()> {
    let t = TestApp::start().await?;
    t.put_file("state_file1.tfstate", b"This is the content").await?;

    let (status, content_type, body) = t.send("GET", "/state_file1", Body::empty()).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    assert_eq!(body, b"This is the content");

    let (status, _, body) = t.send("GET", "/no_file1", Body::empty()).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, b"Not Found");
    t.cleanup().await;
    Ok(())
}

#[tokio::test]
async fn post_creates_and_replaces_state() -> anyhow::Result<()> {
    let t = TestApp::start().await?;
    t.put_file("existing_file.tfstate", b"old content").await?;

    let (status, _, body) = t.send("POST", "/new_file", "New File Content").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"New File Content");

    let (status, _, body) = t.send("POST", "/existing_file", "updated content").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"updated content");

    let (_, _, body) = t.send("GET", "/existing_file.tfstate", Body::empty()).await?;
    assert_eq!(body, b"updated content");
    t.cleanup().await;
    Ok(())
}

#[tokio::test]
async fn delete_reports_success_for_missing_state() -> anyhow::Result<()> {
    let t = TestApp::start().await?;
    t.put_file("existing_state.tfstate", b"This is the Content").await?;

    for uri in ["/existing_state", "/no_file_exists"] {
        let (status, content_type, body) = t.send("DELETE", uri, Body::empty()).await?;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(content_type.as_deref(), Some("application/json"));
        assert_eq!(body, PURGED_BODY.as_bytes());
    }

    let (status, _, _) = t.send("GET", "/existing_state", Body::empty()).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    t.cleanup().await;
    Ok(())
}

#[tokio::test]
async fn delete_that_cannot_remove_the_file_is_internal_error() -> anyhow::Result<()> {
    let t = TestApp::start().await?;
    let squatter = t.dir.join("stuck.tfstate");
    tokio::fs::create_dir(&squatter).await?;
    tokio::fs::write(squatter.join("inner"), b"x").await?;

    let (status, content_type, body) = t.send("DELETE", "/stuck", Body::empty()).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    assert_eq!(body, b"Internal Server Error");
    t.cleanup().await;
    Ok(())
}

#[tokio::test]
async fn lock_method_acquires_and_detects_conflicts() -> anyhow::Result<()> {
    let t = TestApp::start().await?;
    let l1 = lock_payload("myid1");
    let l2 = lock_payload("myid2");
    t.put_file("exists_statelock.lock", &l2).await?;

    let (status, _, body) = t.send("LOCK", "/not_file", "jfkdslf").await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, b"Internal Server Error");

    let (status, _, body) = t.send("LOCK", "/not_file", l1.clone()).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, LockInfo::from_slice(&l1)?.to_indented_json()?);

    let (status, _, body) = t.send("LOCK", "/exists_statelock", l1.clone()).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, b"Conflict");

    // the holder of an existing lock gets the stored bytes back
    let (status, _, body) = t.send("LOCK", "/exists_statelock", l2.clone()).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, l2);
    t.cleanup().await;
    Ok(())
}

#[tokio::test]
async fn unlock_method_releases_only_for_the_holder() -> anyhow::Result<()> {
    let t = TestApp::start().await?;
    let l1 = lock_payload("myid1");
    let l2 = lock_payload("myid2");
    t.put_file("exists_statelock.lock", &l2).await?;

    let (status, _, body) = t.send("UNLOCK", "/not_file", "jfkdslf").await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, b"Internal Server Error");

    let (status, _, body) = t.send("UNLOCK", "/not_file", l1.clone()).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, l1);

    let (status, _, body) = t.send("UNLOCK", "/exists_statelock", l1.clone()).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, b"Conflict");

    let (status, _, body) = t.send("UNLOCK", "/exists_statelock", l2.clone()).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, l2);
    assert!(tokio::fs::metadata(t.dir.join("exists_statelock.lock")).await.is_err());
    t.cleanup().await;
    Ok(())
}

#[tokio::test]
async fn unknown_methods_and_bad_ids_are_rejected() -> anyhow::Result<()> {
    let t = TestApp::start().await?;

    let (status, _, _) = t.send("PATCH", "/some_state", "x").await?;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, _, body) = t.send("GET", "/%2E%2E", Body::empty()).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, b"Bad Request");

    let (status, _, _) = t.send("POST", "/a%2Fb", "x").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    t.cleanup().await;
    Ok(())
}

#[tokio::test]
async fn health_is_served_on_root() -> anyhow::Result<()> {
    let t = TestApp::start().await?;
    for uri in ["/", "/health"] {
        let (status, _, body) = t.send("GET", uri, Body::empty()).await?;
        assert_eq!(status, StatusCode::OK);
        let value: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(value["status"], "ok");
    }
    t.cleanup().await;
    Ok(())
}

#[tokio::test]
async fn admin_router_exposes_store_metrics() -> anyhow::Result<()> {
    let t = TestApp::start().await?;
    let (status, _, _) = t.send("GET", "/never_written", Body::empty()).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let mut admin = common::admin_http::admin_router(service::metrics::encode_metrics);
    let resp = admin.call(Request::builder().uri("/metrics").body(Body::empty())?).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await?;
    let text = String::from_utf8(body.to_vec())?;
    assert!(text.contains(r#"tfstate_store_operations_total{operation="get",outcome="not_found"}"#));

    let resp = admin.call(Request::builder().uri("/healthz").body(Body::empty())?).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    t.cleanup().await;
    Ok(())
}
