//! Registry resolution and the full resolve → download → install pipeline
//! against stub servers.

use std::sync::{Arc, Mutex};

use flate2::write::GzEncoder;
use flate2::Compression;
use gravity_pm::http::{HttpClient, HttpClientConfig};
use gravity_pm::{
    GravityConfig, GravityError, InstallRequest, Pipeline, PipelineEvent, Registry, RegistryError,
    Stage,
};
use serde_json::json;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PACKAGE: &str = "@compy/gravity-lite";
const METADATA_PATH: &str = "/npm/@compy/gravity-lite";

fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (name, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        builder.append_data(&mut header, name, contents.as_bytes()).unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap()
}

fn metadata(tarball_url: &str) -> serde_json::Value {
    json!({
        "name": PACKAGE,
        "dist-tags": { "latest": "1.0.0" },
        "versions": { "1.0.0": { "dist": { "tarball": tarball_url } } }
    })
}

fn config_for(server: &MockServer) -> GravityConfig {
    let mut config = GravityConfig::new().with_license_key("key-123");
    config.registry_url = Some(server.uri());
    config
}

fn pipeline_for(server: &MockServer) -> Pipeline {
    Pipeline::from_config(&config_for(server), HttpClientConfig::default()).unwrap()
}

async fn mount_metadata(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(METADATA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_artifact(server: &MockServer, bytes: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path("/art.tgz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes))
        .mount(server)
        .await;
}

/// One-shot raw HTTP server: reads the request head, writes `response`
/// verbatim and closes the connection.
async fn serve_raw_once(response: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            head.extend_from_slice(&buf[..n]);
        }
        socket.write_all(&response).await.unwrap();
        socket.flush().await.unwrap();
    });

    format!("http://{}", addr)
}

#[tokio::test]
async fn test_resolve_returns_latest_tarball() {
    let server = MockServer::start().await;
    mount_metadata(&server, metadata("https://repobox.io/art.tgz")).await;

    let registry = Registry::new(Arc::new(HttpClient::new().unwrap()), server.uri());
    let resolved = registry.resolve(PACKAGE).await.unwrap();

    assert_eq!(resolved.version, "1.0.0");
    assert_eq!(resolved.tarball, "https://repobox.io/art.tgz");
}

#[tokio::test]
async fn test_registry_request_carries_credential() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(METADATA_PATH))
        .and(header("authorization", "Bearer key-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(metadata("http://127.0.0.1:9/art.tgz")))
        .expect(1)
        .mount(&server)
        .await;

    let base = TempDir::new().unwrap();
    let request = InstallRequest::new("myapp", base.path()).unwrap();

    // Nothing listens on the artifact port; only the metadata request matters
    let _ = pipeline_for(&server).run(request).await;
}

#[tokio::test]
async fn test_registry_status_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(METADATA_PATH))
        .respond_with(ResponseTemplate::new(418))
        .mount(&server)
        .await;

    let registry = Registry::new(Arc::new(HttpClient::new().unwrap()), server.uri());
    let err = registry.resolve(PACKAGE).await.unwrap_err();

    match err {
        RegistryError::Status { status, reason } => {
            assert_eq!(status, 418);
            assert_eq!(reason, "I'm a teapot");
        }
        other => panic!("Expected Status, got {:?}", other),
    }
}

#[tokio::test]
async fn test_registry_status_uses_server_message() {
    let base = serve_raw_once(
        b"HTTP/1.1 503 Registry Under Maintenance\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec(),
    )
    .await;

    let registry = Registry::new(Arc::new(HttpClient::new().unwrap()), base);
    let err = registry.resolve(PACKAGE).await.unwrap_err();

    assert_eq!(err.to_string(), "Got 503 from server: Registry Under Maintenance");
}

#[tokio::test]
async fn test_registry_invalid_payload() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(METADATA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let registry = Registry::new(Arc::new(HttpClient::new().unwrap()), server.uri());
    let err = registry.resolve(PACKAGE).await.unwrap_err();
    assert!(matches!(err, RegistryError::InvalidPayload(_)));
}

#[tokio::test]
async fn test_registry_missing_keys() {
    let server = MockServer::start().await;
    mount_metadata(&server, json!({ "dist-tags": { "latest": "1.0.0" }, "versions": {} })).await;

    let registry = Registry::new(Arc::new(HttpClient::new().unwrap()), server.uri());
    let err = registry.resolve(PACKAGE).await.unwrap_err();
    assert!(matches!(err, RegistryError::MissingKey(_)));
}

#[tokio::test]
async fn test_end_to_end_install() {
    let server = MockServer::start().await;
    mount_metadata(&server, metadata(&format!("{}/art.tgz", server.uri()))).await;
    mount_artifact(
        &server,
        tarball(&[
            ("package/package.json", r#"{"name":"gravity-lite"}"#),
            ("package/app/index.js", "export default {};"),
        ]),
    )
    .await;

    let base = TempDir::new().unwrap();
    let request = InstallRequest::new("myapp", base.path()).unwrap();

    let installed = pipeline_for(&server).run(request).await.unwrap();

    let target = base.path().join("myapp");
    assert_eq!(installed.version, "1.0.0");
    assert_eq!(installed.target_dir, target);
    assert_eq!(
        std::fs::read_to_string(target.join("package.json")).unwrap(),
        r#"{"name":"gravity-lite"}"#
    );
    assert_eq!(
        std::fs::read_to_string(target.join("app/index.js")).unwrap(),
        "export default {};"
    );
    assert!(!target.join("package").exists());
}

#[tokio::test]
async fn test_events_follow_stage_order() {
    let server = MockServer::start().await;
    mount_metadata(&server, metadata(&format!("{}/art.tgz", server.uri()))).await;
    mount_artifact(&server, tarball(&[("package/a.txt", "a")])).await;

    let base = TempDir::new().unwrap();
    let request = InstallRequest::new("myapp", base.path()).unwrap();
    let events = Mutex::new(Vec::new());

    pipeline_for(&server)
        .run_with_progress(request, |event| events.lock().unwrap().push(event.clone()))
        .await
        .unwrap();

    let stages: Vec<Stage> = events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::Stage(stage) => Some(*stage),
            _ => None,
        })
        .collect();
    assert_eq!(
        stages,
        vec![Stage::Resolving, Stage::Downloading, Stage::Installing, Stage::Done]
    );

    let events = events.lock().unwrap();
    assert!(events.contains(&PipelineEvent::Resolved {
        version: "1.0.0".to_string(),
        tarball: format!("{}/art.tgz", server.uri()),
    }));
    assert!(events
        .iter()
        .any(|e| matches!(e, PipelineEvent::Downloading { downloaded, .. } if *downloaded > 0)));
}

#[tokio::test]
async fn test_failed_download_creates_no_folder() {
    let server = MockServer::start().await;
    mount_metadata(&server, metadata(&format!("{}/art.tgz", server.uri()))).await;

    Mock::given(method("GET"))
        .and(path("/art.tgz"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let base = TempDir::new().unwrap();
    let request = InstallRequest::new("myapp", base.path()).unwrap();
    let last_stage = Mutex::new(Stage::Idle);

    let err = pipeline_for(&server)
        .run_with_progress(request, |event| {
            if let PipelineEvent::Stage(stage) = event {
                *last_stage.lock().unwrap() = *stage;
            }
        })
        .await
        .unwrap_err();

    assert!(matches!(err, GravityError::Download(_)));
    assert_eq!(*last_stage.lock().unwrap(), Stage::Failed);
    assert!(!base.path().join("myapp").exists());
}

#[tokio::test]
async fn test_registry_failure_makes_no_further_requests() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(METADATA_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let base = TempDir::new().unwrap();
    let request = InstallRequest::new("myapp", base.path()).unwrap();

    let err = pipeline_for(&server).run(request).await.unwrap_err();

    assert!(matches!(err, GravityError::Registry(RegistryError::Status { status: 500, .. })));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    assert!(!base.path().join("myapp").exists());
}

#[tokio::test]
async fn test_corrupt_archive_keeps_folder() {
    let server = MockServer::start().await;
    mount_metadata(&server, metadata(&format!("{}/art.tgz", server.uri()))).await;
    mount_artifact(&server, b"\x1f\x8b not really a gzip stream".to_vec()).await;

    let base = TempDir::new().unwrap();
    let request = InstallRequest::new("myapp", base.path()).unwrap();

    let err = pipeline_for(&server).run(request).await.unwrap_err();

    assert!(matches!(err, GravityError::Extraction(_)));
    assert!(base.path().join("myapp").is_dir());
}

#[tokio::test]
async fn test_existing_folder_is_rejected_before_any_request() {
    let server = MockServer::start().await;

    let base = TempDir::new().unwrap();
    std::fs::create_dir(base.path().join("myapp")).unwrap();

    let err = InstallRequest::new("myapp", base.path()).unwrap_err();

    assert!(matches!(err, GravityError::TargetExists { .. }));
    assert!(server.received_requests().await.unwrap().is_empty());
}
