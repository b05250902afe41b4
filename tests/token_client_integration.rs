//! Integration tests for the token client.
//!
//! Tests pagination, checkpoint resume and detail normalization against a
//! mocked v2 API.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use yuque_sdk::{
    Breadcrumb, CheckpointStore, DocDetail, DocSink, DocSummary, RetryPolicy, TokenClient,
    TokenConfig, YuqueError,
};

const TOKEN: &str = "t0k3n";
const DOCS_PATH: &str = "/api/v2/repos/me/notes/docs";
const TOC_PATH: &str = "/api/v2/repos/me/notes/toc";

fn client_for(server: &MockServer, dir: &TempDir) -> TokenClient {
    let mut config = TokenConfig::new("me", "notes");
    config.token = Some(TOKEN.to_string());
    config.base_url = Some(format!("{}/api/v2", server.uri()));
    config.checkpoint_dir = Some(dir.path().to_path_buf());
    TokenClient::new(config)
        .unwrap()
        .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(1)))
}

fn doc_json(n: usize) -> Value {
    json!({
        "slug": format!("doc-{n}"),
        "title": format!("Doc {n}"),
        "format": "markdown",
        "updated_at": "2023-05-01T00:00:00.000Z",
        "word_count": n,
    })
}

fn page(start: usize, count: usize, total: usize) -> Value {
    let data: Vec<Value> = (start..start + count).map(doc_json).collect();
    json!({ "data": data, "meta": { "total": total } })
}

fn summaries(start: usize, count: usize) -> Vec<DocSummary> {
    (start..start + count)
        .map(|n| serde_json::from_value(doc_json(n)).unwrap())
        .collect()
}

async fn mount_toc(server: &MockServer, toc: Value) {
    Mock::given(method("GET"))
        .and(path(TOC_PATH))
        .and(header("X-Auth-Token", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": toc })))
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, offset: usize, body: Value, expected: u64) {
    Mock::given(method("GET"))
        .and(path(DOCS_PATH))
        .and(query_param("offset", offset.to_string()))
        .and(query_param("limit", "100"))
        .and(header("X-Auth-Token", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(expected)
        .mount(server)
        .await;
}

// ==================== Pagination Tests ====================

#[tokio::test]
async fn test_doc_list_fetches_250_docs_in_three_pages() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_toc(&server, json!([])).await;
    mount_page(&server, 0, page(0, 100, 250), 1).await;
    mount_page(&server, 100, page(100, 100, 250), 1).await;
    mount_page(&server, 200, page(200, 50, 250), 1).await;

    let mut client = client_for(&server, &dir);
    let docs = client.doc_list().await.unwrap();

    assert_eq!(docs.len(), 250);
    assert_eq!(docs[0].slug, "doc-0");
    assert_eq!(docs[249].slug, "doc-249");
    assert_eq!(docs[7].extra.get("word_count"), Some(&json!(7)));
    assert!(
        !client.checkpoint().path().exists(),
        "checkpoint should be deleted after a complete fetch"
    );
}

#[tokio::test]
async fn test_doc_list_stops_on_empty_page() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_toc(&server, json!([])).await;
    mount_page(&server, 0, page(0, 100, 300), 1).await;
    mount_page(&server, 100, page(100, 0, 300), 1).await;

    let mut client = client_for(&server, &dir);
    let docs = client.doc_list().await.unwrap();
    assert_eq!(docs.len(), 100);
}

// ==================== Checkpoint Tests ====================

#[tokio::test]
async fn test_doc_list_resumes_from_checkpoint() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_toc(&server, json!([])).await;
    mount_page(&server, 0, page(0, 100, 250), 0).await;
    mount_page(&server, 100, page(100, 100, 250), 1).await;
    mount_page(&server, 200, page(200, 50, 250), 1).await;

    let mut client = client_for(&server, &dir);
    client.checkpoint().save(&summaries(0, 100), 250);

    let docs = client.doc_list().await.unwrap();
    assert_eq!(docs.len(), 250);
    assert_eq!(docs[100].slug, "doc-100");
    assert!(!client.checkpoint().path().exists());
}

#[tokio::test]
async fn test_doc_list_complete_checkpoint_skips_fetching() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_toc(&server, json!([])).await;
    mount_page(&server, 0, page(0, 100, 50), 0).await;
    mount_page(&server, 50, page(0, 0, 50), 0).await;

    let mut client = client_for(&server, &dir);
    client.checkpoint().save(&summaries(0, 50), 50);

    let docs = client.doc_list().await.unwrap();
    assert_eq!(docs.len(), 50);
    assert!(!client.checkpoint().path().exists());
}

#[tokio::test]
async fn test_doc_list_failure_leaves_resumable_checkpoint() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_toc(&server, json!([])).await;
    mount_page(&server, 0, page(0, 100, 250), 1).await;
    Mock::given(method("GET"))
        .and(path(DOCS_PATH))
        .and(query_param("offset", "100"))
        .respond_with(ResponseTemplate::new(502))
        .expect(4)
        .mount(&server)
        .await;

    let mut client = client_for(&server, &dir);
    let err = client.doc_list().await.unwrap_err();
    assert!(matches!(err, YuqueError::HttpStatus { status: 502, .. }));
    assert!(!err.is_fatal());

    let checkpoint = CheckpointStore::new(client.checkpoint().path())
        .load()
        .expect("checkpoint should survive a failed fetch");
    assert_eq!(checkpoint.list.len(), 100);
    assert_eq!(checkpoint.offset, checkpoint.list.len());
    assert_eq!(checkpoint.total, 250);
    assert_eq!(checkpoint.list[99].slug, "doc-99");
}

#[tokio::test]
async fn test_doc_list_retries_transient_page_failure() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_toc(&server, json!([])).await;
    Mock::given(method("GET"))
        .and(path(DOCS_PATH))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_page(&server, 0, page(0, 10, 10), 1).await;

    let mut client = client_for(&server, &dir);
    let docs = client.doc_list().await.unwrap();
    assert_eq!(docs.len(), 10);
}

// ==================== Error Mapping Tests ====================

#[tokio::test]
async fn test_book_not_found_is_fatal() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path(TOC_PATH))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "message": "book not found" })),
        )
        .mount(&server)
        .await;

    let mut client = client_for(&server, &dir);
    let err = client.doc_list().await.unwrap_err();
    assert!(matches!(err, YuqueError::BookNotFound { .. }));
    assert!(err.is_fatal());
}

// ==================== Detail Tests ====================

fn nested_toc() -> Value {
    json!([
        { "type": "TITLE", "title": "Guide", "uuid": "g", "parent_uuid": "", "depth": 1 },
        { "type": "TITLE", "title": "Basics", "uuid": "b", "parent_uuid": "g", "depth": 2 },
        { "type": "DOC", "title": "Intro", "uuid": "i", "parent_uuid": "b", "depth": 3, "slug": "intro" },
        { "type": "DOC", "title": "Top", "uuid": "t", "parent_uuid": "", "depth": 1, "slug": "top" }
    ])
}

async fn mount_detail(server: &MockServer, slug: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(format!("{DOCS_PATH}/{slug}")))
        .and(query_param("raw", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "slug": slug,
                "title": slug.to_uppercase(),
                "format": "markdown",
                "body": body,
                "body_html": "<p>html</p>",
                "updated_at": "2023-05-01T00:00:00.000Z",
                "id": 42
            }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_doc_detail_resolves_breadcrumbs_and_properties() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_toc(&server, nested_toc()).await;
    mount_detail(&server, "intro", "---\ntags: [a, b]\ncover: x.png\n---\n# Intro\n").await;

    let mut client = client_for(&server, &dir);
    client.toc().await.unwrap();
    let detail = client.doc_detail("intro").await.unwrap();

    assert_eq!(detail.doc_id, "intro");
    assert_eq!(
        detail.catalog,
        vec![
            Breadcrumb {
                title: "Guide".to_string(),
                doc_id: "intro".to_string()
            },
            Breadcrumb {
                title: "Basics".to_string(),
                doc_id: "intro".to_string()
            },
        ]
    );
    assert_eq!(detail.properties.get("cover"), Some(&json!("x.png")));
    assert_eq!(detail.body, "# Intro\n");
    assert!(detail.body_original.starts_with("---"));
    assert_eq!(detail.body_html.as_deref(), Some("<p>html</p>"));
    assert_eq!(detail.updated, Some(1_682_899_200_000));
    assert_eq!(detail.extra.get("id"), Some(&json!(42)));
}

#[tokio::test]
async fn test_doc_detail_root_document_has_empty_breadcrumb() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_toc(&server, nested_toc()).await;
    mount_detail(&server, "top", "plain body").await;

    let mut client = client_for(&server, &dir);
    client.toc().await.unwrap();
    let detail = client.doc_detail("top").await.unwrap();
    assert!(detail.catalog.is_empty());
    assert_eq!(detail.body, "plain body");
    assert!(detail.properties.is_empty());
}

#[derive(Default)]
struct Recorder(Mutex<Vec<(String, usize, usize)>>);

#[async_trait]
impl DocSink for Recorder {
    async fn on_document(&self, doc: &DocDetail, completed: usize, total: usize) -> anyhow::Result<()> {
        self.0
            .lock()
            .unwrap()
            .push((doc.doc_id.clone(), completed, total));
        Ok(())
    }
}

#[tokio::test]
async fn test_doc_detail_list_filters_ids_and_calls_sink() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_toc(&server, nested_toc()).await;
    mount_detail(&server, "intro", "a").await;
    mount_detail(&server, "top", "b").await;

    let mut client = client_for(&server, &dir);
    client.toc().await.unwrap();
    let docs: Vec<DocSummary> = ["intro", "top", "other"]
        .iter()
        .map(|slug| serde_json::from_value(json!({ "slug": slug, "title": slug })).unwrap())
        .collect();
    let ids = vec!["intro".to_string(), "top".to_string()];
    let recorder = Recorder::default();

    let details = client
        .doc_detail_list(&docs, &ids, Some(&recorder))
        .await
        .unwrap();

    let mut got: Vec<String> = details.iter().map(|d| d.doc_id.clone()).collect();
    got.sort();
    assert_eq!(got, vec!["intro", "top"]);
    let calls = recorder.0.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|(_, _, total)| *total == 2));
}
