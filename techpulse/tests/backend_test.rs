use common::BackendConfig;
use mockito::Matcher;
use techpulse::backend::{HeadlinesQuery, HttpNewsBackend, NewsBackend};

fn backend(url: String, token: Option<&str>) -> HttpNewsBackend {
    let config = BackendConfig {
        base_url: url,
        token_env: None,
        timeout_seconds: Some(5),
    };
    HttpNewsBackend::new(config, token.map(str::to_string)).expect("build backend")
}

#[tokio::test]
async fn test_headlines_with_default_query() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/api/v1/news/headlines")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("country".into(), "us".into()),
            Matcher::UrlEncoded("category".into(), "technology".into()),
            Matcher::UrlEncoded("limit".into(), "6".into()),
        ]))
        .match_header("authorization", "Bearer jwt-123")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "results": [
                    {"id": "1", "title": "Quantum leap", "url": "https://n.example/1",
                     "summary": "Qubits everywhere", "published_at": "2026-04-01T08:00:00Z"},
                    {"id": "2", "title": "Rust in the kernel", "url": "https://n.example/2",
                     "summary": "More drivers", "published_at": "2026-04-02T08:00:00Z"}
                ]
            }"#,
        )
        .create_async()
        .await;

    let articles = backend(server.url(), Some("jwt-123"))
        .get_headlines(&HeadlinesQuery::default())
        .await
        .expect("headlines");

    assert_eq!(articles.len(), 2);
    assert_eq!(articles[1].title, "Rust in the kernel");
    assert_eq!(articles[0].published_at, "2026-04-01T08:00:00Z");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_search_posts_query_and_limit() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/api/v1/news/search")
        .match_body(Matcher::Json(serde_json::json!({"query": "gpu", "limit": 15})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"results": [{"id": "g", "title": "GPU prices", "url": "",
                "summary": "", "published_at": ""}]}"#,
        )
        .create_async()
        .await;

    let client = backend(server.url(), None);
    let articles = client.search_news("  gpu ", None).await.expect("search");
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].id, "g");

    // Blank queries never reach the backend.
    let empty = client.search_news("   ", Some(3)).await.expect("blank search");
    assert!(empty.is_empty());

    mock.assert_async().await;
}

#[tokio::test]
async fn test_non_success_status_is_an_error() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/api/v1/news/search")
        .with_status(503)
        .with_body("maintenance")
        .create_async()
        .await;

    let err = backend(server.url(), None)
        .search_news("ai", Some(5))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "API Error: 503 - maintenance");
}

#[tokio::test]
async fn test_fetch_article_maps_record() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/api/v1/news/fetch")
        .match_body(Matcher::Json(serde_json::json!({"ids": ["abc"]})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "success": true,
                "records": {
                    "abc": {"id": "abc", "metadata": {
                        "title": "Open models",
                        "url": "https://n.example/abc",
                        "text": "Weights released",
                        "published_at": "2026-06-10T09:30:00Z",
                        "text_length": 1200
                    }}
                },
                "namespace": "news",
                "usage": {"read_units": 1},
                "total_fetched": 1,
                "error": null
            }"#,
        )
        .create_async()
        .await;

    let article = backend(server.url(), Some("t"))
        .fetch_article("abc")
        .await
        .expect("fetch article");

    assert_eq!(article.id, "abc");
    assert_eq!(article.title, "Open models");
    assert_eq!(article.summary, "Weights released");
    assert_eq!(article.url, "https://n.example/abc");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_health_check() {
    let mut server = mockito::Server::new_async().await;

    let _ok = server
        .mock("GET", "/health")
        .with_status(200)
        .with_body("OK")
        .create_async()
        .await;

    assert!(backend(server.url(), None).health_check().await);

    // Nothing listens here.
    assert!(!backend("http://127.0.0.1:1".to_string(), None).health_check().await);
}
