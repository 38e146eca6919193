//! Tests for the reqwest-backed search client against a mock API

use reply_harvest::config::SearchConfig;
use reply_harvest::crawler::{
    build_http_client, CredentialCache, Cursor, FetchError, PageFetcher, PageRequest,
    SearchClient, StaticSecretSource,
};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(base_url: &str) -> SearchClient {
    let http = build_http_client(&SearchConfig::default()).unwrap();
    let credentials = CredentialCache::new(
        Box::new(StaticSecretSource::new("test-token")),
        "TEST_TOKEN",
    );
    SearchClient::new(http, base_url, credentials).unwrap()
}

fn request(max: Option<&str>) -> PageRequest {
    PageRequest {
        query: "to:alice".to_string(),
        since: Cursor::new("1000").unwrap(),
        max: max.map(|m| Cursor::new(m).unwrap()),
        page_size: 100,
    }
}

#[tokio::test]
async fn test_fetch_page_sends_query_and_parses_results() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/1.1/search/tweets.json"))
        .and(header("authorization", "Bearer test-token"))
        .and(query_param("q", "to:alice"))
        .and(query_param("count", "100"))
        .and(query_param("since_id", "1000"))
        .and(query_param("max_id", "1500"))
        .and(query_param("tweet_mode", "extended"))
        .and(query_param("result_type", "recent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "statuses": [
                {
                    "id_str": "1499",
                    "in_reply_to_status_id_str": "1000",
                    "full_text": "@alice hello",
                    "user": { "screen_name": "bob" },
                    "entities": { "user_mentions": [{ "indices": [0, 6] }] }
                },
                { "id_str": "1498", "text": "unrelated" }
            ],
            "search_metadata": { "next_results": "?max_id=1497&q=to%3Aalice" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&format!("{}/1.1", server.uri()));
    let page = client.fetch_page(&request(Some("1500"))).await.unwrap();

    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].id_str, "1499");
    assert_eq!(page.items[0].author(), Some("bob"));
    assert_eq!(page.items[0].body(), "@alice hello");
    assert_eq!(page.items[1].body(), "unrelated");
    assert_eq!(
        page.continuation.as_deref(),
        Some("?max_id=1497&q=to%3Aalice")
    );
}

#[tokio::test]
async fn test_final_page_has_no_continuation() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/tweets.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "statuses": [],
            "search_metadata": {}
        })))
        .mount(&server)
        .await;

    let page = client(&server.uri())
        .fetch_page(&request(None))
        .await
        .unwrap();

    assert!(page.items.is_empty());
    assert!(page.continuation.is_none());
}

#[tokio::test]
async fn test_http_429_is_rate_limited() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let result = client(&server.uri()).fetch_page(&request(None)).await;

    assert!(matches!(result, Err(FetchError::RateLimited)));
}

#[tokio::test]
async fn test_error_code_88_is_rate_limited() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(420).set_body_json(json!({
            "errors": [{ "code": 88, "message": "Rate limit exceeded" }]
        })))
        .mount(&server)
        .await;

    let result = client(&server.uri()).fetch_page(&request(None)).await;

    assert!(matches!(result, Err(FetchError::RateLimited)));
}

#[tokio::test]
async fn test_unauthorized_is_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "errors": [{ "code": 89, "message": "Invalid or expired token." }]
        })))
        .mount(&server)
        .await;

    let result = client(&server.uri()).fetch_page(&request(None)).await;

    match result {
        Err(FetchError::Other(message)) => {
            assert!(message.contains("401"));
            assert!(message.contains("code 89"));
        }
        other => panic!("expected a fatal error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_refused_connection_is_transient() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let uri = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let result = client(&uri).fetch_page(&request(None)).await;

    assert!(matches!(result, Err(FetchError::Transient(_))));
}

#[tokio::test]
async fn test_missing_token_fails_without_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let http = build_http_client(&SearchConfig::default()).unwrap();
    let credentials = CredentialCache::new(
        Box::new(StaticSecretSource::new("   ")),
        "TEST_TOKEN",
    );
    let client = SearchClient::new(http, &server.uri(), credentials).unwrap();

    let result = client.fetch_page(&request(None)).await;

    assert!(matches!(result, Err(FetchError::Other(_))));
}

#[tokio::test]
async fn test_truncated_error_body_is_transient() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let uri = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await;
        // Promise more body than is sent, then hang up
        let _ = socket
            .write_all(b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 100\r\n\r\npartial")
            .await;
        let _ = socket.shutdown().await;
    });

    let result = client(&uri).fetch_page(&request(None)).await;

    assert!(
        matches!(result, Err(FetchError::Transient(_))),
        "expected a transient fault, got {:?}",
        result
    );
}
