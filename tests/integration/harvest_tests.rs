//! End-to-end harvest tests
//!
//! Each test writes a config pointing at a mock search API, runs a full
//! harvest, and inspects the resulting database.

use reply_harvest::config::load_config_with_hash;
use reply_harvest::crawler::{CheckpointUpdate, Harvester, JobOutcome, StopReason};
use reply_harvest::storage::{open_storage, RunStatus, Storage, WatermarkStore};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TARGET: &str = "alice/1000";

/// Writes a config file for a single target and returns its path
fn write_config(dir: &Path, api_base_url: &str, token_env: &str, kinds: &str) -> PathBuf {
    let db_path = dir.join("harvest.db");
    let content = format!(
        r#"
[search]
api-base-url = "{}"
bearer-token-env = "{}"

[harvest]
time-budget-secs = 120
retry-delay-ms = 10

[output]
database-path = "{}"
summary-path = "{}"

[[target]]
screen-name = "alice"
status-id = "1000"
kinds = {}
"#,
        api_base_url,
        token_env,
        db_path.display(),
        dir.join("summary.md").display(),
        kinds
    );

    let config_path = dir.join("harvest.toml");
    std::fs::write(&config_path, content).unwrap();
    config_path
}

fn harvester(config_path: &Path) -> Harvester {
    let (config, hash) = load_config_with_hash(config_path).unwrap();
    Harvester::from_config(config, hash, CancellationToken::new()).unwrap()
}

fn reply(id: u64) -> Value {
    json!({
        "id_str": id.to_string(),
        "in_reply_to_status_id_str": "1000",
        "full_text": format!("@alice reply {}", id),
        "user": { "screen_name": format!("fan{}", id) },
        "entities": { "user_mentions": [{ "indices": [0, 6] }] }
    })
}

fn page(ids: impl Iterator<Item = u64>, next_results: Option<&str>) -> ResponseTemplate {
    let statuses: Vec<Value> = ids.map(reply).collect();
    let metadata = match next_results {
        Some(next) => json!({ "next_results": next }),
        None => json!({}),
    };
    ResponseTemplate::new(200).set_body_json(json!({
        "statuses": statuses,
        "search_metadata": metadata
    }))
}

/// Mounts the second page first so it wins over the catch-all first page
async fn mount_two_pages(server: &MockServer, second: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/search/tweets.json"))
        .and(query_param("max_id", "500"))
        .respond_with(second)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search/tweets.json"))
        .and(query_param("q", "to:alice"))
        .and(query_param("since_id", "1000"))
        .respond_with(page(
            (1901..=2000).rev(),
            Some("?max_id=500&q=to%3Aalice&include_entities=1"),
        ))
        .mount(server)
        .await;
}

fn open(config_path: &Path) -> impl Storage {
    let (config, _) = load_config_with_hash(config_path).unwrap();
    open_storage(Path::new(&config.output.database_path)).unwrap()
}

#[tokio::test]
async fn test_two_page_window_stores_replies_and_watermark() {
    std::env::set_var("HARVEST_TEST_TOKEN_TWO_PAGES", "token");
    let server = MockServer::start().await;
    mount_two_pages(&server, page((498..=500).rev(), None)).await;

    let dir = TempDir::new().unwrap();
    let config_path = write_config(
        dir.path(),
        &server.uri(),
        "HARVEST_TEST_TOKEN_TWO_PAGES",
        r#"["replies"]"#,
    );

    let report = harvester(&config_path).run().await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    let job = &report.jobs[0];
    assert_eq!(job.matched, 103);
    assert_eq!(job.stored, 103);
    match &job.outcome {
        JobOutcome::Finished {
            summary,
            checkpoint,
        } => {
            assert_eq!(summary.reason, StopReason::WindowExhausted);
            assert_eq!(summary.items, 103);
            assert_eq!(summary.pages, 2);
            assert!(matches!(checkpoint, CheckpointUpdate::Advanced(c) if c.as_str() == "500"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    let storage = open(&config_path);
    assert_eq!(
        storage
            .load_watermark(TARGET, "latest_max_id")
            .unwrap()
            .map(|c| c.to_string()),
        Some("500".to_string())
    );
    assert_eq!(storage.count_replies(TARGET).unwrap(), 103);

    let replies = storage.get_replies(TARGET).unwrap();
    assert_eq!(replies[0].display_id(), "2000");
    assert_eq!(replies[0].full_text, "reply 2000");
    assert_eq!(replies[0].author, "fan2000");
}

#[tokio::test]
async fn test_rate_limited_window_resumes_on_next_run() {
    std::env::set_var("HARVEST_TEST_TOKEN_RESUME", "token");
    let dir = TempDir::new().unwrap();

    // First run: the second page is rate limited
    let server = MockServer::start().await;
    mount_two_pages(&server, ResponseTemplate::new(429)).await;
    let config_path = write_config(
        dir.path(),
        &server.uri(),
        "HARVEST_TEST_TOKEN_RESUME",
        r#"["replies"]"#,
    );

    let report = harvester(&config_path).run().await.unwrap();
    match &report.jobs[0].outcome {
        JobOutcome::Finished {
            summary,
            checkpoint,
        } => {
            assert_eq!(summary.reason, StopReason::RateLimited);
            assert!(matches!(checkpoint, CheckpointUpdate::Suspended(c) if c.as_str() == "500"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    {
        let storage = open(&config_path);
        assert_eq!(storage.load_watermark(TARGET, "latest_max_id").unwrap(), None);
        assert_eq!(
            storage
                .load_watermark(TARGET, "latest_max_id:resume")
                .unwrap()
                .map(|c| c.to_string()),
            Some("500".to_string())
        );
        assert_eq!(storage.count_replies(TARGET).unwrap(), 100);
    }

    // Second run: only the unvisited part of the window is requested
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/tweets.json"))
        .and(query_param("since_id", "1000"))
        .and(query_param("max_id", "500"))
        .respond_with(page((498..=500).rev(), None))
        .expect(1)
        .mount(&server)
        .await;
    let config_path = write_config(
        dir.path(),
        &server.uri(),
        "HARVEST_TEST_TOKEN_RESUME",
        r#"["replies"]"#,
    );

    let report = harvester(&config_path).run().await.unwrap();
    assert_eq!(report.jobs[0].stored, 3);

    let storage = open(&config_path);
    assert_eq!(
        storage
            .load_watermark(TARGET, "latest_max_id")
            .unwrap()
            .map(|c| c.to_string()),
        Some("500".to_string())
    );
    assert_eq!(
        storage.load_watermark(TARGET, "latest_max_id:resume").unwrap(),
        None
    );
    assert_eq!(storage.count_replies(TARGET).unwrap(), 103);
}

#[tokio::test]
async fn test_fatal_api_error_fails_job_without_watermark() {
    std::env::set_var("HARVEST_TEST_TOKEN_FATAL", "token");
    let server = MockServer::start().await;
    mount_two_pages(
        &server,
        ResponseTemplate::new(401).set_body_string("Unauthorized"),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config_path = write_config(
        dir.path(),
        &server.uri(),
        "HARVEST_TEST_TOKEN_FATAL",
        r#"["replies"]"#,
    );

    let report = harvester(&config_path).run().await.unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert!(matches!(report.jobs[0].outcome, JobOutcome::Failed(_)));

    let storage = open(&config_path);
    assert_eq!(storage.load_watermark(TARGET, "latest_max_id").unwrap(), None);
    assert_eq!(
        storage.load_watermark(TARGET, "latest_max_id:resume").unwrap(),
        None
    );
    // Items yielded before the failure are kept
    assert_eq!(storage.count_replies(TARGET).unwrap(), 100);
    let run = storage.get_run(report.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Failed);
}

#[tokio::test]
async fn test_quoted_replies_use_url_query_and_quote_key() {
    std::env::set_var("HARVEST_TEST_TOKEN_QUOTES", "token");
    let server = MockServer::start().await;
    // Mounted first so the continuation request does not hit the first page again
    Mock::given(method("GET"))
        .and(path("/search/tweets.json"))
        .and(query_param("max_id", "1099"))
        .respond_with(page(std::iter::empty(), None))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/tweets.json"))
        .and(query_param("q", "https://twitter.com/alice/status/1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "statuses": [
                {
                    "id_str": "1200",
                    "full_text": "so true https://t.co/x",
                    "user": { "screen_name": "carol" },
                    "quoted_status": { "id_str": "1000" }
                },
                {
                    "id_str": "1100",
                    "full_text": "links to it but quotes something else",
                    "user": { "screen_name": "dave" },
                    "quoted_status": { "id_str": "999" }
                }
            ],
            "search_metadata": { "next_results": "?max_id=1099&q=x" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config_path = write_config(
        dir.path(),
        &server.uri(),
        "HARVEST_TEST_TOKEN_QUOTES",
        r#"["quoted-replies"]"#,
    );

    let report = harvester(&config_path).run().await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.jobs[0].matched, 1);

    let storage = open(&config_path);
    assert_eq!(
        storage
            .load_watermark(TARGET, "quote_latest_max_id")
            .unwrap()
            .map(|c| c.to_string()),
        Some("1099".to_string())
    );
    assert_eq!(storage.load_watermark(TARGET, "latest_max_id").unwrap(), None);

    let replies = storage.get_replies(TARGET).unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].author, "carol");
    assert_eq!(replies[0].full_text, "so true https://t.co/x");
}
