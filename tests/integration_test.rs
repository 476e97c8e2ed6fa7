use std::sync::{Arc, Mutex};
use std::time::Duration;
use scrumbot::core::ProgressFn;
use scrumbot::{
    AudioFile, ScrumBotClient, TaskClient, TaskError, TaskId, TaskStatus, UploadConfig, UploadManager,
    UploadStatus,
};
use tokio_test::assert_ok;
use wiremock::matchers::{body_string_contains, header_regex, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn recording() -> (ProgressFn, Arc<Mutex<Vec<u8>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let callback: ProgressFn = Arc::new(move |percent| sink.lock().unwrap().push(percent));
    (callback, seen)
}

fn client_for(server: &MockServer) -> ScrumBotClient {
    assert_ok!(ScrumBotClient::with_timeout(&format!("{}/api", server.uri()), Duration::from_secs(5)))
}

fn standup() -> AudioFile {
    AudioFile::from_bytes("standup.wav", "yesterday I shipped the login page ".repeat(4000))
}

#[tokio::test]
async fn test_submit_sends_multipart_and_reports_progress() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload_audio"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .and(body_string_contains("name=\"file\"; filename=\"standup.wav\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "task_id": "rq-123",
            "file": "1715000000.0_standup.wav",
            "message": "Processing started. This may take a few seconds.",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (progress, seen) = recording();
    let task_id = assert_ok!(client_for(&server).submit(standup(), progress).await);
    assert_eq!(task_id, TaskId::from("rq-123"));

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.first(), Some(&0));
    assert_eq!(seen.last(), Some(&100));
    assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn test_submit_non_200_is_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload_audio"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({ "detail": "disk full" })))
        .mount(&server)
        .await;

    let (progress, _) = recording();
    let err = client_for(&server).submit(standup(), progress).await.unwrap_err();
    match err {
        TaskError::Server { status_code, message } => {
            assert_eq!(status_code, 500);
            assert_eq!(message, "disk full");
        }
        other => panic!("expected server error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_submit_connection_refused_is_network_error() {
    let client = assert_ok!(ScrumBotClient::with_timeout("http://127.0.0.1:1/api", Duration::from_secs(2)));
    let (progress, _) = recording();

    let err = client.submit(standup(), progress).await.unwrap_err();
    assert!(matches!(err, TaskError::Network(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_poll_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/task_status/rq-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "success",
            "result": { "log_id": 12 },
            "log_url": "/logs/12",
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/task_status/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "detail": "Job not found: missing",
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let response = assert_ok!(client.poll_status(&TaskId::from("rq-123")).await);
    assert_eq!(response.status, TaskStatus::Success);
    assert_eq!(response.log_url.as_deref(), Some("/logs/12"));

    let err = client.poll_status(&TaskId::from("missing")).await.unwrap_err();
    assert!(matches!(err, TaskError::Server { status_code: 404, .. }));
}

#[tokio::test]
async fn test_upload_workflow_against_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload_audio"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "task_id": "rq-9" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/task_status/rq-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "pending" })))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/task_status/rq-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "success",
            "log_url": "/logs/9",
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let config = UploadConfig {
        poll_interval: Duration::from_millis(50),
        reset_delay: Duration::from_secs(30),
        ..Default::default()
    };
    let handle = UploadManager::new(Arc::new(client.clone()), config);

    assert_ok!(handle.manager.select_file(standup()).await);
    assert_ok!(handle.manager.submit().await);

    let mut attempt = assert_ok!(handle.manager.attempt().await);
    for _ in 0..200 {
        if attempt.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
        attempt = assert_ok!(handle.manager.attempt().await);
    }

    assert_eq!(attempt.status, UploadStatus::Success);
    assert_eq!(attempt.task_id, Some(TaskId::from("rq-9")));
    assert_eq!(attempt.result_link.as_deref(), Some("/logs/9"));
    assert_eq!(client.resolve_link("/logs/9"), format!("{}/api/logs/9", server.uri()));

    let status_checks = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == "/api/task_status/rq-9")
        .count();
    assert_eq!(status_checks, 3);

    assert_ok!(handle.shutdown().await);
}

#[tokio::test]
async fn test_read_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/logs"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({ "detail": "No logs found" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/logs/4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": 4,
            "filename": "1715000000.0_standup.wav",
            "transcript": "Blocked on the staging database.",
            "summary": "Blocked on staging",
            "emotion": "fear",
            "jira_issue_url": "https://jira.example.com/browse/SCRUM-4",
            "progress": [],
            "next_steps": ["ping infra"],
            "blockers": ["staging database down"],
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/report"))
        .and(query_param("days", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "markdown_report": "# Sprint Report (last 3 days)\n",
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "running" })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert!(assert_ok!(client.logs().await).is_empty());

    let log = assert_ok!(client.log(4).await);
    assert_eq!(log.blockers, vec!["staging database down".to_string()]);
    assert_eq!(log.jira_issue_url.as_deref(), Some("https://jira.example.com/browse/SCRUM-4"));

    let report = assert_ok!(client.report(3).await);
    assert!(report.markdown_report.starts_with("# Sprint Report (last 3 days)"));

    assert_eq!(assert_ok!(client.ping().await).status, "running");
}
