use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use std::sync::Arc;
use wiremock::matchers::{body_json, header, header_regex, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use jira_mcp::config::{AuthMode, DEFAULT_MAX_ATTACHMENT_BYTES, JiraConfig};
use jira_mcp::jira::models::JiraAttachment;
use jira_mcp::jira::{JiraApi, JiraClient, JiraError};
use jira_mcp::mcp::tools::{ExecutionContext, ToolRegistry};

fn basic_client(server: &MockServer) -> JiraClient {
    client_with(
        server,
        AuthMode::Basic {
            email: "dev@example.com".into(),
            api_token: "secret-token".into(),
        },
    )
}

fn client_with(server: &MockServer, auth: AuthMode) -> JiraClient {
    let config = JiraConfig {
        base_url: server.uri(),
        auth,
        max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
    };
    JiraClient::new(&config).unwrap()
}

#[tokio::test]
async fn sends_basic_auth_and_field_selection() {
    let server = MockServer::start().await;
    let expected = format!("Basic {}", STANDARD.encode("dev@example.com:secret-token"));

    Mock::given(method("GET"))
        .and(path("/rest/api/2/issue/PROJ-1"))
        .and(header("Authorization", expected.as_str()))
        .and(query_param("fields", "summary,issuetype"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "10001",
            "key": "PROJ-1",
            "fields": {"summary": "Fix login", "issuetype": {"name": "Bug"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let issue = basic_client(&server)
        .get_issue("PROJ-1", Some("summary,issuetype"), None)
        .await
        .unwrap();

    assert_eq!(issue.fields.summary.as_deref(), Some("Fix login"));
    assert_eq!(issue.fields.type_name(), "Bug");
}

#[tokio::test]
async fn sends_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/api/2/issuetype"))
        .and(header("Authorization", "Bearer pat-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "1", "name": "Bug", "subtask": false}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with(&server, AuthMode::Bearer { token: "pat-123".into() });
    let types = client.issue_types().await.unwrap();
    assert_eq!(types[0].name, "Bug");
}

#[tokio::test]
async fn passes_jira_error_messages_through() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/api/2/issue/NOPE-1"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "errorMessages": ["Issue does not exist or you do not have permission to see it."],
            "errors": {}
        })))
        .mount(&server)
        .await;

    let err = basic_client(&server).get_issue("NOPE-1", None, None).await.unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(
        err.to_string(),
        "Not found (404): Issue does not exist or you do not have permission to see it."
    );
}

#[tokio::test]
async fn field_errors_keep_their_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/api/2/issue"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errorMessages": [],
            "errors": {"summary": "You must specify a summary of the issue."}
        })))
        .mount(&server)
        .await;

    let mut fields = serde_json::Map::new();
    fields.insert("project".into(), json!({"key": "PROJ"}));
    let err = basic_client(&server).create_issue(fields).await.unwrap_err();

    match err {
        JiraError::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "summary: You must specify a summary of the issue.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn rate_limit_carries_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/api/2/field"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "30")
                .set_body_string("Too many requests"),
        )
        .mount(&server)
        .await;

    let err = basic_client(&server).fields().await.unwrap_err();
    assert!(matches!(
        err,
        JiraError::RateLimited { retry_after: Some(30), ref message } if message == "Too many requests"
    ));
}

#[tokio::test]
async fn uploads_attachments_as_multipart_with_xsrf_header() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/api/2/issue/PROJ-1/attachments"))
        .and(header("X-Atlassian-Token", "no-check"))
        .and(header_regex("Content-Type", "^multipart/form-data; boundary="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "555", "filename": "notes.txt", "size": 5}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let created = basic_client(&server)
        .add_attachment("PROJ-1", "notes.txt", b"hello".to_vec())
        .await
        .unwrap();

    assert_eq!(created[0].id, "555");
    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("filename=\"notes.txt\""));
    assert!(body.contains("hello"));
}

#[tokio::test]
async fn downloads_from_the_content_url() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secure/attachment/555/notes.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello".to_vec()))
        .mount(&server)
        .await;

    let attachment = JiraAttachment {
        id: "555".into(),
        filename: "notes.txt".into(),
        content: Some(format!("{}/secure/attachment/555/notes.txt", server.uri())),
        ..Default::default()
    };
    let data = basic_client(&server).download_attachment(&attachment).await.unwrap();
    assert_eq!(data, b"hello");
}

#[tokio::test]
async fn transition_posts_fields_and_comment() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/api/2/issue/PROJ-1/transitions"))
        .and(body_json(json!({
            "transition": {"id": "31"},
            "fields": {"resolution": {"name": "Fixed"}},
            "update": {"comment": [{"add": {"body": "Shipped"}}]}
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut fields = serde_json::Map::new();
    fields.insert("resolution".into(), json!({"name": "Fixed"}));
    basic_client(&server)
        .transition_issue("PROJ-1", "31", Some(fields), Some("Shipped"))
        .await
        .unwrap();
}

#[tokio::test]
async fn search_sends_jql_and_limit() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/api/2/search"))
        .and(query_param("jql", "project = PROJ AND status = Open"))
        .and(query_param("maxResults", "30"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issues": [{"key": "PROJ-1", "fields": {"summary": "One"}}],
            "total": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let issues = basic_client(&server)
        .search_issues("project = PROJ AND status = Open", 30, &[])
        .await
        .unwrap();
    assert_eq!(issues.len(), 1);
}

#[tokio::test]
async fn tool_call_reports_jira_failure_as_error_content() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/api/2/issue/PROJ-9/transitions"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "errorMessages": ["You do not have permission to transition this issue."]
        })))
        .mount(&server)
        .await;

    let context = ExecutionContext::new(Arc::new(basic_client(&server)), std::env::temp_dir());
    let registry = ToolRegistry::with_jira_tools().unwrap();

    let result = registry
        .dispatch(
            "transition_issue",
            Some(json!({"issueKey": "PROJ-9", "transition": "Done"})),
            &context,
        )
        .await;

    assert!(result.is_error);
    let payload: Value = serde_json::from_str(&result.text_content()).unwrap();
    assert_eq!(payload["status"], 403);
    assert_eq!(payload["kind"], "external");
    assert_eq!(
        payload["error"],
        "Permission denied (403): You do not have permission to transition this issue."
    );
}

#[tokio::test]
async fn issue_keys_stay_inside_the_issue_path() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = basic_client(&server);
    client.delete_issue("X-1/../../project/PROJ").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].url.path(),
        "/rest/api/2/issue/X-1%2F..%2F..%2Fproject%2FPROJ"
    );
}

#[tokio::test]
async fn dot_segments_are_rejected_before_sending() {
    let server = MockServer::start().await;

    let client = basic_client(&server);
    let err = client.delete_issue("..").await.unwrap_err();
    assert!(matches!(err, JiraError::InvalidPath(_)));
    assert!(err.status().is_none());

    let err = client.attachment("").await.unwrap_err();
    assert!(matches!(err, JiraError::InvalidPath(_)));

    assert!(server.received_requests().await.unwrap().is_empty());
}
