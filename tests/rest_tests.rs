//! Integration tests for the REST primitives.

use mastodon_streaming::transport::HttpMethod;
use mastodon_streaming::{Account, MastodonClient, MastodonError, QueryParams, Status};
use pretty_assertions::assert_eq;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> MastodonClient {
    MastodonClient::new(server.uri(), "rest_token").unwrap()
}

#[tokio::test]
async fn test_object() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/42"))
        .and(header("authorization", "Bearer rest_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "42",
            "username": "bob",
            "acct": "bob@remote.example",
            "fields": [{"name": "Site", "value": "example", "verified_at": "2024-01-01T00:00:00Z"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Act
    let account: Account = client(&server)
        .rest()
        .perform_request_with_object(HttpMethod::Get, "/api/v1/accounts/42", &QueryParams::new())
        .await
        .unwrap();

    // Assert
    assert_eq!(account.username, "bob");
    assert!(account.is_remote());
    assert!(account.fields[0].is_verified());
}

#[tokio::test]
async fn test_collection() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/timelines/tag/rust"))
        .and(query_param("limit", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([{"id": "20"}, {"id": "19"}])),
        )
        .mount(&server)
        .await;

    // Act
    let statuses: Vec<Status> = client(&server)
        .rest()
        .perform_request_with_collection(
            HttpMethod::Get,
            "/api/v1/timelines/tag/rust",
            &QueryParams::new().with("limit", "2"),
        )
        .await
        .unwrap();

    // Assert
    let ids: Vec<&str> = statuses.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["20", "19"]);
}

#[tokio::test]
async fn test_post_form_body() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/accounts/42/follow"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("reblogs=false&languages%5B%5D=en&languages%5B%5D=de"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "42"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut params = QueryParams::new();
    params
        .insert("reblogs", "false")
        .insert_list("languages[]", ["en", "de"]);

    // Act
    let result: serde_json::Value = client(&server)
        .rest()
        .perform_request_with_object(HttpMethod::Post, "/api/v1/accounts/42/follow", &params)
        .await
        .unwrap();

    // Assert
    assert_eq!(result["id"], "42");
}

#[tokio::test]
async fn test_error_mapping() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/0"))
        .respond_with(
            ResponseTemplate::new(404)
                .insert_header("x-request-id", "req-404")
                .set_body_json(serde_json::json!({"error": "Record not found"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/verify_credentials"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(serde_json::json!({"error": "This action is not allowed"})),
        )
        .mount(&server)
        .await;

    let client = client(&server);

    // Act
    let not_found = client
        .rest()
        .perform_request_with_object::<Account>(HttpMethod::Get, "/api/v1/accounts/0", &QueryParams::new())
        .await
        .unwrap_err();
    let forbidden = client
        .rest()
        .perform_request_with_object::<Account>(
            HttpMethod::Get,
            "/api/v1/accounts/verify_credentials",
            &QueryParams::new(),
        )
        .await
        .unwrap_err();

    // Assert
    match not_found {
        MastodonError::Http {
            status,
            message,
            request_id,
        } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Record not found");
            assert_eq!(request_id.as_deref(), Some("req-404"));
        }
        other => panic!("expected http error, got {other:?}"),
    }
    assert!(matches!(forbidden, MastodonError::Unauthorized { status: 403, .. }));
    assert!(!forbidden.is_retryable());
}

#[tokio::test]
async fn test_invalid_json() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/instance"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    // Act
    let err = client(&server)
        .rest()
        .perform_request_with_object::<Account>(HttpMethod::Get, "/api/v1/instance", &QueryParams::new())
        .await
        .unwrap_err();

    // Assert
    assert!(matches!(err, MastodonError::Serialization { .. }));
}
