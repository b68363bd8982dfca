//! REST request primitives.
//!
//! Resource modules build on two calls: one decoding a single object, one
//! decoding an array. Both share request construction and error mapping
//! with the streaming client.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use crate::errors::{MastodonError, MastodonResult};
use crate::streaming::{QueryParams, RequestBuilder};
use crate::transport::{HttpMethod, HttpResponse, HttpTransport};

/// Client for plain request/response endpoints.
#[derive(Clone)]
pub struct RestClient {
    transport: Arc<dyn HttpTransport>,
    requests: RequestBuilder,
    timeout: Duration,
}

impl RestClient {
    /// Creates a REST client.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        requests: RequestBuilder,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            requests,
            timeout,
        }
    }

    /// Performs a request and decodes the body as one `T`.
    #[instrument(skip(self, params))]
    pub async fn perform_request_with_object<T>(
        &self,
        method: HttpMethod,
        path: &str,
        params: &QueryParams,
    ) -> MastodonResult<T>
    where
        T: DeserializeOwned,
    {
        let response = self.perform_request(method, path, params).await?;
        decode(&response)
    }

    /// Performs a request and decodes the body as an array of `T`, keeping
    /// the server's order.
    #[instrument(skip(self, params))]
    pub async fn perform_request_with_collection<T>(
        &self,
        method: HttpMethod,
        path: &str,
        params: &QueryParams,
    ) -> MastodonResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let response = self.perform_request(method, path, params).await?;
        decode(&response)
    }

    async fn perform_request(
        &self,
        method: HttpMethod,
        path: &str,
        params: &QueryParams,
    ) -> MastodonResult<HttpResponse> {
        let request = self
            .requests
            .api_request(method, path, params, Some(self.timeout))?;

        let response = self.transport.send(request).await?;
        tracing::debug!(status = response.status, bytes = response.body.len(), "Response received");

        if !response.is_success() {
            let request_id = response
                .headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("x-request-id"))
                .map(|(_, v)| v.clone());
            return Err(MastodonError::from_response(
                response.status,
                request_id,
                &response.body,
            ));
        }

        Ok(response)
    }
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> MastodonResult<T> {
    response.json().map_err(|e| MastodonError::Serialization {
        message: format!("Failed to decode response: {e}"),
    })
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("requests", &self.requests)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::BearerTokenAuth;
    use crate::config::MastodonConfig;
    use crate::mocks::{MockResponse, MockTransport};
    use crate::types::{Account, Status};
    use pretty_assertions::assert_eq;

    fn rest(transport: Arc<MockTransport>) -> RestClient {
        let config = MastodonConfig::builder()
            .base_url("https://mastodon.example")
            .access_token("rest_token")
            .build()
            .unwrap();
        let requests = RequestBuilder::new(&config, Arc::new(BearerTokenAuth::from_string("rest_token")));
        RestClient::new(transport, requests, config.timeout)
    }

    #[tokio::test]
    async fn test_object() {
        let transport = Arc::new(MockTransport::with_response(MockResponse::json(
            &serde_json::json!({"id": "7", "username": "alice", "acct": "alice"}),
        )));

        let account: Account = rest(transport.clone())
            .perform_request_with_object(HttpMethod::Get, "/api/v1/accounts/7", &QueryParams::new())
            .await
            .unwrap();

        assert_eq!(account.id, "7");
        assert_eq!(account.username, "alice");
        let request = transport.last_request().unwrap();
        assert_eq!(request.url, "https://mastodon.example/api/v1/accounts/7");
        assert_eq!(request.header("authorization"), Some("Bearer rest_token"));
    }

    #[tokio::test]
    async fn test_collection_keeps_order() {
        let transport = Arc::new(MockTransport::with_response(MockResponse::json(
            &serde_json::json!([{"id": "3"}, {"id": "1"}, {"id": "2"}]),
        )));

        let statuses: Vec<Status> = rest(transport)
            .perform_request_with_collection(
                HttpMethod::Get,
                "/api/v1/timelines/home",
                &QueryParams::new().with("limit", "3"),
            )
            .await
            .unwrap();

        let ids: Vec<&str> = statuses.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
    }

    #[tokio::test]
    async fn test_post_sends_form_body() {
        let transport = Arc::new(MockTransport::with_response(MockResponse::json(
            &serde_json::json!({"id": "10"}),
        )));

        let _: Status = rest(transport.clone())
            .perform_request_with_object(
                HttpMethod::Post,
                "/api/v1/statuses",
                &QueryParams::new().with("status", "hi there"),
            )
            .await
            .unwrap();

        let request = transport.last_request().unwrap();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.body.as_deref(), Some(&b"status=hi+there"[..]));
    }

    #[tokio::test]
    async fn test_error_response() {
        let transport = Arc::new(MockTransport::with_response(
            MockResponse::error(404, "Record not found").with_header("x-request-id", "abc"),
        ));

        let err = rest(transport)
            .perform_request_with_object::<Account>(
                HttpMethod::Get,
                "/api/v1/accounts/0",
                &QueryParams::new(),
            )
            .await
            .unwrap_err();

        match err {
            MastodonError::Http {
                status,
                message,
                request_id,
            } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Record not found");
                assert_eq!(request_id.as_deref(), Some("abc"));
            }
            other => panic!("expected http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_decode_failure_is_serialization_error() {
        let transport = Arc::new(MockTransport::with_response(MockResponse::json(
            &serde_json::json!({"id": "1"}),
        )));

        let err = rest(transport)
            .perform_request_with_collection::<Account>(
                HttpMethod::Get,
                "/api/v1/accounts/1/followers",
                &QueryParams::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, MastodonError::Serialization { .. }));
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let transport = Arc::new(MockTransport::with_response(MockResponse::connect_error(
            "connection refused",
        )));

        let err = rest(transport)
            .perform_request_with_object::<Account>(
                HttpMethod::Get,
                "/api/v1/accounts/1",
                &QueryParams::new(),
            )
            .await
            .unwrap_err();

        assert!(err.is_retryable());
    }
}
