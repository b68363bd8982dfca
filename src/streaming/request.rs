//! Request construction shared by streaming subscriptions and REST calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::form_urlencoded;
use url::Url;

use crate::auth::AuthProvider;
use crate::config::MastodonConfig;
use crate::errors::{MastodonError, MastodonResult};
use crate::transport::{HttpMethod, HttpRequest};

/// Path prefix of the streaming namespace, relative to the base URL.
pub const STREAMING_PREFIX: &str = "api/v1/streaming/";

/// A query parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    /// A single value.
    Single(String),
    /// Several values; the key is repeated once per value.
    List(Vec<String>),
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Single(value)
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Single(value.to_string())
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(values: Vec<String>) -> Self {
        QueryValue::List(values)
    }
}

/// Ordered query parameters.
///
/// Keys keep their first insertion position; inserting an existing key
/// replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: Vec<(String, QueryValue)>,
}

impl QueryParams {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a parameter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    /// Sets a list parameter.
    pub fn insert_list<I, S>(&mut self, key: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect::<Vec<_>>();
        self.insert(key, QueryValue::List(values))
    }

    /// Sets a parameter from raw bytes, which must be valid UTF-8.
    pub fn insert_bytes(&mut self, key: impl Into<String>, value: &[u8]) -> MastodonResult<&mut Self> {
        let key = key.into();
        let value = std::str::from_utf8(value).map_err(|e| {
            MastodonError::invalid_param(format!("Query value is not valid UTF-8: {e}"), key.clone())
        })?;
        Ok(self.insert(key, value))
    }

    /// Builder-style variant of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Gets a parameter.
    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Returns the number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copies every entry of `other` into `self`; `other` wins on conflicts.
    pub fn merge(&mut self, other: QueryParams) {
        for (key, value) in other.entries {
            self.insert(key, value);
        }
    }

    /// Flattened key/value pairs, list values expanded.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().flat_map(|(key, value)| {
            let values: Vec<&str> = match value {
                QueryValue::Single(v) => vec![v.as_str()],
                QueryValue::List(vs) => vs.iter().map(String::as_str).collect(),
            };
            values.into_iter().map(move |v| (key.as_str(), v))
        })
    }

    /// Encodes the parameters as `application/x-www-form-urlencoded`.
    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs())
            .finish()
    }

    fn append_to(&self, url: &mut Url) {
        if self.is_empty() {
            return;
        }
        url.query_pairs_mut().extend_pairs(self.pairs());
    }
}

/// Builds authenticated requests against one instance.
///
/// Pure: performs no I/O, and every failure is reported before a
/// connection is attempted.
#[derive(Clone)]
pub struct RequestBuilder {
    base_url: Url,
    auth: Arc<dyn AuthProvider>,
    user_agent: String,
    custom_headers: Vec<(String, String)>,
}

impl RequestBuilder {
    /// Creates a request builder from a configuration and an auth provider.
    pub fn new(config: &MastodonConfig, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            base_url: config.base_url.clone(),
            auth,
            user_agent: config.user_agent.clone(),
            custom_headers: config.custom_headers.clone(),
        }
    }

    /// Builds the GET request for a streaming path such as `user` or
    /// `hashtag/local`.
    pub fn streaming_request(&self, path: &str, params: &QueryParams) -> MastodonResult<HttpRequest> {
        let path = path.trim_matches('/');
        if path.is_empty() {
            return Err(MastodonError::invalid_param("Streaming path is empty", "path"));
        }

        let mut url = self.base_url.join(&format!("{STREAMING_PREFIX}{path}"))?;
        params.append_to(&mut url);

        let headers = self.headers(mime::TEXT_EVENT_STREAM.as_ref())?;

        Ok(HttpRequest {
            method: HttpMethod::Get,
            url,
            headers,
            body: None,
            timeout: None,
        })
    }

    /// Builds a REST request. GET and DELETE carry the parameters in the
    /// query string, other methods as a form body.
    pub fn api_request(
        &self,
        method: HttpMethod,
        path: &str,
        params: &QueryParams,
        timeout: Option<Duration>,
    ) -> MastodonResult<HttpRequest> {
        let mut url = self.base_url.join(path.trim_start_matches('/'))?;
        let mut headers = self.headers(mime::APPLICATION_JSON.as_ref())?;

        let body = if method.uses_query() {
            params.append_to(&mut url);
            None
        } else {
            headers.insert(
                "Content-Type".to_string(),
                mime::APPLICATION_WWW_FORM_URLENCODED.to_string(),
            );
            Some(params.to_query_string().into_bytes())
        };

        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
            timeout,
        })
    }

    fn headers(&self, accept: &str) -> MastodonResult<HashMap<String, String>> {
        let mut headers = HashMap::new();
        headers.insert("Accept".to_string(), accept.to_string());
        headers.insert("User-Agent".to_string(), self.user_agent.clone());
        for (name, value) in &self.custom_headers {
            headers.insert(name.clone(), value.clone());
        }
        self.auth.apply_auth(&mut headers);

        for (name, value) in &headers {
            validate_header(name, value)?;
        }

        Ok(headers)
    }
}

fn validate_header(name: &str, value: &str) -> MastodonResult<()> {
    http::header::HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| MastodonError::invalid_param("Invalid header name", name))?;
    // The value is left out of the message: it may be a credential.
    http::header::HeaderValue::from_str(value)
        .map_err(|_| MastodonError::invalid_param("Invalid header value", name))?;
    Ok(())
}

impl std::fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("base_url", &self.base_url.as_str())
            .field("auth_scheme", &self.auth.scheme())
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}
