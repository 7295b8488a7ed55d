//! Thin HTTP client for the Google Calendar v3 API.
//!
//! Carries no credentials of its own; the access token arrives with
//! every call. Event bodies are raw JSON values so payload construction
//! stays in [`crate::sync::payload`].

use serde_json::Value;

use crate::error::{Result, UpstreamError};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Calendar API transport.
pub struct CalendarClient {
    base_url: String,
    http: reqwest::Client,
}

impl Default for CalendarClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CalendarClient {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Point the client at a different base URL. Tests use this with a
    /// mock server.
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Fetch calendar metadata. `calendar_id` is usually "primary".
    pub fn get_calendar(&self, access_token: &str, calendar_id: &str) -> Result<Value> {
        let url = format!(
            "{}/calendars/{}",
            self.base_url,
            urlencoding::encode(calendar_id)
        );
        self.request(reqwest::Method::GET, &url, access_token, None)
    }

    /// Create an event; returns the created event including its id.
    pub fn insert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &Value,
    ) -> Result<Value> {
        let url = format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        );
        self.request(reqwest::Method::POST, &url, access_token, Some(event))
    }

    /// Replace an existing event.
    pub fn update_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
        event: &Value,
    ) -> Result<Value> {
        let url = format!(
            "{}/calendars/{}/events/{}",
            self.base_url,
            urlencoding::encode(calendar_id),
            urlencoding::encode(event_id)
        );
        self.request(reqwest::Method::PUT, &url, access_token, Some(event))
    }

    /// Fetch a single event.
    pub fn get_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<Value> {
        let url = format!(
            "{}/calendars/{}/events/{}",
            self.base_url,
            urlencoding::encode(calendar_id),
            urlencoding::encode(event_id)
        );
        self.request(reqwest::Method::GET, &url, access_token, None)
    }

    /// Delete an event. Already-gone events (404/410) count as success
    /// so deletes stay idempotent.
    pub fn delete_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/calendars/{}/events/{}",
            self.base_url,
            urlencoding::encode(calendar_id),
            urlencoding::encode(event_id)
        );

        let handle = tokio::runtime::Handle::current();
        handle.block_on(async {
            let response = self
                .http
                .delete(&url)
                .bearer_auth(access_token)
                .send()
                .await?;
            let status = response.status();
            if status.is_success() || status.as_u16() == 404 || status.as_u16() == 410 {
                return Ok(());
            }
            let message = response.text().await.unwrap_or_default();
            Err(UpstreamError::Calendar {
                status: status.as_u16(),
                message,
            }
            .into())
        })
    }

    fn request(
        &self,
        method: reqwest::Method,
        url: &str,
        access_token: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        let handle = tokio::runtime::Handle::current();
        handle.block_on(async {
            let mut builder = self
                .http
                .request(method, url)
                .bearer_auth(access_token);
            if let Some(body) = body {
                builder = builder.json(body);
            }
            let response = builder.send().await?;
            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(UpstreamError::Calendar {
                    status: status.as_u16(),
                    message,
                }
                .into());
            }
            response.json().await.map_err(Into::into)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use serde_json::json;

    #[test]
    fn insert_event_posts_and_returns_body() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/calendars/primary/events")
            .match_header("authorization", "Bearer token-1")
            .with_status(200)
            .with_body(r#"{"id": "evt-1", "summary": "Algebra"}"#)
            .create();

        let client = CalendarClient::with_base_url(&server.url());
        let rt = tokio::runtime::Runtime::new().unwrap();
        let _guard = rt.enter();
        let created = client
            .insert_event("token-1", "primary", &json!({"summary": "Algebra"}))
            .unwrap();
        assert_eq!(created["id"], "evt-1");
        mock.assert();
    }

    #[test]
    fn api_error_carries_status_and_body() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/calendars/primary/events/evt-1")
            .with_status(403)
            .with_body("rate limited")
            .create();

        let client = CalendarClient::with_base_url(&server.url());
        let rt = tokio::runtime::Runtime::new().unwrap();
        let _guard = rt.enter();
        let err = client.get_event("token-1", "primary", "evt-1").unwrap_err();
        match err {
            CoreError::Upstream(UpstreamError::Calendar { status, message }) => {
                assert_eq!(status, 403);
                assert_eq!(message, "rate limited");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn delete_treats_gone_as_success() {
        let mut server = mockito::Server::new();
        server
            .mock("DELETE", "/calendars/primary/events/evt-1")
            .with_status(404)
            .create();
        server
            .mock("DELETE", "/calendars/primary/events/evt-2")
            .with_status(500)
            .with_body("boom")
            .create();

        let client = CalendarClient::with_base_url(&server.url());
        let rt = tokio::runtime::Runtime::new().unwrap();
        let _guard = rt.enter();
        assert!(client.delete_event("token-1", "primary", "evt-1").is_ok());
        assert!(client.delete_event("token-1", "primary", "evt-2").is_err());
    }
}
