//! HTTP client for the dashboard's sync endpoints.

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Serialize;

use crate::config::Credentials;
use crate::error::{Result, SyncError};
use crate::models::{MessageRecord, SessionRecord, SyncBatch};

/// Where records go. The hook handler only talks to this trait.
#[async_trait]
pub trait SyncBackend {
    async fn sync_session(&self, session: &SessionRecord) -> Result<()>;
    async fn sync_message(&self, message: &MessageRecord) -> Result<()>;
    async fn sync_batch(&self, batch: &SyncBatch) -> Result<()>;
}

/// Client for `<site-url>/sync/*` authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct SyncClient {
    http: HttpClient,
    site_url: String,
    api_key: String,
}

impl SyncClient {
    pub fn new(credentials: &Credentials) -> Result<Self> {
        let http = HttpClient::builder()
            .user_agent(concat!("session-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| SyncError::Http {
                endpoint: credentials.site_url.clone(),
                source,
            })?;

        Ok(Self {
            http,
            site_url: credentials.site_url.trim_end_matches('/').to_string(),
            api_key: credentials.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.site_url, path)
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<()> {
        let url = self.url(path);
        tracing::debug!(%url, "POST");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|source| SyncError::Http {
                endpoint: path.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Backend {
                endpoint: path.to_string(),
                status,
                body,
            });
        }

        Ok(())
    }

    /// `GET /health`. Returns the response body on success.
    pub async fn health(&self) -> Result<String> {
        let response = self
            .http
            .get(self.url("/health"))
            .send()
            .await
            .map_err(|source| SyncError::Http {
                endpoint: "/health".to_string(),
                source,
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(SyncError::Backend {
                endpoint: "/health".to_string(),
                status,
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl SyncBackend for SyncClient {
    async fn sync_session(&self, session: &SessionRecord) -> Result<()> {
        self.post("/sync/session", session).await
    }

    async fn sync_message(&self, message: &MessageRecord) -> Result<()> {
        self.post("/sync/message", message).await
    }

    async fn sync_batch(&self, batch: &SyncBatch) -> Result<()> {
        self.post("/sync/batch", batch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use chrono::Utc;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> SyncClient {
        let creds = Credentials {
            site_url: format!("{}/", server.uri()),
            api_key: "test-key".to_string(),
        };
        SyncClient::new(&creds).unwrap()
    }

    #[tokio::test]
    async fn test_sync_session_posts_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sync/session"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({"sessionId": "s1", "inputTokens": 7})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut record = SessionRecord::new("s1");
        record.input_tokens = 7;
        client_for(&server).sync_session(&record).await.unwrap();
    }

    #[tokio::test]
    async fn test_sync_batch_body_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sync/batch"))
            .and(body_partial_json(serde_json::json!({
                "session": {"sessionId": "s1"},
                "messages": [{"messageId": "m1", "role": "assistant"}]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let batch = SyncBatch {
            session: Some(SessionRecord::new("s1")),
            messages: vec![MessageRecord::new("s1", "m1", Role::Assistant, Utc::now())],
        };
        client_for(&server).sync_batch(&batch).await.unwrap();
    }

    #[tokio::test]
    async fn test_backend_rejection_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sync/message"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .mount(&server)
            .await;

        let message = MessageRecord::new("s1", "m1", Role::User, Utc::now());
        let err = client_for(&server).sync_message(&message).await.unwrap_err();
        match err {
            SyncError::Backend { endpoint, status, body } => {
                assert_eq!(endpoint, "/sync/message");
                assert_eq!(status.as_u16(), 401);
                assert_eq!(body, "bad token");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_health() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        assert_eq!(client_for(&server).health().await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_http_error() {
        let creds = Credentials {
            site_url: "http://127.0.0.1:1".to_string(),
            api_key: "k".to_string(),
        };
        let client = SyncClient::new(&creds).unwrap();
        let err = client.sync_session(&SessionRecord::new("s1")).await.unwrap_err();
        assert!(matches!(err, SyncError::Http { .. }));
    }
}
