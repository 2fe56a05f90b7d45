//! Message service client (http://127.0.0.1:8000 by default).
//!
//! `MessageService` is the seam between the store and the remote resource; `HttpMessageService`
//! speaks the REST contract: list/create/update/delete on `/messages/` with trailing slashes.

use async_trait::async_trait;

use crate::message::{Message, MessageDraft, MessageId};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("message service request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("message service returned {status}: {body}")]
    Status { status: u16, body: String },
}

impl ApiError {
    /// True when the service answered 404 (e.g. the id no longer exists server-side).
    /// Transport failures never carry a status, so they are never "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status: 404, .. })
    }
}

/// The four remote operations on the conversation-message resource.
#[async_trait]
pub trait MessageService: Send + Sync {
    /// GET /messages/
    async fn list(&self) -> Result<Vec<Message>, ApiError>;
    /// POST /messages/
    async fn create(&self, user_message: &str) -> Result<Message, ApiError>;
    /// PUT /messages/{id}/
    async fn update(&self, id: MessageId, user_message: &str) -> Result<Message, ApiError>;
    /// DELETE /messages/{id}/
    async fn delete(&self, id: MessageId) -> Result<(), ApiError>;
}

/// Client for the message service HTTP API.
#[derive(Clone)]
pub struct HttpMessageService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpMessageService {
    pub fn new(base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self) -> String {
        format!("{}/messages/", self.base_url)
    }

    fn item_url(&self, id: MessageId) -> String {
        format!("{}/messages/{}/", self.base_url, id)
    }
}

/// Turn a non-2xx response into `ApiError::Status` with the body text.
async fn check_status(res: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    if res.status().is_success() {
        return Ok(res);
    }
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    Err(ApiError::Status { status, body })
}

#[async_trait]
impl MessageService for HttpMessageService {
    async fn list(&self) -> Result<Vec<Message>, ApiError> {
        let url = self.collection_url();
        log::debug!("GET {}", url);
        let res = self.client.get(&url).send().await?;
        let data: Vec<Message> = check_status(res).await?.json().await?;
        Ok(data)
    }

    async fn create(&self, user_message: &str) -> Result<Message, ApiError> {
        let url = self.collection_url();
        log::debug!("POST {}", url);
        let res = self
            .client
            .post(&url)
            .json(&MessageDraft::new(user_message))
            .send()
            .await?;
        let data: Message = check_status(res).await?.json().await?;
        Ok(data)
    }

    async fn update(&self, id: MessageId, user_message: &str) -> Result<Message, ApiError> {
        let url = self.item_url(id);
        log::debug!("PUT {}", url);
        let res = self
            .client
            .put(&url)
            .json(&MessageDraft::new(user_message))
            .send()
            .await?;
        let data: Message = check_status(res).await?.json().await?;
        Ok(data)
    }

    async fn delete(&self, id: MessageId) -> Result<(), ApiError> {
        let url = self.item_url(id);
        log::debug!("DELETE {}", url);
        let res = self.client.delete(&url).send().await?;
        // Acknowledgment body (if any) is ignored.
        check_status(res).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_defaults_and_trims_trailing_slash() {
        assert_eq!(HttpMessageService::new(None).base_url(), DEFAULT_BASE_URL);
        let svc = HttpMessageService::new(Some("http://chat.local:9000/".to_string()));
        assert_eq!(svc.base_url(), "http://chat.local:9000");
    }

    #[test]
    fn urls_keep_trailing_slashes() {
        let svc = HttpMessageService::new(Some("http://h".to_string()));
        assert_eq!(svc.collection_url(), "http://h/messages/");
        assert_eq!(svc.item_url(42), "http://h/messages/42/");
    }

    #[test]
    fn status_404_is_not_found() {
        let e = ApiError::Status {
            status: 404,
            body: r#"{"detail":"Message not found"}"#.to_string(),
        };
        assert!(e.is_not_found());
        let e = ApiError::Status {
            status: 500,
            body: String::new(),
        };
        assert!(!e.is_not_found());
        assert_eq!(e.to_string(), "message service returned 500: ");
    }
}
