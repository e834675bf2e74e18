//! A typed client for the gateway's `/send` endpoint.

use mailgate_core::{Email, Response};
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway response was not valid json: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("gateway rejected the send: {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

pub struct Client {
    url: String,
    http: reqwest::Client,
}

impl Client {
    #[must_use]
    pub fn new(base_url: impl Into<String>, key: &str) -> Self {
        let base_url = base_url.into();
        Self {
            url: format!("{base_url}/send?key={key}"),
            http: reqwest::Client::new(),
        }
    }

    /// Submit an email, letting the gateway pick the backend.
    ///
    /// # Errors
    ///
    /// If the request fails or the gateway answers non-200.
    pub async fn send(&self, email: &Email) -> Result<Vec<Response>, ClientError> {
        self.send_with(email, "").await
    }

    /// Submit an email with a preferred backend hint; the gateway falls
    /// back to its strategy when the hint names no eligible backend.
    ///
    /// # Errors
    ///
    /// If the request fails or the gateway answers non-200.
    pub async fn send_with(
        &self,
        email: &Email,
        service: &str,
    ) -> Result<Vec<Response>, ClientError> {
        let mut request = self.http.post(&self.url).json(email);
        if !service.is_empty() {
            request = request.header("X-Service", service);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK {
            return Err(ClientError::Rejected { status, body });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mailgate_core::Address;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn email() -> Email {
        Email {
            from: Address::new("Ops", "ops@example.com"),
            to: vec![Address::new("", "bob@customer.com")],
            subject: "hi".to_string(),
            text: "hello".to_string(),
            ..Email::default()
        }
    }

    #[tokio::test]
    async fn send_posts_the_email_with_the_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(query_param("key", "sekret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"service": "sendgrid", "message_id": "abc", "email": ""}
            ])))
            .mount(&server)
            .await;

        let client = Client::new(server.uri(), "sekret");
        let responses = client.send(&email()).await.unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].id(), "sendgrid:abc");
    }

    #[tokio::test]
    async fn preferred_backend_travels_in_the_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-Service", "mailjet"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let client = Client::new(server.uri(), "sekret");
        let responses = client.send_with(&email(), "mailjet").await.unwrap();
        assert!(responses.is_empty());
    }

    #[tokio::test]
    async fn non_200_surfaces_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("not authorized"))
            .mount(&server)
            .await;

        let client = Client::new(server.uri(), "wrong");
        let err = client.send(&email()).await.unwrap_err();
        assert!(matches!(err, ClientError::Rejected { .. }));
        assert!(err.to_string().contains("not authorized"));
    }
}
