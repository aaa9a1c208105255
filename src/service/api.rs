// service/api.rs
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::{
    dtos::supportdtos::*,
    error::ConsoleError,
    models::supportmodel::{SupportQuery, SupportTicket},
};

/// REST calls the support panel depends on.
#[async_trait]
pub trait SupportApi: Send + Sync {
    async fn fetch_queries(&self) -> Result<Vec<SupportQuery>, ConsoleError>;

    async fn fetch_tickets(&self) -> Result<Vec<SupportTicket>, ConsoleError>;

    async fn add_query_response(
        &self,
        query_id: &str,
        body: &ThreadEntryDto,
    ) -> Result<SupportQuery, ConsoleError>;

    async fn update_query_status(
        &self,
        query_id: &str,
        body: &UpdateQueryStatusDto,
    ) -> Result<SupportQuery, ConsoleError>;

    async fn add_ticket_message(
        &self,
        ticket_id: &str,
        body: &ThreadEntryDto,
    ) -> Result<SupportTicket, ConsoleError>;

    async fn update_ticket_status(
        &self,
        ticket_id: &str,
        body: &UpdateTicketStatusDto,
    ) -> Result<SupportTicket, ConsoleError>;
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn with_token(&self, token: String) -> Self {
        Self {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub async fn login(&self, body: &LoginDto) -> Result<String, ConsoleError> {
        let response = self
            .request(Method::POST, "/auth/login")
            .json(body)
            .send()
            .await?;

        // rejected credentials, not an expired session
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let message = error_message(response, status).await;
            tracing::warn!("Login rejected for {}: {}", body.email, message);
            return Err(ConsoleError::Api { status: status.as_u16(), message });
        }

        let data: LoginData = read_envelope(response).await?;
        tracing::info!("Logged in as {}", body.email);
        Ok(data.token)
    }

    /// Asks the backend whether the current token is still valid.
    pub async fn verify_token(&self) -> Result<(), ConsoleError> {
        if self.token.is_none() {
            return Err(ConsoleError::Unauthorized);
        }
        let response = self.request(Method::GET, "/auth/verify").send().await?;
        check_status(response).await.map(|_| ())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self
            .http
            .request(method, url)
            .header("Content-Type", "application/json");
        match &self.token {
            Some(token) => builder.header("Authorization", format!("Bearer {}", token)),
            None => builder,
        }
    }
}

fn segment(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}

#[async_trait]
impl SupportApi for ApiClient {
    async fn fetch_queries(&self) -> Result<Vec<SupportQuery>, ConsoleError> {
        let response = self.request(Method::GET, "/support/queries").send().await?;
        read_envelope(response).await
    }

    async fn fetch_tickets(&self) -> Result<Vec<SupportTicket>, ConsoleError> {
        let response = self.request(Method::GET, "/support/tickets").send().await?;
        read_envelope(response).await
    }

    async fn add_query_response(
        &self,
        query_id: &str,
        body: &ThreadEntryDto,
    ) -> Result<SupportQuery, ConsoleError> {
        let path = format!("/support/queries/{}/responses", segment(query_id));
        let response = self.request(Method::POST, &path).json(body).send().await?;
        read_envelope(response).await
    }

    async fn update_query_status(
        &self,
        query_id: &str,
        body: &UpdateQueryStatusDto,
    ) -> Result<SupportQuery, ConsoleError> {
        let path = format!("/support/queries/{}/status", segment(query_id));
        let response = self.request(Method::PUT, &path).json(body).send().await?;
        read_envelope(response).await
    }

    async fn add_ticket_message(
        &self,
        ticket_id: &str,
        body: &ThreadEntryDto,
    ) -> Result<SupportTicket, ConsoleError> {
        let path = format!("/support/tickets/{}/messages", segment(ticket_id));
        let response = self.request(Method::POST, &path).json(body).send().await?;
        read_envelope(response).await
    }

    async fn update_ticket_status(
        &self,
        ticket_id: &str,
        body: &UpdateTicketStatusDto,
    ) -> Result<SupportTicket, ConsoleError> {
        let path = format!("/support/tickets/{}/status", segment(ticket_id));
        let response = self.request(Method::PUT, &path).json(body).send().await?;
        read_envelope(response).await
    }
}

async fn check_status(response: Response) -> Result<Response, ConsoleError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        tracing::warn!("Admin API rejected the token ({})", status);
        return Err(ConsoleError::Unauthorized);
    }
    if !status.is_success() {
        let message = error_message(response, status).await;
        return Err(ConsoleError::Api { status: status.as_u16(), message });
    }
    Ok(response)
}

async fn error_message(response: Response, status: StatusCode) -> String {
    match response.json::<ApiErrorBody>().await {
        Ok(body) => body
            .message
            .or(body.error)
            .unwrap_or_else(|| status.to_string()),
        Err(_) => status.to_string(),
    }
}

async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<T, ConsoleError> {
    let response = check_status(response).await?;
    let envelope: ApiEnvelope<T> = response.json().await?;
    if let Some(message) = &envelope.message {
        tracing::debug!("Admin API: {}", message);
    }
    Ok(envelope.data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_path_encoded() {
        assert_eq!(segment("Q 1/2"), "Q%201%2F2");
        assert_eq!(segment("64f1c2"), "64f1c2");
    }

    #[test]
    fn test_with_token_keeps_base_url() {
        let anonymous = ApiClient::new("http://localhost:5000/api/", None);
        assert!(!anonymous.has_token());

        let authed = anonymous.with_token("tok".to_string());
        assert!(authed.has_token());
        assert_eq!(authed.base_url, "http://localhost:5000/api");
    }

    /// Answers a single request with `status` and a JSON `body`.
    async fn respond_once(status: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = stream.read(&mut chunk).await.unwrap();
                request.extend_from_slice(&chunk[..n]);
                if n == 0 {
                    break;
                }
                let text = String::from_utf8_lossy(&request);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .filter_map(|line| line.split_once(':'))
                        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
        });
        base_url
    }

    #[tokio::test]
    async fn test_rejected_login_is_not_a_session_error() {
        let base_url = respond_once("401 Unauthorized", r#"{"message":"Invalid email or password"}"#).await;
        let client = ApiClient::new(&base_url, None);
        let body = LoginDto { email: "admin@example.com".to_string(), password: "wrong".to_string() };

        match client.login(&body).await {
            Err(ConsoleError::Api { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid email or password");
            }
            other => panic!("unexpected login result {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejected_token_is_unauthorized() {
        let base_url = respond_once("401 Unauthorized", r#"{"message":"Token expired"}"#).await;
        let client = ApiClient::new(&base_url, Some("old".to_string()));
        assert!(matches!(client.fetch_queries().await, Err(ConsoleError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_verify_without_token_is_unauthorized() {
        let client = ApiClient::new("http://localhost:5000/api", None);
        assert!(matches!(client.verify_token().await, Err(ConsoleError::Unauthorized)));
    }
}
