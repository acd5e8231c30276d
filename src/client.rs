use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::reply;
use crate::transcript::{ChatRequest, Transcript};

/// Why a single chat turn failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("The operation was aborted: no response after {}s", format_secs(.0))]
    Timeout(Duration),
    #[error("The operation was aborted by the user")]
    Cancelled,
    #[error("{0}")]
    Transport(String),
    #[error("HTTP {status} {reason}: {body}")]
    Status {
        status: u16,
        reason: String,
        body: String,
    },
    #[error("METHOD_NOT_ALLOWED: The server at {url} does not accept POST requests. If you're testing locally, start the proxy with `advisor-chatd` and point --url at its /api/chat endpoint.")]
    MethodNotAllowed { url: String },
    #[error("Invalid JSON response from server: {0}")]
    InvalidJson(String),
    #[error("Server error: {0}")]
    Server(String),
}

impl ChatError {
    /// Timeouts and user cancellations both abort the call outright.
    pub fn is_abort(&self) -> bool {
        matches!(self, ChatError::Timeout(_) | ChatError::Cancelled)
    }
}

pub fn format_secs(duration: &Duration) -> String {
    format!("{}", duration.as_secs_f64())
}

/// Undecoded HTTP exchange result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub url: String,
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl RawResponse {
    pub fn ok(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            reason: "OK".to_string(),
            body: body.into(),
        }
    }
}

/// Turns a raw exchange into the decoded reply body, or the error to show.
pub fn interpret_response(raw: RawResponse) -> std::result::Result<Value, ChatError> {
    if !(200..300).contains(&raw.status) {
        if raw.status == 405 {
            return Err(ChatError::MethodNotAllowed { url: raw.url });
        }
        return Err(ChatError::Status {
            status: raw.status,
            reason: raw.reason,
            body: raw.body,
        });
    }

    let body = if raw.body.is_empty() {
        json!({})
    } else {
        match serde_json::from_str::<Value>(&raw.body) {
            // Only an object can carry a reply or an error member.
            Ok(body) if body.is_object() => body,
            _ => return Err(ChatError::InvalidJson(raw.body)),
        }
    };

    if let Some(message) = reply::error_message(&body) {
        return Err(ChatError::Server(message));
    }
    Ok(body)
}

/// Network seam of the chat controller.
///
/// Implementations must stop work and return [`ChatError::Cancelled`] once
/// `cancel` fires.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(
        &self,
        transcript: &Transcript,
        cancel: &CancellationToken,
    ) -> std::result::Result<RawResponse, ChatError>;
}

#[derive(Clone)]
pub struct HttpChatTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpChatTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn exchange(&self, transcript: &Transcript) -> std::result::Result<RawResponse, ChatError> {
        let response = self
            .client
            .post(&self.url)
            .json(&ChatRequest::new(transcript))
            .send()
            .await
            .map_err(|err| ChatError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ChatError::Transport(err.to_string()))?;

        Ok(RawResponse {
            url: self.url.clone(),
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn send(
        &self,
        transcript: &Transcript,
        cancel: &CancellationToken,
    ) -> std::result::Result<RawResponse, ChatError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ChatError::Cancelled),
            result = self.exchange(transcript) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(status: u16, reason: &str, body: &str) -> RawResponse {
        RawResponse {
            url: "http://proxy.test/api/chat".to_string(),
            status,
            reason: reason.to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn success_body_is_decoded() {
        let body = interpret_response(raw(200, "OK", r#"{"reply":"hi"}"#)).unwrap();
        assert_eq!(body["reply"], "hi");
    }

    #[test]
    fn empty_success_body_is_an_empty_object() {
        assert_eq!(interpret_response(raw(200, "OK", "")).unwrap(), json!({}));
    }

    #[test]
    fn non_json_success_body_is_reported_with_raw_text() {
        let err = interpret_response(raw(200, "OK", "<html>")).unwrap_err();
        assert_eq!(err, ChatError::InvalidJson("<html>".to_string()));
        assert_eq!(err.to_string(), "Invalid JSON response from server: <html>");
    }

    #[test]
    fn non_object_success_body_is_invalid() {
        for body in ["null", r#""x""#, "[]", "42"] {
            let err = interpret_response(raw(200, "OK", body)).unwrap_err();
            assert_eq!(err, ChatError::InvalidJson(body.to_string()));
        }
    }

    #[test]
    fn error_status_keeps_server_body() {
        let err = interpret_response(raw(429, "Too Many Requests", r#"{"error":"slow"}"#))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"HTTP 429 Too Many Requests: {"error":"slow"}"#
        );
        assert!(!err.is_abort());
    }

    #[test]
    fn method_not_allowed_gets_a_hint() {
        let err = interpret_response(raw(405, "Method Not Allowed", "")).unwrap_err();
        assert!(matches!(err, ChatError::MethodNotAllowed { .. }));
        assert!(err.to_string().contains("advisor-chatd"));
        assert!(err.to_string().contains("http://proxy.test/api/chat"));
    }

    #[test]
    fn error_member_is_unwrapped() {
        let err = interpret_response(raw(
            200,
            "OK",
            r#"{"error":{"message":"model overloaded"}}"#,
        ))
        .unwrap_err();
        assert_eq!(err, ChatError::Server("model overloaded".to_string()));
        assert_eq!(err.to_string(), "Server error: model overloaded");
    }

    #[test]
    fn aborts_are_recognised() {
        assert!(ChatError::Timeout(Duration::from_secs(25)).is_abort());
        assert!(ChatError::Cancelled.is_abort());
        assert!(ChatError::Timeout(Duration::from_secs(25))
            .to_string()
            .contains("25s"));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits_http_call() {
        let transport = HttpChatTransport::new("http://127.0.0.1:9/api/chat");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = transport.send(&Transcript::default(), &cancel).await;
        assert_eq!(result, Err(ChatError::Cancelled));
    }
}
