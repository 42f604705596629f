use std::{sync::Arc, time::Duration};

use {
    courier_common::{AgentResponse, IncomingMessage, Metadata},
    tracing::{debug, warn},
    url::Url,
};

use crate::{
    error::AgentError,
    protocol::{MessagePart, NewMessage, RunRequest, TurnEvent, reply_text},
};

/// Custom session-id generator: channel id → session id.
pub type SessionIdFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Where and as whom to call an agent.
#[derive(Debug, Clone)]
pub struct AgentEndpoint {
    pub base_url: String,
    pub app_name: String,
    /// Per-route override of the client's default timeout.
    pub timeout: Option<Duration>,
}

/// Check an endpoint URL before use: must parse and be http(s).
pub fn validate_endpoint(raw: &str) -> Result<Url, AgentError> {
    let url = Url::parse(raw).map_err(|e| AgentError::InvalidEndpoint(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(AgentError::InvalidEndpoint(format!(
            "unsupported scheme {scheme} in {raw}"
        ))),
    }
}

/// Client for the turn-based run protocol.
#[derive(Clone)]
pub struct AgentClient {
    client: reqwest::Client,
    timeout: Duration,
    session_id_fn: Option<SessionIdFn>,
}

impl Default for AgentClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl AgentClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
            session_id_fn: None,
        }
    }

    /// Replace the deterministic `session-{channel_id}` session derivation.
    pub fn with_session_id_fn(mut self, f: SessionIdFn) -> Self {
        self.session_id_fn = Some(f);
        self
    }

    fn session_id(&self, channel_id: &str) -> String {
        match &self.session_id_fn {
            Some(f) => f(channel_id),
            None => format!("session-{channel_id}"),
        }
    }

    /// Send one message and wait (bounded) for the agent's turn events.
    ///
    /// The timeout drops the in-flight request, cancelling it together with
    /// its timer — a late agent reply goes nowhere.
    pub async fn send_message(
        &self,
        endpoint: &AgentEndpoint,
        message: &IncomingMessage,
    ) -> Result<AgentResponse, AgentError> {
        let url = validate_endpoint(&endpoint.base_url)?;
        let run_url = format!("{}/run", url.as_str().trim_end_matches('/'));

        let request = RunRequest {
            app_name: endpoint.app_name.clone(),
            user_id: message.channel_id.clone(),
            session_id: self.session_id(&message.channel_id),
            new_message: NewMessage {
                parts: vec![MessagePart {
                    text: Some(message.text.clone()),
                }],
                role: "user",
            },
            streaming: false,
        };

        debug!(
            message_id = %message.id,
            channel_id = %message.channel_id,
            url = %run_url,
            "calling agent"
        );

        let send = async {
            let response = self.client.post(&run_url).json(&request).send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(AgentError::Http {
                    status: status.as_u16(),
                    body,
                });
            }
            let events: Vec<TurnEvent> = response
                .json()
                .await
                .map_err(|e| AgentError::Protocol(format!("turn events did not parse: {e}")))?;
            Ok(events)
        };

        let timeout = endpoint.timeout.unwrap_or(self.timeout);
        let events = match tokio::time::timeout(timeout, send).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    message_id = %message.id,
                    channel_id = %message.channel_id,
                    timeout_secs = timeout.as_secs(),
                    "agent call timed out, request cancelled"
                );
                return Err(AgentError::Timeout {
                    secs: timeout.as_secs(),
                });
            },
        };

        let Some(text) = reply_text(&events) else {
            return Err(AgentError::Protocol(
                "no model-authored turn in agent reply".into(),
            ));
        };

        let mut metadata = Metadata::new();
        if let Some(invocation_id) = events
            .iter()
            .rev()
            .find(|e| e.author.as_deref() == Some("model"))
            .and_then(|e| e.invocation_id.clone())
        {
            metadata.insert("invocation_id".into(), invocation_id.into());
        }

        Ok(AgentResponse {
            success: true,
            response: Some(text),
            error: None,
            metadata: (!metadata.is_empty()).then_some(metadata),
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn message(channel_id: &str, text: &str) -> IncomingMessage {
        IncomingMessage {
            id: "m1".into(),
            from: format!("{channel_id}@s.whatsapp.net"),
            channel_id: channel_id.into(),
            text: text.into(),
            timestamp: Utc::now(),
            metadata: Default::default(),
        }
    }

    fn endpoint(base_url: &str) -> AgentEndpoint {
        AgentEndpoint {
            base_url: base_url.into(),
            app_name: "support".into(),
            timeout: None,
        }
    }

    #[test]
    fn endpoint_validation_requires_http_scheme() {
        assert!(validate_endpoint("http://agent:8000").is_ok());
        assert!(validate_endpoint("https://agent.example.com").is_ok());
        assert!(matches!(
            validate_endpoint("ftp://agent"),
            Err(AgentError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            validate_endpoint("not a url"),
            Err(AgentError::InvalidEndpoint(_))
        ));
    }

    #[tokio::test]
    async fn happy_path_sends_run_request_and_reads_last_model_turn() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/run")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "app_name": "support",
                "user_id": "549",
                "session_id": "session-549",
                "new_message": { "parts": [{ "text": "hi" }], "role": "user" },
                "streaming": false,
            })))
            .with_status(200)
            .with_body(
                serde_json::json!([
                    { "author": "model", "invocationId": "inv-1",
                      "content": { "parts": [{ "text": "hello " }, { "text": "there" }], "role": "model" } },
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let client = AgentClient::default();
        let response = client
            .send_message(&endpoint(&server.url()), &message("549", "hi"))
            .await
            .unwrap();

        assert!(response.success);
        assert_eq!(response.response.as_deref(), Some("hello there"));
        assert_eq!(
            response.metadata.unwrap()["invocation_id"],
            serde_json::json!("inv-1")
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn custom_session_id_generator_is_used() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/run")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "session_id": "lab:549",
            })))
            .with_status(200)
            .with_body(
                serde_json::json!([
                    { "author": "model", "content": { "parts": [{ "text": "ok" }] } },
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let client = AgentClient::default()
            .with_session_id_fn(Arc::new(|channel| format!("lab:{channel}")));
        client
            .send_message(&endpoint(&server.url()), &message("549", "hi"))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_2xx_becomes_http_error_with_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/run")
            .with_status(500)
            .with_body("agent exploded")
            .create_async()
            .await;

        let client = AgentClient::default();
        let err = client
            .send_message(&endpoint(&server.url()), &message("549", "hi"))
            .await
            .unwrap_err();
        match err {
            AgentError::Http { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "agent exploded");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn reply_without_model_turn_is_a_protocol_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/run")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = AgentClient::default();
        let err = client
            .send_message(&endpoint(&server.url()), &message("549", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Protocol(_)));
    }

    #[tokio::test]
    async fn slow_agent_hits_the_timeout() {
        // A listener that accepts and then stays silent parks the request
        // until our timeout fires.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = AgentClient::new(Duration::from_millis(100));
        let start = std::time::Instant::now();
        let err = client
            .send_message(&endpoint(&format!("http://{addr}")), &message("549", "hi"))
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Timeout { secs: 0 }));
        assert!(err.to_string().contains("timed out"));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
