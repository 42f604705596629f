use std::{sync::Arc, time::Duration};

use {
    courier_agent_client::{AgentClient, AgentEndpoint},
    courier_common::{IncomingMessage, Metadata, OutgoingMessage},
    courier_config::{AgentSettings, merge_agent_settings},
    courier_routing::RoutingEngine,
    serde::Serialize,
    tokio::sync::mpsc,
    tracing::{debug, error, info, warn},
};

use crate::provider::Provider;

/// Final outcome of handling one inbound message.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl DispatchOutcome {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            response: None,
            error: Some(error.into()),
            metadata: None,
        }
    }
}

/// Composes routing engine, agent client, and provider.
pub struct Dispatcher {
    engine: RoutingEngine,
    agent: AgentClient,
    defaults: AgentSettings,
    provider: Option<Provider>,
}

impl Dispatcher {
    pub fn new(
        engine: RoutingEngine,
        defaults: AgentSettings,
        provider: Option<Provider>,
    ) -> Self {
        let agent = AgentClient::new(Duration::from_secs(defaults.timeout_secs));
        Self {
            engine,
            agent,
            defaults,
            provider,
        }
    }

    pub fn with_agent_client(mut self, agent: AgentClient) -> Self {
        self.agent = agent;
        self
    }

    /// Normalize an HTTP-pushed payload through the configured provider.
    pub fn normalize_webhook(&self, payload: &serde_json::Value) -> Option<IncomingMessage> {
        self.provider
            .as_ref()
            .and_then(|p| p.normalize_webhook(payload))
    }

    /// The end-to-end flow for one message. Never panics and never lets an
    /// agent-client error escape: every path ends in a [`DispatchOutcome`].
    pub async fn route_message(&self, message: &IncomingMessage) -> DispatchOutcome {
        let route = match self.engine.route(message).await {
            Ok(Some(route)) => route,
            Ok(None) => {
                info!(
                    channel_id = %message.channel_id,
                    message_id = %message.id,
                    "no route found"
                );
                return DispatchOutcome::failure(format!(
                    "No route found for channel {}",
                    message.channel_id
                ));
            },
            Err(e) => {
                error!(
                    channel_id = %message.channel_id,
                    message_id = %message.id,
                    error = %e,
                    "route lookup failed"
                );
                return DispatchOutcome::failure(format!("Route lookup failed: {e}"));
            },
        };

        let settings = merge_agent_settings(
            &self.defaults,
            &route.agent_endpoint,
            route.config.as_ref(),
        );
        let endpoint = AgentEndpoint {
            base_url: settings.base_url.clone(),
            app_name: settings.app_name.clone(),
            timeout: Some(Duration::from_secs(settings.timeout_secs)),
        };

        let agent_response = match self.agent.send_message(&endpoint, message).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    channel_id = %message.channel_id,
                    message_id = %message.id,
                    error = %e,
                    "agent call failed"
                );
                return DispatchOutcome::failure(format!(
                    "Failed to communicate with agent: {e}"
                ));
            },
        };

        if !agent_response.success {
            // Agent-reported failure passes through unchanged.
            return DispatchOutcome {
                success: false,
                response: None,
                error: agent_response.error,
                metadata: agent_response.metadata,
            };
        }

        let mut metadata = Metadata::new();
        metadata.insert("agent_endpoint".into(), route.agent_endpoint.clone().into());
        metadata.insert("environment".into(), route.environment.to_string().into());
        if let Some(extra) = agent_response.metadata {
            metadata.extend(extra);
        }

        let reply = agent_response.response.unwrap_or_default();
        if !reply.is_empty()
            && let Some(provider) = &self.provider
        {
            let outgoing = OutgoingMessage {
                to: message.from.clone(),
                channel_id: message.channel_id.clone(),
                text: reply.clone(),
                metadata: None,
            };
            // A reply-send failure is logged and swallowed: the agent did
            // its part, and the caller gets that success.
            if let Err(e) = provider.send(&outgoing).await {
                error!(
                    channel_id = %message.channel_id,
                    message_id = %message.id,
                    provider = provider.kind(),
                    error = %e,
                    "failed to deliver reply"
                );
            } else {
                debug!(
                    channel_id = %message.channel_id,
                    provider = provider.kind(),
                    "reply delivered"
                );
            }
        }

        DispatchOutcome {
            success: true,
            response: (!reply.is_empty()).then_some(reply),
            error: None,
            metadata: Some(metadata),
        }
    }
}

/// Consume the direct connection's inbound stream, handling each message as
/// its own task so slow agents never serialize unrelated channels.
pub fn spawn_inbound_pump(
    dispatcher: Arc<Dispatcher>,
    mut inbound: mpsc::Receiver<IncomingMessage>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = inbound.recv().await {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                let outcome = dispatcher.route_message(&message).await;
                if !outcome.success {
                    debug!(
                        channel_id = %message.channel_id,
                        error = ?outcome.error,
                        "message not dispatched"
                    );
                }
            });
        }
        debug!("inbound pump stopped: channel closed");
    })
}
