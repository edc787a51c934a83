//! Liveness handler
//!
//! Answers careline.ping so deploy checks can confirm the worker is
//! subscribed and replying without touching the database.

use anyhow::Result;
use async_nats::{Client, Subscriber};
use chrono::Utc;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Default, Serialize, Deserialize)]
struct PingRequest {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PongResponse {
    message: String,
    timestamp: String,
}

/// Handle ping messages. An empty or malformed payload still gets a pong.
pub async fn handle_ping(client: Client, mut subscriber: Subscriber) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received ping message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: PingRequest = serde_json::from_slice(&msg.payload).unwrap_or_default();

        let response = PongResponse {
            message: match request.message {
                Some(m) => format!("pong: {}", m),
                None => "pong".to_string(),
            },
            timestamp: Utc::now().to_rfc3339(),
        };

        let _ = client
            .publish(reply, serde_json::to_vec(&response)?.into())
            .await;
        debug!("Answered ping");
    }

    Ok(())
}
