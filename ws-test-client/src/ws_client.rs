use anyhow::{Context, Result};
use futures_util::stream::StreamExt;
use log::*;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Debug, Clone)]
pub struct Event {
    pub kind: String,
    pub data: Value,
    pub timestamp: Instant,
}

pub struct Connection {
    pub user_label: String,
    event_rx: mpsc::UnboundedReceiver<Event>,
    _handle: tokio::task::JoinHandle<()>,
}

impl Connection {
    pub async fn establish(base_url: &str, token: &str, user_label: String) -> Result<Self> {
        let ws_base = base_url
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1);
        let url = format!("{}/ws?token={}", ws_base, token);

        let (mut socket, _) = connect_async(url)
            .await
            .with_context(|| format!("Failed to open WebSocket for {}", user_label))?;
        let (tx, rx) = mpsc::unbounded_channel();

        let label = user_label.clone();
        let handle = tokio::spawn(async move {
            while let Some(received) = socket.next().await {
                match received {
                    Ok(Message::Text(text)) => {
                        let Ok(frame) = serde_json::from_str::<Value>(text.as_str()) else {
                            warn!("Non-JSON frame for {}: {}", label, text.as_str());
                            continue;
                        };
                        let event = Event {
                            kind: frame["kind"].as_str().unwrap_or_default().to_string(),
                            data: frame["data"].clone(),
                            timestamp: Instant::now(),
                        };
                        if tx.send(event).is_err() {
                            debug!("WebSocket receiver dropped for {}", label);
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("WebSocket closed by server for {}", label);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("WebSocket error for {}: {}", label, e);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            user_label,
            event_rx: rx,
            _handle: handle,
        })
    }

    pub async fn wait_for_event(&mut self, kind: &str, timeout: Duration) -> Result<Event> {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                anyhow::bail!("Timeout waiting for event: {}", kind);
            }

            match tokio::time::timeout(remaining, self.event_rx.recv()).await {
                Ok(Some(event)) if event.kind == kind => return Ok(event),
                Ok(Some(other)) => {
                    debug!("{} skipping {} while waiting for {}", self.user_label, other.kind, kind);
                }
                Ok(None) => anyhow::bail!("WebSocket connection closed"),
                Err(_) => anyhow::bail!("Timeout waiting for event: {}", kind),
            }
        }
    }
}
