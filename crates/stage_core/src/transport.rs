//! WebSocket bridge between the in-process sync channel and a relay server,
//! for sessions where the presenter and audience run in separate processes.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use futures::{SinkExt, StreamExt};
use shared::protocol::StageMessage;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::warn;
use url::Url;

use crate::channel::SyncChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportRole {
    Presenter,
    Audience,
}

impl TransportRole {
    fn as_str(&self) -> &'static str {
        match self {
            TransportRole::Presenter => "presenter",
            TransportRole::Audience => "audience",
        }
    }
}

pub struct TransportHandle {
    read_task: JoinHandle<()>,
    write_task: JoinHandle<()>,
}

impl TransportHandle {
    /// Tears the bridge down. The in-process channel keeps working; a later
    /// reconnect resynchronizes through the relay's snapshot cache.
    pub fn shutdown(&self) {
        self.read_task.abort();
        self.write_task.abort();
    }
}

/// Bridges the presenter side of a channel onto a relay: locally published
/// snapshots go out, incoming viewport reports are fed into the channel.
pub async fn connect_presenter(
    relay_url: &str,
    channel: Arc<SyncChannel>,
) -> Result<TransportHandle> {
    connect(relay_url, TransportRole::Presenter, channel).await
}

/// Bridges the audience side: incoming snapshots are published into the
/// local channel, locally reported viewports go out.
pub async fn connect_audience(
    relay_url: &str,
    channel: Arc<SyncChannel>,
) -> Result<TransportHandle> {
    connect(relay_url, TransportRole::Audience, channel).await
}

async fn connect(
    relay_url: &str,
    role: TransportRole,
    channel: Arc<SyncChannel>,
) -> Result<TransportHandle> {
    let ws_url = ws_endpoint(relay_url, role)?;
    let (stream, _) = connect_async(ws_url.as_str())
        .await
        .with_context(|| format!("failed to connect relay websocket: {ws_url}"))?;
    let (mut writer, mut reader) = stream.split();

    let write_task = match role {
        TransportRole::Presenter => {
            let mut snapshots = channel.subscribe_snapshots();
            // The relay's cache is primed from the current state so an
            // audience attaching later resynchronizes without us replaying.
            let prime = channel.latest_snapshot();
            tokio::spawn(async move {
                if let Some(snapshot) = prime {
                    if send_message(&mut writer, StageMessage::Snapshot { snapshot })
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                loop {
                    match snapshots.recv().await {
                        Ok(snapshot) => {
                            if send_message(&mut writer, StageMessage::Snapshot { snapshot })
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        }
        TransportRole::Audience => {
            let mut viewports = channel.subscribe_viewports();
            tokio::spawn(async move {
                loop {
                    match viewports.recv().await {
                        Ok(report) => {
                            if send_message(&mut writer, StageMessage::Viewport { report })
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        }
    };

    let read_channel = Arc::clone(&channel);
    let read_task = tokio::spawn(async move {
        while let Some(message) = reader.next().await {
            match message {
                Ok(Message::Text(text)) => match serde_json::from_str::<StageMessage>(&text) {
                    Ok(StageMessage::Snapshot { snapshot }) => match role {
                        // The presenter is authoritative; a snapshot echoed
                        // back at it is dropped.
                        TransportRole::Presenter => {}
                        TransportRole::Audience => read_channel.publish(snapshot),
                    },
                    Ok(StageMessage::Viewport { report }) => match role {
                        TransportRole::Presenter => read_channel.report_viewport(report),
                        TransportRole::Audience => {}
                    },
                    Err(error) => {
                        warn!(%error, "ignoring unparseable relay message");
                    }
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(error) => {
                    warn!(%error, "relay websocket receive failed");
                    break;
                }
            }
        }
    });

    Ok(TransportHandle {
        read_task,
        write_task,
    })
}

async fn send_message<S>(writer: &mut S, message: StageMessage) -> Result<()>
where
    S: SinkExt<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let text = serde_json::to_string(&message).context("failed to encode relay message")?;
    writer
        .send(Message::Text(text))
        .await
        .map_err(|error| anyhow!("relay websocket send failed: {error}"))
}

fn ws_endpoint(relay_url: &str, role: TransportRole) -> Result<Url> {
    let mut url = Url::parse(relay_url).context("invalid relay url")?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(anyhow!("unsupported relay url scheme: {other}")),
    };
    url.set_scheme(scheme)
        .map_err(|()| anyhow!("failed to set websocket scheme on relay url"))?;
    url.set_path("/ws");
    url.set_query(Some(&format!("role={}", role.as_str())));
    Ok(url)
}
