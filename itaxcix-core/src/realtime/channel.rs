//! Session-scoped push channel
//!
//! Owns the WebSocket connection. A reader task decodes every text frame and
//! forwards the typed message, in arrival order, to an unbounded queue that
//! the [`super::DispatchRouter`] pump drains. Frames that fail to decode are
//! logged and dropped.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use super::decoder::{self, MessageKind, RealtimeMessage};
use super::ws::{self, WsMessage, WsReader, WsWriter};
use crate::error::{AppError, AppResult};
use crate::models::LocationUpdateRequest;

/// Live connection to the push endpoint
#[derive(Debug)]
pub struct PushChannel {
    writer: Arc<Mutex<WsWriter>>,
    reader_task: JoinHandle<()>,
}

impl PushChannel {
    /// Connect and start the reader task.
    ///
    /// The returned receiver yields decoded messages until the connection
    /// closes.
    pub async fn connect(
        url: &str,
        token: Option<&str>,
    ) -> AppResult<(Self, mpsc::UnboundedReceiver<RealtimeMessage>)> {
        let (writer, reader) = ws::connect(url, token).await?;
        let writer = Arc::new(Mutex::new(writer));
        let (tx, rx) = mpsc::unbounded_channel();

        let reader_task = tokio::spawn(read_loop(reader, Arc::clone(&writer), tx));
        tracing::info!("Push channel connected: {}", url);

        Ok((
            Self {
                writer,
                reader_task,
            },
            rx,
        ))
    }

    /// True until the server closes the connection or a read fails
    pub fn is_open(&self) -> bool {
        !self.reader_task.is_finished()
    }

    /// Send an arbitrary `{ type, data }` frame
    pub async fn send<T: serde::Serialize>(&self, kind: MessageKind, data: &T) -> AppResult<()> {
        if !self.is_open() {
            return Err(AppError::Channel("push channel is closed".to_string()));
        }
        let text = decoder::encode(kind, data)?;
        self.writer.lock().await.send_text(&text).await
    }

    /// Report the driver's current position
    pub async fn send_location(&self, location: LocationUpdateRequest) -> AppResult<()> {
        self.send(MessageKind::LocationUpdateRequest, &location)
            .await
    }

    /// Close the connection and stop the reader
    pub async fn close(self) -> AppResult<()> {
        let result = self.writer.lock().await.close().await;
        self.reader_task.abort();
        tracing::info!("Push channel closed");
        result
    }
}

impl Drop for PushChannel {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

async fn read_loop(
    mut reader: WsReader,
    writer: Arc<Mutex<WsWriter>>,
    tx: mpsc::UnboundedSender<RealtimeMessage>,
) {
    while let Some(frame) = reader.recv().await {
        match frame {
            Ok(WsMessage::Text(text)) => match decoder::decode(&text) {
                Ok(message) => {
                    if tx.send(message).is_err() {
                        tracing::debug!("Dispatch pump gone; stopping push reader");
                        break;
                    }
                }
                Err(e) => tracing::warn!("Dropping push frame: {}", e),
            },
            Ok(WsMessage::Ping(data)) => {
                if let Err(e) = writer.lock().await.send_pong(data).await {
                    tracing::warn!("Failed to answer ping: {}", e);
                }
            }
            Ok(WsMessage::Close { code, reason }) => {
                tracing::info!("Push channel closed by server ({}): {}", code, reason);
                break;
            }
            Ok(WsMessage::Binary(_)) => tracing::debug!("Ignoring binary push frame"),
            Ok(WsMessage::Pong(_)) => {}
            Err(e) => {
                tracing::error!("Push channel read failed: {}", e);
                break;
            }
        }
    }
}
