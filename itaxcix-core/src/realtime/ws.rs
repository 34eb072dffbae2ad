//! WebSocket transport for the push channel.
//!
//! Thin wrapper around `tokio-tungstenite` that splits a connection into a
//! writer and a reader half. Reconnection and keep-alive are left to the
//! server and the library; this layer only answers pings.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite;

use crate::error::{AppError, AppResult};

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Received WebSocket frame
#[derive(Debug)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    /// Close frame; code 1005 when the peer sent none
    Close { code: u16, reason: String },
}

/// Write half of a WebSocket connection
#[derive(Debug)]
pub struct WsWriter {
    sink: futures_util::stream::SplitSink<WsStream, tungstenite::Message>,
}

impl WsWriter {
    pub async fn send_text(&mut self, text: &str) -> AppResult<()> {
        self.sink
            .send(tungstenite::Message::Text(text.to_string()))
            .await
            .map_err(|e| AppError::Channel(format!("WebSocket send_text failed: {e}")))
    }

    pub async fn send_pong(&mut self, data: Vec<u8>) -> AppResult<()> {
        self.sink
            .send(tungstenite::Message::Pong(data))
            .await
            .map_err(|e| AppError::Channel(format!("WebSocket send_pong failed: {e}")))
    }

    /// Send a close frame and flush the sink
    pub async fn close(&mut self) -> AppResult<()> {
        self.sink
            .close()
            .await
            .map_err(|e| AppError::Channel(format!("WebSocket close failed: {e}")))
    }
}

/// Read half of a WebSocket connection
#[derive(Debug)]
pub struct WsReader {
    stream: futures_util::stream::SplitStream<WsStream>,
}

impl WsReader {
    /// Receive the next frame, `None` once the stream ends
    pub async fn recv(&mut self) -> Option<AppResult<WsMessage>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(AppError::Channel(format!("WebSocket read error: {e}")))),
            };

            let frame = match message {
                tungstenite::Message::Text(text) => WsMessage::Text(text.to_string()),
                tungstenite::Message::Binary(data) => WsMessage::Binary(data.to_vec()),
                tungstenite::Message::Ping(data) => WsMessage::Ping(data.to_vec()),
                tungstenite::Message::Pong(data) => WsMessage::Pong(data.to_vec()),
                tungstenite::Message::Close(close_frame) => {
                    let (code, reason) = close_frame
                        .map(|cf| (cf.code.into(), cf.reason.to_string()))
                        .unwrap_or((1005, String::new()));
                    WsMessage::Close { code, reason }
                }
                // Raw frames never surface from a client stream
                tungstenite::Message::Frame(_) => continue,
            };
            return Some(Ok(frame));
        }
    }
}

/// Connect with an optional bearer token and split the stream.
pub async fn connect(url: &str, token: Option<&str>) -> AppResult<(WsWriter, WsReader)> {
    use tungstenite::client::IntoClientRequest;

    let mut request = url
        .into_client_request()
        .map_err(|e| AppError::Config(format!("invalid WebSocket URL {url}: {e}")))?;

    if let Some(token) = token {
        let value = tungstenite::http::HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| AppError::Channel("auth token is not a valid header value".to_string()))?;
        request
            .headers_mut()
            .insert(tungstenite::http::header::AUTHORIZATION, value);
    }

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| AppError::Channel(format!("WebSocket connect failed: {e}")))?;

    let (sink, stream) = ws_stream.split();

    Ok((WsWriter { sink }, WsReader { stream }))
}
